use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::batch::batched_upload_tracked;
use crate::cleanup::Cleanup;
use crate::config::{InteropConfig, DEFAULT_CLEANUP_DELAY};
use crate::error::{Result, RunFailure};
use crate::report::{prepare_results, print_results, whole_millis, RunReport};
use crate::uploader::Uploader;

pub const PRE_POPULATE: &str = "pre-populate";
pub const EXEC: &str = "exec";

/// Shape of a run. Missing fields fall back to the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunOptions {
    pub pre_batches: usize,
    pub pre_exposures: usize,
    pub batches: usize,
    pub exposures: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            pre_batches: 0,
            pre_exposures: 5000,
            batches: 1,
            exposures: 1,
        }
    }
}

impl RunOptions {
    pub fn from_json(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(raw)?)
    }
}

/// One volume test against a configured interop server: a pre-populate phase,
/// a measured phase, then cleanup of every batch that was stored.
pub struct VolumeTest<C> {
    config: InteropConfig,
    cleanup: C,
    cleanup_delay: Duration,
    print_results: bool,
}

impl<C: Cleanup> VolumeTest<C> {
    pub fn new(config: InteropConfig, cleanup: C) -> Self {
        Self {
            config,
            cleanup,
            cleanup_delay: DEFAULT_CLEANUP_DELAY,
            print_results: false,
        }
    }

    /// Pause before cleanup so the server under test has settled its writes
    /// before rows are deleted underneath it.
    pub fn with_cleanup_delay(mut self, delay: Duration) -> Self {
        self.cleanup_delay = delay;
        self
    }

    pub fn with_print_results(mut self, enabled: bool) -> Self {
        self.print_results = enabled;
        self
    }

    pub async fn run(&self, options: RunOptions) -> std::result::Result<Vec<RunReport>, RunFailure> {
        info!(
            id = %self.config.id,
            pre_batches = options.pre_batches,
            pre_exposures = options.pre_exposures,
            batches = options.batches,
            exposures = options.exposures,
            "Starting volume test"
        );

        let mut tags = Vec::new();
        let outcome = self.execute(options, &mut tags).await;
        if let Err(err) = &outcome {
            error!(error = %err, "Volume test failed");
        }

        info!(
            tags = tags.len(),
            delay_ms = whole_millis(self.cleanup_delay),
            "Starting cleanup"
        );
        tokio::time::sleep(self.cleanup_delay).await;
        let cleaned = self.cleanup.cleanup(&tags).await;

        match (outcome, cleaned) {
            (Ok(reports), Ok(())) => {
                info!("Cleanup done");
                Ok(reports)
            }
            (Ok(_), Err(cleanup)) => {
                error!(error = %cleanup, "Cleanup failed");
                Err(RunFailure::Cleanup(cleanup))
            }
            (Err(run), Ok(())) => {
                info!("Cleanup done");
                Err(RunFailure::Run(run))
            }
            (Err(run), Err(cleanup)) => {
                error!(error = %cleanup, "Cleanup failed");
                Err(RunFailure::Both { run, cleanup })
            }
        }
    }

    async fn execute(
        &self,
        options: RunOptions,
        tags: &mut Vec<String>,
    ) -> Result<Vec<RunReport>> {
        let uploader = Uploader::from_config(&self.config)?;

        let pre_populate = batched_upload_tracked(
            &uploader,
            options.pre_batches,
            options.pre_exposures,
            tags,
        )
        .await?;
        let exec =
            batched_upload_tracked(&uploader, options.batches, options.exposures, tags).await?;

        info!("Done testing");

        let reports = vec![
            prepare_results(PRE_POPULATE, &pre_populate),
            prepare_results(EXEC, &exec),
        ];
        print_results(&reports, self.print_results);

        Ok(reports)
    }
}
