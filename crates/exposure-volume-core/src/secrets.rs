//! Access to the centralized secret and parameter stores used in production.

use async_trait::async_trait;
use aws_sdk_secretsmanager::error::DisplayErrorContext as SecretsErrorContext;
use aws_sdk_ssm::error::DisplayErrorContext as SsmErrorContext;
use serde::de::DeserializeOwned;

use crate::error::{Result, VolumeError};

/// Named lookups against a secret store (JSON documents) and a parameter
/// store (plain strings). Names are given without any deployment prefix.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get_secret(&self, name: &str) -> Result<String>;
    async fn get_parameter(&self, name: &str) -> Result<String>;
}

/// Fetch a secret and decode it as JSON.
pub async fn get_secret_json<T: DeserializeOwned>(
    store: &dyn ConfigStore,
    name: &str,
) -> Result<T> {
    let raw = store.get_secret(name).await?;
    serde_json::from_str(&raw).map_err(|err| VolumeError::Secret {
        name: name.to_string(),
        message: format!("secret is not valid JSON for the expected shape: {err}"),
    })
}

/// AWS Secrets Manager + SSM Parameter Store. Every name is prefixed with the
/// configured `CONFIG_VAR_PREFIX`.
#[derive(Clone)]
pub struct AwsConfigStore {
    secrets: aws_sdk_secretsmanager::Client,
    ssm: aws_sdk_ssm::Client,
    prefix: String,
}

impl AwsConfigStore {
    pub fn new(
        secrets: aws_sdk_secretsmanager::Client,
        ssm: aws_sdk_ssm::Client,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            secrets,
            ssm,
            prefix: prefix.into(),
        }
    }

    pub fn qualified_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }
}

#[async_trait]
impl ConfigStore for AwsConfigStore {
    async fn get_secret(&self, name: &str) -> Result<String> {
        let secret_id = self.qualified_name(name);
        let output = self
            .secrets
            .get_secret_value()
            .secret_id(&secret_id)
            .send()
            .await
            .map_err(|err| VolumeError::Secret {
                name: secret_id.clone(),
                message: SecretsErrorContext(&err).to_string(),
            })?;

        output
            .secret_string()
            .map(str::to_string)
            .ok_or_else(|| VolumeError::Secret {
                name: secret_id,
                message: "secret has no string value".into(),
            })
    }

    async fn get_parameter(&self, name: &str) -> Result<String> {
        let parameter_name = self.qualified_name(name);
        let output = self
            .ssm
            .get_parameter()
            .name(&parameter_name)
            .send()
            .await
            .map_err(|err| VolumeError::Secret {
                name: parameter_name.clone(),
                message: SsmErrorContext(&err).to_string(),
            })?;

        output
            .parameter()
            .and_then(|parameter| parameter.value())
            .map(str::to_string)
            .ok_or_else(|| VolumeError::Secret {
                name: parameter_name,
                message: "parameter has no value".into(),
            })
    }
}
