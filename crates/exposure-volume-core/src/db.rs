use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use tracing::info;

use crate::error::Result;

/// Open a single Postgres connection. Callers own its lifetime and are
/// expected to `close` it once finished.
pub async fn connect(options: &PgConnectOptions) -> Result<PgConnection> {
    let connection = PgConnection::connect_with(options).await?;
    info!(
        host = options.get_host(),
        database = options.get_database().unwrap_or_default(),
        "Database connection established"
    );
    Ok(connection)
}
