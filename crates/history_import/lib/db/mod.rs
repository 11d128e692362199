pub mod models;
pub mod schema;

use diesel::ConnectionError;
use diesel_async::{AsyncConnection, AsyncMysqlConnection};

/// Opens the single MySQL connection used for a whole run.
pub async fn connect(db_url: &str) -> Result<AsyncMysqlConnection, ConnectionError> {
    AsyncMysqlConnection::establish(db_url).await
}
