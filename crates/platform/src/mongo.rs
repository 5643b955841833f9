// Document-store connection with startup retries.

use std::time::Duration;

use mongodb::bson::doc;
use mongodb::options::ClientOptions;
use mongodb::Client;
use thiserror::Error;

const ATTEMPTS: u32 = 5;
const BACKOFF: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum MongoConnectError {
    #[error("invalid mongodb uri: {0}")]
    Uri(mongodb::error::Error),

    #[error("mongodb unreachable after {attempts} attempts: {last}")]
    Unreachable {
        attempts: u32,
        last: mongodb::error::Error,
    },
}

/// Connects and pings, retrying 5 times with a 2 s backoff. Exhausting the
/// retries is fatal for the caller.
pub async fn connect(uri: &str) -> Result<Client, MongoConnectError> {
    let options = ClientOptions::parse(uri)
        .await
        .map_err(MongoConnectError::Uri)?;
    let client = Client::with_options(options).map_err(MongoConnectError::Uri)?;

    let mut attempt = 0;
    loop {
        attempt += 1;
        match client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
        {
            Ok(_) => return Ok(client),
            Err(err) => {
                tracing::warn!(attempt, attempts = ATTEMPTS, error = %err, "mongodb ping failed");
                if attempt >= ATTEMPTS {
                    return Err(MongoConnectError::Unreachable {
                        attempts: ATTEMPTS,
                        last: err,
                    });
                }
                tokio::time::sleep(BACKOFF).await;
            }
        }
    }
}
