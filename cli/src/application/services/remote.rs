//! Retry discipline around the remote transport.
//!
//! Only [`RemoteError::Connection`] is retried. Authentication failures,
//! timeouts and non-zero exit codes are returned on the first occurrence.

use std::time::Duration;

use crate::application::ports::{RemoteConnector, RemoteShell};
use crate::domain::{CommandResult, RemoteError};

/// Timeout for ordinary remote commands.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Waits between attempts; one more attempt than there are delays.
pub const RETRY_DELAYS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
];

/// Open a session, retrying connection failures with exponential backoff.
///
/// # Errors
///
/// The first non-retryable error, or the last connection error once
/// [`RETRY_DELAYS`] is exhausted.
pub async fn connect_with_retry<C: RemoteConnector>(connector: &C) -> Result<C::Session, RemoteError> {
    let mut delays = RETRY_DELAYS.into_iter();
    loop {
        match connector.connect().await {
            Ok(session) => return Ok(session),
            Err(e) => backoff(connector.host(), e, &mut delays).await?,
        }
    }
}

/// Connect, execute one command and disconnect, retrying the whole unit on
/// connection failures.
///
/// # Errors
///
/// Same policy as [`connect_with_retry`]; a non-zero exit is not an error.
pub async fn run_with_retry<C: RemoteConnector>(
    connector: &C,
    command: &str,
    timeout: Duration,
) -> Result<CommandResult, RemoteError> {
    let mut delays = RETRY_DELAYS.into_iter();
    loop {
        let attempt = match connector.connect().await {
            Ok(session) => {
                let result = session.execute(command, timeout).await;
                connector.disconnect(session).await;
                result
            }
            Err(e) => Err(e),
        };
        match attempt {
            Ok(result) => return Ok(result),
            Err(e) => backoff(connector.host(), e, &mut delays).await?,
        }
    }
}

/// Sleep before the next attempt, or hand back the error when it is not
/// retryable or no attempts remain.
async fn backoff(
    host: &str,
    error: RemoteError,
    delays: &mut impl Iterator<Item = Duration>,
) -> Result<(), RemoteError> {
    if !error.is_retryable() {
        return Err(error);
    }
    let Some(delay) = delays.next() else {
        return Err(error);
    };
    tracing::warn!(%host, %error, delay_secs = delay.as_secs(), "connection failed, retrying");
    tokio::time::sleep(delay).await;
    Ok(())
}
