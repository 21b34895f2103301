//! Connection traits

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;

use super::RemoteSession;
use crate::error::ConnectionError;

/// Opens authenticated sessions to one remote host
///
/// Credential resolution, key parsing and agent delegation all live behind
/// this trait; the engine only ever asks for a fresh session.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new session
    async fn connect(&self) -> Result<Box<dyn RemoteSession>, ConnectionError>;

    /// Human-readable target for log lines (e.g. `user@host:22`)
    fn target(&self) -> String;
}

/// Future returned by a [`with_session`] body
pub type SessionFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Open a session, hand it to `body`, and close it on every exit path.
///
/// Errors from closing are logged and never replace the body's result. If
/// `body` panics the session is dropped during unwinding, which tears down
/// the underlying channel.
pub async fn with_session<T, E, F>(connector: &dyn Connector, body: F) -> Result<T, E>
where
    E: From<ConnectionError>,
    F: for<'a> FnOnce(&'a mut dyn RemoteSession) -> SessionFuture<'a, Result<T, E>>,
{
    let mut session = connector.connect().await?;
    let result = body(session.as_mut()).await;
    if let Err(e) = session.close().await {
        tracing::debug!("Failed to close session to {}: {}", connector.target(), e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExecError, SessionError};
    use crate::testing::{FakeConnector, FakeResponse};

    #[tokio::test]
    async fn test_with_session_closes_on_success() {
        let connector = FakeConnector::always(FakeResponse::ok().stdout("ok\n"));
        let result: Result<(), ExecError> = with_session(&connector, |session| {
            Box::pin(async move { Ok(session.run("true").await?) })
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(connector.opened(), 1);
        assert_eq!(connector.closed(), 1);
        assert_eq!(connector.commands(), vec!["true".to_string()]);
    }

    #[tokio::test]
    async fn test_with_session_closes_on_error() {
        let connector = FakeConnector::always(FakeResponse::ok().exit_status(3));
        let result: Result<(), ExecError> = with_session(&connector, |session| {
            Box::pin(async move { Ok(session.run("false").await?) })
        })
        .await;
        assert!(matches!(
            result,
            Err(ExecError::Setup(SessionError::ExitStatus(3)))
        ));
        assert_eq!(connector.closed(), 1);
    }

    #[tokio::test]
    async fn test_with_session_connect_failure() {
        let connector = FakeConnector::unreachable();
        let result: Result<(), ExecError> =
            with_session(&connector, |_| Box::pin(async move { Ok(()) })).await;
        assert!(matches!(result, Err(ExecError::Connect(_))));
        assert_eq!(connector.opened(), 0);
        assert_eq!(connector.closed(), 0);
    }
}
