//! Capability handshake: `initialize` request, its response, then the
//! `notifications/initialized` notification.

use mcplink_protocol::types::{METHOD_INITIALIZE, METHOD_INITIALIZED};
use mcplink_protocol::{Error, InitializeParams, Result};
use serde_json::Value;
use tracing::{error, info};

use super::correlator::Correlator;
use super::session::{Session, SessionState};
use crate::config::ClientConfig;
use crate::transport::Transport;

/// Drive the session from `Discovered` to `Initialized`.
///
/// Returns the server's opaque `initialize` result. Any failure, including the session
/// being closed mid-handshake, is reported as [`Error::HandshakeFailed`]; the session is
/// left `Failed` unless it was already `Closed`.
pub(super) async fn perform<T: Transport + ?Sized>(
    transport: &T,
    session: &Session,
    correlator: &Correlator,
    config: &ClientConfig,
) -> Result<Value> {
    session.transition(SessionState::Initializing)?;

    let outcome = exchange(transport, session, correlator, config)
        .await
        .and_then(|result| session.transition(SessionState::Initialized).map(|_| result));

    match outcome {
        Ok(result) => {
            info!(
                session_id = session.id(),
                protocol_version = %config.protocol_version,
                "Handshake complete"
            );
            Ok(result)
        }
        Err(e) => {
            // Only fails if the session was closed meanwhile, which is already terminal
            let _ = session.transition(SessionState::Failed);
            error!(session_id = session.id(), error = %e, "Handshake failed");
            Err(Error::handshake_failed(e))
        }
    }
}

async fn exchange<T: Transport + ?Sized>(
    transport: &T,
    session: &Session,
    correlator: &Correlator,
    config: &ClientConfig,
) -> Result<Value> {
    let params = InitializeParams::new(&config.protocol_version, config.client_info.clone());
    let pending = correlator
        .send(
            transport,
            session.endpoint(),
            METHOD_INITIALIZE,
            Some(serde_json::to_value(params)?),
            config.handshake_timeout,
        )
        .await?;
    let result = pending.await_deadline().await?.into_result()?;

    correlator
        .notify(
            transport,
            session.endpoint(),
            METHOD_INITIALIZED,
            None,
            config.handshake_timeout,
        )
        .await?;
    Ok(result)
}
