//! WebSocket connection management

use crate::error::ConnectionError;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

/// Established WebSocket stream type
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Delay before a stream loop reconnects after a transport error
pub const STREAM_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Default connect timeout
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Establish a WebSocket connection with a timeout
pub async fn connect(endpoint: &str, timeout: Duration) -> Result<WsStream, ConnectionError> {
    let url = Url::parse(endpoint)
        .map_err(|e| ConnectionError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;

    let connect_future = connect_async(url);
    let timeout_future = sleep(timeout);

    tokio::select! {
        result = connect_future => {
            match result {
                Ok((ws_stream, _)) => {
                    tracing::info!(endpoint, "WebSocket connection established");
                    Ok(ws_stream)
                }
                Err(e) => Err(ConnectionError::EstablishmentFailed(format!(
                    "{}: {}",
                    endpoint, e
                ))),
            }
        }
        _ = timeout_future => {
            Err(ConnectionError::Timeout(format!("connecting to {}", endpoint)))
        }
    }
}
