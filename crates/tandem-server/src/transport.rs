//! WebSocket transport.
//!
//! Plain TCP listener plus a WebSocket upgrade per accepted stream. Each
//! client message is one JSON text frame; binary frames are passed through as
//! lossy UTF-8 so they surface as `InvalidMessage` rather than being dropped.
//!
//! The upgrade happens in the connection task, so a slow handshake never
//! stalls the accept loop.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{
    WebSocketStream, accept_async_with_config, tungstenite::protocol::WebSocketConfig,
};

use crate::error::ServerError;

/// TCP listener accepting WebSocket clients.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    /// Bind to `address` (e.g. `"0.0.0.0:8080"`, port 0 for ephemeral).
    pub async fn bind(address: &str) -> Result<Self, ServerError> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid bind address '{address}': {e}")))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Transport(format!("failed to bind {addr}: {e}")))?;

        tracing::info!("WebSocket transport bound to {}", listener.local_addr()?);

        Ok(Self { listener })
    }

    /// Accept the next TCP stream.
    ///
    /// This method blocks until a connection is available.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ServerError> {
        Ok(self.listener.accept().await?)
    }

    /// Local address the transport is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }
}

/// Multiple of the driver's message limit the transport will buffer.
///
/// Frames between the two limits reach the driver and are answered with
/// `invalidMessage`; anything larger fails the read and closes the connection.
const TRANSPORT_HEADROOM: usize = 4;

/// WebSocket settings for a driver that accepts `max_message_bytes`.
pub fn socket_config(max_message_bytes: usize) -> WebSocketConfig {
    let cap = max_message_bytes.saturating_mul(TRANSPORT_HEADROOM);
    WebSocketConfig::default().max_message_size(Some(cap)).max_frame_size(Some(cap))
}

/// Perform the WebSocket handshake on an accepted stream.
pub async fn upgrade(
    stream: TcpStream,
    max_message_bytes: usize,
) -> Result<WebSocketStream<TcpStream>, ServerError> {
    accept_async_with_config(stream, Some(socket_config(max_message_bytes)))
        .await
        .map_err(|e| ServerError::Transport(format!("websocket handshake failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_rejects_invalid_address() {
        let result = WebSocketTransport::bind("not an address").await;
        assert!(matches!(result, Err(ServerError::Config(_))));
    }

    #[tokio::test]
    async fn bind_ephemeral_port() {
        let transport = WebSocketTransport::bind("127.0.0.1:0").await.unwrap();
        assert_ne!(transport.local_addr().unwrap().port(), 0);
    }

    #[test]
    fn socket_config_caps_messages_near_driver_limit() {
        let config = socket_config(16 * 1024);

        assert_eq!(config.max_message_size, Some(64 * 1024));
        assert_eq!(config.max_frame_size, Some(64 * 1024));
    }
}
