use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

use super::constants::CONNECTION_TIMEOUT;
use super::error::{BrokerError, BrokerResult};
use super::frame::Frame;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, WsMessage>;
type WsReader = SplitStream<WsStream>;

/// Transport seam for one broker connection.
///
/// `receive` yields `Ok(None)` for a server heartbeat so the caller can
/// reset its idle clock without seeing a frame.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    async fn connect(&mut self, url: &str) -> BrokerResult<()>;
    async fn send(&mut self, frame: &Frame) -> BrokerResult<()>;
    async fn send_heartbeat(&mut self) -> BrokerResult<()>;
    async fn receive(&mut self) -> BrokerResult<Option<Frame>>;
    async fn close(&mut self);
    fn is_connected(&self) -> bool;
}

pub struct WebSocketBrokerConnection {
    writer: Option<WsWriter>,
    reader: Option<WsReader>,
    connected: bool,
}

impl WebSocketBrokerConnection {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            writer: None,
            reader: None,
            connected: false,
        }
    }

    async fn send_text(&mut self, text: String) -> BrokerResult<()> {
        let writer = self.writer.as_mut().ok_or(BrokerError::NotConnected)?;

        writer
            .send(WsMessage::Text(text.into()))
            .await
            .map_err(|e| BrokerError::transport(e.to_string()))
    }
}

impl Default for WebSocketBrokerConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerConnection for WebSocketBrokerConnection {
    async fn connect(&mut self, url: &str) -> BrokerResult<()> {
        let connect_future = connect_async(url);
        let (ws_stream, _) = timeout(CONNECTION_TIMEOUT, connect_future)
            .await
            .map_err(|_| BrokerError::timeout("connection"))?
            .map_err(|e| BrokerError::connection_failed(e.to_string()))?;

        let (writer, reader) = ws_stream.split();
        self.writer = Some(writer);
        self.reader = Some(reader);
        self.connected = true;

        Ok(())
    }

    async fn send(&mut self, frame: &Frame) -> BrokerResult<()> {
        self.send_text(frame.serialize()).await
    }

    async fn send_heartbeat(&mut self) -> BrokerResult<()> {
        self.send_text("\n".to_string()).await
    }

    async fn receive(&mut self) -> BrokerResult<Option<Frame>> {
        let reader = self.reader.as_mut().ok_or(BrokerError::NotConnected)?;

        loop {
            match reader.next().await {
                // Malformed frames are dropped, not fatal to the channel.
                Some(Ok(WsMessage::Text(text))) => match Frame::parse(&text) {
                    Ok(frame) => return Ok(frame),
                    Err(e) => warn!(error = %e, "Dropping malformed frame"),
                },
                Some(Ok(WsMessage::Binary(data))) => {
                    match String::from_utf8(data.to_vec()) {
                        Ok(text) => match Frame::parse(&text) {
                            Ok(frame) => return Ok(frame),
                            Err(e) => warn!(error = %e, "Dropping malformed frame"),
                        },
                        Err(e) => warn!(error = %e, "Dropping non-UTF-8 frame"),
                    }
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    self.connected = false;
                    let reason = frame.map_or_else(
                        || "normal closure".to_string(),
                        |f| format!("{} ({})", f.reason, u16::from(f.code)),
                    );

                    return Err(BrokerError::closed(reason));
                }
                Some(Ok(WsMessage::Ping(data))) => {
                    if let Some(writer) = self.writer.as_mut() {
                        let _ = writer.send(WsMessage::Pong(data)).await;
                    }
                }
                Some(Ok(WsMessage::Pong(_) | WsMessage::Frame(_))) => {}
                Some(Err(e)) => {
                    self.connected = false;
                    return Err(BrokerError::transport(e.to_string()));
                }
                None => {
                    self.connected = false;
                    return Err(BrokerError::closed("stream ended"));
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.close().await;
        }
        self.reader = None;
        self.connected = false;
        debug!("Broker connection closed");
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initial_state_is_disconnected() {
        let conn = WebSocketBrokerConnection::new();
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn test_send_without_connection_fails() {
        let mut conn = WebSocketBrokerConnection::new();
        let result = conn.send(&Frame::disconnect()).await;
        assert!(matches!(result, Err(BrokerError::NotConnected)));
    }
}
