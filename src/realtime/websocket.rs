//! Socket.IO WebSocket connection

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::protocol::{self, Frame, OpenInfo};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

pub struct RealtimeSocket {
    stream: WsStream,
    pub open: OpenInfo,
}

impl RealtimeSocket {
    /// Connect to `origin`, complete the Engine.IO handshake and join the
    /// default namespace.
    pub async fn connect(origin: &str) -> Result<Self> {
        let url = protocol::socket_url(origin)?;
        tracing::info!("Connecting WebSocket to {}", url);

        let (mut stream, response) = connect_async(url.as_str())
            .await
            .context("WebSocket connection failed")?;
        tracing::info!("WebSocket connected (status={})", response.status());

        let open = match next_text(&mut stream).await?.map(|t| protocol::decode(&t)) {
            Some(Frame::Open(info)) => info,
            Some(other) => anyhow::bail!("Expected Engine.IO open frame, got {:?}", other),
            None => anyhow::bail!("Connection closed before handshake"),
        };
        tracing::debug!(
            "Engine.IO session {} (ping every {}ms)",
            open.sid,
            open.ping_interval
        );

        let mut socket = Self { stream, open };
        socket.send_text(protocol::CONNECT).await?;
        Ok(socket)
    }

    pub async fn send_text(&mut self, msg: &str) -> Result<()> {
        tracing::debug!("WS send: {}", msg);
        self.stream
            .send(Message::Text(msg.to_string()))
            .await
            .context("Failed to send WebSocket message")
    }

    pub async fn emit(&mut self, event: &str, data: &Value) -> Result<()> {
        self.send_text(&protocol::encode_event(event, data)).await
    }

    /// Next decoded frame. Engine.IO pings are answered here and still
    /// returned so the caller can reset its liveness timer.
    pub async fn recv_frame(&mut self) -> Result<Option<Frame>> {
        let Some(text) = next_text(&mut self.stream).await? else {
            return Ok(None);
        };
        let frame = protocol::decode(&text);
        if frame == Frame::Ping {
            self.send_text(protocol::PONG).await?;
        }
        Ok(Some(frame))
    }

    pub async fn close(mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!("WebSocket close failed: {}", e);
        }
    }
}

/// Receive the next text message, answering WebSocket-level pings.
async fn next_text(stream: &mut WsStream) -> Result<Option<String>> {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                tracing::debug!("WS recv: {}", text);
                return Ok(Some(text));
            }
            Some(Ok(Message::Ping(data))) => {
                stream
                    .send(Message::Pong(data))
                    .await
                    .context("Failed to send pong")?;
            }
            Some(Ok(Message::Close(frame))) => {
                tracing::info!("WebSocket closed: {:?}", frame);
                return Ok(None);
            }
            Some(Ok(other)) => {
                tracing::debug!("WS frame (ignored): {:?}", other);
            }
            Some(Err(e)) => {
                return Err(e).context("WebSocket receive error");
            }
            None => {
                return Ok(None);
            }
        }
    }
}
