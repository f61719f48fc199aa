//! Test WebSocket client.
//!
//! Sends client events and asserts on the server events that come back.

use futures_util::{SinkExt, StreamExt};
use gradecast_proto::{ClientEvent, Credentials, ServerEvent};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// What the server sent next.
#[derive(Debug)]
pub enum Frame {
    Event(ServerEvent),
    Closed(Option<u16>),
}

/// A test WebSocket client.
pub struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[allow(dead_code)]
impl TestClient {
    /// Connect to a test server.
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let (ws, _response) = connect_async(url).await?;
        Ok(Self { ws })
    }

    /// Send a raw text frame.
    pub async fn send_raw(&mut self, text: &str) -> anyhow::Result<()> {
        self.ws.send(Message::Text(text.to_string())).await?;
        Ok(())
    }

    /// Send a client event.
    pub async fn send(&mut self, event: ClientEvent) -> anyhow::Result<()> {
        let text = event.to_json()?;
        self.send_raw(&text).await
    }

    pub async fn authenticate(&mut self, role: &str, user_id: &str) -> anyhow::Result<()> {
        self.send(ClientEvent::Authenticate(Credentials {
            role: role.to_string(),
            user_id: user_id.to_string(),
            display_name: format!("Test {user_id}"),
        }))
        .await
    }

    /// Receive the next event or close, skipping control frames.
    pub async fn recv_frame(&mut self) -> anyhow::Result<Frame> {
        self.recv_frame_timeout(Duration::from_secs(5)).await
    }

    /// Receive with a timeout.
    pub async fn recv_frame_timeout(&mut self, dur: Duration) -> anyhow::Result<Frame> {
        loop {
            let msg = timeout(dur, self.ws.next())
                .await?
                .ok_or_else(|| anyhow::anyhow!("connection ended"))??;
            match msg {
                Message::Text(text) => return Ok(Frame::Event(ServerEvent::from_json(&text)?)),
                Message::Close(frame) => return Ok(Frame::Closed(frame.map(|f| u16::from(f.code)))),
                _ => continue,
            }
        }
    }

    /// Receive a single event; a close is an error.
    pub async fn recv(&mut self) -> anyhow::Result<ServerEvent> {
        match self.recv_frame().await? {
            Frame::Event(event) => Ok(event),
            Frame::Closed(code) => anyhow::bail!("closed with {code:?}"),
        }
    }

    /// Receive events until a close frame; returns its code.
    pub async fn recv_close(&mut self) -> anyhow::Result<Option<u16>> {
        loop {
            if let Frame::Closed(code) = self.recv_frame().await? {
                return Ok(code);
            }
        }
    }

    pub async fn expect_authenticated(&mut self, success: bool) -> anyhow::Result<()> {
        match self.recv().await? {
            ServerEvent::Authenticated(outcome) if outcome.success == success => Ok(()),
            other => anyhow::bail!("expected authenticated({success}), got {other:?}"),
        }
    }

    /// Assert nothing arrives for `dur`.
    pub async fn expect_silence(&mut self, dur: Duration) -> anyhow::Result<()> {
        match self.recv_frame_timeout(dur).await {
            Err(e) if e.is::<tokio::time::error::Elapsed>() => Ok(()),
            Err(e) => Err(e),
            Ok(frame) => anyhow::bail!("expected silence, got {frame:?}"),
        }
    }

    /// Close cleanly.
    pub async fn close(mut self) -> anyhow::Result<()> {
        self.ws.close(None).await?;
        Ok(())
    }
}
