//! Tokio driver for [`ClientMachine`].

use super::machine::{ClientAction, ClientMachine, ClientState, DEFAULT_RECONNECT_DELAY};
use crate::event::ServerEvent;
use crate::identity::Identity;
use futures_util::{SinkExt, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Sleep};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Client transport errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid broker url: {0}")]
    InvalidUrl(#[source] tungstenite::Error),
    #[error("connection manager has shut down")]
    Closed,
}

/// Connection manager settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Broker WebSocket URL, e.g. `ws://127.0.0.1:8088`.
    pub url: String,
    pub identity: Identity,
    pub reconnect_delay: Duration,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>, identity: Identity) -> Self {
        Self {
            url: url.into(),
            identity,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

/// Requests from the handle to the driver task.
#[derive(Debug)]
enum Command {
    SetIdentity(Identity),
}

/// Keeps one authenticated connection to the broker alive in a background
/// task, reconnecting and re-authenticating after every drop.
///
/// Dropping the manager tears the connection down.
pub struct ConnectionManager {
    events: mpsc::UnboundedReceiver<ServerEvent>,
    state: watch::Receiver<ClientState>,
    commands: mpsc::UnboundedSender<Command>,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    /// Spawn the driver. The first connect attempt starts immediately.
    pub fn spawn(config: ClientConfig) -> Result<Self, ClientError> {
        config
            .url
            .as_str()
            .into_client_request()
            .map_err(ClientError::InvalidUrl)?;

        let machine = ClientMachine::with_reconnect_delay(config.identity, config.reconnect_delay);
        let (events_tx, events) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(machine.state());
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (commands, commands_rx) = mpsc::unbounded_channel();

        let driver = Driver {
            machine,
            url: config.url,
            events: events_tx,
            state: state_tx,
            commands: commands_rx,
            shutdown: shutdown_rx,
            socket: None,
            reconnect: None,
        };
        let task = tokio::spawn(driver.run());

        Ok(Self {
            events,
            state,
            commands,
            shutdown,
            task: Some(task),
        })
    }

    /// Next event from the broker. `None` once the manager has shut down.
    pub async fn recv(&mut self) -> Option<ServerEvent> {
        self.events.recv().await
    }

    pub fn state(&self) -> ClientState {
        *self.state.borrow()
    }

    /// Use `identity` from the next authentication on. A manager stopped in
    /// [`ClientState::Rejected`] reconnects with it straight away.
    pub fn set_identity(&self, identity: Identity) -> Result<(), ClientError> {
        self.commands
            .send(Command::SetIdentity(identity))
            .map_err(|_| ClientError::Closed)
    }

    /// Wait until the connection reaches `target`.
    pub async fn wait_for_state(&mut self, target: ClientState) -> Result<(), ClientError> {
        self.state
            .wait_for(|s| *s == target)
            .await
            .map(|_| ())
            .map_err(|_| ClientError::Closed)
    }

    /// Clear the reconnect timer, close the socket and wait for the task to end.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

struct Driver {
    machine: ClientMachine,
    url: String,
    events: mpsc::UnboundedSender<ServerEvent>,
    state: watch::Sender<ClientState>,
    commands: mpsc::UnboundedReceiver<Command>,
    shutdown: watch::Receiver<bool>,
    socket: Option<Socket>,
    reconnect: Option<Pin<Box<Sleep>>>,
}

impl Driver {
    async fn run(mut self) {
        let mut queue: VecDeque<ClientAction> = self.machine.start().into();

        loop {
            while let Some(action) = queue.pop_front() {
                let follow_up = self.execute(action).await;
                queue.extend(follow_up);
                self.state.send_replace(self.machine.state());
            }

            if self.machine.state() == ClientState::Shutdown {
                break;
            }

            tokio::select! {
                _ = self.shutdown.changed() => {
                    queue.extend(self.machine.shutdown());
                }
                Some(command) = self.commands.recv() => match command {
                    Command::SetIdentity(identity) => {
                        queue.extend(self.machine.set_identity(identity));
                    }
                },
                _ = wait_timer(&mut self.reconnect) => {
                    self.reconnect = None;
                    queue.extend(self.machine.on_reconnect_timer());
                }
                frame = next_frame(&mut self.socket) => {
                    queue.extend(self.on_frame(frame));
                }
            }
        }

        self.state.send_replace(ClientState::Shutdown);
        debug!("connection manager stopped");
    }

    async fn execute(&mut self, action: ClientAction) -> Vec<ClientAction> {
        match action {
            ClientAction::Connect => {
                let attempt = tokio::select! {
                    _ = self.shutdown.changed() => return self.machine.shutdown(),
                    res = connect_async(self.url.as_str()) => res,
                };
                match attempt {
                    Ok((socket, _)) => {
                        info!(url = %self.url, "connected to broker");
                        self.socket = Some(socket);
                        self.machine.on_open()
                    }
                    Err(e) => {
                        warn!(url = %self.url, error = %e, "connect failed");
                        self.machine.on_disconnect()
                    }
                }
            }
            ClientAction::Send(event) => {
                let Some(socket) = self.socket.as_mut() else {
                    return Vec::new();
                };
                let text = match event.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(event = event.name(), error = %e, "failed to encode event");
                        return Vec::new();
                    }
                };
                if let Err(e) = socket.send(Message::Text(text)).await {
                    warn!(error = %e, "send failed");
                    self.socket = None;
                    return self.machine.on_disconnect();
                }
                Vec::new()
            }
            ClientAction::Deliver(event) => {
                // Receiver gone means nobody is listening; keep the connection anyway.
                let _ = self.events.send(event);
                Vec::new()
            }
            ClientAction::ScheduleReconnect(delay) => {
                debug!(?delay, "reconnect scheduled");
                self.reconnect = Some(Box::pin(sleep(delay)));
                Vec::new()
            }
            ClientAction::Close => {
                self.reconnect = None;
                if let Some(mut socket) = self.socket.take() {
                    let _ = socket.close(None).await;
                }
                Vec::new()
            }
        }
    }

    fn on_frame(&mut self, frame: Option<Result<Message, tungstenite::Error>>) -> Vec<ClientAction> {
        match frame {
            Some(Ok(Message::Text(text))) => match ServerEvent::from_json(&text) {
                Ok(event) => self.machine.on_event(event),
                Err(e) => {
                    warn!(error = %e, "ignoring undecodable frame");
                    Vec::new()
                }
            },
            Some(Ok(Message::Close(frame))) => {
                info!(?frame, "broker closed the connection");
                self.socket = None;
                self.machine.on_disconnect()
            }
            Some(Ok(_)) => Vec::new(),
            Some(Err(e)) => {
                warn!(error = %e, "transport error");
                self.socket = None;
                self.machine.on_disconnect()
            }
            None => {
                self.socket = None;
                self.machine.on_disconnect()
            }
        }
    }
}

async fn wait_timer(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

async fn next_frame(socket: &mut Option<Socket>) -> Option<Result<Message, tungstenite::Error>> {
    match socket {
        Some(socket) => socket.next().await,
        None => std::future::pending().await,
    }
}
