//! Drives one [`ServerEngine`] on a tokio task.
//!
//! The loop waits on four triggers (maintenance tick, socket readiness, a
//! scheduled connect attempt, user commands) and runs the matching engine
//! handler to completion before waiting again.

use std::fmt;

use futures::future::BoxFuture;
use shared::domain::{EventId, RoomId, UserId};
use tokio::{
    sync::{
        mpsc::{self, error::SendError},
        watch,
    },
    task::{JoinError, JoinHandle},
    time::{self, MissedTickBehavior},
};
use tracing::{debug, warn};
use zeroize::Zeroize;

use crate::{
    connection::ConnectionState,
    engine::ServerEngine,
    error::{ConnectError, EngineError},
    registry::RegistryEntry,
    surface::Surfaces,
    transport::Transport,
};

/// A password in transit to an engine; wiped on drop and never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

type ConnectAttempt = BoxFuture<'static, Result<Box<dyn Transport>, ConnectError>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    Connect,
    Disconnect,
    SendMessage {
        room: RoomId,
        text: String,
    },
    SetTopic {
        room: RoomId,
        topic: String,
    },
    ShowTopic {
        room: RoomId,
    },
    Redact {
        room: RoomId,
        event: EventId,
        reason: Option<String>,
    },
    FetchBacklog {
        room: RoomId,
    },
    Join {
        room: String,
    },
    Part {
        room: RoomId,
    },
    Invite {
        room: RoomId,
        user: UserId,
    },
    CloseRoom {
        room: RoomId,
    },
    /// New login credentials, used by the next `Connect`.
    SetCredentials {
        user: String,
        password: Secret,
    },
    Shutdown,
}

enum Wake {
    Tick,
    Readable,
    Connected(Result<Box<dyn Transport>, ConnectError>),
    Command(Option<EngineCommand>),
}

/// Runs until `Shutdown` arrives or every command sender is gone; the engine
/// is disconnected on the way out. `status` follows the connection state.
pub async fn run<S: Surfaces>(
    engine: &mut ServerEngine,
    surfaces: &mut S,
    commands: &mut mpsc::Receiver<EngineCommand>,
    status: &watch::Sender<ConnectionState>,
) {
    let mut tick = time::interval(engine.options().tick_interval());
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut pending: Option<ConnectAttempt> = None;

    loop {
        publish(engine, status);
        let connected = engine.is_connected();
        let attempting = pending.is_some();
        let wake = tokio::select! {
            _ = tick.tick() => Wake::Tick,
            _ = engine.readable(), if connected => Wake::Readable,
            result = next_attempt(&mut pending), if attempting => Wake::Connected(result),
            command = commands.recv() => Wake::Command(command),
        };

        match wake {
            Wake::Tick => {
                if let Some(plan) = engine.on_tick(surfaces) {
                    pending = Some(plan.attempt());
                }
            }
            Wake::Readable => engine.on_readable(surfaces),
            Wake::Connected(result) => {
                pending = engine
                    .on_connect_result(surfaces, result)
                    .map(|plan| plan.attempt());
            }
            Wake::Command(None) | Wake::Command(Some(EngineCommand::Shutdown)) => {
                debug!(target: "chat::network", "runtime: shutting down server={}", engine.name());
                engine.disconnect(surfaces);
                publish(engine, status);
                return;
            }
            Wake::Command(Some(command)) => {
                if let Err(err) = handle_command(engine, surfaces, &mut pending, command) {
                    warn!(target: "chat::messaging", "runtime: command failed server={} error={err}", engine.name());
                    surfaces.server_message(engine.name(), &err.to_string());
                }
            }
        }
    }
}

fn publish(engine: &ServerEngine, status: &watch::Sender<ConnectionState>) {
    let state = engine.connection_state();
    status.send_if_modified(|current| {
        if *current == state {
            return false;
        }
        *current = state;
        true
    });
}

/// A server engine running on its own task, driven through commands.
pub struct EngineHandle {
    name: String,
    commands: mpsc::Sender<EngineCommand>,
    status: watch::Receiver<ConnectionState>,
    task: JoinHandle<()>,
}

impl EngineHandle {
    /// Spawns `engine` onto the current tokio runtime, rendering to `surfaces`.
    pub fn spawn<S>(mut engine: ServerEngine, mut surfaces: S, queue: usize) -> Self
    where
        S: Surfaces + Send + 'static,
    {
        let name = engine.name().to_string();
        let (commands, mut rx) = mpsc::channel(queue.max(1));
        let (status_tx, status) = watch::channel(engine.connection_state());
        let task = tokio::spawn(async move {
            run(&mut engine, &mut surfaces, &mut rx, &status_tx).await;
        });
        Self {
            name,
            commands,
            status,
            task,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ConnectionState {
        *self.status.borrow()
    }

    pub async fn send(&self, command: EngineCommand) -> Result<(), SendError<EngineCommand>> {
        self.commands.send(command).await
    }

    /// Disconnects the engine and waits for its task to finish.
    pub async fn shutdown(self) -> Result<(), JoinError> {
        if self.commands.send(EngineCommand::Shutdown).await.is_err() {
            debug!(target: "chat::network", "runtime: already stopped server={}", self.name);
        }
        self.task.await
    }
}

impl RegistryEntry for EngineHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}

async fn next_attempt(
    pending: &mut Option<ConnectAttempt>,
) -> Result<Box<dyn Transport>, ConnectError> {
    match pending {
        Some(attempt) => attempt.await,
        None => std::future::pending().await,
    }
}

fn handle_command<S: Surfaces>(
    engine: &mut ServerEngine,
    surfaces: &mut S,
    pending: &mut Option<ConnectAttempt>,
    command: EngineCommand,
) -> Result<(), EngineError> {
    match command {
        EngineCommand::Connect => {
            if let Some(plan) = engine.connect()? {
                *pending = Some(plan.attempt());
            }
        }
        EngineCommand::Disconnect => {
            *pending = None;
            engine.disconnect(surfaces);
        }
        EngineCommand::SendMessage { room, text } => {
            engine.send_message(surfaces, &room, &text)?;
        }
        EngineCommand::SetTopic { room, topic } => {
            engine.set_topic(surfaces, &room, &topic)?;
        }
        EngineCommand::ShowTopic { room } => {
            engine.show_topic(surfaces, &room)?;
        }
        EngineCommand::Redact {
            room,
            event,
            reason,
        } => {
            engine.redact(surfaces, &room, &event, reason.as_deref())?;
        }
        EngineCommand::FetchBacklog { room } => {
            engine.fetch_backlog(surfaces, &room)?;
        }
        EngineCommand::Join { room } => {
            engine.join(surfaces, &room)?;
        }
        EngineCommand::Part { room } => {
            engine.part(surfaces, &room)?;
        }
        EngineCommand::Invite { room, user } => {
            engine.invite(surfaces, &room, &user)?;
        }
        EngineCommand::CloseRoom { room } => {
            engine.close_room(surfaces, &room)?;
        }
        EngineCommand::SetCredentials { user, password } => {
            engine.set_credentials(user, password.expose());
        }
        EngineCommand::Shutdown => {}
    }
    Ok(())
}
