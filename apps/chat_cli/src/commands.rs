use client_core::{config::DEFAULT_PORT, EngineCommand, Secret};
use shared::domain::{EventId, RoomId, UserId};
use thiserror::Error;

pub const HELP: &str = "\
/server <name>               focus a server
/server list                 list servers and their state
/server add <name> <host>[:port]
                             add a server
/server delete <name>        remove a disconnected server
/room <room id>              focus a room
/login <user> <password>     set credentials for the focused server
/connect [server]            connect a server
/disconnect [server]         disconnect a server
/reconnect [server]          disconnect, then connect
/join <room id or alias>     join a room
/part                        leave the focused room
/close                       close the focused room's surface
/topic [text]                show or set the topic
/redact <event id> [reason]  redact an event
/backlog                     fetch older messages
/invite <user id>            invite a user to the focused room
/quit                        disconnect everything and exit
<text>                       send to the focused room";

/// What the terminal currently points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Focus {
    pub server: String,
    pub room: Option<RoomId>,
}

impl Focus {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            room: None,
        }
    }

    fn room(&self) -> Result<RoomId, CommandError> {
        self.room.clone().ok_or(CommandError::NoRoom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Engine {
        server: String,
        command: EngineCommand,
    },
    Reconnect {
        server: String,
    },
    FocusServer(String),
    AddServer {
        name: String,
        address: String,
        port: u16,
    },
    DeleteServer(String),
    FocusRoom(RoomId),
    ListServers,
    Help,
    Quit,
    Nothing,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("no room selected, use /room <room id>")]
    NoRoom,
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),
    #[error("unknown command /{0}, try /help")]
    Unknown(String),
    #[error("invalid port {0}")]
    InvalidPort(String),
}

/// Turns one input line into an action against the focused server and room.
pub fn parse(line: &str, focus: &Focus) -> Result<Action, CommandError> {
    let line = line.trim_end_matches(|c: char| c == '\r' || c == '\n');
    if line.trim().is_empty() {
        return Ok(Action::Nothing);
    }
    let Some(body) = line.strip_prefix('/') else {
        return Ok(engine(
            focus,
            EngineCommand::SendMessage {
                room: focus.room()?,
                text: line.to_string(),
            },
        ));
    };

    let (name, rest) = match body.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (body, ""),
    };
    let server_arg = || {
        if rest.is_empty() {
            focus.server.clone()
        } else {
            rest.to_string()
        }
    };

    let action = match name {
        "help" => Action::Help,
        "quit" => Action::Quit,
        "server" => parse_server(rest)?,
        "login" => {
            let (user, password) = rest
                .split_once(char::is_whitespace)
                .map(|(user, password)| (user, password.trim()))
                .ok_or(CommandError::MissingArgument("user and password"))?;
            engine(
                focus,
                EngineCommand::SetCredentials {
                    user: user.to_string(),
                    password: Secret::new(required(password, "password")?),
                },
            )
        }
        "room" => Action::FocusRoom(RoomId::from(required(rest, "room id")?)),
        "connect" => Action::Engine {
            server: server_arg(),
            command: EngineCommand::Connect,
        },
        "disconnect" => Action::Engine {
            server: server_arg(),
            command: EngineCommand::Disconnect,
        },
        "reconnect" => Action::Reconnect {
            server: server_arg(),
        },
        "join" => engine(
            focus,
            EngineCommand::Join {
                room: required(rest, "room id or alias")?.to_string(),
            },
        ),
        "part" => engine(focus, EngineCommand::Part { room: focus.room()? }),
        "close" => engine(focus, EngineCommand::CloseRoom { room: focus.room()? }),
        "backlog" => engine(focus, EngineCommand::FetchBacklog { room: focus.room()? }),
        "topic" if rest.is_empty() => {
            engine(focus, EngineCommand::ShowTopic { room: focus.room()? })
        }
        "topic" => engine(
            focus,
            EngineCommand::SetTopic {
                room: focus.room()?,
                topic: rest.to_string(),
            },
        ),
        "redact" => {
            let (event, reason) = match rest.split_once(char::is_whitespace) {
                Some((event, reason)) => (event, Some(reason.trim().to_string())),
                None => (required(rest, "event id")?, None),
            };
            engine(
                focus,
                EngineCommand::Redact {
                    room: focus.room()?,
                    event: EventId::from(event),
                    reason: reason.filter(|r| !r.is_empty()),
                },
            )
        }
        "invite" => engine(
            focus,
            EngineCommand::Invite {
                room: focus.room()?,
                user: UserId::from(required(rest, "user id")?),
            },
        ),
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(action)
}

fn parse_server(rest: &str) -> Result<Action, CommandError> {
    let mut words = rest.split_whitespace();
    let action = match words.next() {
        None => return Err(CommandError::MissingArgument("server name")),
        Some("list") => Action::ListServers,
        Some("add") => {
            let name = words
                .next()
                .ok_or(CommandError::MissingArgument("server name"))?;
            let target = words
                .next()
                .ok_or(CommandError::MissingArgument("host[:port]"))?;
            let (address, port) = match target.rsplit_once(':') {
                Some((host, port)) => (
                    host,
                    port.parse()
                        .map_err(|_| CommandError::InvalidPort(port.to_string()))?,
                ),
                None => (target, DEFAULT_PORT),
            };
            Action::AddServer {
                name: name.to_string(),
                address: address.to_string(),
                port,
            }
        }
        Some("delete") => Action::DeleteServer(
            words
                .next()
                .ok_or(CommandError::MissingArgument("server name"))?
                .to_string(),
        ),
        Some(name) => Action::FocusServer(name.to_string()),
    };
    Ok(action)
}

fn engine(focus: &Focus, command: EngineCommand) -> Action {
    Action::Engine {
        server: focus.server.clone(),
        command,
    }
}

fn required<'a>(value: &'a str, what: &'static str) -> Result<&'a str, CommandError> {
    if value.is_empty() {
        Err(CommandError::MissingArgument(what))
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn focused() -> Focus {
        Focus {
            server: "home".into(),
            room: Some(RoomId::from("!r:example.org")),
        }
    }

    fn command(action: Action) -> EngineCommand {
        match action {
            Action::Engine { command, .. } => command,
            other => panic!("expected engine command, got {other:?}"),
        }
    }

    #[test]
    fn plain_text_goes_to_focused_room() {
        let action = parse("hello there", &focused()).expect("parse");
        assert_eq!(
            action,
            Action::Engine {
                server: "home".into(),
                command: EngineCommand::SendMessage {
                    room: RoomId::from("!r:example.org"),
                    text: "hello there".into(),
                },
            }
        );
    }

    #[test]
    fn room_commands_need_a_focused_room() {
        let focus = Focus::new("home");
        assert_eq!(parse("hi", &focus), Err(CommandError::NoRoom));
        assert_eq!(parse("/part", &focus), Err(CommandError::NoRoom));
        assert_eq!(parse("/topic", &focus), Err(CommandError::NoRoom));
    }

    #[test]
    fn connect_defaults_to_focused_server() {
        let focus = Focus::new("home");
        assert_eq!(
            parse("/connect", &focus),
            Ok(Action::Engine {
                server: "home".into(),
                command: EngineCommand::Connect
            })
        );
        assert_eq!(
            parse("/disconnect work", &focus),
            Ok(Action::Engine {
                server: "work".into(),
                command: EngineCommand::Disconnect
            })
        );
        assert_eq!(
            parse("/reconnect", &focus),
            Ok(Action::Reconnect {
                server: "home".into()
            })
        );
    }

    #[test]
    fn topic_without_text_shows_it() {
        let room = RoomId::from("!r:example.org");
        assert_eq!(
            command(parse("/topic", &focused()).expect("show")),
            EngineCommand::ShowTopic { room: room.clone() }
        );
        assert_eq!(
            command(parse("/topic  new topic here ", &focused()).expect("set")),
            EngineCommand::SetTopic {
                room,
                topic: "new topic here".into()
            }
        );
    }

    #[test]
    fn redact_reason_is_optional() {
        assert_eq!(
            command(parse("/redact $ev", &focused()).expect("bare")),
            EngineCommand::Redact {
                room: RoomId::from("!r:example.org"),
                event: EventId::from("$ev"),
                reason: None,
            }
        );
        assert_eq!(
            command(parse("/redact $ev spam and more", &focused()).expect("reason")),
            EngineCommand::Redact {
                room: RoomId::from("!r:example.org"),
                event: EventId::from("$ev"),
                reason: Some("spam and more".into()),
            }
        );
        assert_eq!(
            parse("/redact", &focused()),
            Err(CommandError::MissingArgument("event id"))
        );
    }

    #[test]
    fn focus_and_misc_commands() {
        let focus = Focus::new("home");
        assert_eq!(
            parse("/room !x:example.org", &focus),
            Ok(Action::FocusRoom(RoomId::from("!x:example.org")))
        );
        assert_eq!(
            parse("/server work", &focus),
            Ok(Action::FocusServer("work".into()))
        );
        assert_eq!(parse("/quit", &focus), Ok(Action::Quit));
        assert_eq!(parse("   ", &focus), Ok(Action::Nothing));
        assert_eq!(
            parse("/frobnicate", &focus),
            Err(CommandError::Unknown("frobnicate".into()))
        );
    }

    #[test]
    fn server_management_subcommands() {
        let focus = Focus::new("home");
        assert_eq!(parse("/server list", &focus), Ok(Action::ListServers));
        assert_eq!(
            parse("/server add work chat.work.example:443", &focus),
            Ok(Action::AddServer {
                name: "work".into(),
                address: "chat.work.example".into(),
                port: 443,
            })
        );
        assert_eq!(
            parse("/server add lab lab.example", &focus),
            Ok(Action::AddServer {
                name: "lab".into(),
                address: "lab.example".into(),
                port: DEFAULT_PORT,
            })
        );
        assert_eq!(
            parse("/server add lab lab.example:http", &focus),
            Err(CommandError::InvalidPort("http".into()))
        );
        assert_eq!(
            parse("/server add lab", &focus),
            Err(CommandError::MissingArgument("host[:port]"))
        );
        assert_eq!(
            parse("/server delete work", &focus),
            Ok(Action::DeleteServer("work".into()))
        );
        assert_eq!(
            parse("/server", &focus),
            Err(CommandError::MissingArgument("server name"))
        );
    }

    #[test]
    fn login_sets_credentials_on_focused_server() {
        let focus = Focus::new("home");
        assert_eq!(
            parse("/login alice correct horse", &focus),
            Ok(Action::Engine {
                server: "home".into(),
                command: EngineCommand::SetCredentials {
                    user: "alice".into(),
                    password: Secret::new("correct horse"),
                },
            })
        );
        assert_eq!(
            parse("/login alice", &focus),
            Err(CommandError::MissingArgument("user and password"))
        );
    }

    #[test]
    fn join_and_invite_take_arguments() {
        assert_eq!(
            command(parse("/join #rust:example.org", &focused()).expect("join")),
            EngineCommand::Join {
                room: "#rust:example.org".into()
            }
        );
        assert_eq!(
            command(parse("/invite @bob:example.org", &focused()).expect("invite")),
            EngineCommand::Invite {
                room: RoomId::from("!r:example.org"),
                user: UserId::from("@bob:example.org"),
            }
        );
        assert_eq!(
            parse("/join", &focused()),
            Err(CommandError::MissingArgument("room id or alias"))
        );
    }
}
