use std::io;

use shared::domain::RoomId;
use thiserror::Error;

/// Why a connection attempt did not produce a usable transport.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("{host} not found")]
    AddressNotFound { host: String },
    #[error("Connection refused")]
    Refused,
    #[error("Timeout")]
    Timeout,
    #[error("TLS init error: {0}")]
    TlsSetup(#[source] rustls::Error),
    #[error("invalid server name {0}")]
    InvalidServerName(String),
    #[error("TLS Handshake failed")]
    Handshake(#[source] io::Error),
    #[error("Not enough memory")]
    Resources,
    #[error("Unable to create socket: {0}")]
    Socket(#[source] io::Error),
}

impl ConnectError {
    /// Maps a TCP-level failure onto the reported taxonomy.
    pub fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => Self::Refused,
            io::ErrorKind::TimedOut => Self::Timeout,
            io::ErrorKind::OutOfMemory => Self::Resources,
            _ => Self::Socket(err),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HttpDecodeError {
    #[error("malformed response head: {0}")]
    Head(#[from] httparse::Error),
    #[error("invalid content-length header {0:?}")]
    ContentLength(String),
    #[error("malformed chunked body: {0}")]
    Chunk(&'static str),
    #[error("response without content-length or chunked framing")]
    MissingFraming,
    #[error("response head exceeds {limit} bytes")]
    HeadTooLarge { limit: usize },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Server address or port not set")]
    MissingAddress,
    #[error("User or password not set")]
    MissingCredentials,
    #[error("invalid server address {address}: {source}")]
    InvalidAddress {
        address: String,
        source: url::ParseError,
    },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("you are not connected to the server")]
    NotConnected,
    #[error("unknown room {0}")]
    UnknownRoom(RoomId),
    #[error("room {0} is encrypted, message sending is disabled")]
    RoomEncrypted(RoomId),
    #[error("room {0} has no older history to fetch")]
    NoBacklog(RoomId),
    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("server {0} already exists")]
    Duplicate(String),
    #[error("server {0} not found")]
    UnknownServer(String),
    #[error("server {0} is still connected")]
    StillConnected(String),
}
