//! Protocol engine for a long-poll chat client: one TLS socket per server,
//! a FIFO request pipeline over it, and a sync loop feeding the room model.

pub mod api;
pub mod apply;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod events;
pub mod http;
pub mod markup;
pub mod model;
pub mod pipeline;
pub mod registry;
pub mod request;
pub mod retry;
pub mod runtime;
pub mod surface;
pub mod sync;
pub mod transport;

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

pub use config::{EngineOptions, RedactionMode, ServerConfig};
pub use connection::ConnectionState;
pub use engine::{ServerEngine, Session};
pub use error::{ConfigError, ConnectError, EngineError, HttpDecodeError, RegistryError};
pub use registry::{RegistryEntry, ServerRegistry};
pub use runtime::{run, EngineCommand, EngineHandle, Secret};
pub use surface::{MemorySurfaces, RenderedLine, Surfaces};
