//! In-memory transport and connector shared by the unit tests.

use std::{
    collections::VecDeque,
    io,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::{
    error::ConnectError,
    transport::{Connector, Endpoint, ReadOutcome, Transport},
};

#[derive(Default)]
struct WireState {
    written: Vec<u8>,
    inbound: VecDeque<Vec<u8>>,
    eof: bool,
    closed: bool,
    fail_sends: bool,
    flushes: usize,
}

/// Both ends of a fake socket: tests push server bytes and inspect what the
/// client wrote.
#[derive(Clone, Default)]
pub struct FakeWire {
    state: Arc<Mutex<WireState>>,
    notify: Arc<Notify>,
}

impl FakeWire {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transport(&self) -> FakeTransport {
        FakeTransport { wire: self.clone() }
    }

    pub fn push_inbound(&self, bytes: impl Into<Vec<u8>>) {
        self.lock().inbound.push_back(bytes.into());
        self.notify.notify_one();
    }

    pub fn hang_up(&self) {
        self.lock().eof = true;
        self.notify.notify_one();
    }

    pub fn fail_sends(&self, fail: bool) {
        self.lock().fail_sends = fail;
    }

    pub fn written(&self) -> Vec<u8> {
        self.lock().written.clone()
    }

    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.lock().written)
    }

    /// Request lines (`GET /path HTTP/1.1`) written since the last call.
    pub fn take_request_lines(&self) -> Vec<String> {
        let written = self.take_written();
        String::from_utf8_lossy(&written)
            .split("\r\n")
            .filter(|line| line.ends_with(" HTTP/1.1"))
            .map(str::to_string)
            .collect()
    }

    pub fn flushes(&self) -> usize {
        self.lock().flushes
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn has_input(&self) -> bool {
        let state = self.lock();
        !state.inbound.is_empty() || state.eof
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, WireState> {
        self.state.lock().expect("wire lock")
    }
}

pub struct FakeTransport {
    wire: FakeWire,
}

#[async_trait]
impl Transport for FakeTransport {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut state = self.wire.lock();
        if state.closed {
            return Err(io::Error::from(io::ErrorKind::NotConnected));
        }
        if state.fail_sends {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        state.written.extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.wire.lock().flushes += 1;
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<ReadOutcome> {
        let mut state = self.wire.lock();
        let Some(mut chunk) = state.inbound.pop_front() else {
            return Ok(if state.eof {
                ReadOutcome::Closed
            } else {
                ReadOutcome::WouldBlock
            });
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            state.inbound.push_front(chunk.split_off(n));
        }
        Ok(ReadOutcome::Data(n))
    }

    async fn ready(&self) -> io::Result<()> {
        loop {
            if self.wire.has_input() {
                return Ok(());
            }
            self.wire.notify.notified().await;
        }
    }

    fn close(&mut self) {
        self.wire.lock().closed = true;
    }

    fn peer_address(&self) -> Option<SocketAddr> {
        "127.0.0.1:8448".parse().ok()
    }
}

enum Script {
    Accept(FakeWire),
    Refuse,
}

/// Connector that replays a script of outcomes; the last entry repeats.
pub struct FakeConnector {
    script: Mutex<VecDeque<Script>>,
    attempts: Mutex<Vec<Endpoint>>,
}

impl FakeConnector {
    pub fn refusing() -> Self {
        Self::from_script(vec![Script::Refuse])
    }

    pub fn accepting(wire: FakeWire) -> Self {
        Self::from_script(vec![Script::Accept(wire)])
    }

    /// Refuses `failures` times, then accepts on `wire`.
    pub fn refusing_then_accepting(failures: usize, wire: FakeWire) -> Self {
        let mut script: Vec<Script> = (0..failures).map(|_| Script::Refuse).collect();
        script.push(Script::Accept(wire));
        Self::from_script(script)
    }

    pub fn attempts(&self) -> usize {
        self.attempts.lock().expect("attempts lock").len()
    }

    fn from_script(script: Vec<Script>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            attempts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Transport>, ConnectError> {
        self.attempts
            .lock()
            .expect("attempts lock")
            .push(endpoint.clone());
        let mut script = self.script.lock().expect("script lock");
        let step = if script.len() > 1 {
            script.pop_front()
        } else {
            None
        };
        let current = step.as_ref().or_else(|| script.front());
        match current {
            Some(Script::Accept(wire)) => Ok(Box::new(wire.transport())),
            Some(Script::Refuse) | None => Err(ConnectError::Refused),
        }
    }
}

/// Serializes a JSON body as a `Content-Length` framed response.
pub fn json_response(status: u16, body: &serde_json::Value) -> Vec<u8> {
    let body = body.to_string();
    let reason = match status {
        200 => "OK",
        403 => "Forbidden",
        504 => "Gateway Timeout",
        _ => "Status",
    };
    format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    )
    .into_bytes()
}
