use std::{io, net::SocketAddr, sync::Arc, time::Duration};

use futures::future::BoxFuture;
use tracing::{debug, info};

use crate::{
    error::ConnectError,
    retry::ReconnectPolicy,
    transport::{Connector, Endpoint, ReadOutcome, Transport},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// A scheduled connect attempt, detached from the connection so it can run
/// while the engine keeps serving other work.
pub struct ConnectPlan {
    pub delay: Duration,
    pub endpoint: Endpoint,
    connector: Arc<dyn Connector>,
}

impl ConnectPlan {
    pub fn attempt(self) -> BoxFuture<'static, Result<Box<dyn Transport>, ConnectError>> {
        Box::pin(async move {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.connector.connect(&self.endpoint).await
        })
    }
}

/// Owns the one socket to one server.
///
/// A transport is held exactly while the state is `Connected`.
pub struct Connection {
    endpoint: Endpoint,
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    transport: Option<Box<dyn Transport>>,
    state: ConnectionState,
    attempts: u32,
    peer: Option<SocketAddr>,
}

impl Connection {
    pub fn new(endpoint: Endpoint, connector: Arc<dyn Connector>, policy: ReconnectPolicy) -> Self {
        Self {
            endpoint,
            connector,
            policy,
            transport: None,
            state: ConnectionState::Disconnected,
            attempts: 0,
            peer: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn is_connecting(&self) -> bool {
        self.state == ConnectionState::Connecting
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn peer_address(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn set_endpoint(&mut self, endpoint: Endpoint) {
        self.endpoint = endpoint;
    }

    /// Starts a connect attempt delayed by the current backoff.
    pub fn begin_connect(&mut self) -> ConnectPlan {
        self.state = ConnectionState::Connecting;
        self.plan()
    }

    /// Records a failed attempt and returns the plan for the next one.
    /// The connection stays in `Connecting` so the maintenance tick does not
    /// race the scheduled retry.
    pub fn on_connect_failed(&mut self) -> ConnectPlan {
        self.attempts = self.attempts.saturating_add(1);
        self.state = ConnectionState::Connecting;
        self.plan()
    }

    pub fn establish(&mut self, transport: Box<dyn Transport>) {
        self.peer = transport.peer_address();
        self.transport = Some(transport);
        self.state = ConnectionState::Connected;
        self.attempts = 0;
        info!(target: "chat::network", "network: connected endpoint={} peer={:?}", self.endpoint, self.peer);
    }

    /// Closes the socket (if any) and returns to `Disconnected`.
    pub fn teardown(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
            debug!(target: "chat::network", "network: socket closed endpoint={}", self.endpoint);
        }
        self.peer = None;
        self.state = ConnectionState::Disconnected;
    }

    /// Aborts a pending attempt without touching the backoff counter.
    pub fn abandon_connect(&mut self) {
        if self.state == ConnectionState::Connecting {
            self.state = ConnectionState::Disconnected;
        }
    }

    pub fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self.transport.as_mut() {
            Some(transport) => transport.send(bytes),
            None => Err(io::Error::from(io::ErrorKind::NotConnected)),
        }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        match self.transport.as_mut() {
            Some(transport) => transport.flush(),
            None => Ok(()),
        }
    }

    pub fn receive(&mut self, buf: &mut [u8]) -> io::Result<ReadOutcome> {
        match self.transport.as_mut() {
            Some(transport) => transport.receive(buf),
            None => Ok(ReadOutcome::Closed),
        }
    }

    /// Waits for socket activity; never resolves while there is no socket.
    pub async fn ready(&self) -> io::Result<()> {
        match self.transport.as_ref() {
            Some(transport) => transport.ready().await,
            None => futures::future::pending().await,
        }
    }

    fn plan(&self) -> ConnectPlan {
        ConnectPlan {
            delay: self.policy.delay_for_attempt(self.attempts),
            endpoint: self.endpoint.clone(),
            connector: self.connector.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeConnector, FakeWire};

    fn connection(connector: Arc<FakeConnector>) -> Connection {
        Connection::new(
            Endpoint::new("chat.example.org", 8448),
            connector,
            ReconnectPolicy::new(Duration::from_secs(5)),
        )
    }

    #[test]
    fn refused_attempts_back_off_linearly_then_reset() {
        let mut conn = connection(Arc::new(FakeConnector::refusing()));

        let first = conn.begin_connect();
        assert_eq!(first.delay, Duration::ZERO);
        assert_eq!(conn.state(), ConnectionState::Connecting);

        let mut delays = vec![first.delay];
        let mut counters = Vec::new();
        for _ in 0..3 {
            let next = conn.on_connect_failed();
            counters.push(conn.attempts());
            delays.push(next.delay);
        }
        assert_eq!(
            &delays[..3],
            &[Duration::ZERO, Duration::from_secs(5), Duration::from_secs(10)]
        );
        assert_eq!(counters, vec![1, 2, 3]);

        conn.establish(Box::new(FakeWire::new().transport()));
        assert_eq!(conn.attempts(), 0);
        assert!(conn.is_connected());
    }

    #[test]
    fn teardown_releases_socket() {
        let wire = FakeWire::new();
        let mut conn = connection(Arc::new(FakeConnector::refusing()));
        conn.establish(Box::new(wire.transport()));
        conn.teardown();
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(wire.is_closed());
        assert!(conn.send(b"x").is_err());
    }

    #[tokio::test]
    async fn plan_attempt_runs_connector() {
        let wire = FakeWire::new();
        let mut conn = connection(Arc::new(FakeConnector::accepting(wire.clone())));
        let transport = conn.begin_connect().attempt().await.expect("connect");
        conn.establish(transport);
        conn.send(b"ping").expect("send");
        assert_eq!(wire.written(), b"ping".to_vec());
    }
}
