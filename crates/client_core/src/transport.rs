use std::{
    fmt,
    io::{self, Read, Write},
    net::{Shutdown, SocketAddr},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use rustls::{
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    pki_types::{CertificateDer, ServerName, UnixTime},
    ClientConfig, ClientConnection, DigitallySignedStruct, RootCertStore, SignatureScheme,
};
use tokio::{
    io::Interest,
    net::{lookup_host, TcpStream},
    time::timeout,
};
use tracing::debug;

use crate::error::ConnectError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Data(usize),
    WouldBlock,
    Closed,
}

/// Byte-level access to one established connection. Reads and writes never wait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Hands bytes to the connection; anything the socket cannot take yet is
    /// kept and pushed out by later `flush` calls.
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<ReadOutcome>;
    /// Resolves once `receive` or `flush` has something to do.
    async fn ready(&self) -> io::Result<()>;
    fn close(&mut self);
    fn peer_address(&self) -> Option<SocketAddr>;
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Transport>, ConnectError>;
}

/// Resolves, dials TCP, and runs the TLS handshake.
pub struct TlsConnector {
    config: Arc<ClientConfig>,
    connect_timeout: Duration,
}

impl TlsConnector {
    pub fn new(verify_tls: bool, connect_timeout: Duration) -> Result<Self, ConnectError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let builder = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(ConnectError::TlsSetup)?;
        let config = if verify_tls {
            let roots = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            builder.with_root_certificates(roots).with_no_client_auth()
        } else {
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(InsecureVerifier))
                .with_no_client_auth()
        };
        Ok(Self {
            config: Arc::new(config),
            connect_timeout,
        })
    }
}

#[async_trait]
impl Connector for TlsConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Transport>, ConnectError> {
        let not_found = || ConnectError::AddressNotFound {
            host: endpoint.host.clone(),
        };
        let addrs: Vec<SocketAddr> = lookup_host((endpoint.host.as_str(), endpoint.port))
            .await
            .map_err(|_| not_found())?
            .collect();
        if addrs.is_empty() {
            return Err(not_found());
        }
        debug!(target: "chat::network", "network: resolved host={} addrs={}", endpoint.host, addrs.len());

        let tcp = timeout(self.connect_timeout, TcpStream::connect(addrs.as_slice()))
            .await
            .map_err(|_| ConnectError::Timeout)?
            .map_err(ConnectError::from_io)?;
        tcp.set_nodelay(true).map_err(ConnectError::Socket)?;

        let server_name = ServerName::try_from(endpoint.host.clone())
            .map_err(|_| ConnectError::InvalidServerName(endpoint.host.clone()))?;
        let connector = tokio_rustls::TlsConnector::from(self.config.clone());
        let stream = timeout(self.connect_timeout, connector.connect(server_name, tcp))
            .await
            .map_err(|_| ConnectError::Timeout)?
            .map_err(ConnectError::Handshake)?;
        debug!(target: "chat::network", "network: tls handshake complete host={}", endpoint.host);

        let (tcp, tls) = stream.into_inner();
        Ok(Box::new(TlsTransport::new(tcp, tls)))
    }
}

/// Adapts a tokio socket to the blocking `Read`/`Write` traits rustls expects,
/// surfacing `WouldBlock` instead of waiting.
struct NonBlocking<'a>(&'a TcpStream);

impl Read for NonBlocking<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.try_read(buf)
    }
}

impl Write for NonBlocking<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.try_write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A TLS session driven by hand over a non-blocking socket.
pub struct TlsTransport {
    tcp: Option<TcpStream>,
    tls: ClientConnection,
    eof: bool,
}

impl TlsTransport {
    fn new(tcp: TcpStream, mut tls: ClientConnection) -> Self {
        tls.set_buffer_limit(None);
        Self {
            tcp: Some(tcp),
            tls,
            eof: false,
        }
    }

    fn write_pending(&mut self) -> io::Result<()> {
        let Some(tcp) = self.tcp.as_ref() else {
            return Err(io::Error::from(io::ErrorKind::NotConnected));
        };
        while self.tls.wants_write() {
            match self.tls.write_tls(&mut NonBlocking(tcp)) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero)),
                Ok(_) => {}
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for TlsTransport {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.tcp.is_none() {
            return Err(io::Error::from(io::ErrorKind::NotConnected));
        }
        self.tls.writer().write_all(bytes)?;
        self.write_pending()
    }

    fn flush(&mut self) -> io::Result<()> {
        self.write_pending()
    }

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<ReadOutcome> {
        let Some(tcp) = self.tcp.as_ref() else {
            return Ok(ReadOutcome::Closed);
        };
        loop {
            match self.tls.reader().read(buf) {
                Ok(0) => return Ok(ReadOutcome::Closed),
                Ok(n) => return Ok(ReadOutcome::Data(n)),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    if self.eof {
                        return Ok(ReadOutcome::Closed);
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                    return Ok(ReadOutcome::Closed)
                }
                Err(err) => return Err(err),
            }

            match self.tls.read_tls(&mut NonBlocking(tcp)) {
                Ok(0) => self.eof = true,
                Ok(_) => {}
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(ReadOutcome::WouldBlock)
                }
                Err(err) => return Err(err),
            }
            self.tls
                .process_new_packets()
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        }
    }

    async fn ready(&self) -> io::Result<()> {
        let Some(tcp) = self.tcp.as_ref() else {
            return Err(io::Error::from(io::ErrorKind::NotConnected));
        };
        let interest = if self.tls.wants_write() {
            Interest::READABLE | Interest::WRITABLE
        } else {
            Interest::READABLE
        };
        tcp.ready(interest).await.map(|_| ())
    }

    fn close(&mut self) {
        if self.tcp.is_none() {
            return;
        }
        self.tls.send_close_notify();
        let _ = self.write_pending();
        if let Some(tcp) = self.tcp.take() {
            if let Ok(std_tcp) = tcp.into_std() {
                let _ = std_tcp.shutdown(Shutdown::Both);
            }
        }
    }

    fn peer_address(&self) -> Option<SocketAddr> {
        self.tcp.as_ref().and_then(|tcp| tcp.peer_addr().ok())
    }
}

impl Drop for TlsTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[derive(Debug)]
struct InsecureVerifier;

impl ServerCertVerifier for InsecureVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
