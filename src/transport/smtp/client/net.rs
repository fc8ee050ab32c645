//! Streams and the factory opening them

use std::{
    fmt::{self, Debug, Formatter},
    io::{self, Read, Write},
    net::{SocketAddr, TcpStream, ToSocketAddrs},
    time::Duration,
};

use native_tls::{HandshakeError, TlsStream};

use super::tls::TlsParameters;
use crate::transport::smtp::{error, Error};

/// A bidirectional byte stream an SMTP session runs over
pub trait SmtpStream: Read + Write {
    /// Is the stream encrypted
    fn is_encrypted(&self) -> bool;
}

/// Opens streams and upgrades them to TLS
///
/// The [`Dialer`](crate::transport::smtp::Dialer) goes through a connector
/// for every network operation, so tests can hand it scripted streams.
pub trait Connector {
    /// The stream type produced
    type Stream: SmtpStream;

    /// Opens a plaintext connection to `host:port`
    fn connect(&self, host: &str, port: u16, timeout: Option<Duration>)
        -> Result<Self::Stream, Error>;

    /// Performs the TLS handshake over `stream`
    fn upgrade_tls(
        &self,
        stream: Self::Stream,
        tls_parameters: &TlsParameters,
    ) -> Result<Self::Stream, Error>;
}

/// Represents the different types of underlying network streams
pub enum NetworkStream {
    /// Plain TCP stream
    Tcp(TcpStream),
    /// Encrypted TCP stream
    Tls(TlsStream<TcpStream>),
}

impl NetworkStream {
    /// Returns peer's address
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        match self {
            NetworkStream::Tcp(s) => s.peer_addr(),
            NetworkStream::Tls(s) => s.get_ref().peer_addr(),
        }
    }
}

impl Debug for NetworkStream {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            NetworkStream::Tcp(_) => f.write_str("NetworkStream::Tcp(_)"),
            NetworkStream::Tls(_) => f.write_str("NetworkStream::Tls(_)"),
        }
    }
}

impl SmtpStream for NetworkStream {
    fn is_encrypted(&self) -> bool {
        matches!(self, NetworkStream::Tls(_))
    }
}

impl Read for NetworkStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            NetworkStream::Tcp(s) => s.read(buf),
            NetworkStream::Tls(s) => s.read(buf),
        }
    }
}

impl Write for NetworkStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            NetworkStream::Tcp(s) => s.write(buf),
            NetworkStream::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            NetworkStream::Tcp(s) => s.flush(),
            NetworkStream::Tls(s) => s.flush(),
        }
    }
}

/// Connects over TCP, with TLS from `native-tls`
#[derive(Debug, Clone, Copy, Default)]
pub struct NetConnector;

fn try_connect<T: ToSocketAddrs>(server: T, timeout: Option<Duration>) -> Result<TcpStream, Error> {
    let addrs = server.to_socket_addrs().map_err(error::connection)?;

    let mut last_err = None;
    for addr in addrs {
        let attempt = match timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }

    Err(match last_err {
        Some(last_err) => error::connection(last_err),
        None => error::connection("could not resolve to any supported address"),
    })
}

impl Connector for NetConnector {
    type Stream = NetworkStream;

    fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Option<Duration>,
    ) -> Result<NetworkStream, Error> {
        let tcp_stream = try_connect((host, port), timeout)?;
        Ok(NetworkStream::Tcp(tcp_stream))
    }

    fn upgrade_tls(
        &self,
        stream: NetworkStream,
        tls_parameters: &TlsParameters,
    ) -> Result<NetworkStream, Error> {
        let tcp_stream = match stream {
            NetworkStream::Tcp(stream) => stream,
            tls @ NetworkStream::Tls(_) => return Ok(tls),
        };

        match tls_parameters
            .connector
            .connect(tls_parameters.domain(), tcp_stream)
        {
            Ok(stream) => Ok(NetworkStream::Tls(stream)),
            Err(HandshakeError::Failure(err)) => Err(error::tls(err)),
            Err(HandshakeError::WouldBlock(_)) => Err(error::tls("TLS handshake would block")),
        }
    }
}
