//! SMTP client
//!
//! `SmtpConnection` allows manually sending SMTP commands over any
//! [`SmtpStream`].
//!
//! ```rust,no_run
//! use missive::transport::smtp::{
//!     client::{Connector, NetConnector, SmtpConnection},
//!     commands::*,
//!     extension::ClientId,
//!     SMTP_PORT,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let stream = NetConnector.connect("localhost", SMTP_PORT, None)?;
//! let mut conn = SmtpConnection::connect(stream, &ClientId::default())?;
//! conn.command(Mail::new("user@example.com", vec![]))?;
//! conn.command(Rcpt::new("user@example.org"))?;
//! let mut data = conn.data()?;
//! std::io::Write::write_all(&mut data, b"Subject: test\r\n\r\nHello\r\n")?;
//! data.finish()?;
//! conn.quit()?;
//! # Ok(())
//! # }
//! ```

use std::{
    fmt::{self, Debug, Display},
    io::{self, BufRead, BufReader, Write},
};

pub use self::{
    net::{Connector, NetConnector, NetworkStream, SmtpStream},
    tls::{Certificate, TlsParameters, TlsParametersBuilder, TlsVersion},
};
use super::{
    authentication::{Authenticator, ServerIdentity},
    commands::*,
    error::{self, Error},
    extension::{ClientId, Extension, ServerInfo},
    response::{parse_response, Response},
};

#[cfg(test)]
pub(crate) mod mock;
mod net;
mod tls;

/// Upper bound on challenges answered in one AUTH exchange
const MAX_CHALLENGES: u8 = 10;

/// Bytes of message data buffered before a write to the stream
const DATA_BUFFER_SIZE: usize = 8 * 1024;

/// The codec used for transparency
///
/// [RFC 5321, section 4.5.2](https://tools.ietf.org/html/rfc5321#section-4.5.2):
/// a line starting with a period gets one more period.
#[derive(Clone, Copy, Debug)]
pub struct ClientCodec {
    /// Progress through `CRLF .`, 2 meaning at the start of a line
    escape_count: u8,
}

impl Default for ClientCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientCodec {
    /// Creates a new client codec, positioned at the start of a line
    pub fn new() -> Self {
        ClientCodec { escape_count: 2 }
    }

    /// Adds transparency, or appends the end of data sequence when `frame`
    /// is empty
    pub fn encode(&mut self, frame: &[u8], buf: &mut Vec<u8>) {
        if frame.is_empty() {
            buf.extend_from_slice(match self.escape_count {
                0 => b"\r\n.\r\n",
                1 => b"\n.\r\n",
                _ => b".\r\n",
            });
            self.escape_count = 2;
            return;
        }

        let mut start = 0;
        for (idx, &byte) in frame.iter().enumerate() {
            self.escape_count = match (self.escape_count, byte) {
                (_, b'\r') => 1,
                (1, b'\n') => 2,
                (2, b'.') => {
                    buf.extend_from_slice(&frame[start..idx]);
                    buf.push(b'.');
                    start = idx;
                    0
                }
                _ => 0,
            };
        }
        buf.extend_from_slice(&frame[start..]);
    }
}

/// Returns the string replacing all the CRLF with "\<CRLF\>"
/// Used for debug displays
#[cfg(feature = "tracing")]
pub(super) fn escape_crlf(string: &str) -> String {
    string.replace("\r\n", "<CRLF>")
}

/// Structure that implements the SMTP client
pub struct SmtpConnection<S> {
    /// Stream between client and server
    stream: BufReader<S>,
    /// Information about the server
    server_info: ServerInfo,
}

impl<S> Debug for SmtpConnection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConnection")
            .field("server_info", &self.server_info)
            .finish_non_exhaustive()
    }
}

impl<S: SmtpStream> SmtpConnection<S> {
    /// Information about the server, from the last `EHLO`
    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Starts a session over `stream`
    ///
    /// Reads the greeting, then sends `EHLO` and parses server information.
    pub fn connect(stream: S, hello_name: &ClientId) -> Result<SmtpConnection<S>, Error> {
        let mut conn = SmtpConnection {
            stream: BufReader::new(stream),
            server_info: ServerInfo::default(),
        };
        conn.read_response()?;

        conn.ehlo(hello_name)?;

        #[cfg(feature = "tracing")]
        tracing::debug!("server {}", conn.server_info);
        Ok(conn)
    }

    /// Tells if the server offers STARTTLS on a plaintext connection
    pub fn can_starttls(&self) -> bool {
        !self.is_encrypted() && self.server_info.supports_feature(Extension::StartTls)
    }

    /// Upgrades the session to TLS and sends `EHLO` again
    ///
    /// Anything the server sent before the handshake and the client did not
    /// read yet is dropped.
    pub fn starttls<C>(
        mut self,
        connector: &C,
        tls_parameters: &TlsParameters,
        hello_name: &ClientId,
    ) -> Result<SmtpConnection<S>, Error>
    where
        C: Connector<Stream = S>,
    {
        if !self.server_info.supports_feature(Extension::StartTls) {
            return Err(error::client("STARTTLS is not supported on this server"));
        }

        self.command(Starttls)?;
        let stream = connector.upgrade_tls(self.stream.into_inner(), tls_parameters)?;

        #[cfg(feature = "tracing")]
        tracing::debug!("connection encrypted");

        let mut conn = SmtpConnection {
            stream: BufReader::new(stream),
            server_info: ServerInfo::default(),
        };
        // Capabilities from before the handshake are not trusted
        conn.ehlo(hello_name)?;
        Ok(conn)
    }

    /// Send EHLO and update server info, falling back to HELO
    fn ehlo(&mut self, hello_name: &ClientId) -> Result<(), Error> {
        let response = match self.command(Ehlo::new(hello_name.clone())) {
            Ok(response) => response,
            Err(err) if err.is_permanent() => {
                #[cfg(feature = "tracing")]
                tracing::debug!("EHLO rejected, trying HELO");
                self.command(Helo::new(hello_name.clone()))?
            }
            Err(err) => return Err(err),
        };
        self.server_info = ServerInfo::from_response(&response)?;
        Ok(())
    }

    /// Sends `QUIT`
    pub fn quit(&mut self) -> Result<Response, Error> {
        self.command(Quit)
    }

    /// Tells if the underlying stream is currently encrypted
    pub fn is_encrypted(&self) -> bool {
        self.stream.get_ref().is_encrypted()
    }

    /// Checks if the server is connected using the NOOP SMTP command
    pub fn test_connected(&mut self) -> bool {
        self.command(Noop).is_ok()
    }

    /// Runs an AUTH exchange driven by `authenticator`
    ///
    /// A challenge the mechanism cannot answer cancels the exchange with `*`
    /// before the error is returned.
    pub fn auth(
        &mut self,
        authenticator: &Authenticator,
        server: &ServerIdentity<'_>,
    ) -> Result<Response, Error> {
        let (mechanism, initial_response) = authenticator.start(server)?;

        #[cfg(feature = "tracing")]
        tracing::debug!("authenticating with {}", mechanism);

        let mut response = self.send_secret(Auth::new(mechanism, initial_response))?;

        let mut challenges = MAX_CHALLENGES;
        while response.has_code(334) {
            if challenges == 0 {
                let _ = self.command(AuthCancel);
                return Err(error::response("Unexpected number of challenges"));
            }
            challenges -= 1;

            let answer = decode_challenge(&response)
                .and_then(|challenge| authenticator.next(&challenge, true));
            response = match answer {
                Ok(answer) => {
                    self.send_secret(AuthResponse::new(answer.unwrap_or_default()))?
                }
                Err(err) => {
                    let _ = self.command(AuthCancel);
                    return Err(err);
                }
            };
        }

        authenticator.next("", false)?;
        Ok(response)
    }

    /// Sends `DATA` and returns a writer for the message content
    ///
    /// The content is dot-stuffed as it is written;
    /// [`DataWriter::finish`] ends it.
    pub fn data(&mut self) -> Result<DataWriter<'_, S>, Error> {
        self.command(Data)?;
        Ok(DataWriter {
            conn: self,
            codec: ClientCodec::new(),
            buf: Vec::with_capacity(DATA_BUFFER_SIZE),
            written: 0,
        })
    }

    /// Sends an SMTP command
    pub fn command<C: Display>(&mut self, command: C) -> Result<Response, Error> {
        let line = command.to_string();
        self.write(line.as_bytes())?;

        #[cfg(feature = "tracing")]
        tracing::debug!("Wrote: {}", escape_crlf(&line));

        self.read_response()
    }

    /// Sends a command carrying credentials, which are not logged
    fn send_secret<C: Display>(&mut self, command: C) -> Result<Response, Error> {
        self.write(command.to_string().as_bytes())?;

        #[cfg(feature = "tracing")]
        tracing::debug!("Wrote: <redacted>");

        self.read_response()
    }

    /// Writes a string to the server
    fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let stream = self.stream.get_mut();
        stream.write_all(bytes).map_err(error::network)?;
        stream.flush().map_err(error::network)
    }

    /// Gets the SMTP response
    pub fn read_response(&mut self) -> Result<Response, Error> {
        let mut buffer = String::with_capacity(100);

        while self.stream.read_line(&mut buffer).map_err(error::network)? > 0 {
            #[cfg(feature = "tracing")]
            tracing::debug!("<< {}", escape_crlf(&buffer));
            match parse_response(&buffer) {
                Ok((_remaining, response)) => {
                    return if response.is_positive() {
                        Ok(response)
                    } else {
                        Err(error::code(
                            response.code(),
                            Some(response.message().collect::<Vec<_>>().join(" ")),
                        ))
                    };
                }
                Err(nom::Err::Failure(e)) => {
                    return Err(error::response(e.to_string()));
                }
                Err(nom::Err::Incomplete(_)) => { /* read more */ }
                Err(nom::Err::Error(e)) => {
                    return Err(error::response(e.to_string()));
                }
            }
        }

        Err(error::response("incomplete response"))
    }
}

/// Streams message content into an open `DATA` command
pub struct DataWriter<'a, S: SmtpStream> {
    conn: &'a mut SmtpConnection<S>,
    codec: ClientCodec,
    buf: Vec<u8>,
    written: u64,
}

impl<S: SmtpStream> DataWriter<'_, S> {
    fn flush_buf(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            self.conn.stream.get_mut().write_all(&self.buf)?;
            self.buf.clear();
        }
        Ok(())
    }

    /// Sends the end of data sequence and reads the server's verdict
    pub fn finish(mut self) -> Result<Response, Error> {
        self.codec.encode(&[], &mut self.buf);
        self.flush().map_err(error::network)?;

        #[cfg(feature = "tracing")]
        tracing::debug!("Wrote: {} bytes of message data", self.written);

        self.conn.read_response()
    }
}

impl<S: SmtpStream> Write for DataWriter<'_, S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.codec.encode(buf, &mut self.buf);
        self.written += buf.len() as u64;
        if self.buf.len() >= DATA_BUFFER_SIZE {
            self.flush_buf()?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_buf()?;
        self.conn.stream.get_mut().flush()
    }
}

impl<S: SmtpStream> Debug for DataWriter<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataWriter")
            .field("written", &self.written)
            .finish_non_exhaustive()
    }
}
