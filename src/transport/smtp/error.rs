//! Error and result type for SMTP clients

use std::{error::Error as StdError, fmt};

use crate::{
    message,
    transport::smtp::response::{Code, Severity},
    BoxError,
};

// Inspired by https://github.com/seanmonstar/reqwest/blob/a8566383168c0ef06c21f38cbc9213af6ff6db31/src/error.rs

/// The Errors that may occur when sending an email over SMTP
pub struct Error {
    inner: Box<Inner>,
}

struct Inner {
    kind: Kind,
    source: Option<BoxError>,
}

impl Error {
    pub(crate) fn new<E>(kind: Kind, source: Option<E>) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            inner: Box::new(Inner {
                kind,
                source: source.map(Into::into),
            }),
        }
    }

    /// Returns true if the error is from response
    pub fn is_response(&self) -> bool {
        matches!(self.inner.kind, Kind::Response)
    }

    /// Returns true if the error is from client
    pub fn is_client(&self) -> bool {
        matches!(self.inner.kind, Kind::Client)
    }

    /// Returns true if the error is a transient SMTP error
    pub fn is_transient(&self) -> bool {
        matches!(self.inner.kind, Kind::Transient(_))
    }

    /// Returns true if the error is a permanent SMTP error
    pub fn is_permanent(&self) -> bool {
        matches!(self.inner.kind, Kind::Permanent(_))
    }

    /// Returns true if the error is caused by a timeout
    pub fn is_timeout(&self) -> bool {
        let mut source = self.source();

        while let Some(err) = source {
            if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
                return io_err.kind() == std::io::ErrorKind::TimedOut;
            }

            source = err.source();
        }

        false
    }

    /// Returns true if the error is from TLS
    pub fn is_tls(&self) -> bool {
        matches!(self.inner.kind, Kind::Tls)
    }

    /// Returns true if the error comes from the underlying network
    pub fn is_network(&self) -> bool {
        matches!(self.inner.kind, Kind::Network)
    }

    /// Returns true if the connection could not be established
    pub fn is_connection(&self) -> bool {
        matches!(self.inner.kind, Kind::Connection)
    }

    /// Returns true if the message itself is incomplete or invalid
    ///
    /// The source is a [`message::Error`].
    pub fn is_message(&self) -> bool {
        matches!(self.inner.kind, Kind::Message)
    }

    /// Returns true if credentials were given but the server does not
    /// support authentication
    pub fn is_auth_not_supported(&self) -> bool {
        matches!(self.inner.kind, Kind::AuthNotSupported)
    }

    /// Returns true if the server offers none of the supported mechanisms
    pub fn is_no_mechanism(&self) -> bool {
        matches!(self.inner.kind, Kind::NoMechanism)
    }

    /// Returns true if credentials were withheld because the connection
    /// is not encrypted
    pub fn is_unencrypted_connection(&self) -> bool {
        matches!(self.inner.kind, Kind::UnencryptedConnection)
    }

    /// Returns true if credentials were withheld because the session is
    /// bound to another host than the configured one
    pub fn is_wrong_host_name(&self) -> bool {
        matches!(self.inner.kind, Kind::WrongHostName)
    }

    /// Returns true if the server sent an authentication challenge the
    /// mechanism does not know
    pub fn is_unexpected_challenge(&self) -> bool {
        matches!(self.inner.kind, Kind::UnexpectedChallenge)
    }

    /// Returns the status code, if the error was generated from a response.
    pub fn status(&self) -> Option<Code> {
        match self.inner.kind {
            Kind::Transient(code) | Kind::Permanent(code) => Some(code),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub(crate) enum Kind {
    /// Transient SMTP error, 4xx reply code
    ///
    /// [RFC 5321, section 4.2.1](https://tools.ietf.org/html/rfc5321#section-4.2.1)
    Transient(Code),
    /// Permanent SMTP error, 5xx reply code
    ///
    /// [RFC 5321, section 4.2.1](https://tools.ietf.org/html/rfc5321#section-4.2.1)
    Permanent(Code),
    /// Error parsing a response
    Response,
    /// Internal client error
    Client,
    /// Connection error
    Connection,
    /// Underlying network i/o error
    Network,
    /// TLS error
    Tls,
    /// Message composition error
    Message,
    /// Credentials configured, AUTH extension missing
    AuthNotSupported,
    /// AUTH extension present, no usable mechanism
    NoMechanism,
    /// Credentials refused on a plaintext, non-loopback channel
    UnencryptedConnection,
    /// Session bound to another host than the configured one
    WrongHostName,
    /// Challenge outside the mechanism's vocabulary
    UnexpectedChallenge,
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = f.debug_struct("missive::transport::smtp::Error");

        builder.field("kind", &self.inner.kind);

        if let Some(ref source) = self.inner.source {
            builder.field("source", source);
        }

        builder.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.kind {
            Kind::Response => f.write_str("response error")?,
            Kind::Client => f.write_str("internal client error")?,
            Kind::Network => f.write_str("network error")?,
            Kind::Connection => f.write_str("Connection error")?,
            Kind::Tls => f.write_str("tls error")?,
            Kind::Message => f.write_str("invalid message")?,
            Kind::AuthNotSupported => f.write_str("server does not support authentication")?,
            Kind::NoMechanism => {
                f.write_str("no supported authentication mechanism offered by the server")?
            }
            Kind::UnencryptedConnection => f.write_str("unencrypted connection")?,
            Kind::WrongHostName => f.write_str("wrong host name")?,
            Kind::UnexpectedChallenge => f.write_str("unexpected server challenge")?,
            Kind::Transient(ref code) => {
                write!(f, "transient error ({code})")?;
            }
            Kind::Permanent(ref code) => {
                write!(f, "permanent error ({code})")?;
            }
        };

        if let Some(ref e) = self.inner.source {
            write!(f, ": {e}")?;
        }

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source.as_ref().map(|e| {
            let r: &(dyn std::error::Error + 'static) = &**e;
            r
        })
    }
}

impl From<message::Error> for Error {
    fn from(err: message::Error) -> Error {
        Error::new(Kind::Message, Some(err))
    }
}

pub(crate) fn code(c: Code, s: Option<String>) -> Error {
    match c.severity {
        Severity::TransientNegativeCompletion => Error::new(Kind::Transient(c), s),
        Severity::PermanentNegativeCompletion => Error::new(Kind::Permanent(c), s),
        _ => client("Unknown error code"),
    }
}

pub(crate) fn response<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Response, Some(e))
}

pub(crate) fn client<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Client, Some(e))
}

pub(crate) fn network<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Network, Some(e))
}

pub(crate) fn connection<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Connection, Some(e))
}

pub(crate) fn tls<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Tls, Some(e))
}

pub(crate) fn auth_not_supported() -> Error {
    Error::new(Kind::AuthNotSupported, None::<BoxError>)
}

pub(crate) fn no_mechanism() -> Error {
    Error::new(Kind::NoMechanism, None::<BoxError>)
}

pub(crate) fn unencrypted_connection() -> Error {
    Error::new(Kind::UnencryptedConnection, None::<BoxError>)
}

pub(crate) fn wrong_host_name<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::WrongHostName, Some(e))
}

pub(crate) fn unexpected_challenge(challenge: &str) -> Error {
    Error::new(
        Kind::UnexpectedChallenge,
        Some(format!("{challenge:?}")),
    )
}
