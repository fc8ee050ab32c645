//! Provides limited SASL authentication mechanisms
//!
//! `PLAIN` and `LOGIN` send the password itself, so they only run over an
//! encrypted connection (or to a loopback host) and only against the host
//! the credentials were configured for.

use std::{
    fmt::{self, Debug, Display, Formatter},
    str::FromStr,
};

use hmac::{Hmac, Mac};
use md5::Md5;

use crate::transport::smtp::error::{self, Error};

/// Mechanisms in order of preference
///
/// LOGIN comes last as it is deprecated.
pub const DEFAULT_MECHANISMS: &[Mechanism] =
    &[Mechanism::CramMd5, Mechanism::Plain, Mechanism::Login];

const LOOPBACK_HOSTS: &[&str] = &["localhost", "127.0.0.1", "::1"];

/// Contains user credentials
#[derive(PartialEq, Eq, Clone, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Credentials {
    authentication_identity: String,
    secret: String,
}

impl Credentials {
    /// Create a `Credentials` struct from username and password
    pub fn new(username: String, password: String) -> Credentials {
        Credentials {
            authentication_identity: username,
            secret: password,
        }
    }

    /// The user name
    pub fn username(&self) -> &str {
        &self.authentication_identity
    }
}

impl<S, T> From<(S, T)> for Credentials
where
    S: Into<String>,
    T: Into<String>,
{
    fn from((username, password): (S, T)) -> Self {
        Credentials::new(username.into(), password.into())
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.authentication_identity)
            .finish_non_exhaustive()
    }
}

/// Represents authentication mechanisms
#[derive(PartialEq, Eq, Copy, Clone, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mechanism {
    /// PLAIN authentication mechanism, defined in
    /// [RFC 4616](https://tools.ietf.org/html/rfc4616)
    Plain,
    /// LOGIN authentication mechanism
    /// Obsolete but needed for some providers (like office365)
    ///
    /// Defined in [draft-murchison-sasl-login-00](https://www.ietf.org/archive/id/draft-murchison-sasl-login-00.txt).
    Login,
    /// CRAM-MD5 authentication mechanism, defined in
    /// [RFC 2195](https://tools.ietf.org/html/rfc2195)
    CramMd5,
}

impl Display for Mechanism {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match *self {
            Mechanism::Plain => "PLAIN",
            Mechanism::Login => "LOGIN",
            Mechanism::CramMd5 => "CRAM-MD5",
        })
    }
}

impl FromStr for Mechanism {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        DEFAULT_MECHANISMS
            .iter()
            .copied()
            .find(|m| s.eq_ignore_ascii_case(&m.to_string()))
            .ok_or_else(|| error::client(format!("unknown mechanism {s:?}")))
    }
}

impl Mechanism {
    /// Picks the preferred mechanism among the ones advertised by the
    /// server, as listed after the `AUTH` keyword
    pub fn select(advertised: &str) -> Option<Mechanism> {
        let offered: Vec<Mechanism> = advertised
            .split_whitespace()
            .filter_map(|m| m.parse().ok())
            .collect();
        DEFAULT_MECHANISMS
            .iter()
            .copied()
            .find(|m| offered.contains(m))
    }

    /// Does the mechanism send the password itself
    fn sends_secret(self) -> bool {
        matches!(self, Mechanism::Plain | Mechanism::Login)
    }
}

/// What the client knows about the server it is authenticating to
#[derive(Debug, Clone, Copy)]
pub struct ServerIdentity<'a> {
    /// Whether the connection is encrypted
    pub tls: bool,
    /// Name the session is bound to: the verified TLS domain when
    /// encrypted, the dialed host otherwise
    pub name: &'a str,
}

/// Drives one authentication exchange with the selected mechanism
#[derive(Clone, Debug)]
pub struct Authenticator {
    mechanism: Mechanism,
    credentials: Credentials,
    host: String,
}

impl Authenticator {
    /// Creates an authenticator for `credentials` bound to `host`
    pub fn new<H: Into<String>>(mechanism: Mechanism, credentials: Credentials, host: H) -> Self {
        Self {
            mechanism,
            credentials,
            host: host.into(),
        }
    }

    /// Chooses the mechanism from the server's `AUTH` capability, `None`
    /// meaning the server does not advertise it
    pub fn select<H: Into<String>>(
        advertised: Option<&str>,
        credentials: Credentials,
        host: H,
    ) -> Result<Self, Error> {
        let advertised = advertised.ok_or_else(error::auth_not_supported)?;
        let mechanism = Mechanism::select(advertised).ok_or_else(error::no_mechanism)?;
        Ok(Self::new(mechanism, credentials, host))
    }

    /// The selected mechanism
    pub fn mechanism(&self) -> Mechanism {
        self.mechanism
    }

    /// Begins the exchange
    ///
    /// Returns the mechanism name and the initial response, if the
    /// mechanism sends one.
    pub fn start(&self, server: &ServerIdentity<'_>) -> Result<(Mechanism, Option<String>), Error> {
        if self.mechanism.sends_secret() {
            if !server.tls && !LOOPBACK_HOSTS.contains(&server.name) {
                return Err(error::unencrypted_connection());
            }
            if server.name != self.host {
                return Err(error::wrong_host_name(server.name.to_owned()));
            }
        }

        let initial = match self.mechanism {
            Mechanism::Plain => Some(format!(
                "\u{0}{}\u{0}{}",
                self.credentials.authentication_identity, self.credentials.secret
            )),
            Mechanism::Login | Mechanism::CramMd5 => None,
        };
        Ok((self.mechanism, initial))
    }

    /// Answers a decoded server challenge
    ///
    /// `more` is false once the server has accepted the exchange, in which
    /// case there is nothing left to send.
    pub fn next(&self, challenge: &str, more: bool) -> Result<Option<String>, Error> {
        if !more {
            return Ok(None);
        }

        match self.mechanism {
            Mechanism::Login => match challenge {
                "Username:" => Ok(Some(self.credentials.authentication_identity.clone())),
                "Password:" => Ok(Some(self.credentials.secret.clone())),
                _ => Err(error::unexpected_challenge(challenge)),
            },
            Mechanism::CramMd5 => {
                let mut mac = Hmac::<Md5>::new_from_slice(self.credentials.secret.as_bytes())
                    .map_err(|_| error::client("invalid CRAM-MD5 key"))?;
                mac.update(challenge.as_bytes());
                Ok(Some(format!(
                    "{} {}",
                    self.credentials.authentication_identity,
                    hex::encode(mac.finalize().into_bytes())
                )))
            }
            Mechanism::Plain => Err(error::unexpected_challenge(challenge)),
        }
    }
}
