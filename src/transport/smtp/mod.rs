//! The SMTP transport sends emails using the SMTP protocol.
//!
//! This SMTP client follows [RFC 5321](https://tools.ietf.org/html/rfc5321),
//! and is meant to hand messages to a relay server, which is trusted for
//! most sanity and RFC compliance checks.
//!
//! It implements the following extensions:
//!
//! * AUTH ([RFC 4954](http://tools.ietf.org/html/rfc4954)) with CRAM-MD5, PLAIN and LOGIN mechanisms
//! * STARTTLS ([RFC 3207](http://tools.ietf.org/html/rfc3207))
//! * SMTPUTF8 ([RFC 6531](http://tools.ietf.org/html/rfc6531)) for non-ASCII envelopes
//!
//! Sessions are opened with implicit TLS ([`Dialer::relay`]) or upgraded
//! with STARTTLS whenever the server offers it. Credentials are only sent
//! over an encrypted channel, or to a loopback host.
//!
//! #### Example
//!
//! ```rust,no_run
//! use missive::{message::Message, transport::smtp::Dialer};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut first = Message::new();
//! first
//!     .set_to(["root@example.org"])
//!     .set_subject("Hello")
//!     .set_plain_body("Hello world");
//!
//! let mut second = first.clone();
//! second.set_plain_body("Hello world a second time");
//!
//! let dialer = Dialer::starttls_relay("smtp.example.org")
//!     .credentials(("user@example.org", "password").into());
//!
//! // Both messages go over the same session
//! let mut sender = dialer.dial()?;
//! sender.send(&first)?;
//! sender.reset()?;
//! sender.send(&second)?;
//! sender.close()?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

pub use self::{dialer::Dialer, error::Error, sender::Sender};

pub mod authentication;
pub mod client;
pub mod commands;
mod dialer;
pub mod error;
pub mod extension;
pub mod response;
mod sender;

// Registered port numbers:
// https://www.iana.
// org/assignments/service-names-port-numbers/service-names-port-numbers.xhtml

/// Default smtp port
pub const SMTP_PORT: u16 = 25;
/// Default submission port
pub const SUBMISSION_PORT: u16 = 587;
/// Default submission over TLS port
///
/// https://tools.ietf.org/html/rfc8314
pub const SUBMISSIONS_PORT: u16 = 465;

/// Default timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
