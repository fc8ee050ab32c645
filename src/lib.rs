//! Missive composes multipart email messages and sends them over SMTP.
//!
//! A [`Message`] holds the sender, recipients, subject, extra headers,
//! body parts and attached or inline files. It serializes to a
//! `multipart/mixed` document where every part is base64 encoded, so any
//! content survives a 7-bit relay.
//!
//! A [`Dialer`] opens sessions to a relay server, with implicit TLS or
//! STARTTLS, and authenticates with CRAM-MD5, PLAIN or LOGIN. Each session
//! is a [`Sender`] able to deliver several messages.
//!
//! ```rust,no_run
//! use missive::{Dialer, Mailbox, Message};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut email = Message::new();
//! email
//!     .set_from(Mailbox::new(Some("Alex".to_owned()), "alex@example.com"))
//!     .set_to(["bob@example.com"])
//!     .set_subject("Report")
//!     .set_plain_body("See attached.")
//!     .attach_path("report.pdf");
//!
//! Dialer::relay("smtp.example.com")
//!     .credentials(("alex@example.com", "secret").into())
//!     .dial_and_send(&email)?;
//! # Ok(())
//! # }
//! ```

#![deny(
    missing_docs,
    missing_debug_implementations,
    unsafe_code,
    unstable_features,
    unused_import_braces
)]

pub mod message;
pub mod transport;

pub use crate::{
    message::{Mailbox, Message},
    transport::smtp::{Dialer, Sender},
};

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;
