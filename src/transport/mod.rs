//! ### Sending Messages
//!
//! Messages built with [`Message`](crate::Message) are delivered over SMTP
//! by the [`smtp`] transport: a [`Dialer`](smtp::Dialer) opens sessions,
//! each one a [`Sender`](smtp::Sender) that sends messages until closed.

pub mod smtp;
