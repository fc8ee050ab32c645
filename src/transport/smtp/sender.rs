use super::{
    client::{SmtpConnection, SmtpStream},
    commands::{Mail, Rcpt, Rset},
    error::{self, Error},
    extension::{Extension, MailParameter, ServerInfo},
    response::Response,
};
use crate::message::{self, Mailbox, Message};

/// An open SMTP session, ready to send messages
///
/// Obtained from [`Dialer::dial`](super::Dialer::dial). Dropping a sender
/// closes the socket without `QUIT`; use [`Sender::close`] to end the
/// session politely.
///
/// A message whose content fails to stream leaves the server waiting in
/// the middle of `DATA`. The session is then broken: further sends fail
/// right away and [`Sender::close`] drops the socket without `QUIT`.
#[derive(Debug)]
pub struct Sender<S: SmtpStream> {
    conn: SmtpConnection<S>,
    identity: Option<Mailbox>,
    broken: bool,
}

impl<S: SmtpStream> Sender<S> {
    pub(super) fn new(conn: SmtpConnection<S>, identity: Option<Mailbox>) -> Self {
        Self {
            conn,
            identity,
            broken: false,
        }
    }

    fn ensure_usable(&self) -> Result<(), Error> {
        if self.broken {
            return Err(error::client(
                "session is unusable after an aborted DATA transfer",
            ));
        }
        Ok(())
    }

    /// Sends one message over the session
    ///
    /// A message without sender is sent as the authenticated user. The
    /// message is checked before any command goes out, so a composition
    /// error leaves the session untouched.
    pub fn send(&mut self, message: &Message) -> Result<Response, Error> {
        self.ensure_usable()?;
        let identity = self.identity.as_ref();
        message.validate(identity)?;
        let from = message.resolved_from(identity)?;
        let recipients = message.resolved_recipients()?;

        let mut parameters = Vec::new();
        let international = std::iter::once(from)
            .chain(recipients.iter().copied())
            .any(|mailbox| !mailbox.email.is_ascii());
        if international {
            if !self
                .conn
                .server_info()
                .supports_feature(Extension::SmtpUtfEight)
            {
                return Err(error::client(
                    "envelope contains non-ASCII addresses and the server does not support SMTPUTF8",
                ));
            }
            parameters.push(MailParameter::SmtpUtfEight);
        }

        self.conn.command(Mail::new(from.email.as_str(), parameters))?;
        for recipient in &recipients {
            self.conn.command(Rcpt::new(recipient.email.as_str()))?;
        }

        let mut data = self.conn.data()?;
        // Cleared once the server has answered the end of data
        self.broken = true;
        message
            .write_with_sender(identity, &mut data)
            .map_err(|err| match err {
                message::Error::Io(err) => error::network(err),
                err => Error::from(err),
            })?;
        let response = data.finish();
        self.broken = match response {
            Ok(_) => false,
            Err(ref err) => !(err.is_transient() || err.is_permanent()),
        };
        let response = response?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "message sent to {} recipient(s): {}",
            recipients.len(),
            response.first_line().unwrap_or_default()
        );
        Ok(response)
    }

    /// Sends `QUIT` and closes the session
    ///
    /// A broken session is closed without `QUIT`.
    pub fn close(mut self) -> Result<(), Error> {
        if self.broken {
            #[cfg(feature = "tracing")]
            tracing::debug!("closing broken session without QUIT");
            return Ok(());
        }
        self.conn.quit().map(|_| ())
    }

    /// Checks the session is still alive with `NOOP`
    pub fn test_connected(&mut self) -> bool {
        !self.broken && self.conn.test_connected()
    }

    /// Aborts any transaction in progress with `RSET`
    pub fn reset(&mut self) -> Result<(), Error> {
        self.ensure_usable()?;
        self.conn.command(Rset).map(|_| ())
    }

    /// Tells if an aborted `DATA` transfer left the session unusable
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Information the server advertised after the last `EHLO`
    pub fn server_info(&self) -> &ServerInfo {
        self.conn.server_info()
    }

    /// Tells if the session runs over TLS
    pub fn is_encrypted(&self) -> bool {
        self.conn.is_encrypted()
    }
}
