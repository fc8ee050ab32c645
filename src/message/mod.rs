//! Composes multipart/mixed email messages
//!
//! ## Usage
//!
//! ```rust
//! use missive::message::{Mailbox, Message};
//!
//! # use std::error::Error;
//! # fn main() -> Result<(), Box<dyn Error>> {
//! let mut m = Message::new();
//! m.set_from(Mailbox::new(Some("NoBody".to_owned()), "nobody@domain.tld"))
//!     .set_to(["hei@domain.tld"])
//!     .set_subject("Happy new year")
//!     .set_plain_body("Be happy!")
//!     .add_html_body("<p>Be <b>happy</b>!</p>");
//!
//! let bytes = m.formatted()?;
//! # assert!(bytes.starts_with(b"MESSAGE-ID: <"));
//! # Ok(())
//! # }
//! ```
//!
//! Which produces:
//!
//! ```sh
//! MESSAGE-ID: <0c9f…e1d2@missive.localdomain>
//! FROM: "NoBody" <nobody@domain.tld>
//! TO: <hei@domain.tld>
//! SUBJECT: Happy new year
//! DATE: Sat, 12 Dec 2020 16:33:19 -0000
//! MIME-VERSION: 1.0
//! USER-AGENT: missive/0.1.0 linux/x86_64
//! Content-Type: multipart/mixed;
//!  boundary="=_Missive_5b1d…"
//!
//! --=_Missive_5b1d…
//! Content-Type: text/plain; charset=utf-8
//! Content-Transfer-Encoding: base64
//!
//! QmUgaGFwcHkh
//! --=_Missive_5b1d…
//! Content-Type: text/html; charset=utf-8
//! Content-Transfer-Encoding: base64
//!
//! PHA+QmUgPGI+aGFwcHk8L2I+ITwvcD4=
//! --=_Missive_5b1d…--
//! ```
//!
//! Header values that are not printable ASCII are written as RFC 2047
//! encoded words. Bodies are always base64 encoded.

pub use attachment::Copier;
pub use encoder::{LineWrappingEncoder, MAX_LINE_LENGTH};
pub use error::Error;
pub use mailbox::Mailbox;

mod attachment;
mod encoder;
mod error;
mod header;
mod mailbox;
mod writer;

use std::{
    io::{self, Write},
    path::Path,
    sync::Arc,
    time::SystemTime,
};

use attachment::{path_copier, text_copier, Disposition, File, Part};
use header::Header;

/// An email message
///
/// Built with the `set_*` (replace) and `add_*` (append) methods, then
/// written with [`Message::write_to`] or sent with a
/// [`Sender`](crate::transport::smtp::Sender). Every write generates a
/// fresh boundary and message id, so the same message can be written
/// several times.
#[derive(Debug, Clone, Default)]
pub struct Message {
    header: Header,
    parts: Vec<Part>,
    files: Vec<File>,
}

fn mailboxes<I, S>(addresses: I) -> impl Iterator<Item = Mailbox>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    addresses.into_iter().map(Mailbox::address)
}

impl Message {
    /// Creates an empty message
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sender address, without a display name
    pub fn set_sender<S: Into<String>>(&mut self, email: S) -> &mut Self {
        self.set_from(Mailbox::address(email))
    }

    /// Sets the sender mailbox
    pub fn set_from(&mut self, from: Mailbox) -> &mut Self {
        self.header.from = Some(from);
        self
    }

    /// Replaces the `To` addresses
    pub fn set_to<I, S>(&mut self, addresses: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.header.to = mailboxes(addresses).collect();
        self
    }

    /// Appends `To` addresses
    pub fn add_to<I, S>(&mut self, addresses: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.header.to.extend(mailboxes(addresses));
        self
    }

    /// Replaces the `To` mailboxes
    pub fn set_rcpt_to<I: IntoIterator<Item = Mailbox>>(&mut self, mailboxes: I) -> &mut Self {
        self.header.to = mailboxes.into_iter().collect();
        self
    }

    /// Appends `To` mailboxes
    pub fn add_rcpt_to<I: IntoIterator<Item = Mailbox>>(&mut self, mailboxes: I) -> &mut Self {
        self.header.to.extend(mailboxes);
        self
    }

    /// Replaces the `Cc` addresses
    pub fn set_cc<I, S>(&mut self, addresses: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.header.cc = mailboxes(addresses).collect();
        self
    }

    /// Appends `Cc` addresses
    pub fn add_cc<I, S>(&mut self, addresses: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.header.cc.extend(mailboxes(addresses));
        self
    }

    /// Replaces the `Cc` mailboxes
    pub fn set_rcpt_cc<I: IntoIterator<Item = Mailbox>>(&mut self, mailboxes: I) -> &mut Self {
        self.header.cc = mailboxes.into_iter().collect();
        self
    }

    /// Appends `Cc` mailboxes
    pub fn add_rcpt_cc<I: IntoIterator<Item = Mailbox>>(&mut self, mailboxes: I) -> &mut Self {
        self.header.cc.extend(mailboxes);
        self
    }

    /// Replaces the `Bcc` addresses
    ///
    /// `Bcc` recipients receive the message but never appear in it.
    pub fn set_bcc<I, S>(&mut self, addresses: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.header.bcc = mailboxes(addresses).collect();
        self
    }

    /// Appends `Bcc` addresses
    pub fn add_bcc<I, S>(&mut self, addresses: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.header.bcc.extend(mailboxes(addresses));
        self
    }

    /// Replaces the `Bcc` mailboxes
    pub fn set_rcpt_bcc<I: IntoIterator<Item = Mailbox>>(&mut self, mailboxes: I) -> &mut Self {
        self.header.bcc = mailboxes.into_iter().collect();
        self
    }

    /// Appends `Bcc` mailboxes
    pub fn add_rcpt_bcc<I: IntoIterator<Item = Mailbox>>(&mut self, mailboxes: I) -> &mut Self {
        self.header.bcc.extend(mailboxes);
        self
    }

    /// Sets the subject, which must not be empty when the message is written
    pub fn set_subject<S: Into<String>>(&mut self, subject: S) -> &mut Self {
        self.header.subject = subject.into();
        self
    }

    /// Overrides the `DATE` header value
    ///
    /// The value is written as is, use [`Message::set_date_time`] to format
    /// a timestamp.
    pub fn set_date<S: Into<String>>(&mut self, date: S) -> &mut Self {
        self.header.date = Some(date.into());
        self
    }

    /// Sets the `DATE` header from a timestamp
    pub fn set_date_time(&mut self, date: SystemTime) -> &mut Self {
        self.header.date = Some(header::format_date(date));
        self
    }

    /// Overrides the `USER-AGENT` header value
    pub fn set_user_agent<S: Into<String>>(&mut self, user_agent: S) -> &mut Self {
        self.header.user_agent = Some(user_agent.into());
        self
    }

    /// Sets the values of an additional header
    ///
    /// The name is uppercased. Values previously set under the same name
    /// are replaced. Names the message generates itself (`FROM`, `TO`,
    /// `CC`, `BCC`, `SUBJECT`, `DATE`, `MIME-VERSION`, `USER-AGENT`,
    /// `MESSAGE-ID`) are ignored when writing.
    pub fn add_header<K, I, V>(&mut self, name: K, values: I) -> &mut Self
    where
        K: AsRef<str>,
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.header.extra.insert(
            name.as_ref().to_uppercase(),
            values.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Replaces all body parts with a part of type `content_type` streamed
    /// by `copier`
    pub fn set_copier_body<C, F>(&mut self, content_type: C, copier: F) -> &mut Self
    where
        C: Into<String>,
        F: Fn(&mut dyn Write) -> io::Result<usize> + Send + Sync + 'static,
    {
        self.parts.clear();
        self.add_copier_body(content_type, copier)
    }

    /// Appends an alternative part of type `content_type` streamed by
    /// `copier`
    ///
    /// The copier is called on every write of the message.
    pub fn add_copier_body<C, F>(&mut self, content_type: C, copier: F) -> &mut Self
    where
        C: Into<String>,
        F: Fn(&mut dyn Write) -> io::Result<usize> + Send + Sync + 'static,
    {
        self.parts
            .push(Part::new(content_type.into(), Arc::new(copier)));
        self
    }

    /// Replaces all body parts with a `text/plain` part
    pub fn set_plain_body<S: Into<String>>(&mut self, body: S) -> &mut Self {
        self.parts.clear();
        self.add_plain_body(body)
    }

    /// Appends a `text/plain` alternative
    pub fn add_plain_body<S: Into<String>>(&mut self, body: S) -> &mut Self {
        self.parts.push(Part::plain(body.into()));
        self
    }

    /// Replaces all body parts with a `text/html` part
    pub fn set_html_body<S: Into<String>>(&mut self, body: S) -> &mut Self {
        self.parts.clear();
        self.add_html_body(body)
    }

    /// Appends a `text/html` alternative
    pub fn add_html_body<S: Into<String>>(&mut self, body: S) -> &mut Self {
        self.parts.push(Part::html(body.into()));
        self
    }

    fn push_file<F>(
        &mut self,
        filename: String,
        saved_name: Option<String>,
        disposition: Disposition,
        copier: F,
    ) -> &mut Self
    where
        F: Fn(&mut dyn Write) -> io::Result<usize> + Send + Sync + 'static,
    {
        self.files.push(File::new(
            filename,
            saved_name,
            disposition,
            Arc::new(copier),
        ));
        self
    }

    /// Attaches a downloadable file
    ///
    /// The content type is guessed from the file name extension.
    pub fn attach<S, F>(&mut self, filename: S, copier: F) -> &mut Self
    where
        S: Into<String>,
        F: Fn(&mut dyn Write) -> io::Result<usize> + Send + Sync + 'static,
    {
        self.push_file(filename.into(), None, Disposition::Attachment, copier)
    }

    /// Attaches a downloadable file, proposed to the reader as `saved_name`
    pub fn attach_as<S, N, F>(&mut self, filename: S, saved_name: N, copier: F) -> &mut Self
    where
        S: Into<String>,
        N: Into<String>,
        F: Fn(&mut dyn Write) -> io::Result<usize> + Send + Sync + 'static,
    {
        self.push_file(
            filename.into(),
            Some(saved_name.into()),
            Disposition::Attachment,
            copier,
        )
    }

    /// Attaches a file from disk
    ///
    /// The file is read each time the message is written; a missing file
    /// fails the write, not this call.
    pub fn attach_path<P: AsRef<Path>>(&mut self, path: P) -> &mut Self {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        self.files.push(File::new(
            filename,
            None,
            Disposition::Attachment,
            path_copier(path),
        ));
        self
    }

    /// Embeds an inline file, referenced from HTML as `cid:<filename>`
    pub fn embed<S, F>(&mut self, filename: S, copier: F) -> &mut Self
    where
        S: Into<String>,
        F: Fn(&mut dyn Write) -> io::Result<usize> + Send + Sync + 'static,
    {
        self.push_file(filename.into(), None, Disposition::Inline, copier)
    }

    /// Embeds an inline file under `filename`, proposed to the reader as
    /// `saved_name`
    pub fn embed_as<S, N, F>(&mut self, filename: S, saved_name: N, copier: F) -> &mut Self
    where
        S: Into<String>,
        N: Into<String>,
        F: Fn(&mut dyn Write) -> io::Result<usize> + Send + Sync + 'static,
    {
        self.push_file(
            filename.into(),
            Some(saved_name.into()),
            Disposition::Inline,
            copier,
        )
    }

    /// Embeds an inline file with in-memory content
    pub fn embed_bytes<S: Into<String>>(&mut self, filename: S, content: Vec<u8>) -> &mut Self {
        self.embed(filename, move |w: &mut dyn Write| {
            w.write_all(&content)?;
            Ok(content.len())
        })
    }

    /// Attaches a file with in-memory content
    pub fn attach_bytes<S: Into<String>>(&mut self, filename: S, content: Vec<u8>) -> &mut Self {
        self.attach(filename, move |w: &mut dyn Write| {
            w.write_all(&content)?;
            Ok(content.len())
        })
    }

    /// Attaches a text file
    pub fn attach_text<S: Into<String>, T: Into<String>>(
        &mut self,
        filename: S,
        content: T,
    ) -> &mut Self {
        self.files.push(File::new(
            filename.into(),
            None,
            Disposition::Attachment,
            text_copier(content.into()),
        ));
        self
    }

    /// Sender of the message, if set and not empty
    pub fn envelope_from(&self) -> Option<&Mailbox> {
        self.header.from.as_ref().filter(|from| !from.is_empty())
    }

    /// Every recipient: `To`, then `Cc`, then `Bcc`, skipping empty addresses
    pub fn envelope_recipients(&self) -> Vec<&Mailbox> {
        self.header
            .to
            .iter()
            .chain(&self.header.cc)
            .chain(&self.header.bcc)
            .filter(|mbox| !mbox.is_empty())
            .collect()
    }

    /// Writes the message to `out`, returning the number of bytes written
    ///
    /// Fails without writing anything when the sender, the recipients or
    /// the subject are missing. The first error raised by `out` or by a
    /// body copier aborts the write.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<u64, Error> {
        writer::write_message(self, None, out)
    }

    /// Writes the message into a new buffer
    pub fn formatted(&self) -> Result<Vec<u8>, Error> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// Checks the message can be written, using `fallback_from` when it
    /// has no sender
    pub(crate) fn validate(&self, fallback_from: Option<&Mailbox>) -> Result<(), Error> {
        self.header.validate(fallback_from)
    }

    pub(crate) fn resolved_from<'a>(
        &'a self,
        fallback_from: Option<&'a Mailbox>,
    ) -> Result<&'a Mailbox, Error> {
        self.header.resolve_from(fallback_from)
    }

    pub(crate) fn resolved_recipients(&self) -> Result<Vec<&Mailbox>, Error> {
        self.header.recipients()
    }

    pub(crate) fn write_with_sender<W: Write>(
        &self,
        fallback_from: Option<&Mailbox>,
        out: &mut W,
    ) -> Result<u64, Error> {
        writer::write_message(self, fallback_from, out)
    }
}
