//! Message header fields and their emission
// https://tools.ietf.org/html/rfc5322#section-3.6

use std::{
    collections::BTreeMap,
    fmt::Write as _,
    time::SystemTime,
};

use super::{encoder::encode_word, Error, Mailbox};

/// Field names generated by the serializer, never taken from extra headers
pub(crate) const RESERVED: &[&str] = &[
    "FROM",
    "TO",
    "CC",
    "BCC",
    "SUBJECT",
    "DATE",
    "MIME-VERSION",
    "USER-AGENT",
    "MESSAGE-ID",
];

const MIME_VERSION: &str = "1.0";

/// Domain part of generated message ids
pub(crate) const MESSAGE_ID_DOMAIN: &str = "missive.localdomain";

/// Formats a date the way RFC 5322 expects it
///
/// `httpdate` always ends with ` GMT`, which is an obsolete zone for email
/// ([RFC 2822, appendix A.6.2](https://tools.ietf.org/html/rfc2822#appendix-A.6.2)),
/// so it is replaced with `-0000`.
pub(crate) fn format_date(st: SystemTime) -> String {
    let mut s = httpdate::fmt_http_date(st);
    if s.ends_with(" GMT") {
        s.truncate(s.len() - "GMT".len());
        s.push_str("-0000");
    }
    s
}

fn default_user_agent() -> String {
    format!(
        "missive/{} {}/{}",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Returns true for printable ASCII field names without a colon
fn valid_field_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| (b'!'..=b'~').contains(&b) && b != b':')
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Header {
    pub(crate) from: Option<Mailbox>,
    pub(crate) to: Vec<Mailbox>,
    pub(crate) cc: Vec<Mailbox>,
    pub(crate) bcc: Vec<Mailbox>,

    pub(crate) subject: String,
    pub(crate) date: Option<String>,
    pub(crate) user_agent: Option<String>,

    /// Uppercased field name to values
    pub(crate) extra: BTreeMap<String, Vec<String>>,
}

impl Header {
    /// Sender taken from the header, or `fallback` when unset or empty
    pub(crate) fn resolve_from<'a>(
        &'a self,
        fallback: Option<&'a Mailbox>,
    ) -> Result<&'a Mailbox, Error> {
        let from = self
            .from
            .as_ref()
            .filter(|mbox| !mbox.is_empty())
            .or(fallback.filter(|mbox| !mbox.is_empty()))
            .ok_or(Error::MissingFrom)?;

        if !from.is_valid() {
            return Err(Error::InvalidAddress(from.email.clone()));
        }
        Ok(from)
    }

    /// Envelope recipients: to, then cc, then bcc
    pub(crate) fn recipients(&self) -> Result<Vec<&Mailbox>, Error> {
        let recipients: Vec<&Mailbox> = self
            .to
            .iter()
            .chain(self.cc.iter())
            .chain(self.bcc.iter())
            .filter(|mbox| !mbox.is_empty())
            .collect();

        if recipients.is_empty() {
            return Err(Error::MissingRecipients);
        }
        if let Some(invalid) = recipients.iter().find(|mbox| !mbox.is_valid()) {
            return Err(Error::InvalidAddress(invalid.email.clone()));
        }
        Ok(recipients)
    }

    /// Checks everything the header block needs before a byte is written
    pub(crate) fn validate(&self, fallback_from: Option<&Mailbox>) -> Result<(), Error> {
        self.resolve_from(fallback_from)?;
        self.recipients()?;
        if self.subject.is_empty() {
            return Err(Error::MissingSubject);
        }
        Ok(())
    }

    /// Renders the complete header block, without the trailing empty line
    pub(crate) fn render(&self, from: &Mailbox, message_id: &str) -> String {
        let mut b = String::with_capacity(512);

        // Writing into a String cannot fail
        let _ = write!(b, "MESSAGE-ID: {}\r\n", encode_word(message_id));
        let _ = write!(b, "FROM: {from}\r\n");
        for to in self.to.iter().filter(|mbox| !mbox.is_empty()) {
            let _ = write!(b, "TO: {to}\r\n");
        }
        for cc in self.cc.iter().filter(|mbox| !mbox.is_empty()) {
            let _ = write!(b, "CC: {cc}\r\n");
        }
        let _ = write!(b, "SUBJECT: {}\r\n", encode_word(&self.subject));

        let date = match &self.date {
            Some(date) => encode_word(date).into_owned(),
            None => format_date(SystemTime::now()),
        };
        let _ = write!(b, "DATE: {date}\r\n");
        let _ = write!(b, "MIME-VERSION: {MIME_VERSION}\r\n");

        let user_agent = match &self.user_agent {
            Some(ua) => encode_word(ua).into_owned(),
            None => default_user_agent(),
        };
        let _ = write!(b, "USER-AGENT: {user_agent}\r\n");

        for (name, values) in &self.extra {
            if RESERVED.contains(&name.as_str()) {
                continue;
            }
            if !valid_field_name(name) {
                #[cfg(feature = "tracing")]
                tracing::debug!("skipping header with invalid name {:?}", name);
                continue;
            }
            for value in values {
                let _ = write!(b, "{}: {}\r\n", name, encode_word(value));
            }
        }

        b
    }
}
