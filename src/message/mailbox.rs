use std::fmt::{Display, Formatter, Result as FmtResult};

use super::encoder::{encode_word, quote};

/// An email address with an optional display name
///
/// The address itself is kept as given; RFC 5322 mailbox syntax is not
/// checked beyond rejecting characters that would break a header line or
/// an SMTP command.
///
/// ```
/// use missive::message::Mailbox;
///
/// let dan = Mailbox::new(Some("Dan".to_owned()), "dan@example.com");
/// assert_eq!(dan.to_string(), "\"Dan\" <dan@example.com>");
///
/// let bare: Mailbox = "bob@example.com".into();
/// assert_eq!(bare.to_string(), "<bob@example.com>");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mailbox {
    /// The name associated with the address.
    pub name: Option<String>,

    /// The email address itself.
    pub email: String,
}

impl Mailbox {
    /// Creates a new `Mailbox` using an email address and the name of the recipient if there is one.
    pub fn new<E: Into<String>>(name: Option<String>, email: E) -> Self {
        Mailbox {
            name,
            email: email.into(),
        }
    }

    /// Creates a `Mailbox` with an empty display name
    pub fn address<E: Into<String>>(email: E) -> Self {
        Self::new(None, email)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.email.is_empty()
    }

    /// Whether the address can be placed in a header or an SMTP command
    pub(crate) fn is_valid(&self) -> bool {
        !self
            .email
            .chars()
            .any(|c| c.is_control() || c == '<' || c == '>')
    }
}

impl Display for Mailbox {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if let Some(name) = &self.name {
            let name = name.trim();
            if !name.is_empty() {
                let rendered = encode_word(name);
                if rendered == name {
                    f.write_str(&quote(name))?;
                } else {
                    f.write_str(&rendered)?;
                }
                f.write_str(" ")?;
            }
        }
        write!(f, "<{}>", self.email)
    }
}

impl From<&str> for Mailbox {
    fn from(email: &str) -> Self {
        Mailbox::address(email)
    }
}

impl From<String> for Mailbox {
    fn from(email: String) -> Self {
        Mailbox::address(email)
    }
}
