use std::{
    error::Error as StdError,
    fmt::{self, Display, Formatter},
    io,
};

/// Error type for message composition and serialization
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// No sender address, or an empty one
    MissingFrom,
    /// None of `To`, `Cc` or `Bcc` holds an address
    MissingRecipients,
    /// Empty or missing subject
    MissingSubject,
    /// Address unusable in a header or an SMTP command
    InvalidAddress(String),
    /// The system random source failed
    Random(rand::Error),
    /// Writing to the output failed, or a body copier failed
    Io(io::Error),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::MissingFrom => f.write_str("missing sender address"),
            Error::MissingRecipients => f.write_str("missing recipient address"),
            Error::MissingSubject => f.write_str("missing subject"),
            Error::InvalidAddress(address) => write!(f, "invalid address: {address:?}"),
            Error::Random(e) => write!(f, "could not generate random token: {e}"),
            Error::Io(e) => e.fmt(f),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Random(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<rand::Error> for Error {
    fn from(err: rand::Error) -> Error {
        Error::Random(err)
    }
}
