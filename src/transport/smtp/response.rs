//! SMTP response, containing a mandatory return code and an optional text
//! message

use std::{
    fmt::{Display, Formatter, Result},
    result,
    str::FromStr,
};

use nom::{
    bytes::streaming::{tag, take_until},
    character::streaming::anychar,
    combinator::{complete, map_opt},
    multi::many0,
    sequence::preceded,
    IResult, Parser,
};

use crate::transport::smtp::{error, Error};

/// The first digit indicates severity
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Severity {
    /// 2yx
    PositiveCompletion = 2,
    /// 3yz
    PositiveIntermediate = 3,
    /// 4yz
    TransientNegativeCompletion = 4,
    /// 5yz
    PermanentNegativeCompletion = 5,
}

impl Severity {
    fn from_digit(c: char) -> Option<Self> {
        Some(match c {
            '2' => Severity::PositiveCompletion,
            '3' => Severity::PositiveIntermediate,
            '4' => Severity::TransientNegativeCompletion,
            '5' => Severity::PermanentNegativeCompletion,
            _ => return None,
        })
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", *self as u8)
    }
}

/// Second digit
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Category {
    /// x0z
    Syntax = 0,
    /// x1z
    Information = 1,
    /// x2z
    Connections = 2,
    /// x3z
    Unspecified3 = 3,
    /// x4z
    Unspecified4 = 4,
    /// x5z
    MailSystem = 5,
}

impl Category {
    fn from_digit(c: char) -> Option<Self> {
        Some(match c {
            '0' => Category::Syntax,
            '1' => Category::Information,
            '2' => Category::Connections,
            '3' => Category::Unspecified3,
            '4' => Category::Unspecified4,
            '5' => Category::MailSystem,
            _ => return None,
        })
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", *self as u8)
    }
}

/// The detail digit of a response code (third digit)
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(missing_docs)]
pub enum Detail {
    Zero = 0,
    One = 1,
    Two = 2,
    Three = 3,
    Four = 4,
    Five = 5,
    Six = 6,
    Seven = 7,
    Eight = 8,
    Nine = 9,
}

impl Detail {
    fn from_digit(c: char) -> Option<Self> {
        const DETAILS: [Detail; 10] = [
            Detail::Zero,
            Detail::One,
            Detail::Two,
            Detail::Three,
            Detail::Four,
            Detail::Five,
            Detail::Six,
            Detail::Seven,
            Detail::Eight,
            Detail::Nine,
        ];
        c.to_digit(10).map(|d| DETAILS[d as usize])
    }
}

impl Display for Detail {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", *self as u8)
    }
}

/// Represents a 3 digit SMTP response code
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Code {
    /// First digit of the response code
    pub severity: Severity,
    /// Second digit of the response code
    pub category: Category,
    /// Third digit
    pub detail: Detail,
}

impl Display for Code {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}{}{}", self.severity, self.category, self.detail)
    }
}

impl Code {
    /// Creates a new `Code` structure
    pub fn new(severity: Severity, category: Category, detail: Detail) -> Code {
        Code {
            severity,
            category,
            detail,
        }
    }

    /// Tells if the response is positive
    pub fn is_positive(self) -> bool {
        matches!(
            self.severity,
            Severity::PositiveCompletion | Severity::PositiveIntermediate
        )
    }
}

impl From<Code> for u16 {
    fn from(code: Code) -> Self {
        code.detail as u16 + 10 * code.category as u16 + 100 * code.severity as u16
    }
}

/// Contains an SMTP reply, with separated code and message
///
/// The text message is optional, only the code is mandatory
#[derive(PartialEq, Eq, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Response {
    /// Response code
    code: Code,
    /// Server response string (optional)
    /// Handle multiline responses
    message: Vec<String>,
}

impl FromStr for Response {
    type Err = Error;

    fn from_str(s: &str) -> result::Result<Response, Error> {
        parse_response(s)
            .map(|(_, r)| r)
            .map_err(|e| error::response(e.to_string()))
    }
}

impl Response {
    /// Creates a new `Response`
    pub fn new(code: Code, message: Vec<String>) -> Response {
        Response { code, message }
    }

    /// Tells if the response is positive
    pub fn is_positive(&self) -> bool {
        self.code.is_positive()
    }

    /// Tests code equality
    pub fn has_code(&self, code: u16) -> bool {
        u16::from(self.code) == code
    }

    /// Returns only the first word of the message if possible
    pub fn first_word(&self) -> Option<&str> {
        self.message
            .first()
            .and_then(|line| line.split_whitespace().next())
    }

    /// Returns only the line of the message if possible
    pub fn first_line(&self) -> Option<&str> {
        self.message.first().map(String::as_str)
    }

    /// Response code
    pub fn code(&self) -> Code {
        self.code
    }

    /// Server response string (array of lines)
    pub fn message(&self) -> impl Iterator<Item = &str> {
        self.message.iter().map(String::as_str)
    }
}

// Parsers

fn parse_code(i: &str) -> IResult<&str, Code> {
    (
        map_opt(anychar, Severity::from_digit),
        map_opt(anychar, Category::from_digit),
        map_opt(anychar, Detail::from_digit),
    )
        .map(|(severity, category, detail)| Code::new(severity, category, detail))
        .parse(i)
}

/// Parses one complete reply, single or multi-line
///
/// Returns `Incomplete` while the final line (`NNN SP text CRLF`) has not
/// been received.
pub(crate) fn parse_response(i: &str) -> IResult<&str, Response> {
    let (i, lines) = many0((
        parse_code,
        preceded(tag("-"), take_until("\r\n")),
        tag("\r\n"),
    ))
    .parse(i)?;
    let (i, (last_code, last_line)) =
        (parse_code, preceded(tag(" "), take_until("\r\n"))).parse(i)?;
    let (i, _) = complete(tag("\r\n")).parse(i)?;

    // Every line of a reply carries the same code
    if lines.iter().any(|&(code, _, _)| code != last_code) {
        return Err(nom::Err::Failure(nom::error::Error::new(
            "",
            nom::error::ErrorKind::Not,
        )));
    }

    let mut message: Vec<String> = lines.into_iter().map(|(_, text, _)| text.into()).collect();
    message.push(last_line.into());

    Ok((
        i,
        Response {
            code: last_code,
            message,
        },
    ))
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    fn code(severity: Severity, category: Category, detail: Detail) -> Code {
        Code::new(severity, category, detail)
    }

    fn lines(l: &[&str]) -> Vec<String> {
        l.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn code_display_and_value() {
        let c = code(
            Severity::TransientNegativeCompletion,
            Category::Connections,
            Detail::One,
        );
        assert_eq!(c.to_string(), "421");
        assert_eq!(u16::from(c), 421);
        assert!(!c.is_positive());
        assert!(code(
            Severity::PositiveIntermediate,
            Category::Syntax,
            Detail::Four
        )
        .is_positive());
    }

    #[test]
    fn single_line() {
        assert_eq!(
            "220 smtp.example.org ESMTP ready\r\n"
                .parse::<Response>()
                .unwrap(),
            Response::new(
                code(
                    Severity::PositiveCompletion,
                    Category::Connections,
                    Detail::Zero
                ),
                lines(&["smtp.example.org ESMTP ready"]),
            )
        );
    }

    #[test]
    fn multi_line() {
        let raw = "250-me\r\n250-8BITMIME\r\n250-SIZE 42\r\n250 AUTH PLAIN CRAM-MD5\r\n";
        let response = raw.parse::<Response>().unwrap();
        assert!(response.has_code(250));
        assert_eq!(
            response.message().collect::<Vec<_>>(),
            vec!["me", "8BITMIME", "SIZE 42", "AUTH PLAIN CRAM-MD5"]
        );
        assert_eq!(response.first_word(), Some("me"));
        assert_eq!(response.first_line(), Some("me"));
    }

    #[test]
    fn malformed() {
        assert!("2506-me\r\n250 AUTH PLAIN\r\n".parse::<Response>().is_err());
        assert!("250-me\r\n250-AUTH PLAIN\r\n".parse::<Response>().is_err());
        assert!("250-me\r\n251 other\r\n".parse::<Response>().is_err());
        assert!("650 nope\r\n".parse::<Response>().is_err());
    }

    #[test]
    fn incomplete() {
        for raw in ["250-smtp.example.org\r\n", "25", "250 partial"] {
            match parse_response(raw) {
                Err(nom::Err::Incomplete(_)) => {}
                res => panic!("expected incomplete response for {raw:?}, got {res:?}"),
            }
        }
    }

    #[test]
    fn first_word_of_blank_lines() {
        let c = code(
            Severity::TransientNegativeCompletion,
            Category::MailSystem,
            Detail::One,
        );
        assert_eq!(Response::new(c, vec![]).first_word(), None);
        assert_eq!(Response::new(c, lines(&["  "])).first_word(), None);
        assert_eq!(Response::new(c, lines(&["  "])).first_line(), Some("  "));
        assert_eq!(Response::new(c, vec![]).first_line(), None);
    }
}
