//! Transfer and header encoders used while streaming a message

use std::{
    borrow::Cow,
    io::{self, Write},
};

use base64::{engine::general_purpose::STANDARD, Engine};

/// Maximum length of an encoded body line, CRLF excluded
///
/// [RFC 2045, section 6.8](https://tools.ietf.org/html/rfc2045#section-6.8)
pub const MAX_LINE_LENGTH: usize = 76;

/// Charset declared for every text part and every encoded header word
pub(crate) const CHARSET: &str = "utf-8";

const WORD_PREFIX: &str = "=?utf-8?b?";
const WORD_SUFFIX: &str = "?=";
// 75 chars max per encoded word, 60 base64 chars fit after prefix and suffix
const WORD_MAX_BYTES: usize = 45;

/// Splits every write into lines of at most [`MAX_LINE_LENGTH`] bytes,
/// each followed by CRLF
///
/// The final partial chunk of a write is terminated too, so lines are
/// never merged across calls.
///
/// ```rust
/// use std::io::Write;
/// use missive::message::LineWrappingEncoder;
///
/// let mut out = Vec::new();
/// LineWrappingEncoder::new(&mut out).write_all(b"abc")?;
/// assert_eq!(out, b"abc\r\n");
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Debug)]
pub struct LineWrappingEncoder<W> {
    inner: W,
}

impl<W: Write> LineWrappingEncoder<W> {
    /// Wraps `inner`
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Returns the wrapped sink
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for LineWrappingEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for line in buf.chunks(MAX_LINE_LENGTH) {
            self.inner.write_all(line)?;
            self.inner.write_all(b"\r\n")?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Counts the bytes accepted by the wrapped sink
#[derive(Debug)]
pub(crate) struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W: Write> CountingWriter<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self { inner, count: 0 }
    }

    pub(crate) fn count(&self) -> u64 {
        self.count
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn needs_encoding(s: &str) -> bool {
    s.bytes().any(|b| (b < b' ' || b > b'~') && b != b'\t')
}

/// Encodes a header value as RFC 2047 `B` encoded words when it contains
/// anything besides printable ASCII
///
/// Words are cut on character boundaries and folded with CRLF SP, so
/// control characters (including CR and LF) never reach the header block
/// verbatim.
pub(crate) fn encode_word(value: &str) -> Cow<'_, str> {
    if !needs_encoding(value) {
        return Cow::Borrowed(value);
    }

    let mut out = String::with_capacity(value.len() * 2);
    let mut rest = value;
    while !rest.is_empty() {
        let mut end = rest.len().min(WORD_MAX_BYTES);
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        let (word, tail) = rest.split_at(end);

        if !out.is_empty() {
            out.push_str("\r\n ");
        }
        out.push_str(WORD_PREFIX);
        STANDARD.encode_string(word.as_bytes(), &mut out);
        out.push_str(WORD_SUFFIX);

        rest = tail;
    }
    Cow::Owned(out)
}

/// Renders `value` as a quoted-string, escaping `"` and `\`
pub(crate) fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Renders a header parameter value: quoted when printable ASCII,
/// otherwise as encoded words inside quotes
pub(crate) fn encode_parameter(value: &str) -> String {
    if needs_encoding(value) {
        format!("\"{}\"", encode_word(value))
    } else {
        quote(value)
    }
}
