//! Streaming multipart/mixed serializer

use std::io::Write;

use base64::{engine::general_purpose::STANDARD, write::EncoderWriter};
use rand::{rngs::OsRng, RngCore};

use super::{
    attachment::Copier,
    encoder::{CountingWriter, LineWrappingEncoder},
    header::MESSAGE_ID_DOMAIN,
    Error, Mailbox, Message,
};

const BOUNDARY_PREFIX: &str = "=_Missive_";
const BOUNDARY_RANDOM_BYTES: usize = 30;
const MESSAGE_ID_RANDOM_BYTES: usize = 32;

fn random_hex(len: usize) -> Result<String, Error> {
    let mut bytes = vec![0; len];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(hex::encode(bytes))
}

/// Fresh boundary token, at most 70 characters
pub(crate) fn boundary() -> Result<String, Error> {
    Ok(format!(
        "{}{}",
        BOUNDARY_PREFIX,
        random_hex(BOUNDARY_RANDOM_BYTES)?
    ))
}

/// Fresh `<id@domain>` message id
pub(crate) fn message_id() -> Result<String, Error> {
    Ok(format!(
        "<{}@{}>",
        random_hex(MESSAGE_ID_RANDOM_BYTES)?,
        MESSAGE_ID_DOMAIN
    ))
}

/// Base64 encodes the copier output into `out`, in lines of 76 characters
///
/// On failure, input still buffered in the encoder is dropped rather than
/// flushed into `out`.
fn write_body<W: Write>(copier: &Copier, out: &mut W) -> Result<(), Error> {
    let mut encoder = EncoderWriter::new(LineWrappingEncoder::new(&mut *out), &STANDARD);
    let written = copier.as_ref()(&mut encoder as &mut dyn Write)
        .and_then(|_| encoder.finish().map(|_| ()));
    if let Err(err) = written {
        // Detach the sink so dropping the encoder writes nothing more
        let _ = encoder.into_inner();
        return Err(err.into());
    }
    Ok(())
}

/// Writes `message` to `out` and returns the number of bytes written
///
/// `fallback_from` stands in for a missing or empty sender. Composition
/// errors are reported before the first byte reaches `out`.
pub(crate) fn write_message<W: Write>(
    message: &Message,
    fallback_from: Option<&Mailbox>,
    out: &mut W,
) -> Result<u64, Error> {
    message.header.validate(fallback_from)?;
    let from = message.header.resolve_from(fallback_from)?;

    let boundary = boundary()?;
    let message_id = message_id()?;

    let mut out = CountingWriter::new(out);

    let mut head = message.header.render(from, &message_id);
    head.push_str("Content-Type: multipart/mixed;\r\n boundary=\"");
    head.push_str(&boundary);
    head.push_str("\"\r\n\r\n");
    out.write_all(head.as_bytes())?;

    for part in &message.parts {
        write!(
            out,
            "--{}\r\nContent-Type: {}\r\nContent-Transfer-Encoding: base64\r\n\r\n",
            boundary,
            part.content_type()
        )?;
        write_body(&part.copier, &mut out)?;
    }

    for file in &message.files {
        write!(
            out,
            "--{}\r\nContent-Type: {}\r\nContent-Disposition: {}\r\n",
            boundary,
            file.content_type(),
            file.content_disposition()
        )?;
        if let Some(id) = file.content_id() {
            write!(out, "Content-ID: {id}\r\n")?;
        }
        out.write_all(b"Content-Transfer-Encoding: base64\r\n\r\n")?;
        write_body(&file.copier, &mut out)?;
    }

    write!(out, "--{boundary}--\r\n")?;
    out.flush()?;

    #[cfg(feature = "tracing")]
    tracing::debug!(
        "wrote message {} with {} part(s) and {} file(s), {} bytes",
        message_id,
        message.parts.len(),
        message.files.len(),
        out.count()
    );

    Ok(out.count())
}
