use std::{
    fmt::{self, Debug},
    fs,
    io::{self, Write},
    path::Path,
    sync::Arc,
};

use mime::Mime;

use super::encoder::{encode_parameter, encode_word, CHARSET};

/// Streams a body into the sink it is handed and returns the number of
/// bytes written
///
/// A copier runs once per serialization, so a message written twice calls
/// it twice.
pub type Copier = Arc<dyn Fn(&mut dyn Write) -> io::Result<usize> + Send + Sync>;

pub(crate) fn text_copier(text: String) -> Copier {
    Arc::new(move |w: &mut dyn Write| {
        w.write_all(text.as_bytes())?;
        Ok(text.len())
    })
}

pub(crate) fn path_copier(path: &Path) -> Copier {
    let path = path.to_path_buf();
    Arc::new(move |w: &mut dyn Write| {
        let mut file = fs::File::open(&path)?;
        let copied = io::copy(&mut file, w)?;
        Ok(usize::try_from(copied).unwrap_or(usize::MAX))
    })
}

/// A body alternative
#[derive(Clone)]
pub(crate) struct Part {
    content_type: String,
    pub(crate) copier: Copier,
}

impl Part {
    pub(crate) fn new(content_type: String, copier: Copier) -> Self {
        Self {
            content_type,
            copier,
        }
    }

    pub(crate) fn plain(text: String) -> Self {
        Self::new(mime::TEXT_PLAIN.as_ref().to_owned(), text_copier(text))
    }

    pub(crate) fn html(html: String) -> Self {
        Self::new(mime::TEXT_HTML.as_ref().to_owned(), text_copier(html))
    }

    /// Value of the part's `Content-Type` header
    pub(crate) fn content_type(&self) -> String {
        format!("{}; charset={}", self.content_type, CHARSET)
    }
}

impl Debug for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Part")
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    Attachment,
    Inline,
}

/// An attached or embedded file
#[derive(Clone)]
pub(crate) struct File {
    /// Identifies the file, used as `Content-ID` when embedded
    filename: String,
    /// Name proposed to the reader, if different from `filename`
    saved_name: Option<String>,
    disposition: Disposition,
    pub(crate) copier: Copier,
}

impl File {
    pub(crate) fn new(
        filename: String,
        saved_name: Option<String>,
        disposition: Disposition,
        copier: Copier,
    ) -> Self {
        Self {
            filename,
            saved_name,
            disposition,
            copier,
        }
    }

    fn display_name(&self) -> &str {
        self.saved_name.as_deref().unwrap_or(&self.filename)
    }

    pub(crate) fn mime_type(&self) -> Mime {
        mime_guess::from_path(&self.filename).first_or_octet_stream()
    }

    /// Value of the file's `Content-Type` header
    pub(crate) fn content_type(&self) -> String {
        format!(
            "{}; name={}",
            self.mime_type().essence_str(),
            encode_parameter(self.display_name())
        )
    }

    /// Value of the file's `Content-Disposition` header
    pub(crate) fn content_disposition(&self) -> String {
        let disposition = match self.disposition {
            Disposition::Attachment => "attachment",
            Disposition::Inline => "inline",
        };
        format!(
            "{}; filename={}",
            disposition,
            encode_parameter(self.display_name())
        )
    }

    /// Value of the file's `Content-ID` header, embedded files only
    pub(crate) fn content_id(&self) -> Option<String> {
        match self.disposition {
            Disposition::Attachment => None,
            Disposition::Inline => Some(format!("<{}>", encode_word(&self.filename))),
        }
    }
}

impl Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("File")
            .field("filename", &self.filename)
            .field("saved_name", &self.saved_name)
            .field("disposition", &self.disposition)
            .finish_non_exhaustive()
    }
}
