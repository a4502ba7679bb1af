//! Uploaded file descriptors.

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::HeaderMap;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::ExtractionError;

/// A file received in a multipart form.
///
/// Content is held in memory. Descriptors coming out of
/// [`decode_form`](crate::decode_form) are normalized: the content type is
/// filled in from the part headers and the filename is reduced to its last
/// path component.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    /// Client-supplied filename.
    pub filename: Option<String>,
    /// Declared content type.
    pub content_type: Option<String>,
    /// Headers of the multipart part.
    pub headers: HeaderMap,
    /// File content.
    pub content: Bytes,
}

impl UploadFile {
    /// A file with a name and content and no headers.
    pub fn new(filename: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            filename: Some(filename.into()),
            content_type: None,
            headers: HeaderMap::new(),
            content: content.into(),
        }
    }

    /// Sets the content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Sets the part headers.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// The canonical form of this descriptor.
    #[must_use]
    pub fn normalize(mut self) -> Self {
        if self.content_type.is_none() {
            self.content_type = self
                .headers
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
        }
        if let Some(name) = &self.filename {
            let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
            if base.len() != name.len() {
                self.filename = Some(base.to_string());
            }
        }
        self
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// True for an empty upload.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Lowercased extension of the filename, without the dot.
    pub fn extension(&self) -> Option<String> {
        let name = self.filename.as_deref()?;
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_lowercase())
    }

    /// The content as UTF-8 text.
    pub fn text(&self) -> Result<&str, ExtractionError> {
        std::str::from_utf8(&self.content).map_err(|_| ExtractionError::InvalidUtf8 {
            field: self.filename.clone().unwrap_or_default(),
        })
    }

    /// Checks the content type against a list of allowed types.
    ///
    /// Entries ending in `/*` match a whole family (`image/*`).
    pub fn validate_content_type(&self, allowed: &[&str]) -> Result<(), ExtractionError> {
        let Some(declared) = self.content_type.as_deref() else {
            return Err(ExtractionError::validation("content_type", "no content type"));
        };
        let essence = declared
            .split(';')
            .next()
            .unwrap_or(declared)
            .trim()
            .to_ascii_lowercase();

        let accepted = allowed.iter().any(|pattern| {
            let pattern = pattern.to_ascii_lowercase();
            match pattern.strip_suffix("/*") {
                Some(family) => essence
                    .split_once('/')
                    .is_some_and(|(kind, _)| kind == family),
                None => essence == pattern,
            }
        });

        if accepted {
            Ok(())
        } else {
            Err(ExtractionError::validation(
                "content_type",
                format!("`{declared}` is not one of {}", allowed.join(", ")),
            ))
        }
    }

    /// Checks the size against a limit in bytes.
    pub fn validate_size(&self, max: usize) -> Result<(), ExtractionError> {
        if self.len() > max {
            return Err(ExtractionError::PayloadTooLarge {
                max,
                actual: self.len(),
            });
        }
        Ok(())
    }
}

impl Serialize for UploadFile {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("UploadFile", 3)?;
        state.serialize_field("filename", &self.filename)?;
        state.serialize_field("content_type", &self.content_type)?;
        state.serialize_field("size", &self.len())?;
        state.end()
    }
}
