//! `multipart/form-data` reading.
//!
//! Parts are read in arrival order into `(name, FieldValue)` pairs. A part
//! with a filename becomes a [`FieldValue::File`], every other part a
//! [`FieldValue::Text`].

use bytes::Bytes;
use http::HeaderMap;

use crate::{ExtractionError, FieldValue, UploadFile};

/// Limits applied while reading a multipart body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultipartConfig {
    /// Maximum total body size in bytes.
    pub max_body_size: usize,
    /// Maximum size of a single part in bytes.
    pub max_field_size: usize,
    /// Maximum number of parts.
    pub max_fields: usize,
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self {
            max_body_size: 50 * 1024 * 1024,
            max_field_size: 10 * 1024 * 1024,
            max_fields: 100,
        }
    }
}

impl MultipartConfig {
    /// Sets the body size limit.
    #[must_use]
    pub const fn max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Sets the per-part size limit.
    #[must_use]
    pub const fn max_field_size(mut self, size: usize) -> Self {
        self.max_field_size = size;
        self
    }

    /// Sets the part count limit.
    #[must_use]
    pub const fn max_fields(mut self, count: usize) -> Self {
        self.max_fields = count;
        self
    }
}

/// Reads every part of a multipart body.
pub(crate) async fn read_multipart(
    content_type: &str,
    body: Bytes,
    config: &MultipartConfig,
) -> Result<Vec<(String, FieldValue)>, ExtractionError> {
    let boundary = multer::parse_boundary(content_type)
        .map_err(|e| ExtractionError::InvalidBoundary(e.to_string()))?;

    if body.len() > config.max_body_size {
        return Err(ExtractionError::PayloadTooLarge {
            max: config.max_body_size,
            actual: body.len(),
        });
    }

    let stream = futures_util::stream::once(async move { Ok::<_, std::io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut fields = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ExtractionError::Malformed(e.to_string()))?
    {
        if fields.len() >= config.max_fields {
            return Err(ExtractionError::TooManyFields {
                max: config.max_fields,
            });
        }

        let Some(name) = field.name().map(str::to_string) else {
            return Err(ExtractionError::Malformed("part without a field name".into()));
        };
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(ToString::to_string);
        let headers: HeaderMap = field.headers().clone();

        let data = field
            .bytes()
            .await
            .map_err(|e| ExtractionError::Malformed(e.to_string()))?;
        if data.len() > config.max_field_size {
            return Err(ExtractionError::PayloadTooLarge {
                max: config.max_field_size,
                actual: data.len(),
            });
        }

        let value = match filename {
            Some(filename) => FieldValue::File(UploadFile {
                filename: Some(filename),
                content_type,
                headers,
                content: data,
            }),
            None => {
                let text = String::from_utf8(data.to_vec())
                    .map_err(|_| ExtractionError::InvalidUtf8 { field: name.clone() })?;
                FieldValue::Text(text)
            }
        };
        fields.push((name, value));
    }

    tracing::trace!(fields = fields.len(), "read multipart body");
    Ok(fields)
}
