//! Form decoding.
//!
//! A form arrives as an ordered list of `(key, value)` pairs where a key
//! may repeat. [`decode_form`] folds it into a [`FormMap`]:
//!
//! - text values that parse as JSON keep the parsed value, anything else
//!   stays a string
//! - file values are normalized [`UploadFile`]s
//! - a repeated key accumulates a [`FormValue::List`] in arrival order
//!
//! The [`TargetField`] the form is bound to then picks the final shape:
//! a list target wraps every value in a list, a single target that accepts
//! files gets the first value directly, anything else gets the map.
//!
//! ```rust
//! use peridot_extract::{decode_form, FieldValue, FormValue, TargetField};
//! use serde_json::json;
//!
//! let decoded = decode_form(
//!     vec![
//!         ("tags".to_string(), FieldValue::Text("a".into())),
//!         ("tags".to_string(), FieldValue::Text("b".into())),
//!         ("age".to_string(), FieldValue::Text("42".into())),
//!     ],
//!     TargetField::single(),
//! );
//!
//! let fields = decoded.into_fields().unwrap();
//! assert_eq!(fields["age"], FormValue::Scalar(json!(42)));
//! assert_eq!(fields["tags"].to_json(), json!(["a", "b"]));
//! ```

use std::mem;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::HeaderMap;
use indexmap::map::Entry;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::multipart::{read_multipart, MultipartConfig};
use crate::{ExtractionError, UploadFile};

/// Decoded fields in first-arrival order.
pub type FormMap = IndexMap<String, FormValue>;

/// A raw field value as read from the body.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// A text field.
    Text(String),
    /// An uploaded file.
    File(UploadFile),
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FormValue {
    /// A JSON value, or the original string when it was not JSON.
    Scalar(Value),
    /// An uploaded file.
    File(UploadFile),
    /// Every value of a repeated key, in arrival order.
    List(Vec<FormValue>),
}

impl FormValue {
    /// The scalar value, if this is one.
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Self::Scalar(value) => Some(value),
            _ => None,
        }
    }

    /// The string value, if this is a string scalar.
    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(Value::as_str)
    }

    /// The file, if this is one.
    pub fn as_file(&self) -> Option<&UploadFile> {
        match self {
            Self::File(file) => Some(file),
            _ => None,
        }
    }

    /// The items, if this is a list.
    pub fn as_list(&self) -> Option<&[FormValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// This value as a list. Non-list values become a one-element list.
    #[must_use]
    pub fn into_list(self) -> Self {
        match self {
            Self::List(_) => self,
            other => Self::List(vec![other]),
        }
    }

    /// A JSON rendering. Files render as their descriptor.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Scalar(value) => value.clone(),
            Self::File(file) => serde_json::to_value(file).unwrap_or(Value::Null),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
        }
    }
}

/// Whether the bound field holds one value or a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldShape {
    /// One value.
    #[default]
    Single,
    /// A sequence of values.
    List,
}

/// Describes the handler parameter a form is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TargetField {
    /// Declared shape.
    pub shape: FieldShape,
    /// Whether the field accepts uploaded files.
    pub accepts_files: bool,
}

impl TargetField {
    /// A single-valued field without files.
    pub const fn single() -> Self {
        Self {
            shape: FieldShape::Single,
            accepts_files: false,
        }
    }

    /// A list-valued field.
    pub const fn list() -> Self {
        Self {
            shape: FieldShape::List,
            accepts_files: false,
        }
    }

    /// A single-valued field that takes an upload.
    pub const fn file() -> Self {
        Self {
            shape: FieldShape::Single,
            accepts_files: true,
        }
    }

    /// Sets whether files are accepted.
    #[must_use]
    pub const fn accepting_files(mut self, accepts_files: bool) -> Self {
        self.accepts_files = accepts_files;
        self
    }
}

/// Result of [`decode_form`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DecodedForm {
    /// The full field map.
    Fields(FormMap),
    /// A single value picked out of the map.
    Value(FormValue),
}

impl DecodedForm {
    /// The field map, if the result is one.
    pub fn fields(&self) -> Option<&FormMap> {
        match self {
            Self::Fields(fields) => Some(fields),
            Self::Value(_) => None,
        }
    }

    /// Takes the field map, if the result is one.
    pub fn into_fields(self) -> Option<FormMap> {
        match self {
            Self::Fields(fields) => Some(fields),
            Self::Value(_) => None,
        }
    }

    /// Takes the single value, if the result is one.
    pub fn into_value(self) -> Option<FormValue> {
        match self {
            Self::Value(value) => Some(value),
            Self::Fields(_) => None,
        }
    }
}

/// Decodes form fields for a target field.
///
/// Never fails: a text value that is not JSON is kept as a string.
pub fn decode_form<I>(fields: I, target: TargetField) -> DecodedForm
where
    I: IntoIterator<Item = (String, FieldValue)>,
{
    let mut values = FormMap::new();

    for (key, raw) in fields {
        let value = match raw {
            FieldValue::Text(text) => FormValue::Scalar(parse_scalar(text)),
            FieldValue::File(file) => FormValue::File(file.normalize()),
        };

        match values.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(mut slot) => {
                let existing = slot.get_mut();
                let mut items = match mem::replace(existing, FormValue::List(Vec::new())) {
                    FormValue::List(items) => items,
                    // A JSON array seen earlier under this key is extended.
                    FormValue::Scalar(Value::Array(array)) => {
                        array.into_iter().map(FormValue::Scalar).collect()
                    }
                    first => vec![first],
                };
                items.push(value);
                *existing = FormValue::List(items);
            }
        }
    }

    resolve_shape(values, target)
}

fn parse_scalar(text: String) -> Value {
    match serde_json::from_str::<Value>(&text) {
        Ok(value) => value,
        Err(_) => Value::String(text),
    }
}

fn resolve_shape(values: FormMap, target: TargetField) -> DecodedForm {
    match target.shape {
        FieldShape::List => DecodedForm::Fields(
            values
                .into_iter()
                .map(|(key, value)| (key, value.into_list()))
                .collect(),
        ),
        FieldShape::Single if target.accepts_files && !values.is_empty() => {
            match values.into_iter().next() {
                Some((_, first)) => DecodedForm::Value(first),
                None => DecodedForm::Fields(FormMap::new()),
            }
        }
        FieldShape::Single => DecodedForm::Fields(values),
    }
}

/// Form body encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingType {
    /// `application/x-www-form-urlencoded`
    UrlEncoded,
    /// `multipart/form-data`
    MultiPart,
}

impl EncodingType {
    /// Detects the encoding from a `Content-Type` value.
    pub fn from_content_type(content_type: &str) -> Result<Self, ExtractionError> {
        let mime: mime::Mime =
            content_type
                .parse()
                .map_err(|_| ExtractionError::UnsupportedMediaType {
                    actual: content_type.to_string(),
                })?;

        if mime.type_() == mime::MULTIPART && mime.subtype() == mime::FORM_DATA {
            Ok(Self::MultiPart)
        } else if mime.type_() == mime::APPLICATION && mime.subtype() == mime::WWW_FORM_URLENCODED
        {
            Ok(Self::UrlEncoded)
        } else {
            Err(ExtractionError::UnsupportedMediaType {
                actual: content_type.to_string(),
            })
        }
    }

    /// The media type this encoding is sent as.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UrlEncoded => "application/x-www-form-urlencoded",
            Self::MultiPart => "multipart/form-data",
        }
    }
}

/// The raw fields of a request body, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct FormData {
    /// How the body was encoded.
    pub encoding: EncodingType,
    /// Raw fields; keys may repeat.
    pub fields: Vec<(String, FieldValue)>,
}

impl FormData {
    /// Reads the form in a request with default multipart limits.
    pub async fn from_request(request: &peridot_core::Request) -> Result<Self, ExtractionError> {
        Self::from_parts(
            request.headers(),
            request.body().clone(),
            &MultipartConfig::default(),
        )
        .await
    }

    /// Reads a form from headers and a buffered body.
    pub async fn from_parts(
        headers: &HeaderMap,
        body: Bytes,
        config: &MultipartConfig,
    ) -> Result<Self, ExtractionError> {
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .ok_or(ExtractionError::MissingContentType {
                expected: "multipart/form-data or application/x-www-form-urlencoded",
            })?;

        let encoding = EncodingType::from_content_type(content_type)?;
        let fields = match encoding {
            EncodingType::MultiPart => read_multipart(content_type, body, config).await?,
            EncodingType::UrlEncoded => read_urlencoded(&body)?,
        };

        Ok(Self { encoding, fields })
    }

    /// Decodes the fields for a target field.
    pub fn decode(self, target: TargetField) -> DecodedForm {
        decode_form(self.fields, target)
    }
}

fn read_urlencoded(body: &[u8]) -> Result<Vec<(String, FieldValue)>, ExtractionError> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body)
        .map_err(|e| ExtractionError::Malformed(e.to_string()))?;
    Ok(pairs
        .into_iter()
        .map(|(key, value)| (key, FieldValue::Text(value)))
        .collect())
}
