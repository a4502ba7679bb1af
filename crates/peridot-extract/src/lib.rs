//! # Peridot Extract
//!
//! Form bodies for Peridot handlers.
//!
//! [`FormData`] reads `multipart/form-data` and
//! `application/x-www-form-urlencoded` bodies into ordered raw fields, and
//! [`decode_form`] turns those into typed [`FormValue`]s shaped for the
//! handler parameter they bind to.
//!
//! ```rust
//! use peridot_extract::{decode_form, FieldValue, TargetField, UploadFile};
//!
//! let decoded = decode_form(
//!     vec![("cv".to_string(), FieldValue::File(UploadFile::new("cv.pdf", "%PDF")))],
//!     TargetField::file(),
//! );
//! let upload = decoded.into_value().unwrap();
//! assert_eq!(upload.as_file().unwrap().filename.as_deref(), Some("cv.pdf"));
//! ```

#![doc(html_root_url = "https://docs.rs/peridot-extract/0.1.0")]

mod error;
mod form;
mod multipart;
mod upload;

pub use error::ExtractionError;
pub use form::{
    decode_form, DecodedForm, EncodingType, FieldShape, FieldValue, FormData, FormMap, FormValue,
    TargetField,
};
pub use multipart::MultipartConfig;
pub use upload::UploadFile;
