//! Shared response types for API handlers.

use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

pub const ZIP_CONTENT_TYPE: &str = "application/zip";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// A file download with a `Content-Disposition: attachment` header.
#[derive(Debug)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn zip(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: ZIP_CONTENT_TYPE.to_string(),
            bytes,
        }
    }

    pub fn binary(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: OCTET_STREAM.to_string(),
            bytes,
        }
    }
}

/// Header values must stay printable ASCII without quotes.
fn disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if !c.is_ascii() || c.is_ascii_control() => '_',
            c => c,
        })
        .collect();
    format!("attachment; filename=\"{safe}\"")
}

impl IntoResponse for Attachment {
    fn into_response(self) -> Response {
        (
            [
                (CONTENT_TYPE, self.content_type),
                (CONTENT_DISPOSITION, disposition(&self.filename)),
            ],
            self.bytes,
        )
            .into_response()
    }
}
