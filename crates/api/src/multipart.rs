//! Buffered multipart form intake.
//!
//! Every endpoint takes a handful of files and a few text options, so the
//! whole form is read up front and then queried by field name.

use std::collections::HashMap;
use std::str::FromStr;

use axum::extract::Multipart;

use crate::error::{AppError, AppResult};

/// A file part of the form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// A fully read multipart form.
#[derive(Debug, Default)]
pub struct MultipartForm {
    files: HashMap<String, Vec<UploadedFile>>,
    fields: HashMap<String, String>,
}

impl MultipartForm {
    /// Read every part. Parts carrying a filename are files, the rest text.
    pub async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let filename = field.file_name().map(str::to_string);
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;

            match filename {
                Some(filename) => form.files.entry(name).or_default().push(UploadedFile {
                    filename: basename(&filename).to_string(),
                    bytes: data.to_vec(),
                }),
                None => {
                    let text = String::from_utf8(data.to_vec()).map_err(|_| {
                        AppError::BadRequest(format!("Field '{name}' is not valid UTF-8"))
                    })?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }

    /// Insert a text field.
    pub fn with_field(mut self, name: &str, value: &str) -> Self {
        self.fields.insert(name.to_string(), value.to_string());
        self
    }

    /// Insert a file part.
    pub fn with_file(mut self, name: &str, filename: &str, bytes: Vec<u8>) -> Self {
        self.files.entry(name.to_string()).or_default().push(UploadedFile {
            filename: filename.to_string(),
            bytes,
        });
        self
    }

    /// Remove and return the first file sent under `name`.
    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        let files = self.files.get_mut(name)?;
        if files.is_empty() {
            return None;
        }
        Some(files.remove(0))
    }

    /// Remove and return every file sent under `name`.
    pub fn take_files(&mut self, name: &str) -> Vec<UploadedFile> {
        self.files.remove(name).unwrap_or_default()
    }

    /// Like [`take_file`](Self::take_file), but a missing file is a 400.
    pub fn require_file(&mut self, name: &str) -> AppResult<UploadedFile> {
        self.take_file(name)
            .ok_or_else(|| AppError::BadRequest(format!("Missing file field '{name}'")))
    }

    /// Trimmed text of `name`; empty counts as absent.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Boolean option accepting `true/false`, `1/0`, `yes/no`, `on/off`.
    pub fn flag(&self, name: &str, default: bool) -> AppResult<bool> {
        match self.text(name) {
            None => Ok(default),
            Some(value) => parse_flag(value).ok_or_else(|| {
                AppError::BadRequest(format!("Field '{name}' must be a boolean, got '{value}'"))
            }),
        }
    }

    /// Parsed option with a default.
    pub fn parse<T: FromStr>(&self, name: &str, default: T) -> AppResult<T> {
        match self.text(name) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|_| {
                AppError::BadRequest(format!("Invalid value for '{name}': '{value}'"))
            }),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Browsers may send a relative path as the filename; keep the last segment.
fn basename(filename: &str) -> &str {
    filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn flags_accept_common_spellings() {
        let form = MultipartForm::default()
            .with_field("a", "TRUE")
            .with_field("b", "0")
            .with_field("c", " ")
            .with_field("d", "maybe");

        assert!(form.flag("a", false).unwrap());
        assert!(!form.flag("b", true).unwrap());
        assert!(form.flag("c", true).unwrap());
        assert!(form.flag("missing", true).unwrap());
        assert_matches!(form.flag("d", true), Err(AppError::BadRequest(_)));
    }

    #[test]
    fn parse_uses_default_and_reports_garbage() {
        let form = MultipartForm::default()
            .with_field("ratio", "0.7")
            .with_field("px", "tall");

        assert_eq!(form.parse("ratio", 0.65f32).unwrap(), 0.7);
        assert_eq!(form.parse("absent", 40u32).unwrap(), 40);
        assert_matches!(form.parse("px", 40u32), Err(AppError::BadRequest(_)));
    }

    #[test]
    fn files_are_taken_in_order() {
        let mut form = MultipartForm::default()
            .with_file("files", "a.png", vec![1])
            .with_file("files", "b.png", vec![2]);

        assert_eq!(form.take_file("files").unwrap().filename, "a.png");
        assert_eq!(form.take_files("files").len(), 1);
        assert!(form.take_file("files").is_none());
        assert_matches!(form.require_file("files"), Err(AppError::BadRequest(_)));
    }

    #[test]
    fn basename_strips_client_paths() {
        assert_eq!(basename("shoot/look_1.png"), "look_1.png");
        assert_eq!(basename("C:\\fakepath\\masks.zip"), "masks.zip");
        assert_eq!(basename("plain.zip"), "plain.zip");
    }
}
