//! Multipart form parsing helpers
//!
//! Collects named file fields and text fields from a multipart/form-data
//! upload, validating each file as it is read.

use std::collections::HashMap;

use axum::extract::Multipart;

use crate::error::ApiError;
use crate::validation::{validate_content_type, validate_file_size};

/// Parsed multipart form fields
#[derive(Debug, Default)]
pub struct MultipartFields {
    /// File bytes indexed by field name. Content type and size are checked
    /// while parsing.
    files: HashMap<String, Vec<u8>>,
    /// Text fields indexed by name
    text_fields: HashMap<String, String>,
}

impl MultipartFields {
    /// Parse all fields from a multipart request
    ///
    /// A field is read as a file when its name is listed in `file_fields`
    /// or when the client attached a filename; everything else is text.
    ///
    /// # Arguments
    /// * `multipart` - The Axum multipart extractor
    /// * `file_fields` - Names always read as files
    /// * `max_file_size` - Maximum allowed file size in bytes
    ///
    /// # Example
    /// ```ignore
    /// let fields = MultipartFields::parse(
    ///     &mut multipart,
    ///     &["profilePhoto"],
    ///     config.max_file_size(),
    /// ).await?;
    /// ```
    pub async fn parse(
        multipart: &mut Multipart,
        file_fields: &[&str],
        max_file_size: usize,
    ) -> Result<Self, ApiError> {
        let mut fields = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to parse multipart: {}", e)))?
        {
            let name = field.name().unwrap_or("").to_string();

            if file_fields.contains(&name.as_str()) || field.file_name().is_some() {
                validate_content_type(field.content_type())?;

                let data = field
                    .bytes()
                    .await
                    .map_err(|e| {
                        ApiError::bad_request(format!("Failed to read file '{}': {}", name, e))
                    })?
                    .to_vec();

                validate_file_size(data.len(), max_file_size)?;

                fields.files.insert(name, data);
            } else {
                let value = field.text().await.map_err(|e| {
                    ApiError::bad_request(format!("Failed to read field '{}': {}", name, e))
                })?;
                fields.text_fields.insert(name, value);
            }
        }

        Ok(fields)
    }

    /// Take a file field out of the form.
    pub fn take_file(&mut self, name: &str) -> Option<Vec<u8>> {
        self.files.remove(name)
    }

    /// Take a text field out of the form.
    pub fn take_text(&mut self, name: &str) -> Option<String> {
        self.text_fields.remove(name)
    }
}
