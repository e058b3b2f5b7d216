use std::collections::HashMap;

use axum::extract::Multipart;

use crate::utils::errors::AppError;

/// An uploaded file captured from a multipart request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Text fields and files from a `multipart/form-data` body.
#[derive(Debug, Default)]
pub struct FormData {
    pub fields: HashMap<String, String>,
    pub files: HashMap<String, UploadedFile>,
}

impl FormData {
    pub fn require_field(&self, name: &str) -> Result<String, AppError> {
        self.fields
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::bad_request(anyhow::anyhow!("{} is required", name)))
    }

    pub fn field(&self, name: &str) -> Option<String> {
        self.fields.get(name).cloned()
    }
}

/// Drain a multipart body into text fields and files. Parts carrying a
/// filename become files; everything else is read as UTF-8 text. Empty
/// file parts (a form submitted with no file chosen) are dropped.
pub async fn parse_form(mut multipart: Multipart) -> Result<FormData, AppError> {
    let mut form = FormData::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(anyhow::anyhow!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name.is_empty() {
            continue;
        }

        if let Some(filename) = field.file_name().map(|f| f.to_string()) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::bad_request(anyhow::anyhow!("Failed to read file: {}", e)))?;
            if !bytes.is_empty() {
                form.files.insert(
                    name,
                    UploadedFile {
                        filename,
                        bytes: bytes.to_vec(),
                    },
                );
            }
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| AppError::bad_request(anyhow::anyhow!("Failed to read field: {}", e)))?;
            form.fields.insert(name, text);
        }
    }

    Ok(form)
}
