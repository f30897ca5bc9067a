//! Validation of submitted posts and comments.
//!
//! Validation never touches the store except to check that a referenced
//! group exists; persisting is the caller's job once a form is clean.

use std::collections::BTreeMap;

use image::GenericImageView as _;

use crate::models::Id;
use crate::repo::{GroupRepo, RepoError};

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str = "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";
pub const EMPTY_FILE: &str = "The submitted file is empty.";

/// Raster formats an attached image may be in (sniffed from content).
pub const ALLOWED_IMAGE_MIME: &[&str] = &["image/png", "image/jpeg", "image/gif", "image/webp", "image/bmp"];

/// Field name -> messages, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors(BTreeMap<&'static str, Vec<String>>);

impl FormErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has(&self, field: &str) -> bool {
        !self.get(field).is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error("invalid form")]
    Invalid(FormErrors),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// A file field as it arrived in a multipart body.
#[derive(Debug, Clone, Default)]
pub struct Upload {
    pub filename: Option<String>,
    pub bytes: Vec<u8>,
}

impl Upload {
    /// Browsers send an empty part for an untouched file input.
    pub fn is_blank(&self) -> bool {
        self.bytes.is_empty() && self.filename.as_deref().map_or(true, str::is_empty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidImage {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
    pub width: u32,
    pub height: u32,
}

/// Accepts `bytes` only when the content sniffs as a supported raster format
/// and fully decodes as that format.
pub fn validate_image(bytes: &[u8]) -> Result<ValidImage, &'static str> {
    if bytes.is_empty() {
        return Err(EMPTY_FILE);
    }
    let mime = infer::get(bytes)
        .map(|t| t.mime_type())
        .filter(|m| ALLOWED_IMAGE_MIME.contains(m))
        .ok_or(INVALID_IMAGE)?;
    let format = image::ImageFormat::from_mime_type(mime).ok_or(INVALID_IMAGE)?;
    let decoded = image::load_from_memory_with_format(bytes, format).map_err(|e| {
        tracing::debug!("rejected {mime} upload: {e}");
        INVALID_IMAGE
    })?;
    let (width, height) = decoded.dimensions();
    if width == 0 || height == 0 {
        return Err(INVALID_IMAGE);
    }
    Ok(ValidImage { bytes: bytes.to_vec(), mime, width, height })
}

/// Submitted post fields, kept verbatim for re-display.
#[derive(Debug, Clone, Default)]
pub struct PostForm {
    pub text: String,
    /// Raw group id; empty means no group.
    pub group: String,
    pub image: Option<Upload>,
}

#[derive(Debug, Clone)]
pub struct CleanPost {
    pub text: String,
    pub group_id: Option<Id>,
    pub image: Option<ValidImage>,
}

impl PostForm {
    pub async fn validate<G: GroupRepo + ?Sized>(&self, groups: &G) -> Result<CleanPost, FormError> {
        let mut errors = FormErrors::default();

        let text = self.text.trim();
        if text.is_empty() {
            errors.add("text", REQUIRED);
        }

        let group_id = match self.group.trim() {
            "" => None,
            raw => match raw.parse::<Id>() {
                Ok(id) => match groups.get_group(id).await {
                    Ok(g) => Some(g.id),
                    Err(RepoError::NotFound) => {
                        errors.add("group", INVALID_CHOICE);
                        None
                    }
                    Err(e) => return Err(e.into()),
                },
                Err(_) => {
                    errors.add("group", INVALID_CHOICE);
                    None
                }
            },
        };

        let image = match self.image.as_ref().filter(|u| !u.is_blank()) {
            Some(upload) => match validate_image(&upload.bytes) {
                Ok(img) => Some(img),
                Err(msg) => {
                    errors.add("image", msg);
                    None
                }
            },
            None => None,
        };

        if !errors.is_empty() {
            return Err(FormError::Invalid(errors));
        }
        Ok(CleanPost { text: text.to_string(), group_id, image })
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommentForm {
    pub text: String,
}

impl CommentForm {
    pub fn validate(&self) -> Result<String, FormErrors> {
        let text = self.text.trim();
        if text.is_empty() {
            let mut errors = FormErrors::default();
            errors.add("text", REQUIRED);
            return Err(errors);
        }
        Ok(text.to_string())
    }
}
