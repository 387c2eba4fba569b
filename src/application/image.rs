use crate::domain::{IdentifierError, Ndn, SubmissionRecord};
use crate::infrastructure::database::{StoreError, SubmissionStore};
use base64::Engine;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    #[error("Image must be a base64 data URL (data:image/<type>;base64,...)")]
    NotDataUrl,

    #[error("Invalid base64 image payload: {0}")]
    InvalidBase64(String),

    #[error("Image is {0} bytes, larger than the 5 MiB limit")]
    TooLarge(usize),

    #[error("Rendered image already stored for {0}")]
    AlreadySet(String),

    #[error(transparent)]
    Store(StoreError),
}

impl ImageError {
    pub fn kind(&self) -> &'static str {
        match self {
            ImageError::Identifier(_)
            | ImageError::NotDataUrl
            | ImageError::InvalidBase64(_)
            | ImageError::TooLarge(_) => "validation",
            ImageError::AlreadySet(_) => "conflict",
            ImageError::Store(e) => e.kind(),
        }
    }
}

/// Checks that `image` is a `data:image/...;base64,` URL with a decodable,
/// bounded payload.
pub fn validate_data_url(image: &str) -> Result<(), ImageError> {
    let rest = image.strip_prefix("data:image/").ok_or(ImageError::NotDataUrl)?;
    let (media, payload) = rest.split_once(',').ok_or(ImageError::NotDataUrl)?;

    let subtype = media
        .strip_suffix(";base64")
        .ok_or(ImageError::NotDataUrl)?;
    let valid_subtype = !subtype.is_empty()
        && subtype
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !valid_subtype {
        return Err(ImageError::NotDataUrl);
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| ImageError::InvalidBase64(e.to_string()))?;

    if bytes.is_empty() {
        return Err(ImageError::InvalidBase64("empty payload".to_string()));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ImageError::TooLarge(bytes.len()));
    }

    Ok(())
}

/// Stores the rendered certificate snapshot for a record, once.
pub struct AttachImageUseCase {
    store: Arc<dyn SubmissionStore>,
}

impl AttachImageUseCase {
    pub fn new(store: Arc<dyn SubmissionStore>) -> Self {
        Self { store }
    }

    pub async fn execute(
        &self,
        identifier: &str,
        image: &str,
    ) -> Result<SubmissionRecord, ImageError> {
        let ndn = Ndn::parse(identifier)?;
        validate_data_url(image).map_err(|e| {
            warn!("Rejected rendered image for {}: {}", ndn, e);
            e
        })?;

        match self.store.update_rendered_image(ndn.as_str(), image).await {
            Ok(record) => {
                info!("Rendered image stored for {}", ndn);
                Ok(record)
            }
            Err(StoreError::Conflict(_)) => Err(ImageError::AlreadySet(ndn.into_inner())),
            Err(e) => {
                error!("Failed to store rendered image for {}: {}", ndn, e);
                Err(ImageError::Store(e))
            }
        }
    }
}
