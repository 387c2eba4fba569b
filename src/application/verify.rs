use crate::application::display::DisplayState;
use crate::domain::{Certificate, Ndn};
use crate::infrastructure::database::SubmissionStore;
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Unknown render preference: {0} (expected \"stored\" or \"reconstruct\")")]
pub struct RenderPreferenceError(String);

/// Whether a stored certificate snapshot is shown in place of the rebuilt
/// view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RenderPreference {
    #[default]
    PreferStoredImage,
    AlwaysReconstruct,
}

impl FromStr for RenderPreference {
    type Err = RenderPreferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stored" => Ok(RenderPreference::PreferStoredImage),
            "reconstruct" => Ok(RenderPreference::AlwaysReconstruct),
            other => Err(RenderPreferenceError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum VerificationView {
    StoredImage { identifier: String, image: String },
    Reconstructed { certificate: Certificate },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyFailure {
    MissingIdentifier,
    MalformedIdentifier,
    NotFound,
    Unavailable,
}

pub type VerificationState = DisplayState<VerificationView, VerifyFailure>;

/// Resolves a public identifier to a read-only certificate view.
pub struct VerifyUseCase {
    store: Arc<dyn SubmissionStore>,
    public_base_url: String,
    preference: RenderPreference,
}

impl VerifyUseCase {
    pub fn new(store: Arc<dyn SubmissionStore>, public_base_url: &str) -> Self {
        Self {
            store,
            public_base_url: public_base_url.to_string(),
            preference: RenderPreference::default(),
        }
    }

    pub fn with_preference(mut self, preference: RenderPreference) -> Self {
        self.preference = preference;
        self
    }

    pub async fn execute(&self, identifier: Option<&str>) -> VerificationState {
        let mut state = VerificationState::Loading;
        let outcome = self.resolve(identifier).await;

        if let Err(e) = state.settle(outcome) {
            error!("Verification state rejected its outcome: {}", e);
        }
        state
    }

    async fn resolve(&self, identifier: Option<&str>) -> Result<VerificationView, VerifyFailure> {
        let raw = identifier
            .filter(|id| !id.trim().is_empty())
            .ok_or(VerifyFailure::MissingIdentifier)?;

        let ndn = Ndn::parse(raw).map_err(|e| {
            warn!("Verification with malformed identifier: {}", e);
            VerifyFailure::MalformedIdentifier
        })?;

        let record = match self.store.fetch_by_identifier(ndn.as_str()).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                info!("Verification for unknown identifier {}", ndn);
                return Err(VerifyFailure::NotFound);
            }
            Err(e) => {
                error!("Verification fetch failed for {}: {}", ndn, e);
                return Err(VerifyFailure::Unavailable);
            }
        };

        match (&record.rendered_image, self.preference) {
            (Some(image), RenderPreference::PreferStoredImage) => Ok(VerificationView::StoredImage {
                identifier: record.identifier.clone(),
                image: image.clone(),
            }),
            _ => Ok(VerificationView::Reconstructed {
                certificate: Certificate::from_record(&record, &self.public_base_url),
            }),
        }
    }
}
