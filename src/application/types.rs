use crate::domain::{Certificate, SubmissionRecord};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of `PUT /api/submissions/{ndn}/image`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageRequest {
    /// `data:image/png;base64,...`
    pub image: String,
}

/// Returned after a successful issuance.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub ndn: String,
    /// Redeem once at `/api/handoff/{token}` to load the result page.
    pub handoff_token: Uuid,
    pub record: SubmissionRecord,
    pub certificate: Certificate,
}

#[derive(Debug, Serialize)]
pub struct HandoffResponse {
    pub record: SubmissionRecord,
    pub certificate: Certificate,
}

#[derive(Debug, Serialize)]
pub struct ExistsResponse {
    pub ndn: String,
    pub exists: bool,
}

#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub ndn: String,
    pub stored: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submissions: Option<usize>,
}
