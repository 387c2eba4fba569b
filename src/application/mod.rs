pub mod display;
mod image;
mod issuer;
mod submit;
mod types;
mod verify;

pub use display::{DisplayError, DisplayState};
pub use image::{validate_data_url, AttachImageUseCase, ImageError, MAX_IMAGE_BYTES};
pub use issuer::{token_digest, IssuerError, IssuerGate};
pub use submit::{SubmitError, SubmitUseCase, DEFAULT_MAX_ATTEMPTS};
pub use types::{
    ExistsResponse, HandoffResponse, HealthResponse, ImageRequest, ImageResponse, SubmitResponse,
};
pub use verify::{
    RenderPreference, RenderPreferenceError, VerificationState, VerificationView, VerifyFailure,
    VerifyUseCase,
};
