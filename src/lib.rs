pub mod application;
pub mod config;
pub mod domain;
pub mod handlers;
pub mod infrastructure;

// Re-export commonly used types
pub use application::{SubmitUseCase, VerificationView, VerifyUseCase};
pub use domain::{Certificate, IdentifierGenerator, Ndn, SubmissionForm, SubmissionRecord};
pub use infrastructure::{PostgrestStore, SqliteStore, StoreError, SubmissionStore};
