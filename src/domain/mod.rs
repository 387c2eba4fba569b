pub mod certificate;
pub mod identifier;
pub mod submission;

pub use certificate::{Certificate, PdfExportOptions, QrPayload};
pub use identifier::{IdentifierError, IdentifierGenerator, Ndn};
pub use submission::{FieldOptions, SubmissionForm, SubmissionRecord, DEFAULT_CONTRIBUTION};
