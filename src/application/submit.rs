use crate::domain::{FieldOptions, IdentifierGenerator, SubmissionForm, SubmissionRecord};
use crate::infrastructure::database::{StoreError, SubmissionStore};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Invalid submission: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("No unused identifier found after {0} attempts")]
    IdentifierExhausted(usize),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SubmitError {
    pub fn kind(&self) -> &'static str {
        match self {
            SubmitError::Validation(_) => "validation",
            SubmitError::IdentifierExhausted(_) => "conflict",
            SubmitError::Store(e) => e.kind(),
        }
    }

    /// Message for the person who submitted the form.
    pub fn user_message(&self) -> String {
        match self {
            SubmitError::Validation(problems) => {
                format!("Please complete the form: {}", problems.join(", "))
            }
            SubmitError::Store(StoreError::Schema(_)) => {
                "Submissions table not found. Create the submissions table before issuing certificates."
                    .to_string()
            }
            SubmitError::Store(StoreError::Permission(_)) => {
                "Permission denied. Check the write policies on the submissions table.".to_string()
            }
            _ => "An error occurred while generating your certificate. Please try again.".to_string(),
        }
    }
}

/// Issues one certificate: validate, allocate an identifier, insert.
///
/// Local validation failures never reach the store. A conflicting
/// identifier is discarded and a fresh one is generated; every other store
/// failure is returned as-is for the caller to retry manually.
pub struct SubmitUseCase {
    store: Arc<dyn SubmissionStore>,
    generator: IdentifierGenerator,
    options: FieldOptions,
    max_attempts: usize,
}

impl SubmitUseCase {
    pub fn new(store: Arc<dyn SubmissionStore>, generator: IdentifierGenerator) -> Self {
        Self {
            store,
            generator,
            options: FieldOptions::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_options(mut self, options: FieldOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub async fn execute(&self, form: &SubmissionForm) -> Result<SubmissionRecord, SubmitError> {
        let problems = form.validate(&self.options);
        if !problems.is_empty() {
            warn!("Rejected submission: {}", problems.join(", "));
            return Err(SubmitError::Validation(problems));
        }

        for attempt in 1..=self.max_attempts {
            let ndn = self.generator.generate();

            match self.store.exists_by_identifier(ndn.as_str()).await {
                Ok(true) => {
                    warn!("Identifier {} already taken (attempt {})", ndn, attempt);
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    error!("Existence check failed for {}: {}", ndn, e);
                    return Err(e.into());
                }
            }

            let record = SubmissionRecord::new(&ndn, form, Utc::now());
            match self.store.insert(&record).await {
                Ok(stored) => {
                    info!("Submission stored: {}", stored.identifier);
                    return Ok(stored);
                }
                Err(StoreError::Conflict(_)) => {
                    warn!("Insert conflicted on {} (attempt {})", ndn, attempt);
                }
                Err(e) => {
                    error!("Failed to store submission {}: {}", ndn, e);
                    return Err(e.into());
                }
            }
        }

        error!(
            "Giving up on submission after {} identifier collisions",
            self.max_attempts
        );
        Err(SubmitError::IdentifierExhausted(self.max_attempts))
    }
}
