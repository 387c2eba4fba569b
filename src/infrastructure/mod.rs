pub mod database;
pub mod handoff;
pub mod postgrest;

pub use database::{SqliteStore, StoreError, StoreFuture, SubmissionStore};
pub use handoff::Handoff;
pub use postgrest::PostgrestStore;
