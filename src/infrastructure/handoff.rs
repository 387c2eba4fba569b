use crate::domain::SubmissionRecord;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

/// Short-lived, in-memory hand-off of freshly inserted records to the result
/// page, so the page does not need a second store round-trip.
///
/// Each token can be redeemed once. Entries older than the TTL are dropped.
pub struct Handoff {
    ttl: Duration,
    entries: Mutex<HashMap<Uuid, (SubmissionRecord, DateTime<Utc>)>>,
}

impl Handoff {
    pub fn new(ttl: std::time::Duration) -> Self {
        Self {
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::minutes(10)),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn put(&self, record: SubmissionRecord) -> Uuid {
        self.put_at(record, Utc::now())
    }

    pub fn take(&self, token: &Uuid) -> Option<SubmissionRecord> {
        self.take_at(token, Utc::now())
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn put_at(&self, record: SubmissionRecord, now: DateTime<Utc>) -> Uuid {
        let token = Uuid::new_v4();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Self::purge(&mut entries, now, self.ttl);
        entries.insert(token, (record, now));
        token
    }

    fn take_at(&self, token: &Uuid, now: DateTime<Utc>) -> Option<SubmissionRecord> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Self::purge(&mut entries, now, self.ttl);
        entries.remove(token).map(|(record, _)| record)
    }

    fn purge(
        entries: &mut HashMap<Uuid, (SubmissionRecord, DateTime<Utc>)>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) {
        entries.retain(|_, (_, stored_at)| now - *stored_at < ttl);
    }
}
