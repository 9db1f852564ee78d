use async_trait::async_trait;

use crate::error::DirectoryResult;

use super::participant::{Identifier, ParticipantRecord};

/// Remote source of participant records.
///
/// Every call goes to the backend; implementations must not cache.
#[async_trait]
pub trait ParticipantDirectory: Send + Sync {
    /// Looks up a participant. `Ok(None)` means the backend answered but had no record.
    async fn fetch(&self, id: &Identifier, event: &str)
        -> DirectoryResult<Option<ParticipantRecord>>;

    /// Marks the participant as checked in and returns the updated record.
    async fn confirm_check_in(&self, id: &Identifier, event: &str)
        -> DirectoryResult<ParticipantRecord>;

    async fn cancel_check_in(&self, id: &Identifier, event: &str) -> DirectoryResult<()>;
}

/// Write access to participant records, used by the edit flow.
#[async_trait]
pub trait ParticipantEditor: Send + Sync {
    async fn update_participant(
        &self,
        id: &Identifier,
        event: &str,
        record: &ParticipantRecord,
    ) -> DirectoryResult<ParticipantRecord>;
}

#[cfg(test)]
pub mod mock {
    use std::{
        collections::HashMap,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
    };

    use async_trait::async_trait;

    use crate::{
        core::participant::{Identifier, ParticipantRecord},
        error::{DirectoryError, DirectoryResult},
    };

    use super::{ParticipantDirectory, ParticipantEditor};

    /// In-memory directory keyed by email, counting every remote call.
    #[derive(Default)]
    pub struct MockDirectory {
        pub records: Mutex<HashMap<String, ParticipantRecord>>,
        pub fail_fetch: bool,
        pub fail_confirm: bool,
        pub fail_cancel: bool,
        pub fail_update: bool,
        pub fetch_calls: AtomicUsize,
        pub confirm_calls: AtomicUsize,
        pub cancel_calls: AtomicUsize,
        pub update_calls: AtomicUsize,
    }

    impl MockDirectory {
        pub fn with_records(records: Vec<ParticipantRecord>) -> Self {
            Self {
                records: Mutex::new(
                    records
                        .into_iter()
                        .map(|r| (r.user_email.clone(), r))
                        .collect(),
                ),
                ..Default::default()
            }
        }

        pub fn record(&self, email: &str) -> Option<ParticipantRecord> {
            self.records.lock().unwrap().get(email).cloned()
        }

        pub fn fetches(&self) -> usize {
            self.fetch_calls.load(Ordering::SeqCst)
        }

        pub fn confirms(&self) -> usize {
            self.confirm_calls.load(Ordering::SeqCst)
        }

        pub fn cancels(&self) -> usize {
            self.cancel_calls.load(Ordering::SeqCst)
        }

        pub fn updates(&self) -> usize {
            self.update_calls.load(Ordering::SeqCst)
        }

        fn find(&self, id: &Identifier) -> Option<ParticipantRecord> {
            let records = self.records.lock().unwrap();
            match id {
                Identifier::Email(email) => records.get(email).cloned(),
                Identifier::Phone(phone) => records
                    .values()
                    .find(|r| &r.metadata.phone_number == phone)
                    .cloned(),
            }
        }

        fn server_error() -> DirectoryError {
            DirectoryError::Server {
                status: 500,
                body: "Error".to_owned(),
            }
        }
    }

    #[async_trait]
    impl ParticipantDirectory for MockDirectory {
        async fn fetch(
            &self,
            id: &Identifier,
            _event: &str,
        ) -> DirectoryResult<Option<ParticipantRecord>> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_fetch {
                return Err(Self::server_error());
            }
            Ok(self.find(id))
        }

        async fn confirm_check_in(
            &self,
            id: &Identifier,
            _event: &str,
        ) -> DirectoryResult<ParticipantRecord> {
            self.confirm_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_confirm {
                return Err(Self::server_error());
            }
            let mut records = self.records.lock().unwrap();
            let record = records
                .get_mut(id.as_str())
                .ok_or(DirectoryError::NotFound)?;
            record.checked_in = true;
            record.metadata.check_in.by_who = "desk".to_owned();
            Ok(record.clone())
        }

        async fn cancel_check_in(&self, id: &Identifier, _event: &str) -> DirectoryResult<()> {
            self.cancel_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_cancel {
                return Err(Self::server_error());
            }
            let mut records = self.records.lock().unwrap();
            let record = records
                .get_mut(id.as_str())
                .ok_or(DirectoryError::NotFound)?;
            record.checked_in = false;
            record.metadata.check_in.by_who.clear();
            Ok(())
        }
    }

    #[async_trait]
    impl ParticipantEditor for MockDirectory {
        async fn update_participant(
            &self,
            id: &Identifier,
            _event: &str,
            record: &ParticipantRecord,
        ) -> DirectoryResult<ParticipantRecord> {
            self.update_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_update {
                return Err(Self::server_error());
            }
            let mut records = self.records.lock().unwrap();
            if !records.contains_key(id.as_str()) {
                return Err(DirectoryError::NotFound);
            }
            records.insert(id.as_str().to_owned(), record.clone());
            Ok(record.clone())
        }
    }
}
