use std::sync::Arc;

use serde::Serialize;

use crate::error::DirectoryError;

use super::{
    directory::ParticipantDirectory,
    participant::{Identifier, ParticipantRecord},
};

/// Why a lookup or mutation ended as "not found".
///
/// The outcome flags fold all of these into `not_found`, this keeps the distinction.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum LookupFailure {
    /// The backend answered but had no such participant
    Absent,
    /// No response at all
    Transport,
    Server { status: u16 },
    /// The response body could not be read as a record
    Decode,
    /// Refused before anything was sent
    Invalid,
}

impl From<&DirectoryError> for LookupFailure {
    fn from(err: &DirectoryError) -> Self {
        match err {
            DirectoryError::NotFound => LookupFailure::Absent,
            DirectoryError::Transport(_) => LookupFailure::Transport,
            DirectoryError::Server { status, .. } => LookupFailure::Server { status: *status },
            DirectoryError::Decode(_) => LookupFailure::Decode,
            DirectoryError::InvalidRequest(_) => LookupFailure::Invalid,
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReviewReason {
    Unpaid,
    Comment,
}

/// Check-in state of a single record as seen by the desk
#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase", tag = "state", content = "reason")]
pub enum CheckInStatus {
    NotFound,
    NeedsReview(ReviewReason),
    Eligible,
    CheckedIn,
}

impl CheckInStatus {
    pub fn of(record: &ParticipantRecord) -> Self {
        if record.checked_in {
            CheckInStatus::CheckedIn
        } else if !record.paid {
            CheckInStatus::NeedsReview(ReviewReason::Unpaid)
        } else if record.has_comment() {
            CheckInStatus::NeedsReview(ReviewReason::Comment)
        } else {
            CheckInStatus::Eligible
        }
    }
}

/// Result of a lookup or check-in attempt. Never an error, callers render the flags.
#[derive(PartialEq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInOutcome {
    pub record: ParticipantRecord,
    pub not_found: bool,
    pub already_checked_in: bool,
    pub has_comment: bool,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<LookupFailure>,
}

impl CheckInOutcome {
    fn not_found(failure: LookupFailure) -> Self {
        Self {
            record: ParticipantRecord::empty(),
            not_found: true,
            already_checked_in: false,
            has_comment: false,
            success: false,
            failure: Some(failure),
        }
    }

    fn refused(record: ParticipantRecord, already_checked_in: bool) -> Self {
        let has_comment = record.has_comment();
        Self {
            record,
            not_found: false,
            already_checked_in,
            has_comment,
            success: false,
            failure: None,
        }
    }

    fn checked_in(record: ParticipantRecord) -> Self {
        Self {
            record,
            not_found: false,
            already_checked_in: false,
            has_comment: false,
            success: true,
            failure: None,
        }
    }

    pub fn status(&self) -> CheckInStatus {
        if self.not_found {
            CheckInStatus::NotFound
        } else {
            CheckInStatus::of(&self.record)
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOutcome {
    pub success: bool,
    pub not_found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<LookupFailure>,
}

#[derive(PartialEq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRefreshOutcome {
    #[serde(flatten)]
    pub outcome: CheckInOutcome,
    pub auto_checked_in: bool,
}

/// The first guard that matched for a fetched record
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum Guard {
    Absent,
    AlreadyCheckedIn,
    NeedsReview(ReviewReason),
    Proceed,
}

/// Evaluates the check-in guards in order. The first match wins.
///
/// Payment and comment are decided here, before any mutating call is issued.
pub fn evaluate_guards(record: Option<&ParticipantRecord>, override_comment: bool) -> Guard {
    let Some(record) = record else {
        return Guard::Absent;
    };

    if record.checked_in {
        Guard::AlreadyCheckedIn
    } else if !record.paid {
        Guard::NeedsReview(ReviewReason::Unpaid)
    } else if record.has_comment() && !override_comment {
        Guard::NeedsReview(ReviewReason::Comment)
    } else {
        Guard::Proceed
    }
}

/// Check-in policy over a participant directory.
///
/// Issues at most a fetch followed by one mutation per call. Concurrent calls
/// for the same participant are not coordinated here.
pub struct CheckInWorkflow<D: ?Sized> {
    directory: Arc<D>,
}

impl<D: ?Sized> Clone for CheckInWorkflow<D> {
    fn clone(&self) -> Self {
        Self {
            directory: self.directory.clone(),
        }
    }
}

impl<D: ParticipantDirectory + ?Sized> CheckInWorkflow<D> {
    pub fn new(directory: Arc<D>) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &Arc<D> {
        &self.directory
    }

    async fn lookup(&self, id: &Identifier, event: &str) -> Result<ParticipantRecord, LookupFailure> {
        match self.directory.fetch(id, event).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => {
                log::debug!("No participant {} in {}", id, event);
                Err(LookupFailure::Absent)
            }
            Err(e) => {
                log::warn!("Failed to fetch participant {} in {}: {}", id, event, e);
                Err(LookupFailure::from(&e))
            }
        }
    }

    /// Fetches a participant and reports its state without changing anything.
    pub async fn fetch_state(&self, id: &Identifier, event: &str) -> CheckInOutcome {
        match self.lookup(id, event).await {
            Ok(record) => {
                let already_checked_in = record.checked_in;
                let has_comment = record.has_comment();
                CheckInOutcome {
                    record,
                    not_found: false,
                    already_checked_in,
                    has_comment,
                    success: true,
                    failure: None,
                }
            }
            Err(failure) => CheckInOutcome::not_found(failure),
        }
    }

    /// Checks a participant in if every guard passes.
    ///
    /// `override_comment` lets a person at the desk accept a record carrying a
    /// review comment. It never lets an unpaid participant in.
    pub async fn perform_check_in(
        &self,
        id: &Identifier,
        event: &str,
        override_comment: bool,
    ) -> CheckInOutcome {
        let record = match self.lookup(id, event).await {
            Ok(record) => record,
            Err(failure) => return CheckInOutcome::not_found(failure),
        };

        match evaluate_guards(Some(&record), override_comment) {
            Guard::Absent => CheckInOutcome::not_found(LookupFailure::Absent),
            Guard::AlreadyCheckedIn => {
                log::info!("{} is already checked in to {}", id, event);
                CheckInOutcome::refused(record, true)
            }
            Guard::NeedsReview(reason) => {
                log::info!("{} needs review before check-in ({:?})", id, reason);
                CheckInOutcome::refused(record, false)
            }
            Guard::Proceed => {
                let target = match id {
                    Identifier::Email(_) => id.clone(),
                    Identifier::Phone(_) => Identifier::Email(record.user_email.clone()),
                };

                match self.directory.confirm_check_in(&target, event).await {
                    Ok(updated) => {
                        log::info!("Checked in {} to {}", target, event);
                        CheckInOutcome::checked_in(updated)
                    }
                    Err(e) => {
                        log::warn!("Check-in of {} to {} failed: {}", target, event, e);
                        CheckInOutcome::not_found(LookupFailure::from(&e))
                    }
                }
            }
        }
    }

    /// Reverses a check-in. The caller resets its own state on success.
    pub async fn cancel_check_in(&self, id: &Identifier, event: &str) -> CancelOutcome {
        match self.directory.cancel_check_in(id, event).await {
            Ok(()) => {
                log::info!("Cancelled check-in of {} for {}", id, event);
                CancelOutcome {
                    success: true,
                    not_found: false,
                    failure: None,
                }
            }
            Err(e) => {
                log::warn!("Cancelling check-in of {} for {} failed: {}", id, event, e);
                CancelOutcome {
                    success: false,
                    not_found: true,
                    failure: Some(LookupFailure::from(&e)),
                }
            }
        }
    }

    /// Re-reads a record after it was edited elsewhere.
    ///
    /// In live mode a record that became eligible is checked in straight away.
    pub async fn handle_edit_refresh(
        &self,
        id: &Identifier,
        event: &str,
        live_mode: bool,
    ) -> EditRefreshOutcome {
        let state = self.fetch_state(id, event).await;
        if state.not_found {
            return EditRefreshOutcome {
                outcome: state,
                auto_checked_in: false,
            };
        }

        if live_mode && CheckInStatus::of(&state.record) == CheckInStatus::Eligible {
            let outcome = self.perform_check_in(id, event, false).await;
            let auto_checked_in = outcome.success;
            EditRefreshOutcome {
                outcome,
                auto_checked_in,
            }
        } else {
            EditRefreshOutcome {
                outcome: state,
                auto_checked_in: false,
            }
        }
    }
}
