use std::sync::Arc;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::{ActorRef, Rto};

use super::{
    directory::{ParticipantDirectory, ParticipantEditor},
    mode::ModeWatch,
    participant::{Identifier, ParticipantRecord},
    workflow::{CheckInOutcome, CheckInStatus, CheckInWorkflow, LookupFailure},
};

/// What a check-in screen shows for the participant currently selected
#[derive(PartialEq, Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DeskView {
    pub record: ParticipantRecord,
    pub not_found: bool,
    pub already_checked_in: bool,
    pub has_comment: bool,
    pub live_mode: bool,
    pub last_scan: Option<String>,
    pub search_performed: bool,
    pub status: Option<CheckInStatus>,
    pub last_failure: Option<LookupFailure>,
}

/// The search form. Phone number takes priority over email.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct SearchQuery {
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl SearchQuery {
    fn identifier(&self) -> Option<Identifier> {
        let phone = self.phone.as_deref().map(str::trim).filter(|p| !p.is_empty());
        let email = self.email.as_deref().map(str::trim).filter(|e| !e.is_empty());

        match (phone, email) {
            (Some(phone), _) => Some(Identifier::Phone(phone.to_owned())),
            (None, Some(email)) => Some(Identifier::Email(email.to_owned())),
            (None, None) => None,
        }
    }
}

/// Requests that can be sent to a DeskActor
pub enum DeskRequest {
    Scan(String, Rto<DeskView>),
    /// Looks the last scanned value up again
    Refresh(Rto<DeskView>),
    Search(SearchQuery, Rto<DeskView>),
    ManualCheckIn(Rto<DeskView>),
    CancelCheckIn(Rto<DeskView>),
    Clear(Rto<DeskView>),
    SaveRecord(ParticipantRecord, Rto<DeskView>),
    View(Rto<DeskView>),
}

pub type DeskActor = ActorRef<DeskRequest>;

/// Session state of one check-in desk
struct DeskSession {
    record: ParticipantRecord,
    not_found: bool,
    already_checked_in: bool,
    has_comment: bool,
    last_scan: Option<String>,
    search_performed: bool,
    status: Option<CheckInStatus>,
    last_failure: Option<LookupFailure>,
}

impl DeskSession {
    fn new() -> Self {
        Self {
            record: ParticipantRecord::empty(),
            not_found: false,
            already_checked_in: false,
            has_comment: false,
            last_scan: None,
            search_performed: false,
            status: None,
            last_failure: None,
        }
    }

    fn clear(&mut self) {
        *self = Self::new();
    }

    fn apply(&mut self, outcome: CheckInOutcome) {
        self.status = Some(outcome.status());
        self.record = outcome.record;
        self.not_found = outcome.not_found;
        self.already_checked_in = outcome.already_checked_in;
        self.has_comment = outcome.has_comment;
        self.last_failure = outcome.failure;
    }

    fn selected(&self) -> anyhow::Result<Identifier> {
        if self.record.is_empty() {
            Err(anyhow!("No participant is selected."))
        } else {
            Ok(Identifier::Email(self.record.user_email.clone()))
        }
    }

    fn view(&self, live_mode: bool) -> DeskView {
        DeskView {
            record: self.record.clone(),
            not_found: self.not_found,
            already_checked_in: self.already_checked_in,
            has_comment: self.has_comment,
            live_mode,
            last_scan: self.last_scan.clone(),
            search_performed: self.search_performed,
            status: self.status,
            last_failure: self.last_failure,
        }
    }
}

/// Runs the desk session, handling one request at a time.
///
/// Because requests are queued on a single channel, a scan arriving while a
/// check-in is in flight waits for it to finish.
pub async fn run_desk_actor<D>(
    workflow: CheckInWorkflow<D>,
    event: String,
    mode: ModeWatch,
    mut rx: UnboundedReceiver<DeskRequest>,
) -> anyhow::Result<()>
where
    D: ParticipantDirectory + ParticipantEditor + ?Sized,
{
    log::debug!("Started desk for {}", event);
    let mut session = DeskSession::new();

    while let Some(msg) = rx.recv().await {
        match msg {
            DeskRequest::Scan(value, rto) => {
                let value = value.trim().to_owned();
                if session.last_scan.as_deref() == Some(value.as_str()) {
                    log::debug!("Ignoring repeated scan of {}", value);
                    rto.reply(Ok(session.view(mode.is_live())));
                    continue;
                }

                let Some(id) = Identifier::parse(&value) else {
                    rto.reply(Err(anyhow!("Scanned value is empty.")));
                    continue;
                };
                session.last_scan = Some(value);

                let live = mode.is_live();
                let outcome = if live {
                    workflow.perform_check_in(&id, &event, false).await
                } else {
                    workflow.fetch_state(&id, &event).await
                };

                if live && outcome.success {
                    log::info!("Checked in {} from scan", outcome.record.user_email);
                }
                session.apply(outcome);
                rto.reply(Ok(session.view(live)));
            }
            DeskRequest::Refresh(rto) => {
                let Some(id) = session.last_scan.as_deref().and_then(Identifier::parse) else {
                    rto.reply(Err(anyhow!("Nothing has been scanned yet.")));
                    continue;
                };

                let outcome = workflow.fetch_state(&id, &event).await;
                session.apply(outcome);
                rto.reply(Ok(session.view(mode.is_live())));
            }
            DeskRequest::Search(query, rto) => {
                session.clear();
                session.search_performed = true;

                if let Some(id) = query.identifier() {
                    let outcome = workflow.fetch_state(&id, &event).await;
                    session.apply(outcome);
                }
                rto.reply(Ok(session.view(mode.is_live())));
            }
            DeskRequest::ManualCheckIn(rto) => match session.selected() {
                Ok(id) => {
                    let outcome = workflow.perform_check_in(&id, &event, true).await;
                    session.apply(outcome);
                    rto.reply(Ok(session.view(mode.is_live())));
                }
                Err(e) => rto.reply(Err(e)),
            },
            DeskRequest::CancelCheckIn(rto) => match session.selected() {
                Ok(id) => {
                    let outcome = workflow.cancel_check_in(&id, &event).await;
                    if outcome.success {
                        session.clear();
                    } else {
                        session.record = ParticipantRecord::empty();
                        session.not_found = true;
                        session.already_checked_in = false;
                        session.has_comment = false;
                        session.status = Some(CheckInStatus::NotFound);
                        session.last_failure = outcome.failure;
                    }
                    rto.reply(Ok(session.view(mode.is_live())));
                }
                Err(e) => rto.reply(Err(e)),
            },
            DeskRequest::Clear(rto) => {
                session.clear();
                rto.reply(Ok(session.view(mode.is_live())));
            }
            DeskRequest::SaveRecord(mut record, rto) => {
                // A blank comment is cleared rather than saved
                if record.metadata.comment.as_deref() == Some("") {
                    record.metadata.comment = None;
                }

                let id = match Identifier::parse(&record.user_email) {
                    Some(id @ Identifier::Email(_)) => id,
                    _ => {
                        rto.reply(Err(anyhow!("Record has no valid email.")));
                        continue;
                    }
                };

                if let Err(e) = workflow
                    .directory()
                    .update_participant(&id, &event, &record)
                    .await
                {
                    log::warn!("Failed to update {}: {}", id, e);
                    rto.reply(Err(anyhow!("Failed to update participant: {}", e)));
                    continue;
                }

                let live = mode.is_live();
                let refreshed = workflow.handle_edit_refresh(&id, &event, live).await;
                if refreshed.auto_checked_in {
                    log::info!("Checked in {} after edit", id);
                }
                session.apply(refreshed.outcome);
                rto.reply(Ok(session.view(live)));
            }
            DeskRequest::View(rto) => rto.reply(Ok(session.view(mode.is_live()))),
        }
    }

    Ok(())
}

/// Spawns a desk actor on the runtime and returns its handle
pub fn spawn_desk<D>(
    directory: Arc<D>,
    event: String,
    mode: ModeWatch,
) -> (DeskActor, tokio::task::JoinHandle<anyhow::Result<()>>)
where
    D: ParticipantDirectory + ParticipantEditor + ?Sized + 'static,
{
    let (actor, rx) = DeskActor::new();
    let task = tokio::spawn(run_desk_actor(
        CheckInWorkflow::new(directory),
        event,
        mode,
        rx,
    ));
    (actor, task)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        core::{
            directory::mock::MockDirectory,
            mode::{CheckInMode, ModeSwitch},
            participant::ParticipantRecord,
            workflow::{CheckInStatus, ReviewReason},
        },
        send_message,
    };

    use super::*;

    fn record(email: &str, phone: &str, paid: bool, comment: Option<&str>) -> ParticipantRecord {
        let mut record = ParticipantRecord {
            event_name: "spring-rally".to_owned(),
            user_email: email.to_owned(),
            paid,
            ..Default::default()
        };
        record.metadata.phone_number = phone.to_owned();
        record.metadata.comment = comment.map(|c| c.to_owned());
        record
    }

    fn desk(directory: MockDirectory, live: bool) -> (Arc<MockDirectory>, ModeSwitch, DeskActor) {
        let directory = Arc::new(directory);
        let (switch, watch) = CheckInMode::new(live);
        let (actor, _) = spawn_desk(directory.clone(), "spring-rally".to_owned(), watch);
        (directory, switch, actor)
    }

    fn records() -> MockDirectory {
        MockDirectory::with_records(vec![
            record("joe@x.pt", "911111111", true, None),
            record("ann@x.pt", "922222222", true, Some("check id")),
            record("bob@x.pt", "933333333", false, None),
        ])
    }

    #[tokio::test]
    async fn test_scan_lookup_mode() {
        let (dir, _switch, actor) = desk(records(), false);

        let view = send_message!(actor, DeskRequest, Scan, "joe@x.pt".to_owned()).unwrap();
        assert_eq!(view.record.user_email, "joe@x.pt");
        assert_eq!(view.status, Some(CheckInStatus::Eligible));
        assert!(!view.live_mode);
        assert_eq!(dir.confirms(), 0);

        // Same code again is ignored
        send_message!(actor, DeskRequest, Scan, "joe@x.pt".to_owned()).unwrap();
        assert_eq!(dir.fetches(), 1);
    }

    #[tokio::test]
    async fn test_scan_live_mode() {
        let (dir, switch, actor) = desk(records(), false);
        switch.set(true);

        let view = send_message!(actor, DeskRequest, Scan, "joe@x.pt".to_owned()).unwrap();
        assert!(view.live_mode);
        assert!(view.record.checked_in);
        assert_eq!(view.status, Some(CheckInStatus::CheckedIn));
        assert_eq!(dir.confirms(), 1);

        let view = send_message!(actor, DeskRequest, Scan, "ann@x.pt".to_owned()).unwrap();
        assert!(view.has_comment);
        assert_eq!(
            view.status,
            Some(CheckInStatus::NeedsReview(ReviewReason::Comment))
        );
        assert_eq!(dir.confirms(), 1);

        // Rescanning the first code after another one goes through the guards again
        let view = send_message!(actor, DeskRequest, Scan, "joe@x.pt".to_owned()).unwrap();
        assert!(view.already_checked_in);
        assert_eq!(dir.confirms(), 1);
    }

    #[tokio::test]
    async fn test_manual_check_in_overrides_comment() {
        let (dir, _switch, actor) = desk(records(), false);

        assert!(send_message!(actor, DeskRequest, ManualCheckIn).is_err());

        send_message!(actor, DeskRequest, Scan, "ann@x.pt".to_owned()).unwrap();
        let view = send_message!(actor, DeskRequest, ManualCheckIn).unwrap();
        assert!(view.record.checked_in);
        assert_eq!(dir.confirms(), 1);

        send_message!(actor, DeskRequest, Scan, "bob@x.pt".to_owned()).unwrap();
        let view = send_message!(actor, DeskRequest, ManualCheckIn).unwrap();
        assert!(!view.record.checked_in);
        assert_eq!(
            view.status,
            Some(CheckInStatus::NeedsReview(ReviewReason::Unpaid))
        );
        assert_eq!(dir.confirms(), 1);
    }

    fn query(phone: Option<&str>, email: Option<&str>) -> SearchQuery {
        SearchQuery {
            phone: phone.map(|p| p.to_owned()),
            email: email.map(|e| e.to_owned()),
        }
    }

    #[tokio::test]
    async fn test_search_prefers_phone() {
        let (dir, _switch, actor) = desk(records(), false);

        let view = send_message!(
            actor,
            DeskRequest,
            Search,
            query(Some("922222222"), Some("joe@x.pt"))
        )
        .unwrap();
        assert!(view.search_performed);
        assert_eq!(view.record.user_email, "ann@x.pt");

        let view = send_message!(
            actor,
            DeskRequest,
            Search,
            query(Some("  "), Some("joe@x.pt"))
        )
        .unwrap();
        assert_eq!(view.record.user_email, "joe@x.pt");

        let fetches = dir.fetches();
        let view = send_message!(actor, DeskRequest, Search, SearchQuery::default()).unwrap();
        assert!(view.search_performed);
        assert!(view.record.is_empty());
        assert!(!view.not_found);
        assert_eq!(dir.fetches(), fetches);

        let view = send_message!(actor, DeskRequest, Search, query(Some("900000000"), None)).unwrap();
        assert!(view.not_found);
        assert_eq!(view.last_failure, Some(LookupFailure::Absent));
    }

    #[tokio::test]
    async fn test_refresh_retries_last_scan() {
        let (dir, _switch, actor) = desk(MockDirectory::default(), false);

        assert!(send_message!(actor, DeskRequest, Refresh).is_err());

        let view = send_message!(actor, DeskRequest, Scan, "joe@x.pt".to_owned()).unwrap();
        assert!(view.not_found);
        assert_eq!(dir.fetches(), 1);

        // Registered after the first scan
        dir.records.lock().unwrap().insert(
            "joe@x.pt".to_owned(),
            record("joe@x.pt", "911111111", true, None),
        );

        // Scanning the same code again is ignored
        let view = send_message!(actor, DeskRequest, Scan, "joe@x.pt".to_owned()).unwrap();
        assert!(view.not_found);
        assert_eq!(dir.fetches(), 1);

        let view = send_message!(actor, DeskRequest, Refresh).unwrap();
        assert_eq!(dir.fetches(), 2);
        assert!(!view.not_found);
        assert_eq!(view.record.user_email, "joe@x.pt");
        assert_eq!(view.status, Some(CheckInStatus::Eligible));
        assert_eq!(view.last_scan.as_deref(), Some("joe@x.pt"));
    }

    #[tokio::test]
    async fn test_cancel_clears_session() {
        let (dir, _switch, actor) = desk(records(), true);

        send_message!(actor, DeskRequest, Scan, "joe@x.pt".to_owned()).unwrap();
        let view = send_message!(actor, DeskRequest, CancelCheckIn).unwrap();
        assert!(view.record.is_empty());
        assert!(!view.not_found);
        assert_eq!(view.last_scan, None);
        assert_eq!(dir.cancels(), 1);
        assert!(!dir.record("joe@x.pt").unwrap().checked_in);
    }

    #[tokio::test]
    async fn test_cancel_failure_reads_as_not_found() {
        let (_dir, _switch, actor) = desk(
            MockDirectory {
                fail_cancel: true,
                ..records()
            },
            true,
        );

        send_message!(actor, DeskRequest, Scan, "joe@x.pt".to_owned()).unwrap();
        let view = send_message!(actor, DeskRequest, CancelCheckIn).unwrap();
        assert!(view.not_found);
        assert!(!view.already_checked_in);
        assert!(view.record.is_empty());
    }

    #[tokio::test]
    async fn test_save_record_checks_in_when_live() {
        let (dir, switch, actor) = desk(records(), false);

        let view = send_message!(actor, DeskRequest, Scan, "bob@x.pt".to_owned()).unwrap();
        assert_eq!(
            view.status,
            Some(CheckInStatus::NeedsReview(ReviewReason::Unpaid))
        );

        let mut edited = view.record.clone();
        edited.paid = true;
        let view = send_message!(actor, DeskRequest, SaveRecord, edited.clone()).unwrap();
        assert_eq!(dir.updates(), 1);
        assert!(view.record.paid);
        assert!(!view.record.checked_in);
        assert_eq!(dir.confirms(), 0);

        switch.set(true);
        let view = send_message!(actor, DeskRequest, SaveRecord, edited).unwrap();
        assert!(view.record.checked_in);
        assert_eq!(dir.confirms(), 1);
    }

    #[tokio::test]
    async fn test_save_record_clears_blank_comment() {
        let (dir, _switch, actor) = desk(records(), true);

        let view = send_message!(actor, DeskRequest, Scan, "ann@x.pt".to_owned()).unwrap();
        assert!(view.has_comment);

        let mut edited = view.record.clone();
        edited.metadata.comment = Some(String::new());
        let view = send_message!(actor, DeskRequest, SaveRecord, edited).unwrap();

        assert_eq!(dir.record("ann@x.pt").unwrap().metadata.comment, None);
        assert!(!view.has_comment);
        assert!(view.record.checked_in);
        assert_eq!(dir.confirms(), 1);
    }

    #[tokio::test]
    async fn test_save_record_failure_keeps_session() {
        let (_dir, _switch, actor) = desk(
            MockDirectory {
                fail_update: true,
                ..records()
            },
            false,
        );

        let before = send_message!(actor, DeskRequest, Scan, "joe@x.pt".to_owned()).unwrap();
        let mut edited = before.record.clone();
        edited.vehicle_type = "quad".to_owned();

        assert!(send_message!(actor, DeskRequest, SaveRecord, edited).is_err());
        let after = send_message!(actor, DeskRequest, View).unwrap();
        assert_eq!(before, after);
    }
}
