use axum::{debug_handler, extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::{
    db::{Event, EventLog},
    store::Store,
    appresult::{JsonBody, PathParam},
    tz, AppError, AppResult, AppState,
};

use super::{ensure_ordered, normalize_description, required_title, Change, EventDiff, EventLocks};

/// The fields an update may touch. `start`/`end` are wall-clock strings read
/// in `eventTimezone` if given, otherwise in the event's current zone.
///
/// `description` is `None` when the key is absent. `null` or a blank string clears it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EventPatch {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub event_timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub event_timezone: Option<String>,
    pub modified_by: Uuid,
}

// a key that is present, even as `null`, becomes `Some`
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl UpdateEventRequest {
    pub fn into_parts(self) -> (EventPatch, Uuid) {
        let patch = EventPatch {
            title: self.title,
            description: self.description,
            start: self.start,
            end: self.end,
            event_timezone: self.event_timezone,
        };
        (patch, self.modified_by)
    }
}

#[derive(Serialize)]
pub(crate) struct Updated {
    message: &'static str,
    event: Event,
}

/// Applies `patch` to the event and appends one audit entry attributed to `actor_id`.
///
/// Plain fields enter the diff only when their value changes. `startUTC` and
/// `endUTC` enter it whenever the patch carries them, even if the resulting
/// instant is the same as before. The entry is written even if the diff is empty.
pub async fn update_event(
    store: &Store,
    locks: &EventLocks,
    id: Uuid,
    patch: EventPatch,
    actor_id: Uuid,
) -> AppResult<Event> {
    let _guard = locks.lock(id).await;

    let old = store.find_event(id).await?.ok_or_else(|| AppError::event_not_found(id))?;
    check_actor(store, &old, actor_id).await?;

    let (mut next, diff) = merge(&old, patch)
        .inspect_err(|err| tracing::warn!(event_id = %id, error = %err, "update rejected"))?;

    let now = Utc::now();
    next.update_at_utc = now;
    let log = EventLog {
        id: Uuid::now_v7(),
        event_log_id: id,
        event_triggered_by: actor_id,
        diff,
        created_at_utc: now,
    };
    store.commit_update(&next, &log).await?;

    tracing::info!(
        event_id = %id,
        actor = %actor_id,
        changed = ?log.diff.fields(),
        "event updated"
    );
    Ok(next)
}

/// Only profiles assigned to the event, or whoever created it, may change it.
async fn check_actor(store: &Store, event: &Event, actor_id: Uuid) -> AppResult<()> {
    if store.find_profile(actor_id).await?.is_none() {
        return Err(AppError::profile_not_found(actor_id));
    }
    if !event.is_assigned(actor_id) && event.created_by != Some(actor_id) {
        return Err(AppError::validation(
            "only an assigned profile or the creator may change this event",
        ));
    }
    Ok(())
}

/// Builds the candidate event and its diff, and validates the candidate as a whole.
fn merge(old: &Event, patch: EventPatch) -> AppResult<(Event, EventDiff)> {
    let mut next = old.clone();
    let mut diff = EventDiff::default();

    if let Some(title) = patch.title {
        let title = required_title(&title)?;
        diff.title = Change::if_changed(&old.title, &title);
        next.title = title;
    }
    if let Some(description) = patch.description {
        let description = normalize_description(description);
        diff.description = Change::if_changed(&old.description, &description);
        next.description = description;
    }
    if let Some(zone) = patch.event_timezone {
        tz::parse_zone(&zone)?;
        diff.event_timezone = Change::if_changed(&old.event_timezone, &zone);
        next.event_timezone = zone;
    }

    if let Some(start) = patch.start {
        let start_utc = tz::to_absolute_instant(&start, &next.event_timezone)?;
        diff.start_utc = Some(Change(old.start_utc, start_utc));
        next.start_utc = start_utc;
    }
    if let Some(end) = patch.end {
        let end_utc = tz::to_absolute_instant(&end, &next.event_timezone)?;
        diff.end_utc = Some(Change(old.end_utc, end_utc));
        next.end_utc = end_utc;
    }

    ensure_ordered(next.start_utc, next.end_utc)?;
    Ok((next, diff))
}

#[debug_handler(state = AppState)]
pub(crate) async fn update(
    State(store): State<Store>,
    State(locks): State<EventLocks>,
    PathParam(id): PathParam<Uuid>,
    JsonBody(body): JsonBody<UpdateEventRequest>,
) -> AppResult<Json<Updated>> {
    let (patch, actor_id) = body.into_parts();
    let event = update_event(&store, &locks, id, patch, actor_id).await?;

    Ok(Json(Updated { message: "Event has been Updated", event }))
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        db::Profile,
        events::{create_event, get_event_logs, test_support::seed_profile, NewEvent},
    };

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn stored(title: &str) -> Event {
        Event {
            id: Uuid::now_v7(),
            title: title.to_owned(),
            description: None,
            profiles: vec![Uuid::now_v7()],
            event_timezone: "UTC".to_owned(),
            start_utc: utc("2024-06-01T09:00:00Z"),
            end_utc: utc("2024-06-01T10:00:00Z"),
            created_at_utc: utc("2024-05-01T00:00:00Z"),
            update_at_utc: utc("2024-05-01T00:00:00Z"),
            created_by: None,
        }
    }

    async fn setup() -> (Store, EventLocks, Profile, Event) {
        let store = Store::in_memory().await.unwrap();
        let ana = seed_profile(&store, "Ana", "Asia/Kolkata").await;
        let event = create_event(
            &store,
            NewEvent {
                title: "Standup".into(),
                description: None,
                profiles: vec![ana.id],
                event_timezone: "UTC".into(),
                start: "2024-06-01T09:00".into(),
                end: "2024-06-01T09:15".into(),
                created_by: Some(ana.id),
            },
        )
        .await
        .unwrap();
        (store, EventLocks::default(), ana, event)
    }

    #[test]
    fn unchanged_title_is_not_logged() {
        let old = stored("Standup");
        let patch = EventPatch { title: Some("Standup".into()), ..EventPatch::default() };

        let (next, diff) = merge(&old, patch).unwrap();
        assert_eq!(diff, EventDiff::default());
        assert_eq!(next, old);
    }

    #[test]
    fn resubmitted_start_is_always_logged() {
        let old = stored("Standup");
        let patch = EventPatch { start: Some("2024-06-01T09:00".into()), ..EventPatch::default() };

        let (_, diff) = merge(&old, patch).unwrap();
        assert_eq!(diff.start_utc, Some(Change(old.start_utc, old.start_utc)));
        assert_eq!(diff.fields(), vec!["startUTC"]);
    }

    #[test]
    fn times_use_the_patched_zone() {
        let old = stored("Standup");
        let patch = EventPatch {
            event_timezone: Some("Asia/Kolkata".into()),
            start: Some("2024-06-01T14:00".into()),
            end: Some("2024-06-01T16:00".into()),
            ..EventPatch::default()
        };

        let (next, diff) = merge(&old, patch).unwrap();
        assert_eq!(next.start_utc, utc("2024-06-01T08:30:00Z"));
        assert_eq!(next.end_utc, utc("2024-06-01T10:30:00Z"));
        assert_eq!(diff.event_timezone, Some(Change("UTC".into(), "Asia/Kolkata".into())));
        assert_eq!(diff.end_utc, Some(Change(old.end_utc, utc("2024-06-01T10:30:00Z"))));
    }

    #[test]
    fn merged_range_is_validated() {
        let old = stored("Standup");
        let patch = EventPatch { start: Some("2024-06-01T11:00".into()), ..EventPatch::default() };
        assert!(matches!(merge(&old, patch), Err(AppError::Validation(_))));
    }

    #[test]
    fn description_can_be_cleared() {
        let mut old = stored("Standup");
        old.description = Some("agenda".into());
        let patch = EventPatch { description: Some(Some(String::new())), ..EventPatch::default() };

        let (next, diff) = merge(&old, patch).unwrap();
        assert_eq!(next.description, None);
        assert_eq!(diff.description, Some(Change(Some("agenda".into()), None)));
    }

    #[test]
    fn null_description_clears_but_absent_keeps() {
        let mut old = stored("Standup");
        old.description = Some("agenda".into());

        let cleared: EventPatch = serde_json::from_str(r#"{"description":null}"#).unwrap();
        assert_eq!(cleared.description, Some(None));
        let (next, diff) = merge(&old, cleared).unwrap();
        assert_eq!(next.description, None);
        assert_eq!(diff.description, Some(Change(Some("agenda".into()), None)));

        let untouched: EventPatch = serde_json::from_str(r#"{"title":"Standup"}"#).unwrap();
        assert_eq!(untouched.description, None);
        let (next, diff) = merge(&old, untouched).unwrap();
        assert_eq!(next.description, Some("agenda".into()));
        assert!(diff.is_empty());

        let body = r#"{"description":null,"modifiedBy":"00000000-0000-0000-0000-000000000000"}"#;
        let (patch, _) = serde_json::from_str::<UpdateEventRequest>(body).unwrap().into_parts();
        assert_eq!(patch.description, Some(None));
    }

    #[test]
    fn unknown_patch_fields_are_refused() {
        let body = r#"{"title":"x","createdBy":"00000000-0000-0000-0000-000000000000"}"#;
        assert!(serde_json::from_str::<EventPatch>(body).is_err());

        let nil = Uuid::nil();
        let body = format!(r#"{{"title":"x","modifiedBy":"{nil}","profiles":[]}}"#);
        assert!(serde_json::from_str::<UpdateEventRequest>(&body).is_err());
    }

    #[tokio::test]
    async fn persists_event_and_log_together() {
        let (store, locks, ana, event) = setup().await;

        let patch = EventPatch {
            title: Some("Daily standup".into()),
            end: Some("2024-06-01T09:30".into()),
            ..EventPatch::default()
        };
        let updated = update_event(&store, &locks, event.id, patch, ana.id).await.unwrap();

        assert_eq!(updated.title, "Daily standup");
        assert_eq!(updated.end_utc, utc("2024-06-01T09:30:00Z"));
        assert!(updated.update_at_utc >= event.update_at_utc);
        assert_eq!(store.find_event(event.id).await.unwrap(), Some(updated.clone()));

        let logs = get_event_logs(&store, event.id).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].event_triggered_by.id, ana.id);
        assert_eq!(logs[0].created_at_utc, updated.update_at_utc);
        assert_eq!(logs[0].diff.fields(), vec!["title", "endUTC"]);
    }

    #[tokio::test]
    async fn empty_diff_still_appends_an_entry() {
        let (store, locks, ana, event) = setup().await;

        update_event(&store, &locks, event.id, EventPatch::default(), ana.id).await.unwrap();

        let logs = get_event_logs(&store, event.id).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert!(logs[0].diff.is_empty());
    }

    #[tokio::test]
    async fn rejected_update_writes_nothing() {
        let (store, locks, ana, event) = setup().await;

        let patch = EventPatch {
            title: Some("Moved".into()),
            end: Some("2024-06-01T08:00".into()),
            ..EventPatch::default()
        };
        let err = update_event(&store, &locks, event.id, patch, ana.id).await.unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(store.find_event(event.id).await.unwrap(), Some(event.clone()));
        assert!(get_event_logs(&store, event.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_zone_in_patch_writes_nothing() {
        let (store, locks, ana, event) = setup().await;

        let patch = EventPatch {
            title: Some("Moved".into()),
            event_timezone: Some("Nowhere/Zone".into()),
            ..EventPatch::default()
        };
        let err = update_event(&store, &locks, event.id, patch, ana.id).await.unwrap_err();

        assert!(matches!(err, AppError::InvalidTimezone(ref zone) if zone == "Nowhere/Zone"));
        assert_eq!(store.find_event(event.id).await.unwrap(), Some(event.clone()));
        assert!(get_event_logs(&store, event.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreadable_wall_clock_in_patch_writes_nothing() {
        let (store, locks, ana, event) = setup().await;

        let patch = EventPatch {
            title: Some("Moved".into()),
            start: Some("half past two".into()),
            ..EventPatch::default()
        };
        let err = update_event(&store, &locks, event.id, patch, ana.id).await.unwrap_err();

        assert!(matches!(err, AppError::InvalidWallClock(ref raw) if raw == "half past two"));
        assert_eq!(store.find_event(event.id).await.unwrap(), Some(event.clone()));
        assert!(get_event_logs(&store, event.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_event_is_not_found() {
        let (store, locks, ana, _) = setup().await;
        let ghost = Uuid::now_v7();

        let err = update_event(&store, &locks, ghost, EventPatch::default(), ana.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { kind: "event", id } if id == ghost));
    }

    #[tokio::test]
    async fn outsiders_cannot_update() {
        let (store, locks, _, event) = setup().await;
        let bob = seed_profile(&store, "Bob", "UTC").await;

        let err = update_event(&store, &locks, event.id, EventPatch::default(), bob.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let ghost = Uuid::now_v7();
        let err = update_event(&store, &locks, event.id, EventPatch::default(), ghost)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { kind: "profile", .. }));
    }

    #[tokio::test]
    async fn concurrent_updates_diff_against_latest_state() {
        let (store, locks, ana, event) = setup().await;

        let (event_id, actor_id) = (event.id, ana.id);
        let mut tasks = Vec::new();
        for title in ["Alpha", "Beta"] {
            let (store, locks) = (store.clone(), locks.clone());
            let patch = EventPatch { title: Some(title.into()), ..EventPatch::default() };
            tasks.push(tokio::spawn(async move {
                update_event(&store, &locks, event_id, patch, actor_id).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        // newest first: each entry's "old" title is the "new" title of the one before it
        let logs = get_event_logs(&store, event.id).await.unwrap();
        let changes: Vec<_> = logs.iter().rev().map(|l| l.diff.title.clone().unwrap()).collect();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].before(), "Standup");
        assert_eq!(changes[1].before(), changes[0].after());

        let last = store.find_event(event.id).await.unwrap().unwrap();
        assert_eq!(&last.title, changes[1].after());
    }

    #[tokio::test]
    async fn log_entries_are_newest_first() {
        let (store, locks, ana, event) = setup().await;

        for minutes in [20, 25, 30] {
            let patch = EventPatch {
                end: Some(format!("2024-06-01T09:{minutes}")),
                ..EventPatch::default()
            };
            update_event(&store, &locks, event.id, patch, ana.id).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let logs = get_event_logs(&store, event.id).await.unwrap();
        let ends: Vec<_> = logs.iter().map(|l| l.diff.end_utc.clone().unwrap().1).collect();
        assert_eq!(
            ends,
            vec![
                utc("2024-06-01T09:30:00Z"),
                utc("2024-06-01T09:25:00Z"),
                utc("2024-06-01T09:20:00Z"),
            ]
        );
        assert!(logs.windows(2).all(|w| w[0].created_at_utc >= w[1].created_at_utc));
        assert_eq!(logs.last().unwrap().diff.end_utc.as_ref().unwrap().before(), &event.end_utc);
    }
}
