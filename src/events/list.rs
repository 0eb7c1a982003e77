use axum::{debug_handler, extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    appresult::QueryParams,
    db::{Event, Profile},
    store::Store,
    tz, AppError, AppResult, AppState,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListQuery {
    profile_id: Option<String>,
    tz: Option<String>,
}

/// Start and end as shown to a viewer in `timezone`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalTimes {
    pub timezone: String,
    pub start: String,
    pub end: String,
}

#[derive(Debug, Serialize)]
pub struct EventView {
    #[serde(flatten)]
    pub event: Event<Profile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalTimes>,
}

pub fn local_times<P>(event: &Event<P>, viewer_zone: &str) -> AppResult<LocalTimes> {
    Ok(LocalTimes {
        timezone: viewer_zone.to_owned(),
        start: tz::to_zoned_display(event.start_utc, viewer_zone)?,
        end: tz::to_zoned_display(event.end_utc, viewer_zone)?,
    })
}

/// Every event `profile_id` is assigned to, oldest first, with assigned profiles expanded.
pub async fn list_events_for_profile(
    store: &Store,
    profile_id: Uuid,
) -> AppResult<Vec<Event<Profile>>> {
    let events = store.events_for_profile(profile_id).await?;
    tracing::debug!(%profile_id, count = events.len(), "listed events");
    Ok(events)
}

fn required_profile_id(raw: Option<&str>) -> AppResult<Uuid> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(AppError::validation("profileId query parameter is required"));
    }
    Uuid::parse_str(raw)
        .map_err(|_| AppError::validation(format!("profileId {raw:?} is not a valid id")))
}

#[debug_handler(state = AppState)]
pub(crate) async fn list(
    State(store): State<Store>,
    QueryParams(ListQuery { profile_id, tz: viewer }): QueryParams<ListQuery>,
) -> AppResult<Json<Vec<EventView>>> {
    let profile_id = required_profile_id(profile_id.as_deref())?;
    if let Some(zone) = &viewer {
        tz::parse_zone(zone)?;
    }

    let views = list_events_for_profile(&store, profile_id)
        .await?
        .into_iter()
        .map(|event| -> AppResult<EventView> {
            let local = viewer.as_deref().map(|zone| local_times(&event, zone)).transpose()?;
            Ok(EventView { event, local })
        })
        .collect::<AppResult<Vec<_>>>()?;

    Ok(Json(views))
}
