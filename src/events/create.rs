use axum::{debug_handler, extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::{appresult::JsonBody, db::Event, store::Store, tz, AppError, AppResult, AppState};

use super::{ensure_ordered, normalize_description, required_title};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub profiles: Vec<Uuid>,
    pub event_timezone: String,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub created_by: Option<Uuid>,
}

/// Validates everything, then persists. Nothing is written on failure.
pub async fn create_event(store: &Store, input: NewEvent) -> AppResult<Event> {
    let title = required_title(&input.title)?;

    let mut profiles: Vec<Uuid> = Vec::with_capacity(input.profiles.len());
    for id in input.profiles {
        if !profiles.contains(&id) {
            profiles.push(id);
        }
    }
    if profiles.is_empty() {
        return Err(AppError::validation("an event needs at least one assigned profile"));
    }

    let start_utc = tz::to_absolute_instant(&input.start, &input.event_timezone)?;
    let end_utc = tz::to_absolute_instant(&input.end, &input.event_timezone)?;
    ensure_ordered(start_utc, end_utc)?;

    for &id in profiles.iter().chain(input.created_by.iter()) {
        if store.find_profile(id).await?.is_none() {
            return Err(AppError::profile_not_found(id));
        }
    }

    let now = Utc::now();
    let event = Event {
        id: Uuid::now_v7(),
        title,
        description: normalize_description(input.description),
        profiles,
        event_timezone: input.event_timezone,
        start_utc,
        end_utc,
        created_at_utc: now,
        update_at_utc: now,
        created_by: input.created_by,
    };
    store.insert_event(&event).await?;

    tracing::info!(event_id = %event.id, profiles = event.profiles.len(), "event created");
    Ok(event)
}

#[debug_handler(state = AppState)]
pub(crate) async fn create(
    State(store): State<Store>,
    JsonBody(input): JsonBody<NewEvent>,
) -> AppResult<(StatusCode, Json<Event>)> {
    let event = create_event(&store, input).await?;
    Ok((StatusCode::CREATED, Json(event)))
}
