use axum::{debug_handler, extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    appresult::JsonBody,
    db::Profile,
    store::Store,
    tz, AppError, AppResult, AppState,
};

#[derive(Debug, Clone, Deserialize)]
pub struct NewProfile {
    pub name: String,
    #[serde(default)]
    pub timezone: Option<String>,
}

pub async fn create_profile(
    store: &Store,
    NewProfile { name, timezone }: NewProfile,
) -> AppResult<Profile> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::validation("name must not be empty"));
    }

    let timezone = timezone.unwrap_or_else(|| tz::DEFAULT_ZONE.to_owned());
    tz::parse_zone(&timezone)?;

    let profile = Profile {
        id: Uuid::now_v7(),
        name: name.to_owned(),
        timezone,
        created_at: Utc::now(),
    };
    store.insert_profile(&profile).await?;

    tracing::info!(profile_id = %profile.id, timezone = %profile.timezone, "profile created");
    Ok(profile)
}

#[debug_handler(state = AppState)]
pub(crate) async fn new_profile(
    State(store): State<Store>,
    JsonBody(input): JsonBody<NewProfile>,
) -> AppResult<(StatusCode, Json<Profile>)> {
    let profile = create_profile(&store, input).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}
