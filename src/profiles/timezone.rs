use axum::{debug_handler, extract::State, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    appresult::{JsonBody, PathParam},
    db::Profile,
    store::Store,
    tz, AppError, AppResult, AppState,
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimezoneUpdate {
    pub timezone: String,
}

/// Changes only the zone; returns the profile as it is now stored.
pub async fn update_profile_timezone(
    store: &Store,
    id: Uuid,
    timezone: &str,
) -> AppResult<Profile> {
    tz::parse_zone(timezone)?;

    let profile = store
        .set_profile_timezone(id, timezone)
        .await?
        .ok_or_else(|| AppError::profile_not_found(id))?;

    tracing::info!(profile_id = %id, %timezone, "profile timezone updated");
    Ok(profile)
}

#[debug_handler(state = AppState)]
pub(crate) async fn set_timezone(
    PathParam(id): PathParam<Uuid>,
    State(store): State<Store>,
    JsonBody(TimezoneUpdate { timezone }): JsonBody<TimezoneUpdate>,
) -> AppResult<Json<Profile>> {
    Ok(Json(update_profile_timezone(&store, id, &timezone).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::{create_profile, NewProfile};

    fn named_ana() -> NewProfile {
        NewProfile { name: "Ana".into(), timezone: None }
    }

    #[tokio::test]
    async fn returns_the_new_state() {
        let store = Store::in_memory().await.unwrap();
        let ana = create_profile(&store, named_ana()).await.unwrap();

        let updated = update_profile_timezone(&store, ana.id, "America/Los_Angeles").await.unwrap();
        assert_eq!(updated.timezone, "America/Los_Angeles");
        assert_eq!(updated.created_at, ana.created_at);
    }

    #[tokio::test]
    async fn validates_zone_and_id() {
        let store = Store::in_memory().await.unwrap();
        let ana = create_profile(&store, named_ana()).await.unwrap();

        assert!(matches!(
            update_profile_timezone(&store, ana.id, "Nowhere").await,
            Err(AppError::InvalidTimezone(_))
        ));
        assert!(matches!(
            update_profile_timezone(&store, Uuid::now_v7(), "UTC").await,
            Err(AppError::NotFound { .. })
        ));
        assert_eq!(store.find_profile(ana.id).await.unwrap().unwrap().timezone, "UTC");
    }
}
