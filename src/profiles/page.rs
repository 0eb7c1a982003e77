use axum::{debug_handler, extract::State, Json};
use uuid::Uuid;

use crate::{appresult::PathParam, db::Profile, store::Store, AppError, AppResult, AppState};

pub async fn find_profile(store: &Store, id: Uuid) -> AppResult<Profile> {
    store
        .find_profile(id)
        .await?
        .ok_or_else(|| AppError::profile_not_found(id))
}

#[debug_handler(state = AppState)]
pub(crate) async fn profile(
    PathParam(id): PathParam<Uuid>,
    State(store): State<Store>,
) -> AppResult<Json<Profile>> {
    Ok(Json(find_profile(&store, id).await?))
}
