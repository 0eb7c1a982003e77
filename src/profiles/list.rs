use axum::{debug_handler, extract::State, Json};

use crate::{db::Profile, store::Store, AppResult, AppState};

/// All profiles in creation order.
pub async fn list_profiles(store: &Store) -> AppResult<Vec<Profile>> {
    Ok(store.all_profiles().await?)
}

#[debug_handler(state = AppState)]
pub(crate) async fn list(State(store): State<Store>) -> AppResult<Json<Vec<Profile>>> {
    Ok(Json(list_profiles(&store).await?))
}
