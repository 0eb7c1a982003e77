mod list;
mod new;
mod page;
mod timezone;

use axum::{routing::{get, post}, Router};

use crate::AppState;

pub use list::list_profiles;
pub use new::{create_profile, NewProfile};
pub use page::find_profile;
pub use timezone::{update_profile_timezone, TimezoneUpdate};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list::list))
        .route("/create", post(new::new_profile))
        .route("/{id}", get(page::profile).patch(timezone::set_timezone))
}
