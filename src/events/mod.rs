mod create;
mod diff;
mod list;
mod locks;
mod logs;
mod update;

use axum::{routing::{get, patch, post}, Router};
use chrono::{DateTime, Utc};

use crate::{AppError, AppResult, AppState};

pub use create::{create_event, NewEvent};
pub use diff::{Change, DiffEntry, EventDiff};
pub use list::{list_events_for_profile, local_times, EventView, LocalTimes};
pub use locks::EventLocks;
pub use logs::{get_event_logs, LocalLog, LogView};
pub use update::{update_event, EventPatch, UpdateEventRequest};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list::list))
        .route("/create", post(create::create))
        .route("/update/{id}", patch(update::update))
        .route("/{event_id}/logs", get(logs::logs))
}

fn required_title(title: &str) -> AppResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::validation("title must not be empty"));
    }
    Ok(title.to_owned())
}

// blank means "no description"
fn normalize_description(description: Option<String>) -> Option<String> {
    description.filter(|d| !d.trim().is_empty())
}

fn ensure_ordered(start_utc: DateTime<Utc>, end_utc: DateTime<Utc>) -> AppResult<()> {
    if end_utc <= start_utc {
        return Err(AppError::validation("end before start"));
    }
    Ok(())
}
