use axum::{debug_handler, extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    appresult::{PathParam, QueryParams},
    db::{Actor, EventLog},
    store::Store,
    tz, AppResult, AppState,
};

use super::DiffEntry;

#[derive(Deserialize)]
pub(crate) struct LogsQuery {
    tz: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalLog {
    pub timezone: String,
    pub created_at: String,
    pub changes: Vec<DiffEntry>,
}

#[derive(Debug, Serialize)]
pub struct LogView {
    #[serde(flatten)]
    pub log: EventLog<Actor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalLog>,
}

impl LogView {
    pub fn new(log: EventLog<Actor>, viewer_zone: Option<&str>) -> AppResult<Self> {
        let local = match viewer_zone {
            Some(zone) => Some(LocalLog {
                timezone: zone.to_owned(),
                created_at: tz::to_zoned_display(log.created_at_utc, zone)?,
                changes: log.diff.render(zone)?,
            }),
            None => None,
        };
        Ok(Self { log, local })
    }
}

/// Audit trail of one event, newest first. An event without entries yields an empty list.
pub async fn get_event_logs(store: &Store, event_id: Uuid) -> AppResult<Vec<EventLog<Actor>>> {
    let logs = store.logs_for_event(event_id).await?;
    tracing::debug!(%event_id, count = logs.len(), "loaded event logs");
    Ok(logs)
}

#[debug_handler(state = AppState)]
pub(crate) async fn logs(
    State(store): State<Store>,
    PathParam(event_id): PathParam<Uuid>,
    QueryParams(LogsQuery { tz: viewer }): QueryParams<LogsQuery>,
) -> AppResult<Json<Vec<LogView>>> {
    if let Some(zone) = &viewer {
        tz::parse_zone(zone)?;
    }

    let views = get_event_logs(&store, event_id)
        .await?
        .into_iter()
        .map(|log| LogView::new(log, viewer.as_deref()))
        .collect::<AppResult<Vec<_>>>()?;

    Ok(Json(views))
}
