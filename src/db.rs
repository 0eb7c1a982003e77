use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::events::EventDiff;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
    pub timezone: String,
    pub created_at: DateTime<Utc>,
}

/// Who performed a mutation, as shown next to an audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub name: String,
    pub timezone: String,
}

/// `P` is how assigned profiles are carried: bare ids, or expanded [`Profile`]s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event<P = Uuid> {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub profiles: Vec<P>,
    pub event_timezone: String,
    #[serde(rename = "startUTC")]
    pub start_utc: DateTime<Utc>,
    #[serde(rename = "endUTC")]
    pub end_utc: DateTime<Utc>,
    #[serde(rename = "createdAtUTC")]
    pub created_at_utc: DateTime<Utc>,
    #[serde(rename = "updateAtUTC")]
    pub update_at_utc: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

impl Event<Uuid> {
    pub fn is_assigned(&self, profile_id: Uuid) -> bool {
        self.profiles.contains(&profile_id)
    }
}

/// One append-only audit record. `A` is the actor: a bare id or an expanded [`Actor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLog<A = Uuid> {
    pub id: Uuid,
    #[serde(rename = "eventLogID")]
    pub event_log_id: Uuid,
    pub event_triggered_by: A,
    pub diff: EventDiff,
    #[serde(rename = "createdAtUTC")]
    pub created_at_utc: DateTime<Utc>,
}
