//! SQLite-backed entity store for profiles, events and their audit trail.
//!
//! Events reference profiles through `event_profiles`; log entries reference
//! both by id. Nothing is embedded, and log rows can only ever be inserted.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    types::Json,
    FromRow, SqlitePool,
};
use uuid::Uuid;

use crate::{
    db::{Actor, Event, EventLog, Profile},
    events::EventDiff,
    res::MIGRATIONS,
};

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

#[derive(FromRow)]
struct EventRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    event_timezone: String,
    start_utc: DateTime<Utc>,
    end_utc: DateTime<Utc>,
    created_at_utc: DateTime<Utc>,
    update_at_utc: DateTime<Utc>,
    created_by: Option<Uuid>,
}

impl EventRow {
    fn with_profiles<P>(self, profiles: Vec<P>) -> Event<P> {
        Event {
            id: self.id,
            title: self.title,
            description: self.description,
            profiles,
            event_timezone: self.event_timezone,
            start_utc: self.start_utc,
            end_utc: self.end_utc,
            created_at_utc: self.created_at_utc,
            update_at_utc: self.update_at_utc,
            created_by: self.created_by,
        }
    }
}

#[derive(FromRow)]
struct LogRow {
    id: Uuid,
    event_id: Uuid,
    diff: Json<EventDiff>,
    created_at_utc: DateTime<Utc>,
    actor_id: Uuid,
    actor_name: String,
    actor_timezone: String,
}

const EVENT_COLUMNS: &str = "e.id,e.title,e.description,e.event_timezone,\
    e.start_utc,e.end_utc,e.created_at_utc,e.update_at_utc,e.created_by";

impl Store {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// A private, migrated in-memory database. One connection, never recycled,
    /// so the data lives as long as the store.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        for (name, sql) in MIGRATIONS {
            tracing::debug!(migration = name, "applying migration");
            sqlx::raw_sql(sql).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn insert_profile(&self, profile: &Profile) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO profiles (id,name,timezone,created_at) VALUES (?,?,?,?)")
            .bind(profile.id)
            .bind(&profile.name)
            .bind(&profile.timezone)
            .bind(profile.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn all_profiles(&self) -> Result<Vec<Profile>, sqlx::Error> {
        sqlx::query_as("SELECT id,name,timezone,created_at FROM profiles ORDER BY created_at,rowid")
            .fetch_all(&self.pool)
            .await
    }

    pub async fn find_profile(&self, id: Uuid) -> Result<Option<Profile>, sqlx::Error> {
        sqlx::query_as("SELECT id,name,timezone,created_at FROM profiles WHERE id=?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Returns the updated row, or `None` if no profile has this id.
    pub async fn set_profile_timezone(
        &self,
        id: Uuid,
        timezone: &str,
    ) -> Result<Option<Profile>, sqlx::Error> {
        sqlx::query_as(
            "UPDATE profiles SET timezone=? WHERE id=? RETURNING id,name,timezone,created_at",
        )
        .bind(timezone)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn insert_event(&self, event: &Event) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO events (id,title,description,event_timezone,start_utc,end_utc,\
             created_at_utc,update_at_utc,created_by) VALUES (?,?,?,?,?,?,?,?,?)",
        )
        .bind(event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(&event.event_timezone)
        .bind(event.start_utc)
        .bind(event.end_utc)
        .bind(event.created_at_utc)
        .bind(event.update_at_utc)
        .bind(event.created_by)
        .execute(&mut *tx)
        .await?;

        for (position, profile_id) in event.profiles.iter().enumerate() {
            sqlx::query("INSERT INTO event_profiles (event_id,profile_id,position) VALUES (?,?,?)")
                .bind(event.id)
                .bind(profile_id)
                .bind(position as i64)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await
    }

    pub async fn find_event(&self, id: Uuid) -> Result<Option<Event>, sqlx::Error> {
        let Some(row): Option<EventRow> =
            sqlx::query_as(&format!("SELECT {EVENT_COLUMNS} FROM events e WHERE e.id=?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
        else {
            return Ok(None);
        };

        let profile_ids: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT profile_id FROM event_profiles WHERE event_id=? ORDER BY position",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(row.with_profiles(profile_ids.into_iter().map(|(id,)| id).collect())))
    }

    async fn assigned_profiles(&self, event_id: Uuid) -> Result<Vec<Profile>, sqlx::Error> {
        sqlx::query_as(
            "SELECT p.id,p.name,p.timezone,p.created_at FROM event_profiles ep \
             JOIN profiles p ON p.id=ep.profile_id \
             WHERE ep.event_id=? ORDER BY ep.position",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Events assigned to `profile_id`, oldest first, with profiles expanded.
    pub async fn events_for_profile(
        &self,
        profile_id: Uuid,
    ) -> Result<Vec<Event<Profile>>, sqlx::Error> {
        let rows: Vec<EventRow> = sqlx::query_as(&format!(
            "SELECT {EVENT_COLUMNS} FROM events e \
             JOIN event_profiles ep ON ep.event_id=e.id \
             WHERE ep.profile_id=? ORDER BY e.created_at_utc,e.rowid"
        ))
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let profiles = self.assigned_profiles(row.id).await?;
            events.push(row.with_profiles(profiles));
        }
        Ok(events)
    }

    /// Writes the mutated event and its audit entry together, or neither.
    pub async fn commit_update(&self, event: &Event, log: &EventLog) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE events SET title=?,description=?,event_timezone=?,\
             start_utc=?,end_utc=?,update_at_utc=? WHERE id=?",
        )
        .bind(&event.title)
        .bind(&event.description)
        .bind(&event.event_timezone)
        .bind(event.start_utc)
        .bind(event.end_utc)
        .bind(event.update_at_utc)
        .bind(event.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO event_logs (id,event_id,triggered_by,diff,created_at_utc) \
             VALUES (?,?,?,?,?)",
        )
        .bind(log.id)
        .bind(log.event_log_id)
        .bind(log.event_triggered_by)
        .bind(Json(&log.diff))
        .bind(log.created_at_utc)
        .execute(&mut *tx)
        .await?;

        tx.commit().await
    }

    /// Audit entries for one event, newest first, actor expanded.
    pub async fn logs_for_event(
        &self,
        event_id: Uuid,
    ) -> Result<Vec<EventLog<Actor>>, sqlx::Error> {
        let rows: Vec<LogRow> = sqlx::query_as(
            "SELECT l.id,l.event_id,l.diff,l.created_at_utc,\
             p.id AS actor_id,p.name AS actor_name,p.timezone AS actor_timezone \
             FROM event_logs l JOIN profiles p ON p.id=l.triggered_by \
             WHERE l.event_id=? ORDER BY l.created_at_utc DESC,l.rowid DESC",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| EventLog {
                id: row.id,
                event_log_id: row.event_id,
                event_triggered_by: Actor {
                    id: row.actor_id,
                    name: row.actor_name,
                    timezone: row.actor_timezone,
                },
                diff: row.diff.0,
                created_at_utc: row.created_at_utc,
            })
            .collect())
    }
}
