use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{tz, AppResult};

/// Before/after values of one field. Serialized as `[old, new]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change<T>(pub T, pub T);

impl<T: PartialEq + Clone> Change<T> {
    /// `None` when nothing actually changed.
    pub fn if_changed(old: &T, new: &T) -> Option<Self> {
        (old != new).then(|| Change(old.clone(), new.clone()))
    }
}

impl<T> Change<T> {
    pub fn before(&self) -> &T {
        &self.0
    }

    pub fn after(&self) -> &T {
        &self.1
    }
}

/// The fields one update touched. Only these fields can ever appear in an
/// audit entry; anything else a client sends is rejected before it gets here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDiff {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<Change<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Change<Option<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_timezone: Option<Change<String>>,
    #[serde(rename = "startUTC", default, skip_serializing_if = "Option::is_none")]
    pub start_utc: Option<Change<DateTime<Utc>>>,
    #[serde(rename = "endUTC", default, skip_serializing_if = "Option::is_none")]
    pub end_utc: Option<Change<DateTime<Utc>>>,
}

/// A diff field prepared for display: instants already shown in the viewer's zone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffEntry {
    pub field: &'static str,
    pub old: Option<String>,
    pub new: Option<String>,
}

impl EventDiff {
    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    pub fn fields(&self) -> Vec<&'static str> {
        [
            ("title", self.title.is_some()),
            ("description", self.description.is_some()),
            ("eventTimezone", self.event_timezone.is_some()),
            ("startUTC", self.start_utc.is_some()),
            ("endUTC", self.end_utc.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, present)| present.then_some(name))
        .collect()
    }

    pub fn render(&self, viewer_zone: &str) -> AppResult<Vec<DiffEntry>> {
        let mut entries = Vec::new();

        if let Some(Change(old, new)) = &self.title {
            entries.push(DiffEntry {
                field: "title",
                old: Some(old.clone()),
                new: Some(new.clone()),
            });
        }
        if let Some(Change(old, new)) = &self.description {
            entries.push(DiffEntry { field: "description", old: old.clone(), new: new.clone() });
        }
        if let Some(Change(old, new)) = &self.event_timezone {
            entries.push(DiffEntry {
                field: "eventTimezone",
                old: Some(old.clone()),
                new: Some(new.clone()),
            });
        }
        for (field, change) in [("startUTC", &self.start_utc), ("endUTC", &self.end_utc)] {
            if let Some(Change(old, new)) = change {
                entries.push(DiffEntry {
                    field,
                    old: Some(tz::to_zoned_display(*old, viewer_zone)?),
                    new: Some(tz::to_zoned_display(*new, viewer_zone)?),
                });
            }
        }

        Ok(entries)
    }
}
