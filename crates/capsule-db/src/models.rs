//! Database row types. These map directly to SQLite rows and are converted
//! into `capsule-types` entities through a checked `TryFrom`.

use capsule_types::models::{Capsule, CapsuleStatus, Location, UnlockKind, UnlockMethod};
use chrono::{DateTime, Utc};
use rusqlite::Row;
use uuid::Uuid;

use crate::error::StoreError;

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub created_at: String,
}

pub struct MediaRow {
    pub id: String,
    pub user_id: String,
    pub size: i64,
    pub sha256: String,
    /// Unix milliseconds.
    pub created_at: i64,
}

/// Column list shared by every capsule SELECT, in `CapsuleRow::from_row` order.
pub const CAPSULE_COLUMNS: &str = "id, user_id, creator_name, title, content, latitude, longitude, \
     location_name, unlock_method, unlock_time, media_urls, status, created_at, opened_at";

#[derive(Debug, Clone)]
pub struct CapsuleRow {
    pub id: String,
    pub user_id: String,
    pub creator_name: Option<String>,
    pub title: String,
    pub content: String,
    pub latitude: f64,
    pub longitude: f64,
    pub location_name: Option<String>,
    pub unlock_method: String,
    pub unlock_time: Option<i64>,
    pub media_urls: String,
    pub status: String,
    pub created_at: i64,
    pub opened_at: Option<i64>,
}

impl CapsuleRow {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            creator_name: row.get(2)?,
            title: row.get(3)?,
            content: row.get(4)?,
            latitude: row.get(5)?,
            longitude: row.get(6)?,
            location_name: row.get(7)?,
            unlock_method: row.get(8)?,
            unlock_time: row.get(9)?,
            media_urls: row.get(10)?,
            status: row.get(11)?,
            created_at: row.get(12)?,
            opened_at: row.get(13)?,
        })
    }

    pub fn from_capsule(c: &Capsule) -> Result<Self, StoreError> {
        let media_urls = serde_json::to_string(&c.media_urls)
            .map_err(|e| StoreError::Internal(format!("encode media_urls: {}", e)))?;

        Ok(Self {
            id: c.id.to_string(),
            user_id: c.user_id.to_string(),
            creator_name: c.creator_name.clone(),
            title: c.title.clone(),
            content: c.content.clone(),
            latitude: c.location.latitude,
            longitude: c.location.longitude,
            location_name: c.location.name.clone(),
            unlock_method: c.unlock.kind().as_str().to_string(),
            unlock_time: c.unlock.unlock_time().map(|t| t.timestamp_millis()),
            media_urls,
            status: c.status.as_str().to_string(),
            created_at: c.created_at.timestamp_millis(),
            opened_at: c.status.opened_at().map(|t| t.timestamp_millis()),
        })
    }
}

impl TryFrom<CapsuleRow> for Capsule {
    type Error = StoreError;

    fn try_from(row: CapsuleRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| StoreError::Corrupt {
            id: row.id.clone(),
            reason,
        };

        let id = Uuid::parse_str(&row.id).map_err(|e| corrupt(format!("id: {}", e)))?;
        let user_id =
            Uuid::parse_str(&row.user_id).map_err(|e| corrupt(format!("user_id: {}", e)))?;

        let kind = UnlockKind::parse(&row.unlock_method)
            .ok_or_else(|| corrupt(format!("unknown unlock_method '{}'", row.unlock_method)))?;
        let unlock = match (kind, row.unlock_time) {
            (UnlockKind::Immediate, None) => UnlockMethod::Immediate,
            (UnlockKind::Location, None) => UnlockMethod::Location,
            (UnlockKind::Time, Some(ms)) => UnlockMethod::Time {
                unlock_time: millis(ms).ok_or_else(|| corrupt("unlock_time out of range".into()))?,
            },
            (UnlockKind::Time, None) => return Err(corrupt("time capsule without unlock_time".into())),
            (_, Some(_)) => return Err(corrupt("unlock_time on a non-time capsule".into())),
        };

        let status = match (row.status.as_str(), row.opened_at) {
            ("sealed", None) => CapsuleStatus::Sealed,
            ("opened", Some(ms)) => CapsuleStatus::Opened {
                opened_at: millis(ms).ok_or_else(|| corrupt("opened_at out of range".into()))?,
            },
            (status, opened_at) => {
                return Err(corrupt(format!(
                    "status '{}' inconsistent with opened_at {:?}",
                    status, opened_at
                )));
            }
        };

        let media_urls: Vec<String> = serde_json::from_str(&row.media_urls)
            .map_err(|e| corrupt(format!("media_urls: {}", e)))?;

        let created_at =
            millis(row.created_at).ok_or_else(|| corrupt("created_at out of range".into()))?;

        Ok(Capsule {
            id,
            user_id,
            creator_name: row.creator_name,
            title: row.title,
            content: row.content,
            location: Location {
                latitude: row.latitude,
                longitude: row.longitude,
                name: row.location_name,
            },
            unlock,
            media_urls,
            status,
            created_at,
        })
    }
}

fn millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> CapsuleRow {
        CapsuleRow {
            id: Uuid::new_v4().to_string(),
            user_id: Uuid::new_v4().to_string(),
            creator_name: None,
            title: "t".into(),
            content: "c".into(),
            latitude: 10.0,
            longitude: 20.0,
            location_name: Some("pier".into()),
            unlock_method: "time".into(),
            unlock_time: Some(1_700_000_000_123),
            media_urls: r#"["/media/x"]"#.into(),
            status: "sealed".into(),
            created_at: 1_690_000_000_000,
            opened_at: None,
        }
    }

    #[test]
    fn valid_row_converts() {
        let capsule = Capsule::try_from(row()).unwrap();
        assert_eq!(
            capsule.unlock.unlock_time().map(|t| t.timestamp_millis()),
            Some(1_700_000_000_123)
        );
        assert_eq!(capsule.media_urls, vec!["/media/x".to_string()]);
        assert_eq!(capsule.status, CapsuleStatus::Sealed);
    }

    #[test]
    fn row_round_trips_through_capsule() {
        let capsule = Capsule::try_from(row()).unwrap();
        let back = CapsuleRow::from_capsule(&capsule).unwrap();
        assert_eq!(Capsule::try_from(back).unwrap(), capsule);
    }

    #[test]
    fn time_row_without_unlock_time_is_corrupt() {
        let mut r = row();
        r.unlock_time = None;
        assert!(matches!(Capsule::try_from(r), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn opened_row_without_timestamp_is_corrupt() {
        let mut r = row();
        r.status = "opened".into();
        assert!(matches!(Capsule::try_from(r), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn unknown_method_is_corrupt() {
        let mut r = row();
        r.unlock_method = "geofence".into();
        assert!(matches!(Capsule::try_from(r), Err(StoreError::Corrupt { .. })));
    }
}
