use capsule_types::models::Capsule;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;
use uuid::Uuid;

use crate::Database;
use crate::error::StoreError;
use crate::models::{CAPSULE_COLUMNS, CapsuleRow, MediaRow, UserRow};
use crate::repository::{CapsuleRepository, OpenOutcome};

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, username: &str, password_hash: &str) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password) VALUES (?1, ?2, ?3)",
                (id, username, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>, StoreError> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    // -- Media --

    pub fn insert_media(&self, row: &MediaRow) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO media (id, user_id, size, sha256, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![row.id, row.user_id, row.size, row.sha256, row.created_at],
            )?;
            Ok(())
        })
    }

    /// Who uploaded the blob, if it is known at all.
    pub fn media_owner(&self, id: Uuid) -> Result<Option<Uuid>, StoreError> {
        let owner: Option<String> = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT user_id FROM media WHERE id = ?1",
                    [id.to_string()],
                    |r| r.get(0),
                )
                .optional()?)
        })?;

        owner
            .map(|s| {
                Uuid::parse_str(&s).map_err(|e| StoreError::Corrupt {
                    id: id.to_string(),
                    reason: format!("media user_id: {}", e),
                })
            })
            .transpose()
    }

    /// Forget the blob behind `url` when `owner` uploaded it and no capsule
    /// references `url` any more. Returns whether the caller may now remove
    /// the bytes.
    pub fn release_media(&self, id: Uuid, owner: Uuid, url: &str) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM media
                 WHERE id = ?1 AND user_id = ?2
                   AND NOT EXISTS (
                       SELECT 1 FROM capsules, json_each(capsules.media_urls) AS m
                       WHERE m.value = ?3
                   )",
                params![id.to_string(), owner.to_string(), url],
            )?;
            Ok(changed == 1)
        })
    }
}

impl CapsuleRepository for Database {
    fn insert(&self, capsule: &Capsule) -> Result<(), StoreError> {
        let row = CapsuleRow::from_capsule(capsule)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO capsules (id, user_id, creator_name, title, content, latitude, longitude,
                                       location_name, unlock_method, unlock_time, media_urls, status,
                                       created_at, opened_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    row.id,
                    row.user_id,
                    row.creator_name,
                    row.title,
                    row.content,
                    row.latitude,
                    row.longitude,
                    row.location_name,
                    row.unlock_method,
                    row.unlock_time,
                    row.media_urls,
                    row.status,
                    row.created_at,
                    row.opened_at,
                ],
            )?;
            Ok(())
        })
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<Capsule>, StoreError> {
        let row = self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM capsules WHERE id = ?1", CAPSULE_COLUMNS);
            Ok(conn
                .query_row(&sql, [id.to_string()], CapsuleRow::from_row)
                .optional()?)
        })?;

        row.map(Capsule::try_from).transpose()
    }

    fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Capsule>, StoreError> {
        let rows = self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM capsules WHERE user_id = ?1 ORDER BY created_at DESC, seq ASC",
                CAPSULE_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id.to_string()], CapsuleRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        rows.into_iter().map(Capsule::try_from).collect()
    }

    fn mark_opened(&self, id: Uuid, at: DateTime<Utc>) -> Result<OpenOutcome, StoreError> {
        let id = id.to_string();
        self.with_conn(|conn| {
            // The status predicate is the compare-and-swap: exactly one caller
            // sees a changed row.
            let changed = conn.execute(
                "UPDATE capsules SET status = 'opened', opened_at = ?2
                 WHERE id = ?1 AND status = 'sealed'",
                params![id, at.timestamp_millis()],
            )?;

            if changed == 1 {
                return Ok(OpenOutcome::Transitioned { opened_at: at });
            }

            let exists = conn
                .query_row("SELECT 1 FROM capsules WHERE id = ?1", [&id], |_| Ok(()))
                .optional()?
                .is_some();

            if exists {
                debug!("Capsule {} already opened", id);
                Ok(OpenOutcome::AlreadyOpened)
            } else {
                Err(StoreError::NotFound)
            }
        })
    }

    fn delete_by_id(&self, id: Uuid) -> Result<Option<Capsule>, StoreError> {
        let row = self.with_conn(|conn| {
            let sql = format!("DELETE FROM capsules WHERE id = ?1 RETURNING {}", CAPSULE_COLUMNS);
            Ok(conn
                .query_row(&sql, [id.to_string()], CapsuleRow::from_row)
                .optional()?)
        })?;

        row.map(Capsule::try_from).transpose()
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>, StoreError> {
    let sql = format!(
        "SELECT id, username, password, created_at FROM users WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn users_are_found_by_name() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u-1", "ana", "hash").unwrap();

        let by_name = db.get_user_by_username("ana").unwrap().unwrap();
        assert_eq!(by_name.id, "u-1");
        assert_eq!(by_name.password, "hash");

        assert!(db.get_user_by_username("bo").unwrap().is_none());
    }

    fn media_row(id: Uuid, owner: Uuid) -> MediaRow {
        MediaRow {
            id: id.to_string(),
            user_id: owner.to_string(),
            size: 5,
            sha256: "ab".into(),
            created_at: 0,
        }
    }

    fn capsule_with_media(owner: Uuid, url: &str) -> Capsule {
        use capsule_types::models::{CapsuleStatus, Location, UnlockMethod};
        Capsule {
            id: Uuid::new_v4(),
            user_id: owner,
            creator_name: None,
            title: "t".into(),
            content: "c".into(),
            location: Location {
                latitude: 0.0,
                longitude: 0.0,
                name: None,
            },
            unlock: UnlockMethod::Immediate,
            media_urls: vec![url.to_string()],
            status: CapsuleStatus::Sealed,
            created_at: DateTime::from_timestamp_millis(0).unwrap(),
        }
    }

    #[test]
    fn media_owner_is_recorded() {
        let db = Database::open_in_memory().unwrap();
        let (id, owner) = (Uuid::new_v4(), Uuid::new_v4());
        db.insert_media(&media_row(id, owner)).unwrap();

        assert_eq!(db.media_owner(id).unwrap(), Some(owner));
        assert_eq!(db.media_owner(Uuid::new_v4()).unwrap(), None);
    }

    #[test]
    fn media_is_released_only_by_its_owner_once_unreferenced() {
        let db = Database::open_in_memory().unwrap();
        let (id, owner) = (Uuid::new_v4(), Uuid::new_v4());
        let url = format!("/media/{}", id);
        db.insert_media(&media_row(id, owner)).unwrap();

        let capsule = capsule_with_media(owner, &url);
        db.insert(&capsule).unwrap();

        // Still referenced.
        assert!(!db.release_media(id, owner, &url).unwrap());

        db.delete_by_id(capsule.id).unwrap();
        // Someone else.
        assert!(!db.release_media(id, Uuid::new_v4(), &url).unwrap());

        assert!(db.release_media(id, owner, &url).unwrap());
        assert_eq!(db.media_owner(id).unwrap(), None);
        assert!(!db.release_media(id, owner, &url).unwrap());
    }

    #[test]
    fn duplicate_username_is_a_conflict() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u-1", "ana", "hash").unwrap();
        let err = db.create_user("u-2", "ana", "hash").unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn mark_opened_on_unknown_id_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let err = db.mark_opened(Uuid::new_v4(), Utc::now()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[test]
    fn delete_on_unknown_id_returns_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.delete_by_id(Uuid::new_v4()).unwrap().is_none());
    }
}
