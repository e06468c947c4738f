use std::path::PathBuf;

use anyhow::Result;
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use bytes::Bytes;
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

use capsule_db::models::MediaRow;
use capsule_db::{Database, StoreError};
use capsule_types::api::UploadResponse;
use capsule_types::models::RequestContext;

use crate::error::ApiError;
use crate::state::{AppState, blocking};

/// 25 MB upload limit for a capsule attachment
pub const MAX_MEDIA_BYTES: usize = 25 * 1024 * 1024;

const URL_PREFIX: &str = "/media/";

/// A blob written to local storage.
#[derive(Debug, Clone)]
pub struct StoredMedia {
    pub id: Uuid,
    pub url: String,
    pub size: u64,
    pub sha256: String,
}

/// On-disk media storage. Each blob lives at `{dir}/{uuid}` and is addressed
/// by the opaque URL `/media/{uuid}`.
pub struct MediaStore {
    dir: PathBuf,
}

impl MediaStore {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Media storage directory: {}", dir.display());
        Ok(Self { dir })
    }

    fn path(&self, id: Uuid) -> PathBuf {
        self.dir.join(id.to_string())
    }

    /// The media id behind a URL this store issued. Anything else, including
    /// path tricks, yields `None`.
    pub fn id_from_url(url: &str) -> Option<Uuid> {
        url.strip_prefix(URL_PREFIX)?.parse().ok()
    }

    pub async fn put(&self, data: &[u8]) -> Result<StoredMedia> {
        let id = Uuid::new_v4();
        fs::write(self.path(id), data).await?;

        Ok(StoredMedia {
            id,
            url: format!("{}{}", URL_PREFIX, id),
            size: data.len() as u64,
            sha256: hex::encode(Sha256::digest(data)),
        })
    }

    pub async fn read(&self, id: Uuid) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path(id)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove the bytes of a blob. A blob that is already gone is fine.
    pub async fn remove(&self, id: Uuid) -> Result<()> {
        match fs::remove_file(self.path(id)).await {
            Ok(()) => {
                info!("Deleted media {}", id);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Media {} already gone", id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Every URL must name a blob the caller uploaded.
pub fn check_attachable(
    db: &Database,
    ctx: &RequestContext,
    urls: &[String],
) -> Result<(), StoreError> {
    for url in urls {
        let owner = match MediaStore::id_from_url(url) {
            Some(id) => db.media_owner(id)?,
            None => None,
        };
        match owner {
            Some(owner) if owner == ctx.user_id => {}
            Some(_) => {
                warn!("User {} tried to attach media {} they do not own", ctx.user_id, url);
                return Err(StoreError::Permission);
            }
            None => return Err(StoreError::Validation(format!("unknown media url '{}'", url))),
        }
    }
    Ok(())
}

/// POST /media: accepts raw bytes (application/octet-stream), stores them
/// and returns the opaque URL to reference from a capsule.
pub async fn upload_media(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("empty upload".into()));
    }
    if body.len() > MAX_MEDIA_BYTES {
        return Err(ApiError::PayloadTooLarge);
    }

    let stored = state.media.put(&body).await?;

    let row = MediaRow {
        id: stored.id.to_string(),
        user_id: ctx.user_id.to_string(),
        size: stored.size as i64,
        sha256: stored.sha256.clone(),
        created_at: state.store.now().timestamp_millis(),
    };
    if let Err(e) = blocking(&state, move |s| Ok(s.db.insert_media(&row)?)).await {
        if let Err(cleanup) = state.media.remove(stored.id).await {
            warn!("Orphaned media {} after failed upload: {:#}", stored.id, cleanup);
        }
        return Err(e);
    }

    info!("Media {} uploaded by {} ({} bytes)", stored.id, ctx.user_id, stored.size);

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            url: stored.url,
            size: stored.size,
            sha256: stored.sha256,
        }),
    ))
}

/// GET /media/{media_id}: only the uploader may read a blob.
pub async fn download_media(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(media_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    // A UUID id keeps the lookup inside the media directory.
    let id: Uuid = media_id
        .parse()
        .map_err(|_| ApiError::BadRequest("invalid media id".into()))?;

    let owner = blocking(&state, move |s| Ok(s.db.media_owner(id)?))
        .await?
        .ok_or(StoreError::NotFound)?;
    if owner != ctx.user_id {
        warn!("User {} tried to read media {}", ctx.user_id, id);
        return Err(StoreError::Permission.into());
    }

    let bytes = state.media.read(id).await?.ok_or(StoreError::NotFound)?;

    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_read_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path().join("media")).await.unwrap();

        let stored = store.put(b"hello").await.unwrap();
        assert_eq!(stored.size, 5);
        assert_eq!(
            stored.sha256,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(MediaStore::id_from_url(&stored.url), Some(stored.id));
        assert_eq!(store.read(stored.id).await.unwrap().as_deref(), Some(&b"hello"[..]));

        store.remove(stored.id).await.unwrap();
        assert!(store.read(stored.id).await.unwrap().is_none());

        // Second removal is a no-op.
        store.remove(stored.id).await.unwrap();
    }

    #[test]
    fn only_own_uploads_are_attachable() {
        let db = Database::open_in_memory().unwrap();
        let alice = RequestContext {
            user_id: Uuid::new_v4(),
            username: "alice".into(),
        };
        let bob = RequestContext {
            user_id: Uuid::new_v4(),
            username: "bob".into(),
        };
        let id = Uuid::new_v4();
        db.insert_media(&MediaRow {
            id: id.to_string(),
            user_id: alice.user_id.to_string(),
            size: 1,
            sha256: String::new(),
            created_at: 0,
        })
        .unwrap();
        let urls = vec![format!("{}{}", URL_PREFIX, id)];

        assert!(check_attachable(&db, &alice, &urls).is_ok());
        assert!(matches!(check_attachable(&db, &bob, &urls), Err(StoreError::Permission)));
        assert!(matches!(
            check_attachable(&db, &alice, &["https://cdn.example.com/x.jpg".into()]),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            check_attachable(&db, &alice, &[format!("{}{}", URL_PREFIX, Uuid::new_v4())]),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn foreign_urls_have_no_id() {
        assert_eq!(MediaStore::id_from_url("/media/../etc/passwd"), None);
        assert_eq!(MediaStore::id_from_url("https://cdn.example.com/x.jpg"), None);
    }
}
