use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Capsule, CapsuleStatus, GeoPoint, Location, UnlockMethod};

// -- JWT Claims --

/// JWT claims issued by `/auth/*` and checked by the bearer middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

// -- Capsules --

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateCapsuleResponse {
    pub id: Uuid,
}

/// A capsule as shown to its owner. Content and media stay hidden until the
/// capsule has been opened.
#[derive(Debug, Serialize, Deserialize)]
pub struct CapsuleView {
    pub id: Uuid,
    pub creator_name: Option<String>,
    pub title: String,
    pub content: Option<String>,
    pub location: Location,
    #[serde(flatten)]
    pub unlock: UnlockMethod,
    pub media_urls: Vec<String>,
    #[serde(flatten)]
    pub status: CapsuleStatus,
    pub created_at: DateTime<Utc>,
}

impl From<Capsule> for CapsuleView {
    fn from(c: Capsule) -> Self {
        let opened = c.is_opened();
        Self {
            id: c.id,
            creator_name: c.creator_name,
            title: c.title,
            content: opened.then_some(c.content),
            location: c.location,
            unlock: c.unlock,
            media_urls: if opened { c.media_urls } else { Vec::new() },
            status: c.status,
            created_at: c.created_at,
        }
    }
}

/// Optional current position for eligibility checks.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PositionRequest {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Fail with 409 instead of succeeding when the capsule was already open.
    #[serde(default)]
    pub expect_sealed: bool,
}

impl PositionRequest {
    /// A position counts only when both coordinates are present.
    pub fn position(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnlockCheckResponse {
    pub can_open: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OpenCapsuleResponse {
    /// True only for the call that performed the sealed -> opened transition.
    pub transitioned: bool,
    pub opened_at: Option<DateTime<Utc>>,
    pub message: String,
    pub capsule: CapsuleView,
}

// -- Media --

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub url: String,
    pub size: u64,
    pub sha256: String,
}
