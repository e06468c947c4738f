use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A bare coordinate pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// The anchor point a capsule is tied to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Location {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// How a capsule becomes openable. A time capsule always carries its unlock
/// instant; the other strategies never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "unlock_method", rename_all = "lowercase")]
pub enum UnlockMethod {
    Immediate,
    Time { unlock_time: DateTime<Utc> },
    Location,
}

impl UnlockMethod {
    pub fn kind(&self) -> UnlockKind {
        match self {
            Self::Immediate => UnlockKind::Immediate,
            Self::Time { .. } => UnlockKind::Time,
            Self::Location => UnlockKind::Location,
        }
    }

    pub fn unlock_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Time { unlock_time } => Some(*unlock_time),
            _ => None,
        }
    }
}

/// The unlock strategy without its payload, as it appears in requests and
/// in the `unlock_method` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnlockKind {
    Immediate,
    Time,
    Location,
}

impl UnlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::Time => "time",
            Self::Location => "location",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "immediate" => Some(Self::Immediate),
            "time" => Some(Self::Time),
            "location" => Some(Self::Location),
            _ => None,
        }
    }
}

/// One-way lifecycle: `Sealed` becomes `Opened` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CapsuleStatus {
    Sealed,
    Opened { opened_at: DateTime<Utc> },
}

impl CapsuleStatus {
    pub fn is_opened(&self) -> bool {
        matches!(self, Self::Opened { .. })
    }

    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Opened { opened_at } => Some(*opened_at),
            Self::Sealed => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sealed => "sealed",
            Self::Opened { .. } => "opened",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capsule {
    pub id: Uuid,
    pub user_id: Uuid,
    pub creator_name: Option<String>,
    pub title: String,
    pub content: String,
    pub location: Location,
    #[serde(flatten)]
    pub unlock: UnlockMethod,
    pub media_urls: Vec<String>,
    #[serde(flatten)]
    pub status: CapsuleStatus,
    pub created_at: DateTime<Utc>,
}

impl Capsule {
    pub fn is_opened(&self) -> bool {
        self.status.is_opened()
    }
}

/// Caller-supplied fields for a new capsule, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCapsule {
    pub title: String,
    pub content: String,
    pub location: Location,
    pub unlock_method: UnlockKind,
    #[serde(default)]
    pub unlock_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub media_urls: Vec<String>,
}

/// The authenticated caller, passed explicitly into every store and handler
/// call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub user_id: Uuid,
    pub username: String,
}
