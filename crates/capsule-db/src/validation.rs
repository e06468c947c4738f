use capsule_types::models::{Location, NewCapsule, UnlockKind, UnlockMethod};
use chrono::{DateTime, SubsecRound, Utc};

use crate::error::StoreError;

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_CONTENT_CHARS: usize = 20_000;
pub const MAX_LOCATION_NAME_CHARS: usize = 200;
/// A capsule holds at most one media attachment.
pub const MAX_MEDIA_URLS: usize = 1;

/// The checked, immutable part of a capsule.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidCapsule {
    pub title: String,
    pub content: String,
    pub location: Location,
    pub unlock: UnlockMethod,
    pub media_urls: Vec<String>,
}

/// Check caller input against the capsule rules. `now` is the creation
/// instant; a time capsule must unlock strictly after it.
pub fn validate_new_capsule(fields: NewCapsule, now: DateTime<Utc>) -> Result<ValidCapsule, StoreError> {
    check_text("title", &fields.title, MAX_TITLE_CHARS)?;
    check_text("content", &fields.content, MAX_CONTENT_CHARS)?;
    check_location(&fields.location)?;

    let unlock = match (fields.unlock_method, fields.unlock_time) {
        (UnlockKind::Time, None) => return Err(invalid("unlock_time is required for time capsules")),
        (UnlockKind::Time, Some(unlock_time)) if unlock_time <= now => {
            return Err(invalid("unlock_time must be in the future"));
        }
        (UnlockKind::Time, Some(unlock_time)) => UnlockMethod::Time {
            unlock_time: unlock_time.trunc_subsecs(3),
        },
        (_, Some(_)) => return Err(invalid("unlock_time is only allowed for time capsules")),
        (UnlockKind::Immediate, None) => UnlockMethod::Immediate,
        (UnlockKind::Location, None) => UnlockMethod::Location,
    };

    if fields.media_urls.len() > MAX_MEDIA_URLS {
        return Err(invalid(format!(
            "at most {} media attachment allowed",
            MAX_MEDIA_URLS
        )));
    }
    if fields.media_urls.iter().any(|u| u.trim().is_empty()) {
        return Err(invalid("media url must not be empty"));
    }

    Ok(ValidCapsule {
        title: fields.title,
        content: fields.content,
        location: fields.location,
        unlock,
        media_urls: fields.media_urls,
    })
}

fn check_text(field: &str, value: &str, max_chars: usize) -> Result<(), StoreError> {
    if value.trim().is_empty() {
        return Err(invalid(format!("{} must not be empty", field)));
    }
    if value.chars().count() > max_chars {
        return Err(invalid(format!("{} exceeds {} characters", field, max_chars)));
    }
    Ok(())
}

fn check_location(location: &Location) -> Result<(), StoreError> {
    let Location {
        latitude,
        longitude,
        name,
    } = location;

    if !latitude.is_finite() || !(-90.0..=90.0).contains(latitude) {
        return Err(invalid(format!("latitude {} is outside -90..90", latitude)));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(longitude) {
        return Err(invalid(format!("longitude {} is outside -180..180", longitude)));
    }
    if let Some(name) = name {
        if name.chars().count() > MAX_LOCATION_NAME_CHARS {
            return Err(invalid(format!(
                "location name exceeds {} characters",
                MAX_LOCATION_NAME_CHARS
            )));
        }
    }
    Ok(())
}

fn invalid(msg: impl Into<String>) -> StoreError {
    StoreError::Validation(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    fn fields(unlock_method: UnlockKind, unlock_time: Option<DateTime<Utc>>) -> NewCapsule {
        NewCapsule {
            title: "First apartment".into(),
            content: "Keys under the mat".into(),
            location: Location {
                latitude: 52.52,
                longitude: 13.405,
                name: Some("Berlin".into()),
            },
            unlock_method,
            unlock_time,
            media_urls: vec![],
        }
    }

    fn reason(result: Result<ValidCapsule, StoreError>) -> String {
        match result {
            Err(StoreError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn accepts_each_unlock_method() {
        let later = now() + Duration::days(7);
        let v = validate_new_capsule(fields(UnlockKind::Time, Some(later)), now()).unwrap();
        assert_eq!(v.unlock, UnlockMethod::Time { unlock_time: later });

        let v = validate_new_capsule(fields(UnlockKind::Location, None), now()).unwrap();
        assert_eq!(v.unlock, UnlockMethod::Location);

        let v = validate_new_capsule(fields(UnlockKind::Immediate, None), now()).unwrap();
        assert_eq!(v.unlock, UnlockMethod::Immediate);
    }

    #[test]
    fn rejects_blank_title_and_content() {
        let mut f = fields(UnlockKind::Immediate, None);
        f.title = "   ".into();
        assert!(reason(validate_new_capsule(f, now())).contains("title"));

        let mut f = fields(UnlockKind::Immediate, None);
        f.content = String::new();
        assert!(reason(validate_new_capsule(f, now())).contains("content"));
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        for (lat, lon) in [(90.1, 0.0), (-91.0, 0.0), (0.0, 180.5), (0.0, -181.0), (f64::NAN, 0.0)] {
            let mut f = fields(UnlockKind::Immediate, None);
            f.location.latitude = lat;
            f.location.longitude = lon;
            validate_new_capsule(f, now()).unwrap_err();
        }
    }

    #[test]
    fn accepts_coordinate_extremes() {
        let mut f = fields(UnlockKind::Immediate, None);
        f.location.latitude = -90.0;
        f.location.longitude = 180.0;
        validate_new_capsule(f, now()).unwrap();
    }

    #[test]
    fn time_capsule_needs_a_future_unlock_time() {
        let missing = fields(UnlockKind::Time, None);
        assert!(reason(validate_new_capsule(missing, now())).contains("required"));

        let present = fields(UnlockKind::Time, Some(now()));
        assert!(reason(validate_new_capsule(present, now())).contains("future"));

        let past = fields(UnlockKind::Time, Some(now() - Duration::seconds(1)));
        assert!(reason(validate_new_capsule(past, now())).contains("future"));
    }

    #[test]
    fn unlock_time_is_rejected_for_other_methods() {
        let f = fields(UnlockKind::Location, Some(now() + Duration::days(1)));
        assert!(reason(validate_new_capsule(f, now())).contains("only allowed"));
    }

    #[test]
    fn limits_media_to_one_attachment() {
        let mut f = fields(UnlockKind::Immediate, None);
        f.media_urls = vec!["/media/a".into(), "/media/b".into()];
        assert!(reason(validate_new_capsule(f, now())).contains("media"));

        let mut f = fields(UnlockKind::Immediate, None);
        f.media_urls = vec!["/media/a".into()];
        validate_new_capsule(f, now()).unwrap();
    }
}
