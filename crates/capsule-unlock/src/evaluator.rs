use std::fmt;

use chrono::{DateTime, Utc};

use capsule_types::models::{Capsule, GeoPoint, UnlockMethod};

use crate::geo::{distance_meters, is_near};

/// How close a caller must be to a location capsule's anchor to open it.
pub const PROXIMITY_THRESHOLD_METERS: f64 = 100.0;

const MS_PER_MINUTE: i64 = 60 * 1000;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

/// Time left before a time capsule unlocks, floored to the coarser pair of
/// units that still reads naturally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remaining {
    DaysHours { days: i64, hours: i64 },
    HoursMinutes { hours: i64, minutes: i64 },
}

impl Remaining {
    pub fn from_millis(ms: i64) -> Self {
        let days = ms / MS_PER_DAY;
        let hours = (ms % MS_PER_DAY) / MS_PER_HOUR;
        if days >= 1 {
            Self::DaysHours { days, hours }
        } else {
            Self::HoursMinutes {
                hours,
                minutes: (ms % MS_PER_HOUR) / MS_PER_MINUTE,
            }
        }
    }
}

impl fmt::Display for Remaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DaysHours { days, hours } => write!(f, "{days} days and {hours} hours"),
            Self::HoursMinutes { hours, minutes } => {
                write!(f, "{hours} hours and {minutes} minutes")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnlockReason {
    AlreadyOpened,
    TimeReached,
    TimeRemaining(Remaining),
    PositionRequired,
    WithinRange { distance_meters: f64 },
    OutOfRange { distance_meters: f64 },
    Immediate,
}

impl UnlockReason {
    pub fn can_open(&self) -> bool {
        matches!(
            self,
            Self::AlreadyOpened | Self::TimeReached | Self::WithinRange { .. } | Self::Immediate
        )
    }
}

impl fmt::Display for UnlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyOpened => f.write_str("This capsule has already been opened."),
            Self::TimeReached => f.write_str("The unlock time has arrived. You can open this capsule."),
            Self::TimeRemaining(left) => write!(f, "This capsule unlocks in {left}."),
            Self::PositionRequired => f.write_str(
                "Allow location access so we can check whether you are near this capsule.",
            ),
            Self::WithinRange { distance_meters } => write!(
                f,
                "You are {distance_meters:.0} m from this capsule. You can open it."
            ),
            Self::OutOfRange { distance_meters } => write!(
                f,
                "You are {distance_meters:.0} m away. Move within {PROXIMITY_THRESHOLD_METERS:.0} m of this capsule to open it."
            ),
            Self::Immediate => f.write_str("This capsule can be opened right away."),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnlockDecision {
    pub can_open: bool,
    pub reason: UnlockReason,
    pub message: String,
}

impl From<UnlockReason> for UnlockDecision {
    fn from(reason: UnlockReason) -> Self {
        Self {
            can_open: reason.can_open(),
            message: reason.to_string(),
            reason,
        }
    }
}

/// Decide whether `capsule` may be opened at `now` by a caller standing at
/// `position` (if known). Rules apply in order and the first match wins:
/// an opened capsule stays openable, then the capsule's own unlock method
/// decides.
pub fn evaluate(capsule: &Capsule, position: Option<GeoPoint>, now: DateTime<Utc>) -> UnlockDecision {
    if capsule.is_opened() {
        return UnlockReason::AlreadyOpened.into();
    }

    let reason = match capsule.unlock {
        UnlockMethod::Time { unlock_time } => {
            if now >= unlock_time {
                UnlockReason::TimeReached
            } else {
                let left = (unlock_time - now).num_milliseconds();
                UnlockReason::TimeRemaining(Remaining::from_millis(left))
            }
        }
        UnlockMethod::Location => match position {
            None => UnlockReason::PositionRequired,
            Some(here) => {
                let anchor = capsule.location.point();
                let distance = distance_meters(here, anchor);
                if is_near(here, anchor, PROXIMITY_THRESHOLD_METERS) {
                    UnlockReason::WithinRange {
                        distance_meters: distance,
                    }
                } else {
                    UnlockReason::OutOfRange {
                        distance_meters: distance,
                    }
                }
            }
        },
        UnlockMethod::Immediate => UnlockReason::Immediate,
    };

    reason.into()
}
