use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Family {
    pub family_id: i64,
    pub family_type: String,
    pub creation_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct User {
    pub user_id: i64,
    pub user_name: String,
    pub email: String,
    pub birthday: NaiveDate,
    pub location: String,
    pub bio: String,
    pub family_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Device {
    pub device_id: i64,
    pub device_name: String,
    pub registration_date: NaiveDate,
    pub user_id: i64,
}

/// Unordered pair; stored once in whichever order it was first inserted
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Friendship {
    pub user_id: i64,
    pub friend_id: i64,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Media {
    pub media_id: i64,
    pub media_name: String,
    pub genre: String,
    pub prod_year: i64,
    pub descr: String,
    pub location: String,
    pub cost_per_day: i64,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Film {
    pub film_id: i64,
    /// Running time in minutes
    pub duration: i64,
    pub number_of_parts: i64,
    pub media_id: i64,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Series {
    pub series_id: i64,
    pub number_of_episodes: i64,
    pub is_ongoing: bool,
    pub media_id: i64,
}

/// A rental. `duration` is in hours.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Session {
    pub session_id: i64,
    pub user_id: i64,
    pub media_id: i64,
    pub date_of_rent: DateTime<Utc>,
    pub cost: i64,
    pub duration: i64,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct WatchHistory {
    pub watch_history_id: i64,
    pub user_id: i64,
    pub media_id: i64,
    pub date_of_watch: DateTime<Utc>,
    pub family_watch: bool,
}

// ============================================================================
// Insert payloads
// ============================================================================

#[derive(Debug, Clone)]
pub struct NewFamily {
    pub family_type: String,
    pub creation_date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub user_name: String,
    pub email: String,
    pub birthday: NaiveDate,
    pub location: String,
    pub bio: String,
    pub family_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewDevice {
    pub device_name: String,
    pub registration_date: NaiveDate,
    pub user_id: i64,
}

#[derive(Debug, Clone)]
pub struct NewMedia {
    pub media_name: String,
    pub genre: String,
    pub prod_year: i64,
    pub descr: String,
    pub location: String,
    pub cost_per_day: i64,
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: i64,
    pub media_id: i64,
    pub date_of_rent: DateTime<Utc>,
    pub cost: i64,
    pub duration: i64,
}

#[derive(Debug, Clone)]
pub struct NewWatchHistory {
    pub user_id: i64,
    pub media_id: i64,
    pub date_of_watch: DateTime<Utc>,
    pub family_watch: bool,
}

// ============================================================================
// Boundary validation
// ============================================================================

/// Row-level invariants checked when rows cross into the engine
pub trait Validate {
    fn validate(&self) -> AppResult<()>;
}

fn require_non_empty(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

impl Validate for User {
    fn validate(&self) -> AppResult<()> {
        require_non_empty("user_name", &self.user_name)
    }
}

impl Validate for NewUser {
    fn validate(&self) -> AppResult<()> {
        require_non_empty("user_name", &self.user_name)
    }
}

impl Validate for Media {
    fn validate(&self) -> AppResult<()> {
        require_non_empty("media_name", &self.media_name)
    }
}

impl Validate for NewMedia {
    fn validate(&self) -> AppResult<()> {
        require_non_empty("media_name", &self.media_name)?;
        if self.cost_per_day < 0 {
            return Err(AppError::validation("cost_per_day must not be negative"));
        }
        Ok(())
    }
}

impl Validate for Friendship {
    fn validate(&self) -> AppResult<()> {
        if self.user_id == self.friend_id {
            return Err(AppError::validation(format!(
                "user {} cannot befriend themselves",
                self.user_id
            )));
        }
        Ok(())
    }
}

impl Validate for Session {
    fn validate(&self) -> AppResult<()> {
        validate_duration(self.duration)
    }
}

impl Validate for NewSession {
    fn validate(&self) -> AppResult<()> {
        validate_duration(self.duration)
    }
}

pub fn validate_duration(hours: i64) -> AppResult<()> {
    if hours <= 0 {
        return Err(AppError::validation("duration must be positive"));
    }
    Ok(())
}

impl Friendship {
    /// Order-independent key of the pair
    pub fn key(&self) -> (i64, i64) {
        (self.user_id.min(self.friend_id), self.user_id.max(self.friend_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_friendship_key_ignores_order() {
        let a = Friendship { user_id: 4, friend_id: 2 };
        let b = Friendship { user_id: 2, friend_id: 4 };
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key(), (2, 4));
    }

    #[test]
    fn test_self_friendship_rejected() {
        let f = Friendship { user_id: 3, friend_id: 3 };
        assert!(matches!(f.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_duration_must_be_positive() {
        assert!(validate_duration(0).is_err());
        assert!(validate_duration(-2).is_err());
        assert!(validate_duration(1).is_ok());
    }

    #[test]
    fn test_blank_names_rejected() {
        let media = NewMedia {
            media_name: "  ".to_string(),
            genre: String::new(),
            prod_year: 2000,
            descr: String::new(),
            location: String::new(),
            cost_per_day: 1,
        };
        assert!(media.validate().is_err());
    }
}
