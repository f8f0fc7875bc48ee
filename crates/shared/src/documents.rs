use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Media discriminator
// ============================================================================

/// Which type-detail shape applies to a media document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Film,
    Series,
    /// Media row without a film or series detail row
    Unknown,
}

impl MediaType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "film" => Some(MediaType::Film),
            "series" => Some(MediaType::Series),
            "unknown" => Some(MediaType::Unknown),
            _ => None,
        }
    }
}

/// Shape of `type_details`, selected by [`MediaType`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeDetails {
    Film {
        duration: i64,
        number_of_parts: i64,
    },
    Series {
        number_of_episodes: i64,
        is_ongoing: bool,
    },
    Unknown {},
}

impl TypeDetails {
    pub fn media_type(&self) -> MediaType {
        match self {
            TypeDetails::Film { .. } => MediaType::Film,
            TypeDetails::Series { .. } => MediaType::Series,
            TypeDetails::Unknown {} => MediaType::Unknown,
        }
    }
}

// ============================================================================
// Collection documents
// ============================================================================

/// Member entry embedded in a family document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyMemberEntry {
    pub user_id: i64,
    pub user_name: String,
    pub email: String,
}

/// `families` collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyDocument {
    pub family_id: i64,
    pub family_type: String,
    pub users: Vec<FamilyMemberEntry>,
    pub creation_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub device_id: i64,
    pub device_name: String,
}

/// `users` collection. The family is referenced by id only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDocument {
    pub user_id: i64,
    pub user_name: String,
    pub email: String,
    pub birthday: NaiveDate,
    pub location: String,
    pub bio: String,
    pub family_id: Option<i64>,
    pub devices: Vec<DeviceEntry>,
    pub friends: Vec<i64>,
}

/// `media` collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaDocument {
    pub media_id: i64,
    pub media_name: String,
    pub genre: String,
    pub prod_year: i64,
    pub description: String,
    pub location: String,
    pub cost_per_day: i64,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub type_details: TypeDetails,
}

/// User snapshot frozen into a session document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUserSnapshot {
    pub user_id: i64,
    pub user_name: String,
    pub email: String,
}

/// Media snapshot frozen into a session document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMediaSnapshot {
    pub media_id: i64,
    pub media_name: String,
    pub genre: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub cost_per_day: i64,
}

/// `sessions` collection. `duration` is in hours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDocument {
    pub session_id: i64,
    pub user: SessionUserSnapshot,
    pub media: SessionMediaSnapshot,
    pub date_of_rent: DateTime<Utc>,
    pub cost: i64,
    pub duration: i64,
}

impl SessionDocument {
    /// End of the half-open rental window `[date_of_rent, date_of_rent + duration)`.
    /// `None` when the end lies past the representable range.
    pub fn rental_end(&self) -> Option<DateTime<Utc>> {
        chrono::Duration::try_hours(self.duration)
            .and_then(|d| self.date_of_rent.checked_add_signed(d))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchUserSnapshot {
    pub user_id: i64,
    pub user_name: String,
    pub family_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchMediaSnapshot {
    pub media_id: i64,
    pub media_name: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
}

/// `watch_history` collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchHistoryDocument {
    pub watch_history_id: i64,
    pub user: WatchUserSnapshot,
    pub media: WatchMediaSnapshot,
    pub date_of_watch: DateTime<Utc>,
    pub family_watch: bool,
}

// ============================================================================
// Snapshot constructors
// ============================================================================

impl From<&UserDocument> for SessionUserSnapshot {
    fn from(user: &UserDocument) -> Self {
        Self {
            user_id: user.user_id,
            user_name: user.user_name.clone(),
            email: user.email.clone(),
        }
    }
}

impl From<&MediaDocument> for SessionMediaSnapshot {
    fn from(media: &MediaDocument) -> Self {
        Self {
            media_id: media.media_id,
            media_name: media.media_name.clone(),
            genre: media.genre.clone(),
            media_type: media.media_type,
            cost_per_day: media.cost_per_day,
        }
    }
}

impl From<&UserDocument> for WatchUserSnapshot {
    fn from(user: &UserDocument) -> Self {
        Self {
            user_id: user.user_id,
            user_name: user.user_name.clone(),
            family_id: user.family_id,
        }
    }
}

impl From<&MediaDocument> for WatchMediaSnapshot {
    fn from(media: &MediaDocument) -> Self {
        Self {
            media_id: media.media_id,
            media_name: media.media_name.clone(),
            media_type: media.media_type,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
