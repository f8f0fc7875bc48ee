//! Row-to-document mapping.
//!
//! Every function here is pure: it takes one typed row plus lookup tables that
//! were built once per migration by a grouping pass, and returns the document.
//! Missing references are errors; the caller aborts the whole run on the first
//! one.

use shared::{
    DeviceEntry, FamilyDocument, FamilyMemberEntry, MediaDocument, SessionDocument,
    SessionMediaSnapshot, SessionUserSnapshot, TypeDetails, UserDocument, WatchHistoryDocument,
    WatchMediaSnapshot, WatchUserSnapshot,
};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::{
    error::{AppError, AppResult},
    relational::{Device, Family, Film, Friendship, Media, Series, Session, User, WatchHistory},
};

// ============================================================================
// Families
// ============================================================================

/// Members of each family, grouped in one pass over all users
pub fn group_members(users: &[User]) -> HashMap<i64, Vec<FamilyMemberEntry>> {
    let mut members: HashMap<i64, Vec<FamilyMemberEntry>> = HashMap::new();
    for user in users {
        if let Some(family_id) = user.family_id {
            members.entry(family_id).or_default().push(FamilyMemberEntry {
                user_id: user.user_id,
                user_name: user.user_name.clone(),
                email: user.email.clone(),
            });
        }
    }
    members
}

pub fn map_family(
    family: &Family,
    members: &HashMap<i64, Vec<FamilyMemberEntry>>,
) -> FamilyDocument {
    FamilyDocument {
        family_id: family.family_id,
        family_type: family.family_type.clone(),
        users: members.get(&family.family_id).cloned().unwrap_or_default(),
        creation_date: family.creation_date,
    }
}

// ============================================================================
// Users
// ============================================================================

/// Lookups needed to build user documents
#[derive(Debug, Default)]
pub struct UserLookups {
    families: HashSet<i64>,
    devices: HashMap<i64, Vec<DeviceEntry>>,
    friends: HashMap<i64, BTreeSet<i64>>,
}

impl UserLookups {
    /// Groups devices by owner and collapses each friendship pair into both
    /// users' perspectives. Devices or friendships naming an unknown user are
    /// rejected.
    pub fn build(
        families: &[FamilyDocument],
        users: &[User],
        devices: &[Device],
        friendships: &[Friendship],
    ) -> AppResult<Self> {
        let known: HashSet<i64> = users.iter().map(|u| u.user_id).collect();
        let require = |user_id: i64| {
            if known.contains(&user_id) {
                Ok(())
            } else {
                Err(AppError::not_found("user", user_id))
            }
        };

        let mut lookups = UserLookups {
            families: families.iter().map(|f| f.family_id).collect(),
            ..Default::default()
        };

        for device in devices {
            require(device.user_id)?;
            lookups
                .devices
                .entry(device.user_id)
                .or_default()
                .push(DeviceEntry {
                    device_id: device.device_id,
                    device_name: device.device_name.clone(),
                });
        }

        for friendship in friendships {
            require(friendship.user_id)?;
            require(friendship.friend_id)?;
            lookups
                .friends
                .entry(friendship.user_id)
                .or_default()
                .insert(friendship.friend_id);
            lookups
                .friends
                .entry(friendship.friend_id)
                .or_default()
                .insert(friendship.user_id);
        }

        Ok(lookups)
    }
}

pub fn map_user(user: &User, lookups: &UserLookups) -> AppResult<UserDocument> {
    if let Some(family_id) = user.family_id {
        if !lookups.families.contains(&family_id) {
            return Err(AppError::not_found("family", family_id));
        }
    }

    Ok(UserDocument {
        user_id: user.user_id,
        user_name: user.user_name.clone(),
        email: user.email.clone(),
        birthday: user.birthday,
        location: user.location.clone(),
        bio: user.bio.clone(),
        family_id: user.family_id,
        devices: lookups.devices.get(&user.user_id).cloned().unwrap_or_default(),
        friends: lookups
            .friends
            .get(&user.user_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default(),
    })
}

// ============================================================================
// Media
// ============================================================================

/// Film and series detail rows keyed by media id
#[derive(Debug, Default)]
pub struct MediaDetails {
    films: HashMap<i64, Film>,
    series: HashMap<i64, Series>,
}

impl MediaDetails {
    pub fn build(films: &[Film], series: &[Series]) -> Self {
        Self {
            films: films.iter().map(|f| (f.media_id, f.clone())).collect(),
            series: series.iter().map(|s| (s.media_id, s.clone())).collect(),
        }
    }

    fn details_for(&self, media_id: i64) -> AppResult<TypeDetails> {
        match (self.films.get(&media_id), self.series.get(&media_id)) {
            (Some(film), None) => Ok(TypeDetails::Film {
                duration: film.duration,
                number_of_parts: film.number_of_parts,
            }),
            (None, Some(series)) => Ok(TypeDetails::Series {
                number_of_episodes: series.number_of_episodes,
                is_ongoing: series.is_ongoing,
            }),
            (None, None) => Ok(TypeDetails::Unknown {}),
            (Some(_), Some(_)) => Err(AppError::validation(format!(
                "media {} has both a film and a series detail",
                media_id
            ))),
        }
    }
}

pub fn map_media(media: &Media, details: &MediaDetails) -> AppResult<MediaDocument> {
    let type_details = details.details_for(media.media_id)?;
    Ok(MediaDocument {
        media_id: media.media_id,
        media_name: media.media_name.clone(),
        genre: media.genre.clone(),
        prod_year: media.prod_year,
        description: media.descr.clone(),
        location: media.location.clone(),
        cost_per_day: media.cost_per_day,
        media_type: type_details.media_type(),
        type_details,
    })
}

// ============================================================================
// Sessions and watch history
// ============================================================================

/// Already-migrated user and media documents, source of every snapshot
pub struct SnapshotIndex<'a> {
    users: &'a HashMap<i64, UserDocument>,
    media: &'a HashMap<i64, MediaDocument>,
}

impl<'a> SnapshotIndex<'a> {
    pub fn new(
        users: &'a HashMap<i64, UserDocument>,
        media: &'a HashMap<i64, MediaDocument>,
    ) -> Self {
        Self { users, media }
    }

    fn user(&self, user_id: i64) -> AppResult<&'a UserDocument> {
        self.users
            .get(&user_id)
            .ok_or_else(|| AppError::not_found("user", user_id))
    }

    fn media(&self, media_id: i64) -> AppResult<&'a MediaDocument> {
        self.media
            .get(&media_id)
            .ok_or_else(|| AppError::not_found("media", media_id))
    }
}

pub fn map_session(session: &Session, index: &SnapshotIndex<'_>) -> AppResult<SessionDocument> {
    let user = index.user(session.user_id)?;
    let media = index.media(session.media_id)?;
    Ok(SessionDocument {
        session_id: session.session_id,
        user: SessionUserSnapshot::from(user),
        media: SessionMediaSnapshot::from(media),
        date_of_rent: session.date_of_rent,
        cost: session.cost,
        duration: session.duration,
    })
}

pub fn map_watch_history(
    entry: &WatchHistory,
    index: &SnapshotIndex<'_>,
) -> AppResult<WatchHistoryDocument> {
    let user = index.user(entry.user_id)?;
    let media = index.media(entry.media_id)?;
    Ok(WatchHistoryDocument {
        watch_history_id: entry.watch_history_id,
        user: WatchUserSnapshot::from(user),
        media: WatchMediaSnapshot::from(media),
        date_of_watch: entry.date_of_watch,
        family_watch: entry.family_watch,
    })
}
