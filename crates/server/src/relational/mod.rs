use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::BTreeMap;

use crate::error::{AppError, AppResult};

mod catalog;
mod models;
mod reader;

pub use models::*;
pub use reader::RelationalReader;

/// Longest rental accepted by `rent_media`, one year in hours
pub const MAX_RENTAL_HOURS: i64 = 365 * 24;

/// Tables in creation order (parents first)
pub const TABLES: [&str; 9] = [
    "Family",
    "Users",
    "Device",
    "Friendships",
    "Media",
    "Film",
    "Series",
    "Sessions",
    "WatchHistory",
];

/// Normalized store, the system of record
#[derive(Clone)]
pub struct RelationalStore {
    pool: SqlitePool,
}

impl RelationalStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> AppResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS Family (
                family_id INTEGER PRIMARY KEY AUTOINCREMENT,
                family_type TEXT NOT NULL,
                creation_date DATE NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS Users (
                user_id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_name TEXT NOT NULL,
                email TEXT NOT NULL,
                birthday DATE NOT NULL,
                location TEXT NOT NULL,
                bio TEXT NOT NULL,
                family_id INTEGER REFERENCES Family(family_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS Device (
                device_id INTEGER PRIMARY KEY AUTOINCREMENT,
                device_name TEXT NOT NULL,
                registration_date DATE NOT NULL,
                user_id INTEGER NOT NULL REFERENCES Users(user_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS Friendships (
                user_id INTEGER NOT NULL REFERENCES Users(user_id),
                friend_id INTEGER NOT NULL REFERENCES Users(user_id),
                PRIMARY KEY (user_id, friend_id),
                CHECK (user_id <> friend_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS Media (
                media_id INTEGER PRIMARY KEY AUTOINCREMENT,
                media_name TEXT NOT NULL,
                genre TEXT NOT NULL,
                prod_year INTEGER NOT NULL,
                descr TEXT NOT NULL,
                location TEXT NOT NULL,
                cost_per_day INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS Film (
                film_id INTEGER PRIMARY KEY AUTOINCREMENT,
                duration INTEGER NOT NULL,
                number_of_parts INTEGER NOT NULL,
                media_id INTEGER NOT NULL UNIQUE REFERENCES Media(media_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS Series (
                series_id INTEGER PRIMARY KEY AUTOINCREMENT,
                number_of_episodes INTEGER NOT NULL,
                is_ongoing BOOLEAN NOT NULL,
                media_id INTEGER NOT NULL UNIQUE REFERENCES Media(media_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS Sessions (
                session_id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES Users(user_id),
                media_id INTEGER NOT NULL REFERENCES Media(media_id),
                date_of_rent DATETIME NOT NULL,
                cost INTEGER NOT NULL,
                duration INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS WatchHistory (
                watch_history_id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES Users(user_id),
                media_id INTEGER NOT NULL REFERENCES Media(media_id),
                date_of_watch DATETIME NOT NULL,
                family_watch BOOLEAN NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_family ON Users(family_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_user ON Sessions(user_id)")
            .execute(&self.pool)
            .await?;

        tracing::info!("Relational schema ready");
        Ok(())
    }

    async fn exists(&self, table: &str, column: &str, id: i64) -> AppResult<bool> {
        let sql = format!("SELECT 1 FROM {} WHERE {} = ?", table, column);
        let row: Option<(i64,)> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn require_user(&self, user_id: i64) -> AppResult<()> {
        if !self.exists("Users", "user_id", user_id).await? {
            return Err(AppError::not_found("user", user_id));
        }
        Ok(())
    }

    async fn require_media(&self, media_id: i64) -> AppResult<()> {
        if !self.exists("Media", "media_id", media_id).await? {
            return Err(AppError::not_found("media", media_id));
        }
        Ok(())
    }

    // Family operations
    pub async fn insert_family(&self, family: &NewFamily) -> AppResult<Family> {
        if family.family_type.trim().is_empty() {
            return Err(AppError::validation("family_type must not be empty"));
        }
        let id = sqlx::query("INSERT INTO Family (family_type, creation_date) VALUES (?, ?)")
            .bind(&family.family_type)
            .bind(family.creation_date)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();

        Ok(Family {
            family_id: id,
            family_type: family.family_type.clone(),
            creation_date: family.creation_date,
        })
    }

    // User operations
    pub async fn insert_user(&self, user: &NewUser) -> AppResult<User> {
        user.validate()?;
        if let Some(family_id) = user.family_id {
            if !self.exists("Family", "family_id", family_id).await? {
                return Err(AppError::not_found("family", family_id));
            }
        }

        let id = sqlx::query(
            r#"
            INSERT INTO Users (user_name, email, birthday, location, bio, family_id)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.user_name)
        .bind(&user.email)
        .bind(user.birthday)
        .bind(&user.location)
        .bind(&user.bio)
        .bind(user.family_id)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(User {
            user_id: id,
            user_name: user.user_name.clone(),
            email: user.email.clone(),
            birthday: user.birthday,
            location: user.location.clone(),
            bio: user.bio.clone(),
            family_id: user.family_id,
        })
    }

    pub async fn update_user(&self, user: &User) -> AppResult<()> {
        user.validate()?;
        let rows = sqlx::query(
            r#"
            UPDATE Users
            SET user_name = ?, email = ?, birthday = ?, location = ?, bio = ?, family_id = ?
            WHERE user_id = ?
            "#,
        )
        .bind(&user.user_name)
        .bind(&user.email)
        .bind(user.birthday)
        .bind(&user.location)
        .bind(&user.bio)
        .bind(user.family_id)
        .bind(user.user_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(AppError::not_found("user", user.user_id));
        }
        Ok(())
    }

    pub async fn get_user(&self, user_id: i64) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT user_id, user_name, email, birthday, location, bio, family_id FROM Users WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn insert_device(&self, device: &NewDevice) -> AppResult<Device> {
        self.require_user(device.user_id).await?;
        let id = sqlx::query(
            "INSERT INTO Device (device_name, registration_date, user_id) VALUES (?, ?, ?)",
        )
        .bind(&device.device_name)
        .bind(device.registration_date)
        .bind(device.user_id)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(Device {
            device_id: id,
            device_name: device.device_name.clone(),
            registration_date: device.registration_date,
            user_id: device.user_id,
        })
    }

    /// Inserts an unordered friendship pair. (A, B) and (B, A) are the same
    /// pair; the duplicate check runs here, not through a storage constraint.
    pub async fn insert_friendship(&self, user_id: i64, friend_id: i64) -> AppResult<Friendship> {
        let friendship = Friendship { user_id, friend_id };
        friendship.validate()?;
        self.require_user(user_id).await?;
        self.require_user(friend_id).await?;

        let (low, high) = friendship.key();
        let existing: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT 1 FROM Friendships
            WHERE MIN(user_id, friend_id) = ? AND MAX(user_id, friend_id) = ?
            "#,
        )
        .bind(low)
        .bind(high)
        .fetch_optional(&self.pool)
        .await?;

        if existing.is_some() {
            return Err(AppError::validation(format!(
                "users {} and {} are already friends",
                user_id, friend_id
            )));
        }

        sqlx::query("INSERT INTO Friendships (user_id, friend_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(friend_id)
            .execute(&self.pool)
            .await?;
        Ok(friendship)
    }

    // Media operations
    pub async fn insert_media(&self, media: &NewMedia) -> AppResult<Media> {
        media.validate()?;
        let id = sqlx::query(
            r#"
            INSERT INTO Media (media_name, genre, prod_year, descr, location, cost_per_day)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&media.media_name)
        .bind(&media.genre)
        .bind(media.prod_year)
        .bind(&media.descr)
        .bind(&media.location)
        .bind(media.cost_per_day)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(Media {
            media_id: id,
            media_name: media.media_name.clone(),
            genre: media.genre.clone(),
            prod_year: media.prod_year,
            descr: media.descr.clone(),
            location: media.location.clone(),
            cost_per_day: media.cost_per_day,
        })
    }

    pub async fn update_media(&self, media: &Media) -> AppResult<()> {
        media.validate()?;
        let rows = sqlx::query(
            r#"
            UPDATE Media
            SET media_name = ?, genre = ?, prod_year = ?, descr = ?, location = ?, cost_per_day = ?
            WHERE media_id = ?
            "#,
        )
        .bind(&media.media_name)
        .bind(&media.genre)
        .bind(media.prod_year)
        .bind(&media.descr)
        .bind(&media.location)
        .bind(media.cost_per_day)
        .bind(media.media_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(AppError::not_found("media", media.media_id));
        }
        Ok(())
    }

    pub async fn get_media(&self, media_id: i64) -> AppResult<Option<Media>> {
        let media = sqlx::query_as::<_, Media>(
            "SELECT media_id, media_name, genre, prod_year, descr, location, cost_per_day FROM Media WHERE media_id = ?",
        )
        .bind(media_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(media)
    }

    /// A media row carries at most one type-detail row
    async fn require_no_type_detail(&self, media_id: i64) -> AppResult<()> {
        self.require_media(media_id).await?;
        if self.exists("Film", "media_id", media_id).await?
            || self.exists("Series", "media_id", media_id).await?
        {
            return Err(AppError::validation(format!(
                "media {} already has a type detail",
                media_id
            )));
        }
        Ok(())
    }

    pub async fn insert_film(
        &self,
        media_id: i64,
        duration: i64,
        number_of_parts: i64,
    ) -> AppResult<Film> {
        self.require_no_type_detail(media_id).await?;
        let id = sqlx::query("INSERT INTO Film (duration, number_of_parts, media_id) VALUES (?, ?, ?)")
            .bind(duration)
            .bind(number_of_parts)
            .bind(media_id)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();

        Ok(Film {
            film_id: id,
            duration,
            number_of_parts,
            media_id,
        })
    }

    pub async fn insert_series(
        &self,
        media_id: i64,
        number_of_episodes: i64,
        is_ongoing: bool,
    ) -> AppResult<Series> {
        self.require_no_type_detail(media_id).await?;
        let id = sqlx::query(
            "INSERT INTO Series (number_of_episodes, is_ongoing, media_id) VALUES (?, ?, ?)",
        )
        .bind(number_of_episodes)
        .bind(is_ongoing)
        .bind(media_id)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(Series {
            series_id: id,
            number_of_episodes,
            is_ongoing,
            media_id,
        })
    }

    // Session operations
    pub async fn insert_session(&self, session: &NewSession) -> AppResult<Session> {
        session.validate()?;
        self.require_user(session.user_id).await?;
        self.require_media(session.media_id).await?;

        let id = sqlx::query(
            r#"
            INSERT INTO Sessions (user_id, media_id, date_of_rent, cost, duration)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(session.user_id)
        .bind(session.media_id)
        .bind(session.date_of_rent)
        .bind(session.cost)
        .bind(session.duration)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(Session {
            session_id: id,
            user_id: session.user_id,
            media_id: session.media_id,
            date_of_rent: session.date_of_rent,
            cost: session.cost,
            duration: session.duration,
        })
    }

    /// Rents media starting at `at` for `duration_hours`; the cost is charged
    /// per started day.
    pub async fn rent_media(
        &self,
        user_id: i64,
        media_id: i64,
        duration_hours: i64,
        at: DateTime<Utc>,
    ) -> AppResult<Session> {
        validate_rental_hours(duration_hours)?;
        self.require_user(user_id).await?;
        let media = self
            .get_media(media_id)
            .await?
            .ok_or_else(|| AppError::not_found("media", media_id))?;

        let session = NewSession {
            user_id,
            media_id,
            date_of_rent: at,
            cost: rental_cost(media.cost_per_day, duration_hours)?,
            duration: duration_hours,
        };
        let session = self.insert_session(&session).await?;
        tracing::info!(
            "User {} rented media {} for {}h (session {})",
            user_id,
            media_id,
            duration_hours,
            session.session_id
        );
        Ok(session)
    }

    pub async fn insert_watch_history(&self, history: &NewWatchHistory) -> AppResult<WatchHistory> {
        self.require_user(history.user_id).await?;
        self.require_media(history.media_id).await?;

        let id = sqlx::query(
            r#"
            INSERT INTO WatchHistory (user_id, media_id, date_of_watch, family_watch)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(history.user_id)
        .bind(history.media_id)
        .bind(history.date_of_watch)
        .bind(history.family_watch)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(WatchHistory {
            watch_history_id: id,
            user_id: history.user_id,
            media_id: history.media_id,
            date_of_watch: history.date_of_watch,
            family_watch: history.family_watch,
        })
    }

    /// Row count per table
    pub async fn table_counts(&self) -> AppResult<BTreeMap<String, u64>> {
        let mut counts = BTreeMap::new();
        for table in TABLES {
            let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(&self.pool)
                .await?;
            counts.insert(table.to_string(), count as u64);
        }
        Ok(counts)
    }
}

pub fn validate_rental_hours(hours: i64) -> AppResult<()> {
    validate_duration(hours)?;
    if hours > MAX_RENTAL_HOURS {
        return Err(AppError::validation(format!(
            "duration must not exceed {} hours",
            MAX_RENTAL_HOURS
        )));
    }
    Ok(())
}

/// `cost_per_day` times the number of started days
pub fn rental_cost(cost_per_day: i64, duration_hours: i64) -> AppResult<i64> {
    let days = duration_hours / 24 + i64::from(duration_hours % 24 != 0);
    cost_per_day
        .checked_mul(days)
        .ok_or_else(|| AppError::validation("rental cost overflows"))
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[tokio::test]
    async fn test_friendship_rejects_reverse_duplicate() {
        let store = store().await;
        let a = user(&store, "A", None).await;
        let b = user(&store, "B", None).await;

        store.insert_friendship(a.user_id, b.user_id).await.unwrap();
        let err = store
            .insert_friendship(b.user_id, a.user_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = store
            .insert_friendship(a.user_id, b.user_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let counts = store.table_counts().await.unwrap();
        assert_eq!(counts["Friendships"], 1);
    }

    #[tokio::test]
    async fn test_friendship_requires_distinct_existing_users() {
        let store = store().await;
        let a = user(&store, "A", None).await;

        let err = store.insert_friendship(a.user_id, a.user_id).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = store.insert_friendship(a.user_id, 99).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { resource: "user", id: 99 }));
    }

    #[tokio::test]
    async fn test_media_accepts_only_one_type_detail() {
        let store = store().await;
        let m = media(&store, "Inception", 5).await;

        store.insert_film(m.media_id, 148, 1).await.unwrap();
        let err = store.insert_series(m.media_id, 10, true).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = store.insert_film(42, 100, 1).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { resource: "media", .. }));
    }

    #[tokio::test]
    async fn test_rent_media_validates_and_prices() {
        let store = store().await;
        let u = user(&store, "Zhami", None).await;
        let m = media(&store, "Inception", 5).await;
        let now = Utc::now();

        let session = store.rent_media(u.user_id, m.media_id, 30, now).await.unwrap();
        assert_eq!(session.duration, 30);
        assert_eq!(session.cost, 10);

        let err = store.rent_media(u.user_id, m.media_id, 0, now).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = store
            .rent_media(u.user_id, m.media_id, MAX_RENTAL_HOURS + 1, now)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = store.rent_media(77, m.media_id, 2, now).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { resource: "user", id: 77 }));

        let err = store.rent_media(u.user_id, 88, 2, now).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { resource: "media", id: 88 }));
    }

    #[tokio::test]
    async fn test_update_user_missing_row() {
        let store = store().await;
        let mut u = user(&store, "Grisha", None).await;
        u.user_name = "Grigory".to_string();
        store.update_user(&u).await.unwrap();
        assert_eq!(
            store.get_user(u.user_id).await.unwrap().unwrap().user_name,
            "Grigory"
        );

        u.user_id = 500;
        let err = store.update_user(&u).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_user_family_reference_checked() {
        let store = store().await;
        let err = store
            .insert_user(&NewUser {
                user_name: "Orphan".to_string(),
                email: String::new(),
                birthday: date(1990, 1, 1),
                location: String::new(),
                bio: String::new(),
                family_id: Some(12),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { resource: "family", id: 12 }));
    }

    #[test]
    fn test_rental_cost_rounds_up_to_days() {
        assert_eq!(rental_cost(5, 1).unwrap(), 5);
        assert_eq!(rental_cost(5, 24).unwrap(), 5);
        assert_eq!(rental_cost(5, 25).unwrap(), 10);
        assert_eq!(rental_cost(3, 72).unwrap(), 9);
        assert!(matches!(rental_cost(i64::MAX / 2, 72), Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_rent_media_rejects_overflowing_cost() {
        let store = store().await;
        let u = user(&store, "Zhami", None).await;
        let m = media(&store, "Gold Edition", i64::MAX / 2).await;

        let err = store
            .rent_media(u.user_id, m.media_id, 72, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(store.table_counts().await.unwrap()["Sessions"], 0);

        let session = store
            .rent_media(u.user_id, m.media_id, 24, Utc::now())
            .await
            .unwrap();
        assert_eq!(session.cost, i64::MAX / 2);
    }
}
