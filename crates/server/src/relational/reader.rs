use async_trait::async_trait;

use super::{
    Device, Family, Film, Friendship, Media, RelationalStore, Series, Session, User, Validate,
    WatchHistory,
};
use crate::error::AppResult;

/// Read-only typed access to the source tables. Implementations hand out
/// validated rows; the migration never sees untyped data.
#[async_trait]
pub trait RelationalReader: Send + Sync {
    async fn families(&self) -> AppResult<Vec<Family>>;
    async fn users(&self) -> AppResult<Vec<User>>;
    async fn devices(&self) -> AppResult<Vec<Device>>;
    async fn friendships(&self) -> AppResult<Vec<Friendship>>;
    async fn media(&self) -> AppResult<Vec<Media>>;
    async fn films(&self) -> AppResult<Vec<Film>>;
    async fn series(&self) -> AppResult<Vec<Series>>;
    async fn sessions(&self) -> AppResult<Vec<Session>>;
    async fn watch_history(&self) -> AppResult<Vec<WatchHistory>>;
}

fn validated<T: Validate>(rows: Vec<T>) -> AppResult<Vec<T>> {
    for row in &rows {
        row.validate()?;
    }
    Ok(rows)
}

#[async_trait]
impl RelationalReader for RelationalStore {
    async fn families(&self) -> AppResult<Vec<Family>> {
        let rows = sqlx::query_as::<_, Family>(
            "SELECT family_id, family_type, creation_date FROM Family ORDER BY family_id",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    async fn users(&self) -> AppResult<Vec<User>> {
        let rows = sqlx::query_as::<_, User>(
            "SELECT user_id, user_name, email, birthday, location, bio, family_id FROM Users ORDER BY user_id",
        )
        .fetch_all(self.pool())
        .await?;
        validated(rows)
    }

    async fn devices(&self) -> AppResult<Vec<Device>> {
        let rows = sqlx::query_as::<_, Device>(
            "SELECT device_id, device_name, registration_date, user_id FROM Device ORDER BY device_id",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    async fn friendships(&self) -> AppResult<Vec<Friendship>> {
        let rows = sqlx::query_as::<_, Friendship>(
            "SELECT user_id, friend_id FROM Friendships ORDER BY user_id, friend_id",
        )
        .fetch_all(self.pool())
        .await?;
        validated(rows)
    }

    async fn media(&self) -> AppResult<Vec<Media>> {
        let rows = sqlx::query_as::<_, Media>(
            "SELECT media_id, media_name, genre, prod_year, descr, location, cost_per_day FROM Media ORDER BY media_id",
        )
        .fetch_all(self.pool())
        .await?;
        validated(rows)
    }

    async fn films(&self) -> AppResult<Vec<Film>> {
        let rows = sqlx::query_as::<_, Film>(
            "SELECT film_id, duration, number_of_parts, media_id FROM Film ORDER BY film_id",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    async fn series(&self) -> AppResult<Vec<Series>> {
        let rows = sqlx::query_as::<_, Series>(
            "SELECT series_id, number_of_episodes, is_ongoing, media_id FROM Series ORDER BY series_id",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    async fn sessions(&self) -> AppResult<Vec<Session>> {
        let rows = sqlx::query_as::<_, Session>(
            "SELECT session_id, user_id, media_id, date_of_rent, cost, duration FROM Sessions ORDER BY session_id",
        )
        .fetch_all(self.pool())
        .await?;
        validated(rows)
    }

    async fn watch_history(&self) -> AppResult<Vec<WatchHistory>> {
        let rows = sqlx::query_as::<_, WatchHistory>(
            "SELECT watch_history_id, user_id, media_id, date_of_watch, family_watch FROM WatchHistory ORDER BY watch_history_id",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }
}
