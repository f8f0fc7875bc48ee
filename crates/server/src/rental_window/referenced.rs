use async_trait::async_trait;
use shared::{SessionDocument, UserDocument};

use super::{FamilyMember, FamilyMemberResolver, RentalRecord, RentalSessionResolver};
use crate::{
    document::{Collection, DocumentStore, Filter},
    error::AppResult,
};

/// Resolution through id references between documents: members by the
/// `family_id` field of user documents, sessions by `user.user_id`
pub struct ReferencedResolver<'a> {
    store: &'a DocumentStore,
}

impl<'a> ReferencedResolver<'a> {
    pub fn new(store: &'a DocumentStore) -> Self {
        Self { store }
    }
}

impl From<&UserDocument> for FamilyMember {
    fn from(user: &UserDocument) -> Self {
        FamilyMember {
            user_id: user.user_id,
            user_name: user.user_name.clone(),
        }
    }
}

impl From<SessionDocument> for RentalRecord {
    fn from(session: SessionDocument) -> Self {
        RentalRecord {
            renter_id: session.user.user_id,
            media_id: session.media.media_id,
            media_name: session.media.media_name,
            media_type: session.media.media_type,
            date_of_rent: session.date_of_rent,
            duration_hours: session.duration,
        }
    }
}

/// Sessions whose embedded renter is one of `user_ids`
pub(super) async fn sessions_by_renter(
    store: &DocumentStore,
    user_ids: &[i64],
) -> AppResult<Vec<RentalRecord>> {
    let sessions: Vec<SessionDocument> = store
        .find(Collection::Sessions, &[Filter::is_in("user.user_id", user_ids)])
        .await?;
    Ok(sessions.into_iter().map(Into::into).collect())
}

pub(super) async fn all_user_documents(store: &DocumentStore) -> AppResult<Vec<FamilyMember>> {
    let mut users: Vec<UserDocument> = store.find(Collection::Users, &[]).await?;
    users.sort_by_key(|u| u.user_id);
    Ok(users.iter().map(FamilyMember::from).collect())
}

#[async_trait]
impl<'a> FamilyMemberResolver for ReferencedResolver<'a> {
    async fn other_members(&self, user_id: i64) -> AppResult<Vec<FamilyMember>> {
        let user: Option<UserDocument> = self.store.find_by_id(Collection::Users, user_id).await?;
        let Some(family_id) = user.and_then(|u| u.family_id) else {
            return Ok(Vec::new());
        };

        let mut members: Vec<UserDocument> = self
            .store
            .find(
                Collection::Users,
                &[Filter::eq("family_id", family_id), Filter::ne("user_id", user_id)],
            )
            .await?;
        members.sort_by_key(|u| u.user_id);
        Ok(members.iter().map(FamilyMember::from).collect())
    }

    async fn all_users(&self) -> AppResult<Vec<FamilyMember>> {
        all_user_documents(self.store).await
    }
}

#[async_trait]
impl<'a> RentalSessionResolver for ReferencedResolver<'a> {
    async fn sessions_of(&self, user_ids: &[i64]) -> AppResult<Vec<RentalRecord>> {
        sessions_by_renter(self.store, user_ids).await
    }
}
