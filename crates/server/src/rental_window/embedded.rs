use async_trait::async_trait;
use shared::{FamilyDocument, UserDocument};

use super::{
    referenced::{all_user_documents, sessions_by_renter},
    FamilyMember, FamilyMemberResolver, RentalRecord, RentalSessionResolver,
};
use crate::{
    document::{Collection, DocumentStore},
    error::AppResult,
};

/// Resolution through the member list embedded in the family document.
/// Sessions are still found by reference.
pub struct EmbeddedResolver<'a> {
    store: &'a DocumentStore,
}

impl<'a> EmbeddedResolver<'a> {
    pub fn new(store: &'a DocumentStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<'a> FamilyMemberResolver for EmbeddedResolver<'a> {
    async fn other_members(&self, user_id: i64) -> AppResult<Vec<FamilyMember>> {
        let user: Option<UserDocument> = self.store.find_by_id(Collection::Users, user_id).await?;
        let Some(family_id) = user.and_then(|u| u.family_id) else {
            return Ok(Vec::new());
        };
        let family: Option<FamilyDocument> =
            self.store.find_by_id(Collection::Families, family_id).await?;

        let mut members: Vec<FamilyMember> = family
            .map(|f| f.users)
            .unwrap_or_default()
            .into_iter()
            .filter(|m| m.user_id != user_id)
            .map(|m| FamilyMember {
                user_id: m.user_id,
                user_name: m.user_name,
            })
            .collect();
        members.sort_by_key(|m| m.user_id);
        Ok(members)
    }

    async fn all_users(&self) -> AppResult<Vec<FamilyMember>> {
        all_user_documents(self.store).await
    }
}

#[async_trait]
impl<'a> RentalSessionResolver for EmbeddedResolver<'a> {
    async fn sessions_of(&self, user_ids: &[i64]) -> AppResult<Vec<RentalRecord>> {
        sessions_by_renter(self.store, user_ids).await
    }
}
