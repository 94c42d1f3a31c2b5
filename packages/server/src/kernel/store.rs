//! PostgreSQL implementation of [`BaseAuthStore`].
//!
//! Thin delegation to the SQL on the model structs; the only logic here is
//! translating sqlx errors into the store's typed conflict/unavailable split.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domains::auth::models::{Challenge, Credential, Profile, RoleGrant};
use crate::domains::auth::types::Role;
use crate::kernel::traits::{BaseAuthStore, StoreError, StoreResult};

#[derive(Clone)]
pub struct PostgresAuthStore {
    pool: PgPool,
}

impl PostgresAuthStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_err(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::Duplicate {
                constraint: db_err.constraint().unwrap_or("unique").to_string(),
            };
        }
    }
    StoreError::Unavailable(err.into())
}

#[async_trait]
impl BaseAuthStore for PostgresAuthStore {
    async fn insert_challenge(&self, challenge: Challenge) -> StoreResult<Challenge> {
        challenge.insert(&self.pool).await.map_err(map_err)
    }

    async fn latest_challenge(&self, phone: &str) -> StoreResult<Option<Challenge>> {
        Challenge::latest_for_phone(phone, &self.pool)
            .await
            .map_err(map_err)
    }

    async fn expire_active_challenges(&self, phone: &str) -> StoreResult<u64> {
        Challenge::expire_active_for_phone(phone, &self.pool)
            .await
            .map_err(map_err)
    }

    async fn record_attempt(&self, challenge_id: Uuid) -> StoreResult<Option<Challenge>> {
        Challenge::record_attempt(challenge_id, &self.pool)
            .await
            .map_err(map_err)
    }

    async fn mark_challenge_verified(&self, challenge_id: Uuid) -> StoreResult<bool> {
        Challenge::mark_verified(challenge_id, &self.pool)
            .await
            .map_err(map_err)
    }

    async fn mark_challenge_expired(&self, challenge_id: Uuid) -> StoreResult<bool> {
        Challenge::mark_expired(challenge_id, &self.pool)
            .await
            .map_err(map_err)
    }

    async fn credential_by_phone(&self, phone: &str) -> StoreResult<Option<Credential>> {
        Credential::find_by_phone(phone, &self.pool)
            .await
            .map_err(map_err)
    }

    async fn profile_by_phone(&self, phone: &str) -> StoreResult<Option<Profile>> {
        Profile::find_by_phone(phone, &self.pool)
            .await
            .map_err(map_err)
    }

    async fn insert_credential(&self, phone: &str) -> StoreResult<Credential> {
        Credential::insert(phone, &self.pool).await.map_err(map_err)
    }

    async fn insert_profile(
        &self,
        credential_id: Uuid,
        phone: &str,
        display_name: &str,
        role: Role,
    ) -> StoreResult<Profile> {
        Profile::insert(credential_id, phone, display_name, role, &self.pool)
            .await
            .map_err(map_err)
    }

    async fn link_profile(
        &self,
        profile_id: Uuid,
        credential_id: Uuid,
    ) -> StoreResult<Option<Profile>> {
        Profile::link_credential(profile_id, credential_id, &self.pool)
            .await
            .map_err(map_err)
    }

    async fn upsert_role_grant(&self, credential_id: Uuid, role: Role) -> StoreResult<RoleGrant> {
        RoleGrant::upsert(credential_id, role, &self.pool)
            .await
            .map_err(map_err)
    }

    async fn set_synthetic_address_if_absent(
        &self,
        credential_id: Uuid,
        address: &str,
    ) -> StoreResult<Credential> {
        Credential::set_synthetic_address_if_absent(credential_id, address, &self.pool)
            .await
            .map_err(map_err)
    }
}
