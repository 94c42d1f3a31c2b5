use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domains::auth::types::Role;

/// Application-level user record with display attributes and default role.
///
/// `phone` is unique. `credential_id` is nullable: a profile left behind by a
/// partially completed provisioning attempt is *orphaned* until a later
/// verification links it. Once set, `credential_id` never changes to a
/// different value (the link update is conditional on it still being null).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub credential_id: Option<Uuid>,
    pub phone: String,
    pub display_name: String,
    pub default_role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl Profile {
    pub async fn find_by_phone(phone: &str, pool: &PgPool) -> sqlx::Result<Option<Self>> {
        sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE phone = $1")
            .bind(phone)
            .fetch_optional(pool)
            .await
    }

    pub async fn insert(
        credential_id: Uuid,
        phone: &str,
        display_name: &str,
        role: Role,
        pool: &PgPool,
    ) -> sqlx::Result<Self> {
        let now = Utc::now();
        sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles
                (id, credential_id, phone, display_name, default_role, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, TRUE, $6, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(credential_id)
        .bind(phone)
        .bind(display_name)
        .bind(role)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    /// Adopt an orphaned profile. Conditional on `credential_id` still being
    /// null so a concurrent link cannot be overwritten; `None` means this
    /// caller lost that race (or the profile was never orphaned).
    pub async fn link_credential(
        profile_id: Uuid,
        credential_id: Uuid,
        pool: &PgPool,
    ) -> sqlx::Result<Option<Self>> {
        sqlx::query_as::<_, Profile>(
            r#"
            UPDATE profiles
            SET credential_id = $2, updated_at = $3
            WHERE id = $1 AND credential_id IS NULL
            RETURNING *
            "#,
        )
        .bind(profile_id)
        .bind(credential_id)
        .bind(Utc::now())
        .fetch_optional(pool)
        .await
    }
}
