use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domains::auth::types::Role;

/// An active role assignment tied to a credential.
///
/// Keyed by `(credential_id, role)`; a credential may hold several roles at
/// once and granting one never touches the others.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RoleGrant {
    pub credential_id: Uuid,
    pub role: Role,
    pub is_active: bool,
    pub granted_at: DateTime<Utc>,
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl RoleGrant {
    /// Idempotent upsert: inserting an existing grant re-activates it rather
    /// than duplicating the row.
    pub async fn upsert(credential_id: Uuid, role: Role, pool: &PgPool) -> sqlx::Result<Self> {
        sqlx::query_as::<_, RoleGrant>(
            r#"
            INSERT INTO role_grants (credential_id, role, is_active, granted_at)
            VALUES ($1, $2, TRUE, $3)
            ON CONFLICT (credential_id, role) DO UPDATE SET is_active = TRUE
            RETURNING *
            "#,
        )
        .bind(credential_id)
        .bind(role)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }
}
