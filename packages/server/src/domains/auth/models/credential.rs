use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// The authenticatable identity record, keyed by phone.
///
/// `phone` is unique; the provisioner leans on the store rejecting a second
/// insert for the same number. `synthetic_address` is set lazily the first
/// time the session backing service needs an address-like identifier and is
/// reused for every later issuance.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Credential {
    pub id: Uuid,
    pub phone: String,
    pub synthetic_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl Credential {
    pub async fn find_by_phone(phone: &str, pool: &PgPool) -> sqlx::Result<Option<Self>> {
        sqlx::query_as::<_, Credential>("SELECT * FROM credentials WHERE phone = $1")
            .bind(phone)
            .fetch_optional(pool)
            .await
    }

    /// Insert a credential for a phone. Fails with a unique violation when a
    /// concurrent request has just created one; callers treat that as an
    /// expected conflict, not an error.
    pub async fn insert(phone: &str, pool: &PgPool) -> sqlx::Result<Self> {
        sqlx::query_as::<_, Credential>(
            r#"
            INSERT INTO credentials (id, phone, created_at)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(phone)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    /// Set the synthetic address if none is present yet. First writer wins;
    /// the returned row carries whichever value ended up persisted.
    pub async fn set_synthetic_address_if_absent(
        id: Uuid,
        address: &str,
        pool: &PgPool,
    ) -> sqlx::Result<Self> {
        sqlx::query_as::<_, Credential>(
            r#"
            UPDATE credentials
            SET synthetic_address = COALESCE(synthetic_address, $2)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(address)
        .fetch_one(pool)
        .await
    }
}
