use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// One code-issuance lifecycle: created on request, mutated only by attempt
/// recording, terminal exactly once.
///
/// State machine: `active -> verified` (code redeemed), `active -> locked`
/// (attempts exhausted), `active -> expired` (time elapsed or superseded).
/// No transitions out of a terminal state; every terminal transition is a
/// conditional update that only fires while the row is still `active`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Challenge {
    pub id: Uuid,
    pub phone: String,
    pub code: String,
    /// Provider-side verification handle, when the external provider was
    /// reachable at creation time. Absent means local-only verification.
    pub external_ref: Option<String>,
    pub attempts: i32,
    pub max_attempts: i32,
    pub status: ChallengeStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    Active,
    Verified,
    Expired,
    Locked,
}

/// Codes expire five minutes after issuance.
pub const CHALLENGE_TTL: Duration = Duration::minutes(5);

/// Wrong-code attempts allowed before the challenge locks.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 5;

impl ChallengeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeStatus::Active => "active",
            ChallengeStatus::Verified => "verified",
            ChallengeStatus::Expired => "expired",
            ChallengeStatus::Locked => "locked",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ChallengeStatus::Active)
    }
}

impl fmt::Display for ChallengeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown challenge status: {0}")]
pub struct UnknownChallengeStatus(String);

impl FromStr for ChallengeStatus {
    type Err = UnknownChallengeStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ChallengeStatus::Active),
            "verified" => Ok(ChallengeStatus::Verified),
            "expired" => Ok(ChallengeStatus::Expired),
            "locked" => Ok(ChallengeStatus::Locked),
            other => Err(UnknownChallengeStatus(other.to_string())),
        }
    }
}

// Statuses are stored as TEXT; map them through &str at the sqlx layer.

impl sqlx::Type<sqlx::Postgres> for ChallengeStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <&str as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <&str as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for ChallengeStatus {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<'q, sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for ChallengeStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<'r, sqlx::Postgres>>::decode(value)?;
        s.parse::<ChallengeStatus>().map_err(Into::into)
    }
}

impl Challenge {
    /// A fresh active challenge for `phone`, expiring [`CHALLENGE_TTL`] from
    /// `now`.
    pub fn new(
        phone: String,
        code: String,
        external_ref: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            phone,
            code,
            external_ref,
            attempts: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            status: ChallengeStatus::Active,
            expires_at: now + CHALLENGE_TTL,
            created_at: now,
        }
    }

    /// Whether the challenge's window has elapsed, regardless of status.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl Challenge {
    pub async fn insert(&self, pool: &PgPool) -> sqlx::Result<Self> {
        let challenge = sqlx::query_as::<_, Challenge>(
            r#"
            INSERT INTO challenges
                (id, phone, code, external_ref, attempts, max_attempts, status, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(self.id)
        .bind(&self.phone)
        .bind(&self.code)
        .bind(&self.external_ref)
        .bind(self.attempts)
        .bind(self.max_attempts)
        .bind(self.status)
        .bind(self.expires_at)
        .bind(self.created_at)
        .fetch_one(pool)
        .await?;
        Ok(challenge)
    }

    /// Most recent challenge for a phone, whatever its status.
    pub async fn latest_for_phone(phone: &str, pool: &PgPool) -> sqlx::Result<Option<Self>> {
        sqlx::query_as::<_, Challenge>(
            "SELECT * FROM challenges WHERE phone = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(phone)
        .fetch_optional(pool)
        .await
    }

    /// Supersede any still-active challenges for a phone. Returns the number
    /// of rows transitioned.
    pub async fn expire_active_for_phone(phone: &str, pool: &PgPool) -> sqlx::Result<u64> {
        let result = sqlx::query(
            "UPDATE challenges SET status = 'expired' WHERE phone = $1 AND status = 'active'",
        )
        .bind(phone)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Atomically record a verification attempt.
    ///
    /// Single-statement increment-and-check: the lockout threshold cannot be
    /// bypassed by concurrent attempts against the same challenge. Returns
    /// `None` when the challenge is no longer active.
    pub async fn record_attempt(id: Uuid, pool: &PgPool) -> sqlx::Result<Option<Self>> {
        sqlx::query_as::<_, Challenge>(
            r#"
            UPDATE challenges
            SET attempts = attempts + 1,
                status = CASE WHEN attempts + 1 >= max_attempts THEN 'locked' ELSE status END
            WHERE id = $1 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Consume the challenge. Conditional on the row still being active, so a
    /// code is redeemable exactly once; returns whether this caller won.
    pub async fn mark_verified(id: Uuid, pool: &PgPool) -> sqlx::Result<bool> {
        let result =
            sqlx::query("UPDATE challenges SET status = 'verified' WHERE id = $1 AND status = 'active'")
                .bind(id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn mark_expired(id: Uuid, pool: &PgPool) -> sqlx::Result<bool> {
        let result =
            sqlx::query("UPDATE challenges SET status = 'expired' WHERE id = $1 AND status = 'active'")
                .bind(id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_challenge_defaults() {
        let now = Utc::now();
        let challenge = Challenge::new("+966501234567".to_string(), "482913".to_string(), None, now);
        assert_eq!(challenge.attempts, 0);
        assert_eq!(challenge.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(challenge.status, ChallengeStatus::Active);
        assert_eq!(challenge.expires_at, now + Duration::minutes(5));
    }

    #[test]
    fn expiry_is_inclusive_of_deadline() {
        let now = Utc::now();
        let challenge = Challenge::new("+966501234567".to_string(), "482913".to_string(), None, now);
        assert!(!challenge.is_expired(now));
        assert!(!challenge.is_expired(now + Duration::seconds(299)));
        assert!(challenge.is_expired(now + Duration::seconds(300)));
        assert!(challenge.is_expired(now + Duration::hours(1)));
    }

    #[test]
    fn terminal_statuses() {
        assert!(!ChallengeStatus::Active.is_terminal());
        assert!(ChallengeStatus::Verified.is_terminal());
        assert!(ChallengeStatus::Expired.is_terminal());
        assert!(ChallengeStatus::Locked.is_terminal());
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            ChallengeStatus::Active,
            ChallengeStatus::Verified,
            ChallengeStatus::Expired,
            ChallengeStatus::Locked,
        ] {
            assert_eq!(status.as_str().parse::<ChallengeStatus>().unwrap(), status);
        }
        assert!("pending".parse::<ChallengeStatus>().is_err());
    }
}
