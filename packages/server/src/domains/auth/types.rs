//! Auth domain data types shared across actions and the HTTP surface.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Platform role a phone signs up for.
///
/// Closed set; anything else is rejected at the boundary. A credential may
/// hold several roles at once (separate [`RoleGrant`] rows), `Role` here is
/// the one requested for this sign-in.
///
/// [`RoleGrant`]: crate::domains::auth::models::RoleGrant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Affiliate,
    Merchant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Affiliate => "affiliate",
            Role::Merchant => "merchant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "affiliate" => Ok(Role::Affiliate),
            "merchant" => Ok(Role::Merchant),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

// Roles are stored as TEXT; map them through &str at the sqlx layer.

impl sqlx::Type<sqlx::Postgres> for Role {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <&str as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <&str as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for Role {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<'q, sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Role {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<'r, sqlx::Postgres>>::decode(value)?;
        s.parse::<Role>().map_err(Into::into)
    }
}

/// The resolved identity returned to a successfully verified caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    pub credential_id: Uuid,
    pub profile_id: Uuid,
    pub phone: String,
    pub role: Role,
}

/// Ephemeral session artifact; never persisted beyond issuance.
///
/// `exchange_token` is redeemed against the session backing service by the
/// client; `exchange_address` is the contact address the token was minted
/// for (the credential's synthetic address when the account is phone-only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCredential {
    pub credential_id: Uuid,
    pub exchange_address: String,
    pub exchange_token: String,
}
