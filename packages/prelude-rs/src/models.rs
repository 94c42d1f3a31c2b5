use serde::{Deserialize, Serialize};

/// Response from creating a verification.
///
/// `id` is the provider-side handle; store it and pass it back to
/// [`crate::PreludeService::check_verification`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResponse {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub method: Option<String>,
}

/// Response from checking a submitted code against a verification.
///
/// `status` is the provider's coarse verdict. The provider reports success as
/// either `valid` or `succeeded` depending on API version; everything else is
/// a rejection or an in-progress state. Interpretation is left to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResponse {
    #[serde(default)]
    pub id: Option<String>,
    pub status: String,
}

/// Target of a verification (currently always a phone number).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationTarget {
    #[serde(rename = "type")]
    pub target_type: String,
    pub value: String,
}

impl VerificationTarget {
    pub fn phone_number(value: &str) -> Self {
        Self {
            target_type: "phone_number".to_string(),
            value: value.to_string(),
        }
    }
}
