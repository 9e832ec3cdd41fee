use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of a completed third-party authentication.
///
/// Claim order is whatever the provider returned and is preserved, since the
/// reconciler credits the first matching claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityAssertion {
    /// Provider-scoped opaque identifier
    pub identifier: String,
    #[serde(default)]
    pub email_claims: Vec<EmailClaim>,
}

impl IdentityAssertion {
    #[must_use]
    pub fn new(identifier: impl Into<String>, email_claims: Vec<EmailClaim>) -> Self {
        Self {
            identifier: identifier.into(),
            email_claims,
        }
    }

    /// Build an assertion from plain email strings
    #[must_use]
    pub fn with_emails(identifier: impl Into<String>, emails: &[&str]) -> Self {
        Self::new(
            identifier,
            emails.iter().map(|email| EmailClaim::new(*email)).collect(),
        )
    }
}

/// One provider-asserted email address. Providers may omit the value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EmailClaim {
    #[serde(default)]
    pub value: Option<String>,
}

impl EmailClaim {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
        }
    }

    #[must_use]
    pub fn missing() -> Self {
        Self { value: None }
    }

    /// The claim's value, treating an empty string the same as an absent one
    #[must_use]
    pub fn usable_value(&self) -> Option<&str> {
        self.value.as_deref().filter(|value| !value.is_empty())
    }
}

/// Email the user claimed before being sent to the identity provider, plus
/// where to send them once the claim is verified. Single-use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingClaim {
    pub claimed_email: String,
    pub redirect_target: String,
    pub created_at: DateTime<Utc>,
}

impl PendingClaim {
    #[must_use]
    pub fn new(claimed_email: impl Into<String>, redirect_target: impl Into<String>) -> Self {
        Self {
            claimed_email: claimed_email.into(),
            redirect_target: redirect_target.into(),
            created_at: Utc::now(),
        }
    }
}

/// Locally authenticated user, persisted in the user cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub email: String,
    pub provider: String,
    pub authenticated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}
