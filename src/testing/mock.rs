//! Mock objects and fake implementations for testing
//!
//! This module provides in-memory implementations of the session store,
//! metrics sink and identity provider for isolated unit testing.

use crate::metrics::MetricsSink;
use crate::models::IdentityAssertion;
use crate::oauth::{IdentityProvider, OAuthError};
use crate::session::PendingClaimStore;
use async_trait::async_trait;
use std::sync::Mutex;

/// Session store kept entirely in memory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySession {
    pub claimed_email: Option<String>,
    pub redirect_target: Option<String>,
    pub current_user: Option<String>,
}

impl MemorySession {
    #[must_use]
    pub fn with_claim(claimed_email: &str, redirect_target: &str) -> Self {
        Self {
            claimed_email: Some(claimed_email.to_string()),
            redirect_target: Some(redirect_target.to_string()),
            current_user: None,
        }
    }
}

impl PendingClaimStore for MemorySession {
    fn claimed_email(&self) -> Option<String> {
        self.claimed_email.clone()
    }

    fn redirect_target(&self) -> Option<String> {
        self.redirect_target.clone()
    }

    fn clear_claimed_email(&mut self) {
        self.claimed_email = None;
    }

    fn clear_redirect_target(&mut self) {
        self.redirect_target = None;
    }

    fn set_current_user(&mut self, email: &str) {
        self.current_user = Some(email.to_string());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedMetric {
    Counter(String),
    Timing(String, u64),
}

/// Metrics sink remembering everything emitted, in order
#[derive(Debug, Default)]
pub struct RecordingMetrics {
    recorded: Mutex<Vec<RecordedMetric>>,
}

impl RecordingMetrics {
    /// # Panics
    ///
    /// Panics if the lock was poisoned by a panicking test thread
    #[must_use]
    pub fn recorded(&self) -> Vec<RecordedMetric> {
        self.recorded.lock().unwrap().clone()
    }

    #[must_use]
    pub fn counters(&self) -> Vec<String> {
        self.recorded()
            .into_iter()
            .filter_map(|metric| match metric {
                RecordedMetric::Counter(name) => Some(name),
                RecordedMetric::Timing(..) => None,
            })
            .collect()
    }

    #[must_use]
    pub fn timings(&self) -> Vec<String> {
        self.recorded()
            .into_iter()
            .filter_map(|metric| match metric {
                RecordedMetric::Timing(name, _) => Some(name),
                RecordedMetric::Counter(_) => None,
            })
            .collect()
    }

    /// How many times the counter `name` was incremented
    #[must_use]
    pub fn count(&self, name: &str) -> usize {
        self.counters().iter().filter(|counter| *counter == name).count()
    }
}

impl MetricsSink for RecordingMetrics {
    fn increment(&self, name: &str) {
        self.recorded
            .lock()
            .unwrap()
            .push(RecordedMetric::Counter(name.to_string()));
    }

    fn timing(&self, name: &str, millis: u64) {
        self.recorded
            .lock()
            .unwrap()
            .push(RecordedMetric::Timing(name.to_string(), millis));
    }
}

/// What a [`MockIdentityProvider`] answers on code exchange
#[derive(Debug, Clone)]
pub enum MockExchange {
    Assertion(IdentityAssertion),
    NoUser,
    Fails,
}

/// Identity provider that answers from a canned response
#[derive(Debug, Clone)]
pub struct MockIdentityProvider {
    pub name: String,
    pub exchange: MockExchange,
}

impl MockIdentityProvider {
    #[must_use]
    pub fn returning(name: &str, assertion: IdentityAssertion) -> Self {
        Self {
            name: name.to_string(),
            exchange: MockExchange::Assertion(assertion),
        }
    }

    #[must_use]
    pub fn without_user(name: &str) -> Self {
        Self {
            name: name.to_string(),
            exchange: MockExchange::NoUser,
        }
    }

    #[must_use]
    pub fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            exchange: MockExchange::Fails,
        }
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn authorization_url(&self, state: &str) -> Result<String, OAuthError> {
        Ok(format!(
            "https://idp.test/authorize?state={}",
            urlencoding::encode(state)
        ))
    }

    async fn fetch_assertion(&self, code: &str) -> Result<Option<IdentityAssertion>, OAuthError> {
        match &self.exchange {
            MockExchange::Assertion(assertion) => Ok(Some(assertion.clone())),
            MockExchange::NoUser => Ok(None),
            MockExchange::Fails => Err(OAuthError::TokenExchange(format!(
                "mock provider rejected code {code}"
            ))),
        }
    }
}
