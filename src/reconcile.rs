//! Assertion reconciliation
//!
//! Decides whether an identity provider's email claims vouch for the email the
//! user claimed before leaving for the provider. Synchronous and free of
//! shared mutable state; all I/O happens in the caller.

use crate::metrics::MetricsSink;
use crate::models::IdentityAssertion;
use crate::session::PendingClaimStore;
use crate::utils::logging::LoggingHelper;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Why a reconciliation did not authenticate the user.
///
/// None of these are faults; each ends in a redirect to the error page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReconcileFailure {
    #[error("identity provider returned no email claims")]
    NoEmailsProvided,
    #[error("no provider email matched the pending claim")]
    NoEmailMatched,
    #[error("session holds no pending email claim")]
    NoPendingClaim,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// `email` is the matched claim with the provider's casing
    Authenticated {
        email: String,
        redirect_target: String,
    },
    Failed(ReconcileFailure),
}

impl SessionOutcome {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }
}

/// Metric names for one provider's return endpoint
#[derive(Debug, Clone)]
pub struct ReturnMetrics {
    base: String,
}

impl ReturnMetrics {
    #[must_use]
    pub fn for_provider(provider: &str) -> Self {
        Self {
            base: format!("routes.auth.{provider}.return"),
        }
    }

    /// Timer name, also the prefix of every counter
    #[must_use]
    pub fn timer(&self) -> &str {
        &self.base
    }

    #[must_use]
    pub fn get(&self) -> String {
        format!("{}.get", self.base)
    }

    #[must_use]
    pub fn email_matched(&self) -> String {
        format!("{}.email_matched", self.base)
    }

    #[must_use]
    pub fn no_email_value(&self) -> String {
        format!("warn.{}.no_email_value", self.base)
    }

    #[must_use]
    pub fn no_emails(&self) -> String {
        format!("warn.{}.no_emails", self.base)
    }

    #[must_use]
    pub fn no_emails_matched(&self) -> String {
        format!("warn.{}.no_emails_matched", self.base)
    }

    #[must_use]
    pub fn no_pending_claim(&self) -> String {
        format!("warn.{}.no_pending_claim", self.base)
    }
}

/// Matches a provider's assertion against a session's pending claim
pub struct AssertionReconciler {
    provider: String,
    names: ReturnMetrics,
    metrics: Arc<dyn MetricsSink>,
    default_redirect: String,
}

impl AssertionReconciler {
    #[must_use]
    pub fn new(provider: &str, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            provider: provider.to_string(),
            names: ReturnMetrics::for_provider(provider),
            metrics,
            default_redirect: "/".to_string(),
        }
    }

    /// Target used when a verified claim carried no redirect target
    #[must_use]
    pub fn with_default_redirect(mut self, target: &str) -> Self {
        self.default_redirect = target.to_string();
        self
    }

    /// Reconcile `assertion` against the pending claim in `session`.
    ///
    /// On a match the pending claim is cleared and the matched email becomes
    /// the session's current user. On any failure the session is left as it
    /// was. Emits the `.get` counter, one outcome counter and the timer.
    pub fn reconcile<S>(&self, assertion: Option<&IdentityAssertion>, session: &mut S) -> SessionOutcome
    where
        S: PendingClaimStore + ?Sized,
    {
        let started = Instant::now();
        self.metrics.increment(&self.names.get());

        let outcome = self.decide(assertion, session);

        let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.metrics.timing(self.names.timer(), elapsed);
        outcome
    }

    fn decide<S>(&self, assertion: Option<&IdentityAssertion>, session: &mut S) -> SessionOutcome
    where
        S: PendingClaimStore + ?Sized,
    {
        let Some(assertion) = assertion.filter(|a| !a.email_claims.is_empty()) else {
            LoggingHelper::log_no_emails(&self.provider, assertion);
            self.metrics.increment(&self.names.no_emails());
            return SessionOutcome::Failed(ReconcileFailure::NoEmailsProvided);
        };

        let Some(claimed_email) = session.claimed_email().filter(|email| !email.is_empty()) else {
            LoggingHelper::log_no_pending_claim(&self.provider);
            self.metrics.increment(&self.names.no_pending_claim());
            return SessionOutcome::Failed(ReconcileFailure::NoPendingClaim);
        };
        let claimed_email = claimed_email.to_lowercase();

        // First match wins; later claims are not inspected at all
        let matched = assertion
            .email_claims
            .iter()
            .enumerate()
            .find_map(|(index, claim)| {
                let Some(value) = claim.usable_value() else {
                    LoggingHelper::log_missing_email_value(&self.provider, index, claim);
                    self.metrics.increment(&self.names.no_email_value());
                    return None;
                };
                (value.to_lowercase() == claimed_email).then(|| value.to_string())
            });

        let Some(email) = matched else {
            LoggingHelper::log_no_email_matched(&self.provider, assertion);
            self.metrics.increment(&self.names.no_emails_matched());
            return SessionOutcome::Failed(ReconcileFailure::NoEmailMatched);
        };

        let redirect_target = session
            .redirect_target()
            .filter(|target| !target.is_empty())
            .unwrap_or_else(|| self.default_redirect.clone());

        session.clear_claimed_email();
        session.clear_redirect_target();
        session.set_current_user(&email);

        self.metrics.increment(&self.names.email_matched());
        LoggingHelper::log_email_matched(&self.provider, &assertion.identifier);

        SessionOutcome::Authenticated {
            email,
            redirect_target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EmailClaim;
    use crate::testing::mock::{MemorySession, RecordingMetrics};

    fn reconciler(metrics: &Arc<RecordingMetrics>) -> AssertionReconciler {
        AssertionReconciler::new("yahoo", metrics.clone())
    }

    #[test]
    fn test_second_claim_matches_case_insensitively() {
        let metrics = Arc::new(RecordingMetrics::default());
        let assertion = IdentityAssertion::with_emails("id", &["x@foo.com", "claimed@bar.com"]);
        let mut session = MemorySession::with_claim("CLAIMED@bar.com", "/dashboard");

        let outcome = reconciler(&metrics).reconcile(Some(&assertion), &mut session);

        assert_eq!(
            outcome,
            SessionOutcome::Authenticated {
                email: "claimed@bar.com".to_string(),
                redirect_target: "/dashboard".to_string(),
            }
        );
        assert_eq!(session.claimed_email(), None);
        assert_eq!(session.redirect_target(), None);
        // Provider casing is what gets stored
        assert_eq!(session.current_user.as_deref(), Some("claimed@bar.com"));
        assert_eq!(
            metrics.counters(),
            vec![
                "routes.auth.yahoo.return.get",
                "routes.auth.yahoo.return.email_matched",
            ]
        );
        assert_eq!(metrics.timings(), vec!["routes.auth.yahoo.return"]);
    }

    #[test]
    fn test_mixed_case_claim_matches_lowercase_assertion() {
        let metrics = Arc::new(RecordingMetrics::default());
        let assertion = IdentityAssertion::with_emails("id", &["a@example.com"]);
        let mut session = MemorySession::with_claim("A@Example.com", "/");

        let outcome = reconciler(&metrics).reconcile(Some(&assertion), &mut session);

        assert!(outcome.is_authenticated());
    }

    #[test]
    fn test_no_match_preserves_pending_claim() {
        let metrics = Arc::new(RecordingMetrics::default());
        let assertion = IdentityAssertion::with_emails("id", &["x@foo.com", "y@foo.com"]);
        let mut session = MemorySession::with_claim("claimed@bar.com", "/dashboard");

        let outcome = reconciler(&metrics).reconcile(Some(&assertion), &mut session);

        assert_eq!(outcome, SessionOutcome::Failed(ReconcileFailure::NoEmailMatched));
        assert_eq!(session.claimed_email().as_deref(), Some("claimed@bar.com"));
        assert_eq!(session.redirect_target().as_deref(), Some("/dashboard"));
        assert_eq!(session.current_user, None);
        assert_eq!(metrics.count("warn.routes.auth.yahoo.return.no_emails_matched"), 1);
        assert_eq!(metrics.timings().len(), 1);
    }

    #[test]
    fn test_empty_claim_list_fails_without_scanning() {
        let metrics = Arc::new(RecordingMetrics::default());
        let assertion = IdentityAssertion::new("id", Vec::new());
        let mut session = MemorySession::with_claim("claimed@bar.com", "/dashboard");

        let outcome = reconciler(&metrics).reconcile(Some(&assertion), &mut session);

        assert_eq!(outcome, SessionOutcome::Failed(ReconcileFailure::NoEmailsProvided));
        assert_eq!(session.claimed_email().as_deref(), Some("claimed@bar.com"));
        assert_eq!(
            metrics.counters(),
            vec![
                "routes.auth.yahoo.return.get",
                "warn.routes.auth.yahoo.return.no_emails",
            ]
        );
    }

    #[test]
    fn test_absent_assertion_fails() {
        let metrics = Arc::new(RecordingMetrics::default());
        let mut session = MemorySession::with_claim("claimed@bar.com", "/dashboard");

        let outcome = reconciler(&metrics).reconcile(None, &mut session);

        assert_eq!(outcome, SessionOutcome::Failed(ReconcileFailure::NoEmailsProvided));
        assert_eq!(session.redirect_target().as_deref(), Some("/dashboard"));
    }

    #[test]
    fn test_missing_value_is_skipped() {
        let metrics = Arc::new(RecordingMetrics::default());
        let assertion = IdentityAssertion::new(
            "id",
            vec![
                EmailClaim::missing(),
                EmailClaim::new(""),
                EmailClaim::new("Claimed@Bar.com"),
            ],
        );
        let mut session = MemorySession::with_claim("claimed@bar.com", "/next");

        let outcome = reconciler(&metrics).reconcile(Some(&assertion), &mut session);

        assert_eq!(
            outcome,
            SessionOutcome::Authenticated {
                email: "Claimed@Bar.com".to_string(),
                redirect_target: "/next".to_string(),
            }
        );
        assert_eq!(metrics.count("warn.routes.auth.yahoo.return.no_email_value"), 2);
    }

    #[test]
    fn test_only_invalid_claims_is_no_match() {
        let metrics = Arc::new(RecordingMetrics::default());
        let assertion = IdentityAssertion::new("id", vec![EmailClaim::missing()]);
        let mut session = MemorySession::with_claim("claimed@bar.com", "/next");

        let outcome = reconciler(&metrics).reconcile(Some(&assertion), &mut session);

        assert_eq!(outcome, SessionOutcome::Failed(ReconcileFailure::NoEmailMatched));
        assert_eq!(metrics.count("warn.routes.auth.yahoo.return.no_email_value"), 1);
        assert_eq!(metrics.count("warn.routes.auth.yahoo.return.no_emails_matched"), 1);
        assert_eq!(metrics.count("warn.routes.auth.yahoo.return.no_emails"), 0);
    }

    #[test]
    fn test_first_match_wins_and_stops_scanning() {
        let metrics = Arc::new(RecordingMetrics::default());
        // Precondition for this list: duplicates are not expected from providers
        let assertion = IdentityAssertion::new(
            "id",
            vec![
                EmailClaim::new("CLAIMED@bar.com"),
                EmailClaim::new("claimed@BAR.com"),
                EmailClaim::missing(),
            ],
        );
        let mut session = MemorySession::with_claim("claimed@bar.com", "/");

        let outcome = reconciler(&metrics).reconcile(Some(&assertion), &mut session);

        assert_eq!(
            outcome,
            SessionOutcome::Authenticated {
                email: "CLAIMED@bar.com".to_string(),
                redirect_target: "/".to_string(),
            }
        );
        // The claim after the match is never looked at
        assert_eq!(metrics.count("warn.routes.auth.yahoo.return.no_email_value"), 0);
    }

    #[test]
    fn test_second_reconcile_after_success_fails() {
        let metrics = Arc::new(RecordingMetrics::default());
        let assertion = IdentityAssertion::with_emails("id", &["claimed@bar.com"]);
        let mut session = MemorySession::with_claim("claimed@bar.com", "/dashboard");
        let reconciler = reconciler(&metrics);

        assert!(reconciler.reconcile(Some(&assertion), &mut session).is_authenticated());
        let second = reconciler.reconcile(Some(&assertion), &mut session);

        assert_eq!(second, SessionOutcome::Failed(ReconcileFailure::NoPendingClaim));
        assert_eq!(metrics.count("routes.auth.yahoo.return.email_matched"), 1);
        assert_eq!(metrics.count("warn.routes.auth.yahoo.return.no_pending_claim"), 1);
        assert_eq!(metrics.timings().len(), 2);
    }

    #[test]
    fn test_missing_redirect_target_uses_default() {
        let metrics = Arc::new(RecordingMetrics::default());
        let assertion = IdentityAssertion::with_emails("id", &["a@b.com"]);
        let mut session = MemorySession {
            claimed_email: Some("a@b.com".to_string()),
            ..MemorySession::default()
        };

        let outcome = AssertionReconciler::new("yahoo", metrics.clone())
            .with_default_redirect("/home")
            .reconcile(Some(&assertion), &mut session);

        assert_eq!(
            outcome,
            SessionOutcome::Authenticated {
                email: "a@b.com".to_string(),
                redirect_target: "/home".to_string(),
            }
        );
    }

    #[test]
    fn test_failure_reasons_render_without_user_data() {
        for failure in [
            ReconcileFailure::NoEmailsProvided,
            ReconcileFailure::NoEmailMatched,
            ReconcileFailure::NoPendingClaim,
        ] {
            assert!(!failure.to_string().contains('@'));
        }
    }
}
