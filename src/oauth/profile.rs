//! Mapping provider userinfo documents to identity assertions
//!
//! Providers disagree on shape. Portable-contacts style profiles carry an
//! `emails` array of `{ "value": ... }` objects (entries may lack `value`);
//! OpenID Connect userinfo carries a single `email`. Both are accepted.
//!
//! An address the provider explicitly marks unverified (`email_verified:
//! false`, or `"verified": false` on an `emails` entry) proves nothing about
//! ownership and becomes a claim with no value, so it can never match.

use crate::models::{EmailClaim, IdentityAssertion};
use serde_json::Value;

const IDENTIFIER_FIELDS: &[&str] = &["sub", "id", "identifier"];

/// Convert a userinfo document into an assertion.
///
/// Returns `None` when the document is not a JSON object, i.e. the provider
/// gave no usable user. An object without any email fields yields an
/// assertion with no claims.
#[must_use]
pub fn assertion_from_userinfo(profile: &Value) -> Option<IdentityAssertion> {
    let object = profile.as_object()?;

    let identifier = IDENTIFIER_FIELDS
        .iter()
        .find_map(|field| object.get(*field).and_then(identifier_string))
        .unwrap_or_default();

    let email_claims = if let Some(emails) = object.get("emails").and_then(Value::as_array) {
        emails.iter().map(claim_from_entry).collect()
    } else if let Some(email) = object.get("email").and_then(Value::as_str) {
        if marked_unverified(object.get("email_verified")) {
            vec![EmailClaim::missing()]
        } else {
            vec![EmailClaim::new(email)]
        }
    } else {
        Vec::new()
    };

    Some(IdentityAssertion::new(identifier, email_claims))
}

fn identifier_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn claim_from_entry(entry: &Value) -> EmailClaim {
    match entry {
        Value::String(s) => EmailClaim::new(s.clone()),
        Value::Object(fields) if marked_unverified(fields.get("verified")) => {
            EmailClaim::missing()
        }
        Value::Object(fields) => EmailClaim {
            value: fields
                .get("value")
                .and_then(Value::as_str)
                .map(str::to_string),
        },
        _ => EmailClaim::missing(),
    }
}

/// Some providers send the flag as a string
fn marked_unverified(flag: Option<&Value>) -> bool {
    match flag {
        Some(Value::Bool(verified)) => !verified,
        Some(Value::String(verified)) => verified.eq_ignore_ascii_case("false"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_portable_contacts_emails_keep_order_and_gaps() {
        let profile = json!({
            "identifier": "https://me.yahoo.com/a/abc",
            "emails": [
                { "value": "x@foo.com", "type": "home" },
                { "type": "work" },
                { "value": "claimed@bar.com" }
            ]
        });

        let assertion = assertion_from_userinfo(&profile).unwrap();

        assert_eq!(assertion.identifier, "https://me.yahoo.com/a/abc");
        assert_eq!(
            assertion.email_claims,
            vec![
                EmailClaim::new("x@foo.com"),
                EmailClaim::missing(),
                EmailClaim::new("claimed@bar.com"),
            ]
        );
    }

    #[test]
    fn test_oidc_single_email() {
        let profile = json!({ "sub": "12345", "email": "a@example.com", "email_verified": true });

        let assertion = assertion_from_userinfo(&profile).unwrap();

        assert_eq!(assertion.identifier, "12345");
        assert_eq!(assertion.email_claims, vec![EmailClaim::new("a@example.com")]);
    }

    #[test]
    fn test_oidc_unverified_email_has_no_value() {
        for flag in [json!(false), json!("false")] {
            let profile = json!({ "sub": "12345", "email": "a@example.com", "email_verified": flag });

            let assertion = assertion_from_userinfo(&profile).unwrap();

            assert_eq!(assertion.email_claims, vec![EmailClaim::missing()]);
        }
    }

    #[test]
    fn test_unverified_entries_in_emails_array_have_no_value() {
        let profile = json!({
            "sub": "s",
            "emails": [
                { "value": "claimed@bar.com", "verified": false },
                { "value": "claimed@bar.com", "verified": true },
                { "value": "other@bar.com" }
            ]
        });

        let assertion = assertion_from_userinfo(&profile).unwrap();

        assert_eq!(
            assertion.email_claims,
            vec![
                EmailClaim::missing(),
                EmailClaim::new("claimed@bar.com"),
                EmailClaim::new("other@bar.com"),
            ]
        );
    }

    #[test]
    fn test_numeric_identifier_and_no_emails() {
        let assertion = assertion_from_userinfo(&json!({ "id": 42, "name": "x" })).unwrap();

        assert_eq!(assertion.identifier, "42");
        assert!(assertion.email_claims.is_empty());
    }

    #[test]
    fn test_non_object_is_no_user() {
        assert!(assertion_from_userinfo(&Value::Null).is_none());
        assert!(assertion_from_userinfo(&json!(["a@b.com"])).is_none());
    }

    #[test]
    fn test_unexpected_entry_shapes_become_missing_claims() {
        let profile = json!({ "sub": "s", "emails": ["plain@b.com", 7, null] });

        let assertion = assertion_from_userinfo(&profile).unwrap();

        assert_eq!(
            assertion.email_claims,
            vec![
                EmailClaim::new("plain@b.com"),
                EmailClaim::missing(),
                EmailClaim::missing(),
            ]
        );
    }
}
