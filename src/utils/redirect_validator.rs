use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

// High-confidence attack patterns that plain prefix checks would miss

static PATH_TRAVERSAL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.\.").expect("valid path traversal regex"));

static PROTOCOL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:[a-z][a-z0-9+.-]*:)|(?:/{2,})").expect("valid protocol regex")
});

static SUSPICIOUS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)[\x00-\x1F\x7F-\x9F]|%(?:00|0[aAdD]|09|5c)|\\|[\u{200E}\u{200F}\u{2060}-\u{2064}\u{2000}-\u{200A}]",
    )
    .expect("valid suspicious character regex")
});

const MAX_REDIRECT_LENGTH: usize = 2048;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RedirectError {
    #[error("redirect target must be a relative path")]
    NotRelative,
    #[error("redirect target exceeds {MAX_REDIRECT_LENGTH} bytes")]
    TooLong,
    #[error("redirect target contains a disallowed pattern")]
    Suspicious,
}

/// Validate a post-login redirect target.
///
/// Only same-origin relative paths are accepted: they start with a single
/// `/` and survive up to two rounds of URL decoding without turning into a
/// traversal, a scheme, or a protocol-relative URL.
///
/// # Errors
///
/// Returns a [`RedirectError`] describing why the target was refused
pub fn validate_post_auth_redirect(redirect_url: &str) -> Result<String, RedirectError> {
    debug!("Validating post-authentication redirect URL: {redirect_url}");

    if redirect_url.len() > MAX_REDIRECT_LENGTH {
        warn!(
            "Excessively long redirect URL: {} characters",
            redirect_url.len()
        );
        return Err(RedirectError::TooLong);
    }

    if !is_relative_url(redirect_url) {
        warn!("Rejected non-relative redirect URL: {redirect_url}");
        return Err(RedirectError::NotRelative);
    }

    for decoded in decoded_variants(redirect_url) {
        if PATH_TRAVERSAL_PATTERN.is_match(&decoded)
            || PROTOCOL_PATTERN.is_match(&decoded)
            || SUSPICIOUS_PATTERN.is_match(&decoded)
        {
            warn!("Suspicious redirect URL: {redirect_url} -> {decoded}");
            return Err(RedirectError::Suspicious);
        }
    }

    Ok(redirect_url.to_string())
}

/// Starts with one `/`; a leading slash already rules out a scheme, so `:`
/// and `@` later in the path or query are ordinary characters
fn is_relative_url(url: &str) -> bool {
    url.starts_with('/') && !url.starts_with("//")
}

/// The input plus its single and double URL-decoded forms
fn decoded_variants(request_path: &str) -> Vec<String> {
    let mut variants = Vec::with_capacity(3);
    variants.push(request_path.to_string());

    if let Ok(decoded) = urlencoding::decode(request_path) {
        let decoded_string = decoded.into_owned();
        if decoded_string != request_path {
            if let Ok(double_decoded) = urlencoding::decode(&decoded_string) {
                let double_decoded_string = double_decoded.into_owned();
                if double_decoded_string != decoded_string {
                    variants.push(double_decoded_string);
                }
            }
            variants.push(decoded_string);
        }
    }

    variants
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legitimate_redirects() {
        for redirect in [
            "/",
            "/dashboard",
            "/sign_in?return=%2Fhome",
            "/users/123",
            "/search?q=test&page=2",
        ] {
            assert_eq!(
                validate_post_auth_redirect(redirect).as_deref(),
                Ok(redirect),
                "Legitimate redirect should be allowed: {redirect}"
            );
        }
    }

    #[test]
    fn test_colon_and_at_inside_relative_path_allowed() {
        for redirect in ["/search?at=10:30", "/u/a@b/c@d", "/mail?to=a%40b.com"] {
            assert_eq!(
                validate_post_auth_redirect(redirect).as_deref(),
                Ok(redirect),
                "Relative path should be allowed: {redirect}"
            );
        }
    }

    #[test]
    fn test_absolute_and_protocol_relative_blocked() {
        for redirect in [
            "http://evil.com",
            "https://malicious.site.com/login",
            "//evil.com",
            "///evil.com",
            "javascript:alert(1)",
            "dashboard",
        ] {
            assert_eq!(
                validate_post_auth_redirect(redirect),
                Err(RedirectError::NotRelative),
                "Should be blocked: {redirect}"
            );
        }
    }

    #[test]
    fn test_traversal_and_encoded_attacks_blocked() {
        for redirect in [
            "/api/../../../etc/passwd",
            "/..%2F..%2Fetc%2Fpasswd",
            "/%252e%252e%252fetc",
            "/%2F%2Fevil.com",
            "/path%00/to/file",
            "/api%0Aheader-injection",
            "/a\\b",
            "/api\u{2000}spaced",
            "/http://evil.com",
        ] {
            assert_eq!(
                validate_post_auth_redirect(redirect),
                Err(RedirectError::Suspicious),
                "Should be blocked: {redirect}"
            );
        }
    }

    #[test]
    fn test_long_redirect_blocked() {
        let long_redirect = format!("/api/{}", "a".repeat(MAX_REDIRECT_LENGTH));
        assert_eq!(
            validate_post_auth_redirect(&long_redirect),
            Err(RedirectError::TooLong)
        );
    }
}
