use crate::settings::ApplicationSettings;
use crate::utils::logging::LoggingHelper;

/// Public URLs derived once at startup from the application settings.
///
/// Immutable after construction and shared by the provider client and the
/// route handlers. Only `return_url` is sent to providers today (as the
/// OAuth `redirect_uri`). `hostname` is the common base of the other two.
/// `realm` is the OpenID 2.0 realm for this deployment; it is not sent
/// automatically, and operators whose provider still asks for one set
/// `openid.realm` to this value in `extra_auth_params`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoints {
    /// `<protocol>://<issuer>`
    pub hostname: String,
    /// Absolute URL of the provider's return route
    pub return_url: String,
    /// `<hostname>/`, the OpenID 2.0 realm covering every return URL
    pub realm: String,
}

impl ProviderEndpoints {
    #[must_use]
    pub fn new(application: &ApplicationSettings, provider: &str) -> Self {
        let protocol = if application.use_https { "https" } else { "http" };
        let hostname = format!("{protocol}://{}", application.issuer);
        let return_url = format!("{hostname}{}", Self::return_path(provider));
        let realm = format!("{hostname}/");

        LoggingHelper::log_provider_endpoints(provider, &hostname, &return_url, &realm);

        Self {
            hostname,
            return_url,
            realm,
        }
    }

    /// Path of the route the provider redirects back to
    #[must_use]
    pub fn return_path(provider: &str) -> String {
        format!("/auth/{provider}/return")
    }
}
