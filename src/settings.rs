use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClaimcheckSettings {
    #[serde(default)]
    pub application: ApplicationSettings,
    #[serde(default)]
    pub routes: RouteSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub cookies: CookieSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub metrics: MetricsSettings,
    #[serde(default)]
    pub providers: Vec<ProviderSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    /// Public host name the identity provider redirects back to
    pub issuer: String,
    pub use_https: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteSettings {
    /// Where every failed reconciliation ends up
    pub error_path: String,
    /// Where a handshake that cannot start ends up
    pub login_path: String,
    /// Post-login target when the pending claim carried none
    pub default_redirect: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub session_secret: String,
    pub session_duration_hours: u64,
    /// Lifetime of the pending claim cookie set before the provider redirect
    pub pending_claim_minutes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieSettings {
    pub secure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    /// Record into a Prometheus registry served on `/metrics`
    pub enabled: bool,
    pub prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub name: String,
    pub display_name: Option<String>,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    // Direct values (can be overridden by environment variables)
    pub client_id: Option<String>,
    pub client_secret: Option<String>,

    // Environment variable names for overrides
    pub client_id_env: Option<String>,
    pub client_secret_env: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,
    pub extra_auth_params: Option<HashMap<String, String>>,
}

fn default_true() -> bool {
    true
}

fn default_scopes() -> Vec<String> {
    vec!["openid".to_string(), "email".to_string()]
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            issuer: "localhost:8080".to_string(),
            use_https: false,
        }
    }
}

impl Default for RouteSettings {
    fn default() -> Self {
        Self {
            error_path: "/error".to_string(),
            login_path: "/login".to_string(),
            default_redirect: "/".to_string(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            session_secret: String::new(), // Will be generated if empty
            session_duration_hours: 24,
            pending_claim_minutes: 15,
        }
    }
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self { secure: true }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            prefix: "claimcheck".to_string(),
        }
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            display_name: None,
            authorization_endpoint: String::new(),
            token_endpoint: String::new(),
            userinfo_endpoint: String::new(),
            scopes: default_scopes(),
            client_id: None,
            client_secret: None,
            client_id_env: None,
            client_secret_env: None,
            enabled: true,
            extra_auth_params: Some(HashMap::new()),
        }
    }
}

impl ClaimcheckSettings {
    /// Load settings from configuration files and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Logger initialization fails
    /// - Settings file cannot be read or parsed
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        Self::initialize_environment()?;

        let mut settings = Self::load_base_settings()?;
        Self::apply_env_overrides(&mut settings);

        Ok(settings)
    }

    /// Load the `.env` file and initialize logging
    ///
    /// # Errors
    ///
    /// Returns an error if logger initialization fails
    fn initialize_environment() -> Result<(), Box<dyn std::error::Error>> {
        Self::load_env_file();
        env_logger::try_init()?;
        Ok(())
    }

    /// Load base settings from TOML file(s) or use defaults
    /// Settings are loaded with the following priority (highest to lowest):
    /// 1. Environment variables (applied separately after loading base settings)
    /// 2. Settings.toml in `CLAIMCHECK_SECRETS_DIR` (if specified and exists)
    /// 3. Settings.toml in current directory (if exists)
    /// 4. Default settings
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file cannot be read or parsed
    fn load_base_settings() -> Result<Self, Box<dyn std::error::Error>> {
        let mut settings = Self::default();

        let default_config_path = std::path::PathBuf::from("Settings.toml");
        if default_config_path.exists() {
            settings = Self::from_file(&default_config_path)?;
            println!(
                "✓ Loaded base settings from {}",
                default_config_path.display()
            );
        }

        if let Ok(secrets_dir) = std::env::var("CLAIMCHECK_SECRETS_DIR") {
            let secrets_path = std::path::Path::new(&secrets_dir).join("Settings.toml");
            if secrets_path.exists() {
                settings = Self::from_file(&secrets_path)?;
                println!("✓ Overriding settings from {}", secrets_path.display());
            } else {
                println!(
                    "ℹ CLAIMCHECK_SECRETS_DIR set but no Settings.toml found at: {}",
                    secrets_path.display()
                );
            }
        }

        Ok(settings)
    }

    /// Parse a single TOML settings file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML
    pub fn from_file(path: &std::path::Path) -> Result<Self, Box<dyn std::error::Error>> {
        let toml_content = fs::read_to_string(path)?;
        Ok(basic_toml::from_str(&toml_content)?)
    }

    /// Apply environment variable overrides to settings
    pub fn apply_env_overrides(settings: &mut Self) {
        Self::apply_application_env_overrides(&mut settings.application);
        Self::apply_session_env_overrides(&mut settings.session);
        Self::apply_cookie_env_overrides(&mut settings.cookies);
        Self::apply_logging_env_overrides(&mut settings.logging);
        Self::apply_metrics_env_overrides(&mut settings.metrics);
    }

    fn apply_application_env_overrides(app_settings: &mut ApplicationSettings) {
        if let Ok(host) = std::env::var("HOST") {
            app_settings.host = host;
        }
        if let Ok(port_str) = std::env::var("PORT") {
            if let Ok(port) = port_str.parse::<u16>() {
                app_settings.port = port;
            }
        }
        if let Ok(issuer) = std::env::var("ISSUER") {
            app_settings.issuer = issuer;
        }
        Self::apply_bool_env_override("USE_HTTPS", &mut app_settings.use_https);
    }

    /// Apply environment overrides for session settings
    pub fn apply_session_env_overrides(session_settings: &mut SessionSettings) {
        Self::apply_numeric_env_override(
            "SESSION_DURATION_HOURS",
            &mut session_settings.session_duration_hours,
        );
        Self::apply_numeric_env_override(
            "PENDING_CLAIM_MINUTES",
            &mut session_settings.pending_claim_minutes,
        );

        Self::handle_session_secret_override(session_settings);
    }

    fn apply_numeric_env_override(env_var: &str, target: &mut u64) {
        if let Ok(value_str) = std::env::var(env_var) {
            if let Ok(value) = value_str.parse::<u64>() {
                *target = value;
            }
        }
    }

    fn apply_bool_env_override(env_var: &str, target: &mut bool) {
        if let Ok(value_str) = std::env::var(env_var) {
            if let Ok(value) = value_str.parse::<bool>() {
                *target = value;
            }
        }
    }

    fn handle_session_secret_override(session_settings: &mut SessionSettings) {
        let env_secret_set = std::env::var("SESSION_SECRET").is_ok_and(|secret| {
            if secret.is_empty() {
                false
            } else {
                session_settings.session_secret = secret;
                true
            }
        });

        if !env_secret_set && session_settings.session_secret.is_empty() {
            session_settings.session_secret = Self::generate_random_session_secret();
            Self::warn_about_generated_secret();
        }
    }

    /// Generate 32 bytes of secret material for AES-256
    fn generate_random_session_secret() -> String {
        use rand::RngCore;
        let mut secret = [0u8; 32];
        rand::rng().fill_bytes(&mut secret);
        general_purpose::STANDARD.encode(secret)
    }

    fn warn_about_generated_secret() {
        eprintln!("⚠️  WARNING: Using auto-generated session secret");
        eprintln!("🔒 For production use, set the SESSION_SECRET environment variable");
        eprintln!("   or configure session_secret in Settings.toml");
        eprintln!("💡 Pending claims and sessions will not survive a restart");
    }

    fn apply_cookie_env_overrides(cookie_settings: &mut CookieSettings) {
        Self::apply_bool_env_override("COOKIE_SECURE", &mut cookie_settings.secure);
    }

    fn apply_logging_env_overrides(logging_settings: &mut LoggingSettings) {
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            logging_settings.level = log_level;
        }
    }

    fn apply_metrics_env_overrides(metrics_settings: &mut MetricsSettings) {
        Self::apply_bool_env_override("METRICS_ENABLED", &mut metrics_settings.enabled);
        if let Ok(prefix) = std::env::var("METRICS_PREFIX") {
            metrics_settings.prefix = prefix;
        }
    }

    /// Load environment variables from .env file
    fn load_env_file() {
        if let Ok(contents) = std::fs::read_to_string(".env") {
            for line in contents.lines() {
                if let Some((key, value)) = line.split_once('=') {
                    std::env::set_var(key.trim(), value.trim());
                }
            }
        }
    }

    /// Get the bind address for the server
    #[must_use]
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.application.host, self.application.port)
    }

    #[must_use]
    pub fn get_enabled_providers(&self) -> Vec<&ProviderSettings> {
        self.providers.iter().filter(|p| p.enabled).collect()
    }
}

impl ProviderSettings {
    /// Client ID, preferring the named environment variable
    #[must_use]
    pub fn get_client_id(&self) -> Option<String> {
        self.client_id_env
            .as_ref()
            .and_then(|env_name| std::env::var(env_name).ok())
            .or_else(|| self.client_id.clone())
            .filter(|id| !id.is_empty())
    }

    /// Client secret, preferring the named environment variable
    #[must_use]
    pub fn get_client_secret(&self) -> Option<String> {
        self.client_secret_env
            .as_ref()
            .and_then(|env_name| std::env::var(env_name).ok())
            .or_else(|| self.client_secret.clone())
            .filter(|secret| !secret.is_empty())
    }

    #[must_use]
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn clean_env_vars() {
        for var in [
            "SESSION_SECRET",
            "SESSION_DURATION_HOURS",
            "PENDING_CLAIM_MINUTES",
            "CLAIMCHECK_SECRETS_DIR",
            "ISSUER",
            "USE_HTTPS",
            "METRICS_ENABLED",
            "METRICS_PREFIX",
            "TEST_YAHOO_CLIENT_ID",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_default_routes() {
        let settings = ClaimcheckSettings::default();
        assert_eq!(settings.routes.error_path, "/error");
        assert_eq!(settings.routes.login_path, "/login");
        assert_eq!(settings.routes.default_redirect, "/");
        assert_eq!(settings.session.session_secret, "");
    }

    #[test]
    #[serial]
    fn test_session_secret_env_override() {
        clean_env_vars();

        let mut session_settings = SessionSettings {
            session_secret: "default-secret".to_string(),
            ..SessionSettings::default()
        };
        std::env::set_var("SESSION_SECRET", "env-override-secret");
        std::env::set_var("PENDING_CLAIM_MINUTES", "5");

        ClaimcheckSettings::apply_session_env_overrides(&mut session_settings);

        assert_eq!(session_settings.session_secret, "env-override-secret");
        assert_eq!(session_settings.pending_claim_minutes, 5);
        assert_eq!(session_settings.session_duration_hours, 24);

        clean_env_vars();
    }

    #[test]
    #[serial]
    fn test_session_secret_auto_generation() {
        clean_env_vars();

        let mut first = SessionSettings::default();
        let mut second = SessionSettings::default();
        ClaimcheckSettings::apply_session_env_overrides(&mut first);
        ClaimcheckSettings::apply_session_env_overrides(&mut second);

        // Base64 encoded 32 bytes is 44 chars
        assert_eq!(first.session_secret.len(), 44);
        assert_ne!(first.session_secret, second.session_secret);

        clean_env_vars();
    }

    #[test]
    #[serial]
    fn test_application_and_metrics_env_overrides() {
        clean_env_vars();
        std::env::set_var("ISSUER", "login.example.org");
        std::env::set_var("USE_HTTPS", "true");
        std::env::set_var("METRICS_ENABLED", "true");
        std::env::set_var("METRICS_PREFIX", "login");

        let mut settings = ClaimcheckSettings::default();
        settings.session.session_secret = "fixed".to_string();
        ClaimcheckSettings::apply_env_overrides(&mut settings);

        assert_eq!(settings.application.issuer, "login.example.org");
        assert!(settings.application.use_https);
        assert!(settings.metrics.enabled);
        assert_eq!(settings.metrics.prefix, "login");
        assert_eq!(settings.session.session_secret, "fixed");

        clean_env_vars();
    }

    #[test]
    #[serial]
    fn test_invalid_bool_override_is_ignored() {
        clean_env_vars();
        std::env::set_var("USE_HTTPS", "yes please");

        let mut settings = ClaimcheckSettings::default();
        settings.session.session_secret = "fixed".to_string();
        ClaimcheckSettings::apply_env_overrides(&mut settings);

        assert!(!settings.application.use_https);
        clean_env_vars();
    }

    #[test]
    fn test_settings_file_parsing() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[application]
host = "127.0.0.1"
port = 9000
issuer = "auth.example.org"
use_https = true

[routes]
error_path = "/oops"
login_path = "/signin"
default_redirect = "/home"

[metrics]
enabled = true

[[providers]]
name = "yahoo"
authorization_endpoint = "https://api.login.yahoo.com/oauth2/request_auth"
token_endpoint = "https://api.login.yahoo.com/oauth2/get_token"
userinfo_endpoint = "https://api.login.yahoo.com/openid/v1/userinfo"
client_id = "abc"
"#
        )
        .unwrap();

        let settings = ClaimcheckSettings::from_file(file.path()).unwrap();

        assert_eq!(settings.get_bind_address(), "127.0.0.1:9000");
        assert_eq!(settings.routes.error_path, "/oops");
        // Sections missing from the file fall back to defaults
        assert_eq!(settings.session.pending_claim_minutes, 15);
        assert!(settings.metrics.enabled);
        assert_eq!(settings.metrics.prefix, "claimcheck");
        let provider = settings.get_enabled_providers()[0];
        assert!(provider.enabled);
        assert_eq!(provider.scopes, vec!["openid", "email"]);
        assert_eq!(provider.get_client_id().as_deref(), Some("abc"));
        assert_eq!(provider.label(), "yahoo");
    }

    #[test]
    #[serial]
    fn test_client_id_env_takes_precedence() {
        clean_env_vars();
        std::env::set_var("TEST_YAHOO_CLIENT_ID", "from-env");

        let provider = ProviderSettings {
            name: "yahoo".to_string(),
            client_id: Some("from-file".to_string()),
            client_id_env: Some("TEST_YAHOO_CLIENT_ID".to_string()),
            ..ProviderSettings::default()
        };

        assert_eq!(provider.get_client_id().as_deref(), Some("from-env"));
        assert_eq!(provider.get_client_secret(), None);
        clean_env_vars();
    }
}
