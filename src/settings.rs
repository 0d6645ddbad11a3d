use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::PortalError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalSettings {
    pub application: ApplicationSettings,
    pub http: HttpSettings,
    pub logging: LoggingSettings,
    pub portals: Vec<PortalConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: String,
}

/// Limits applied to every outbound call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_ms: u64,
    /// Upper bound for each wait on a browser page element
    pub element_wait_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginStrategy {
    TokenReplay,
    Browser,
}

/// Name/value pair used for cookies and form fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedValue {
    pub name: String,
    pub value: String,
}

impl NamedValue {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One portal tenant family and how to log into it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub name: String,
    pub base_url: String,
    pub login_strategy: LoginStrategy,
    pub login_path: String,
    /// Cookie carrying the session credential
    pub auth_cookie: String,
    /// Cookie selecting the organizational structure
    pub structure_cookie: String,
    pub default_structure: String,
    /// IANA zone sent as the `tz` cookie
    pub timezone: String,
    /// Offset dates are normalised to
    pub utc_offset_minutes: i32,
    /// Cookies the portal expects before it serves data
    pub extra_cookies: Vec<NamedValue>,
    pub login_form: LoginFormSettings,
    pub browser: Option<BrowserSettings>,
    pub endpoints: EndpointSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginFormSettings {
    pub token_field: String,
    pub identifier_field: String,
    pub secret_field: String,
    pub extra_fields: Vec<NamedValue>,
}

/// Data-surface paths; an unset path means the portal does not serve that data
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointSettings {
    /// Page the portal's own front-end issues data calls from
    pub referer_path: String,
    pub comanda_list: Option<String>,
    pub comanda_detail: Option<String>,
    pub client_form: Option<String>,
    pub client_list: Option<String>,
    pub scheduler_read: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Falls back to `CHROME_PATH`, then to chromiumoxide's own lookup
    pub chrome_path: Option<String>,
    /// `{base}` and `{tenant}` are substituted
    pub login_url_template: String,
    pub username_selector: String,
    pub password_selector: String,
    pub submit_selector: String,
    pub error_selector: String,
    pub headless: bool,
}

impl Default for PortalSettings {
    fn default() -> Self {
        Self {
            application: ApplicationSettings::default(),
            http: HttpSettings::default(),
            logging: LoggingSettings::default(),
            portals: vec![PortalConfig::elos(), PortalConfig::avec()],
        }
    }
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            cors_origins: "http://localhost:3000,http://localhost:5173".to_string(),
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            element_wait_ms: 15_000,
        }
    }
}

impl HttpSettings {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    #[must_use]
    pub fn element_wait(&self) -> Duration {
        Duration::from_millis(self.element_wait_ms)
    }

    /// Client builder for portal calls
    ///
    /// Every call is bounded by `timeout_ms` and no idle connection outlives
    /// the call that opened it.
    #[must_use]
    pub fn client_builder(&self) -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .timeout(self.timeout())
            .pool_max_idle_per_host(0)
    }
}

impl LoggingSettings {
    /// Logger filtered by `level`, which takes `RUST_LOG` syntax
    #[must_use]
    pub fn logger_builder(&self) -> env_logger::Builder {
        let mut builder = env_logger::Builder::new();
        builder.parse_filters(&self.level);
        builder
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for LoginFormSettings {
    fn default() -> Self {
        let fingerprint = serde_json::json!({
            "OS": "OS X",
            "BrowserName": "Chrome",
            "BrowserInfo": "135.0.0.0 - 64 bits",
            "IpAddress": "127.0.0.1",
        });
        Self {
            token_field: "__RequestVerificationToken".to_string(),
            identifier_field: "Login".to_string(),
            secret_field: "Password".to_string(),
            extra_fields: vec![
                NamedValue::new("FingerPrint", fingerprint.to_string()),
                NamedValue::new("IsEvupProvider", "False"),
                NamedValue::new("RememberMe", "false"),
            ],
        }
    }
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            chrome_path: None,
            login_url_template: "{base}/{tenant}/login".to_string(),
            username_selector: "input[name=\"usuario\"]".to_string(),
            password_selector: "input[type=\"password\"]".to_string(),
            submit_selector: "button[type=\"submit\"]".to_string(),
            error_selector: ".alert-danger".to_string(),
            headless: true,
        }
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_url: String::new(),
            login_strategy: LoginStrategy::TokenReplay,
            login_path: "/Login".to_string(),
            auth_cookie: "session".to_string(),
            structure_cookie: "current-structure".to_string(),
            default_structure: String::new(),
            timezone: "America/Sao_Paulo".to_string(),
            utc_offset_minutes: -180,
            extra_cookies: Vec::new(),
            login_form: LoginFormSettings::default(),
            browser: None,
            endpoints: EndpointSettings {
                referer_path: "/".to_string(),
                ..EndpointSettings::default()
            },
        }
    }
}

impl PortalConfig {
    /// Scheduler portal, logged into by replaying the anti-forgery token
    #[must_use]
    pub fn elos() -> Self {
        Self {
            name: "elos".to_string(),
            base_url: "https://botoclinic.elosclub.com.br".to_string(),
            login_strategy: LoginStrategy::TokenReplay,
            login_path: "/Login".to_string(),
            auth_cookie: "Authentication".to_string(),
            structure_cookie: "current-organizational-structure".to_string(),
            default_structure: "58".to_string(),
            timezone: "America/Maceio".to_string(),
            extra_cookies: vec![
                NamedValue::new("slot-routing-url", "-"),
                NamedValue::new("_ga", "GA1.1.1853101631.1733855667"),
                NamedValue::new("_ga_H3Z1Q956EV", "GS1.1.1738295739.7.0.1738295739.0.0.0"),
            ],
            endpoints: EndpointSettings {
                referer_path: "/".to_string(),
                scheduler_read: Some("/Scheduler/Read".to_string()),
                ..EndpointSettings::default()
            },
            ..Self::default()
        }
    }

    /// Salon back-office portal, logged into through a real browser
    #[must_use]
    pub fn avec() -> Self {
        Self {
            name: "avec".to_string(),
            base_url: "https://admin.avec.beauty".to_string(),
            login_strategy: LoginStrategy::Browser,
            login_path: "/login".to_string(),
            auth_cookie: "ci3_session".to_string(),
            structure_cookie: "current-structure".to_string(),
            timezone: "America/Sao_Paulo".to_string(),
            browser: Some(BrowserSettings::default()),
            endpoints: EndpointSettings {
                referer_path: "/admin/financeiro/comanda/historico".to_string(),
                comanda_list: Some("/admin/financeiro/comanda/lista".to_string()),
                comanda_detail: Some("/admin/financeiro/comanda/abrir".to_string()),
                client_form: Some("/admin/clientes/form".to_string()),
                client_list: Some("/admin/clientes/lista".to_string()),
                scheduler_read: None,
            },
            ..Self::default()
        }
    }

    /// Absolute URL for a portal path
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Check the fields every strategy relies on
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::Configuration`] when the base URL is not a valid URL,
    /// the auth cookie name is empty, or a browser portal lacks its browser block.
    pub fn validate(&self) -> Result<(), PortalError> {
        url::Url::parse(&self.base_url).map_err(|e| {
            PortalError::Configuration(format!(
                "portal '{}' has an invalid base_url '{}': {e}",
                self.name, self.base_url
            ))
        })?;
        if self.auth_cookie.trim().is_empty() {
            return Err(PortalError::Configuration(format!(
                "portal '{}' has no auth_cookie",
                self.name
            )));
        }
        if self.login_strategy == LoginStrategy::Browser && self.browser.is_none() {
            return Err(PortalError::Configuration(format!(
                "portal '{}' uses the browser strategy but has no [browser] block",
                self.name
            )));
        }
        Ok(())
    }
}

impl PortalSettings {
    /// Load settings from configuration files and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Settings file cannot be read or parsed
    /// - Logger initialization fails
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        Self::load_env_file();
        let (mut settings, sources) = Self::load_base_settings()?;
        Self::apply_env_overrides(&mut settings);
        settings.logging.logger_builder().try_init()?;

        for source in &sources {
            log::info!("Loaded settings from {}", source.display());
        }
        log::info!(
            "Configured portals: {}",
            settings
                .portals
                .iter()
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(settings)
    }

    /// Load base settings from TOML file(s) or use defaults
    /// Settings are loaded with the following priority (highest to lowest):
    /// 1. Environment variables (applied separately after loading base settings)
    /// 2. Settings.toml in `PORTALKIT_SECRETS_DIR` (if specified and exists)
    /// 3. Settings.toml in current directory (if exists)
    /// 4. Default settings
    ///
    /// Returns the settings and the files they were read from.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Settings file cannot be read
    /// - TOML parsing fails
    fn load_base_settings() -> Result<(Self, Vec<PathBuf>), Box<dyn std::error::Error>> {
        let mut settings = Self::default();
        let mut sources = Vec::new();

        let default_config_path = PathBuf::from("Settings.toml");
        if default_config_path.exists() {
            settings = Self::from_file(&default_config_path)?;
            sources.push(default_config_path);
        }

        if let Ok(secrets_dir) = std::env::var("PORTALKIT_SECRETS_DIR") {
            let secrets_path = Path::new(&secrets_dir).join("Settings.toml");
            if secrets_path.exists() {
                settings = Self::from_file(&secrets_path)?;
                sources.push(secrets_path);
            }
        }

        Ok((settings, sources))
    }

    /// Parse a single settings file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let toml_content = fs::read_to_string(path)?;
        Ok(basic_toml::from_str(&toml_content)?)
    }

    /// Apply environment variable overrides to settings
    pub fn apply_env_overrides(settings: &mut Self) {
        Self::apply_application_env_overrides(&mut settings.application);
        Self::apply_http_env_overrides(&mut settings.http);
        Self::apply_logging_env_overrides(&mut settings.logging);
        Self::apply_browser_env_overrides(&mut settings.portals);
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
        if let Ok(cors_origins) = std::env::var("CORS_ORIGINS") {
            app_settings.cors_origins = cors_origins;
        }
    }

    fn apply_http_env_overrides(http_settings: &mut HttpSettings) {
        Self::apply_numeric_env_override("PORTAL_TIMEOUT_MS", &mut http_settings.timeout_ms);
        Self::apply_numeric_env_override(
            "PORTAL_ELEMENT_WAIT_MS",
            &mut http_settings.element_wait_ms,
        );
    }

    fn apply_numeric_env_override(env_var: &str, target: &mut u64) {
        if let Ok(value_str) = std::env::var(env_var) {
            if let Ok(value) = value_str.parse::<u64>() {
                *target = value;
            }
        }
    }

    fn apply_logging_env_overrides(logging_settings: &mut LoggingSettings) {
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            logging_settings.level = log_level;
        }
    }

    /// `CHROME_PATH` fills in browser blocks that do not name an executable
    fn apply_browser_env_overrides(portals: &mut [PortalConfig]) {
        if let Ok(chrome_path) = std::env::var("CHROME_PATH") {
            for browser in portals.iter_mut().filter_map(|p| p.browser.as_mut()) {
                if browser.chrome_path.is_none() {
                    browser.chrome_path = Some(chrome_path.clone());
                }
            }
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

    /// Get CORS origins as a vector of strings
    #[must_use]
    pub fn get_cors_origins(&self) -> Vec<String> {
        self.application
            .cors_origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Get portal by name
    #[must_use]
    pub fn get_portal(&self, name: &str) -> Option<&PortalConfig> {
        self.portals.iter().find(|p| p.name == name)
    }
}
