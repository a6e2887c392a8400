use secrecy::Secret;
use serde::Deserialize;

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub backend: BackendSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

#[derive(Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone)]
pub struct BackendSettings {
    /// Base URL of the Spring Boot backend (e.g., http://localhost:8080).
    /// May be left empty; proxy routes then answer with a configuration error.
    #[serde(default)]
    pub base_url: String,
    /// Tenant identifier partitioning all backend data for this deployment.
    pub tenant_id: String,
    /// Service account used to obtain the backend API token.
    pub service_user: String,
    pub service_password: Secret<String>,
    /// Browser-facing URL of this application (emails, QR codes, redirects).
    #[serde(default = "default_public_app_url")]
    pub public_app_url: String,
}

fn default_public_app_url() -> String {
    "http://localhost:3000".to_string()
}

impl BackendSettings {
    /// Returns the backend base URL, or `None` when it was never configured.
    /// Callers surface the absence as an HTTP 500 before any network call.
    pub fn base_url(&self) -> Option<&str> {
        if self.base_url.trim().is_empty() {
            None
        } else {
            Some(self.base_url.trim_end_matches('/'))
        }
    }
}

#[derive(Deserialize, Clone, Default)]
pub struct TelemetrySettings {
    /// OTLP collector endpoint. Span export is disabled when unset.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().expect("Failed to determine the current directory");

    // Works both from the workspace root and from inside gateway-service
    let configuration_directory = if base_path.ends_with("gateway-service") {
        base_path.join("config")
    } else {
        base_path.join("gateway-service").join("config")
    };

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")).required(true))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}
