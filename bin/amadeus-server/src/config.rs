//! Server configuration, loaded from environment variables at startup.

use amadeus_agent::session::DEFAULT_MODEL;
use amadeus_rag::embeddings::DEFAULT_EMBEDDING_MODEL;

/// Runtime configuration for amadeus-server.
///
/// Every field has a default so the server starts without any environment
/// variables set; missing credentials surface through `/health` and as
/// per-request errors instead of aborting startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// Anthropic key used by both personas.
    pub anthropic_api_key: Option<String>,

    /// Messages endpoint override; the public Anthropic API when unset.
    pub anthropic_endpoint: Option<String>,

    /// Chat model id (default: [`DEFAULT_MODEL`]).
    pub model: String,

    /// Offer provider-native web search to the model.
    pub enable_web_search: bool,

    /// Upper bound on web searches per turn.
    pub web_search_max_uses: u32,

    /// OpenAI key for document and query embeddings.
    pub openai_api_key: Option<String>,

    pub embedding_model: String,

    /// Supabase project URL; together with `supabase_key` selects the
    /// hosted vector store. Without both, documents live in memory.
    pub supabase_url: Option<String>,

    pub supabase_key: Option<String>,

    /// Scratch directory for uploads while they are parsed.
    pub upload_dir: String,

    /// Total request body limit for `/api/upload`, in megabytes.
    pub max_request_mb: usize,

    /// Comma-separated allowed origins; `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// Serve Swagger UI and the OpenAPI document.
    pub enable_swagger: bool,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Also write daily-rolling log files into this directory.
    pub log_dir: Option<String>,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("AMADEUS_BIND", "0.0.0.0:3000"),
            anthropic_api_key: env_opt("ANTHROPIC_API_KEY"),
            anthropic_endpoint: env_opt("AMADEUS_ANTHROPIC_ENDPOINT"),
            model: env_or("AMADEUS_MODEL", DEFAULT_MODEL),
            enable_web_search: env_flag("AMADEUS_ENABLE_WEB_SEARCH", true),
            web_search_max_uses: parse_env("AMADEUS_WEB_SEARCH_MAX_USES", 5),
            openai_api_key: env_opt("OPENAI_API_KEY"),
            embedding_model: env_or("AMADEUS_EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
            supabase_url: env_opt("SUPABASE_URL"),
            supabase_key: env_opt("SUPABASE_PRIVATE_KEY"),
            upload_dir: env_or("AMADEUS_UPLOAD_DIR", "uploads"),
            max_request_mb: parse_env("AMADEUS_MAX_REQUEST_MB", 100),
            cors_allowed_origins: env_opt("AMADEUS_CORS_ORIGINS"),
            enable_swagger: env_flag("AMADEUS_ENABLE_SWAGGER", true),
            log_level: env_or("AMADEUS_LOG", "info"),
            log_json: env_flag("AMADEUS_LOG_JSON", false),
            log_dir: env_opt("AMADEUS_LOG_DIR"),
        }
    }

    /// Supabase URL and key, when both are present.
    pub fn supabase(&self) -> Option<(&str, &str)> {
        Some((self.supabase_url.as_deref()?, self.supabase_key.as_deref()?))
    }

    /// Configuration problems, split into blocking errors and warnings.
    pub fn validate(&self) -> EnvironmentReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if self.anthropic_api_key.is_none() {
            errors.push("ANTHROPIC_API_KEY is not set; chat requests will fail".to_owned());
        }
        if self.openai_api_key.is_none() {
            warnings.push(
                "OPENAI_API_KEY is not set; document upload and knowledge retrieval will fail"
                    .to_owned(),
            );
        }
        match (&self.supabase_url, &self.supabase_key) {
            (Some(_), Some(_)) => {}
            (None, None) => warnings.push(
                "SUPABASE_URL and SUPABASE_PRIVATE_KEY are not set; documents are kept in memory only"
                    .to_owned(),
            ),
            (None, Some(_)) => warnings.push("SUPABASE_URL is not set".to_owned()),
            (Some(_), None) => warnings.push("SUPABASE_PRIVATE_KEY is not set".to_owned()),
        }

        EnvironmentReport {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_owned(),
            anthropic_api_key: None,
            anthropic_endpoint: None,
            model: DEFAULT_MODEL.to_owned(),
            enable_web_search: true,
            web_search_max_uses: 5,
            openai_api_key: None,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_owned(),
            supabase_url: None,
            supabase_key: None,
            upload_dir: "uploads".to_owned(),
            max_request_mb: 100,
            cors_allowed_origins: None,
            enable_swagger: true,
            log_level: "info".to_owned(),
            log_json: false,
            log_dir: None,
        }
    }
}

/// Result of [`Config::validate`], reported by `/health`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Unset and blank both read as `None`.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn missing_anthropic_key_is_an_error() {
        let report = Config::default().validate();
        assert!(!report.is_valid);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("ANTHROPIC_API_KEY"));
        assert_eq!(report.warnings.len(), 2);
    }

    #[test]
    fn fully_configured_is_valid() {
        let cfg = Config {
            anthropic_api_key: Some("sk-ant".into()),
            openai_api_key: Some("sk-openai".into()),
            supabase_url: Some("https://x.supabase.co".into()),
            supabase_key: Some("service".into()),
            ..Config::default()
        };
        let report = cfg.validate();
        assert!(report.is_valid);
        assert!(report.warnings.is_empty());
        assert_eq!(cfg.supabase(), Some(("https://x.supabase.co", "service")));
    }

    #[test]
    fn half_configured_supabase_falls_back() {
        let cfg = Config {
            supabase_url: Some("https://x.supabase.co".into()),
            ..Config::default()
        };
        assert_eq!(cfg.supabase(), None);
        assert!(cfg.validate().warnings.iter().any(|w| w == "SUPABASE_PRIVATE_KEY is not set"));
    }
}
