use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use studyhub_core::providers::{GeminiConfig, OpenAiCompatConfig};
use tracing::{info, warn};

/// Config written by `studyhub init` and used when no config file exists
pub const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyhubConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

// ── Server ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let bind = if self.bind.trim().is_empty() {
            default_bind()
        } else {
            self.bind.clone()
        };
        format!("{}:{}", bind, self.port)
            .parse()
            .with_context(|| format!("Invalid server address {}:{}", bind, self.port))
    }
}

// ── Providers ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub gemini: GeminiProviderConfig,
    #[serde(default)]
    pub groq: GroqProviderConfig,
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            gemini: GeminiProviderConfig::default(),
            groq: GroqProviderConfig::default(),
        }
    }
}

impl ProvidersConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GeminiProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_gemini_model")]
    pub model: String,
    #[serde(default = "default_gemini_model")]
    pub vision_model: String,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
    #[serde(default = "default_gemini_max_tokens")]
    pub max_tokens: u32,
}

impl std::fmt::Debug for GeminiProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProviderConfig")
            .field("api_key", &mask_secret(&self.api_key))
            .field("model", &self.model)
            .field("vision_model", &self.vision_model)
            .field("base_url", &self.base_url)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}
fn default_gemini_max_tokens() -> u32 {
    8192
}

impl Default for GeminiProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_gemini_model(),
            vision_model: default_gemini_model(),
            base_url: default_gemini_base_url(),
            max_tokens: default_gemini_max_tokens(),
        }
    }
}

impl GeminiProviderConfig {
    pub fn to_provider_config(&self, timeout: Duration) -> GeminiConfig {
        GeminiConfig {
            api_key: usable_key(&self.api_key),
            model: self.model.clone(),
            vision_model: self.vision_model.clone(),
            base_url: self.base_url.clone(),
            max_tokens: self.max_tokens,
            timeout,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GroqProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_groq_model")]
    pub model: String,
    #[serde(default = "default_groq_base_url")]
    pub base_url: String,
    #[serde(default = "default_groq_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_groq_temperature")]
    pub temperature: f32,
}

impl std::fmt::Debug for GroqProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroqProviderConfig")
            .field("api_key", &mask_secret(&self.api_key))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

fn default_groq_model() -> String {
    "llama-3.1-70b-versatile".to_string()
}
fn default_groq_base_url() -> String {
    "https://api.groq.com/openai".to_string()
}
fn default_groq_max_tokens() -> u32 {
    4096
}
fn default_groq_temperature() -> f32 {
    0.2
}

impl Default for GroqProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_groq_model(),
            base_url: default_groq_base_url(),
            max_tokens: default_groq_max_tokens(),
            temperature: default_groq_temperature(),
        }
    }
}

impl GroqProviderConfig {
    pub fn to_provider_config(&self, timeout: Duration) -> OpenAiCompatConfig {
        OpenAiCompatConfig {
            name: "groq".to_string(),
            api_key: usable_key(&self.api_key).unwrap_or_default(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout,
        }
    }
}

/// A key left as an unexpanded `${VAR}` placeholder counts as absent
fn usable_key(key: &str) -> Option<String> {
    let key = key.trim();
    if key.is_empty() || key.contains("${") {
        None
    } else {
        Some(key.to_string())
    }
}

/// Mask a secret string for safe display in Debug output / logs.
/// Shows first 3 and last 4 chars for keys longer than 7 chars, otherwise "***".
fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "(empty)".to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    if chars.len() > 7 {
        let prefix: String = chars[..3].iter().collect();
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", prefix, suffix)
    } else {
        "***".to_string()
    }
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".studyhub")
}

impl StudyhubConfig {
    /// Load from `custom_path`, or `~/.studyhub/config.toml`, or the built-in
    /// defaults when neither exists.
    pub fn load(custom_path: &Option<PathBuf>) -> Result<Self> {
        let path = match custom_path {
            Some(path) => path.clone(),
            None => {
                let path = config_dir().join("config.toml");
                if !path.exists() {
                    info!(
                        "No config at {}, using built-in defaults. Run `studyhub init` to create one.",
                        path.display()
                    );
                    return Self::parse(DEFAULT_CONFIG);
                }
                path
            }
        };

        check_permissions(&path)?;

        let content = std::fs::read_to_string(&path).with_context(|| {
            format!(
                "Failed to read config at {}. Run `studyhub init` first.",
                path.display()
            )
        })?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config at {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse config text, expanding allowed `${VAR}` placeholders first
    pub fn parse(content: &str) -> Result<Self> {
        for section in hardcoded_keys(content) {
            warn!(
                "API key is hardcoded in [{}]. For security, use environment variables: api_key = \"${{{}}}\"",
                section,
                key_var_for(&section)
            );
        }

        let expanded = expand_env_vars(content, |name| std::env::var(name).ok());
        let config: Self = toml::from_str(&expanded).context("Invalid config")?;
        Ok(config)
    }

    /// Copy with every secret masked, for display
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.providers.gemini.api_key = mask_secret(&self.providers.gemini.api_key);
        copy.providers.groq.api_key = mask_secret(&self.providers.groq.api_key);
        copy
    }
}

/// Refuse config files readable by group or other (Unix only)
fn check_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = std::fs::metadata(path) {
            let mode = metadata.permissions().mode();
            if mode & 0o077 != 0 {
                return Err(anyhow::anyhow!(
                    "Config file {:?} has overly permissive permissions ({:o}). \
                     It may contain secrets. Fix with: chmod 600 {:?}",
                    path,
                    mode & 0o777,
                    path
                ));
            }
        }
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

/// Sections whose `api_key` holds a literal value rather than a `${VAR}` placeholder
fn hardcoded_keys(content: &str) -> Vec<String> {
    let mut section = String::new();
    let mut found = Vec::new();
    for line in content.lines().map(str::trim) {
        if line.starts_with('#') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            section = name.trim().to_string();
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"');
        if key.trim() == "api_key" && !value.is_empty() && !value.contains("${") {
            found.push(section.clone());
        }
    }
    found
}

fn key_var_for(section: &str) -> &'static str {
    if section.ends_with("groq") {
        "GROQ_API_KEY"
    } else {
        "GEMINI_API_KEY"
    }
}

/// Allowlist of environment variable names that may be expanded in config files.
/// This prevents an attacker who can modify the config from reading arbitrary env vars.
const ALLOWED_ENV_VARS: &[&str] = &[
    "GEMINI_API_KEY",
    "GROQ_API_KEY",
    "STUDYHUB_BIND",
    "HOME",
    "USER",
];

fn expand_env_vars(s: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = s.to_string();
    let mut pos = 0;
    while pos < result.len() {
        let Some(start) = result[pos..].find("${") else {
            break;
        };
        let abs_start = pos + start;
        let Some(end) = result[abs_start..].find('}') else {
            break;
        };
        let var_name = result[abs_start + 2..abs_start + end].to_string();

        if !ALLOWED_ENV_VARS.contains(&var_name.as_str()) {
            warn!(
                "Skipping expansion of unrecognized env var '{}' in config (not in allowlist)",
                var_name
            );
            // Leave the ${VAR} unexpanded so it's obvious
            pos = abs_start + end + 1;
            continue;
        }

        let value = lookup(&var_name).unwrap_or_default();
        let value_len = value.len();
        result = format!(
            "{}{}{}",
            &result[..abs_start],
            value,
            &result[abs_start + end + 1..]
        );
        pos = abs_start + value_len;
    }
    result
}
