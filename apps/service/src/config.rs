use std::collections::HashMap;
use std::time::Duration;
use std::{env, fmt, fs, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::monitoring::validation::{
    validate_check_interval, validate_proxy_address, validate_target, validate_timeout,
};
use crate::monitoring::{ProxySettings, RetryPolicy, Target, Timeouts};
use crate::sinks::telegram::DEFAULT_API_URL;
use crate::sinks::{BotConfig, LokiConfig};

/// Defaults compiled into the binary; `.env` and real environment variables win.
const EMBEDDED_ENV: &str = include_str!("../config.env");

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read config: {0}")]
    ReadFailed(String),
    #[error("failed to write config: {0}")]
    WriteFailed(String),
    #[error("failed to parse config: {0}")]
    ParseFailed(String),
    #[error("no config directory available ($XDG_CONFIG_HOME and $HOME unset)")]
    ConfigPathUnavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub monitor: Monitor,
    pub tor: Tor,
    pub retry: Retry,
    pub loki: Loki,
    pub telegram: Telegram,
    pub logging: Logging,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Monitor {
    pub urls: Vec<String>,
    pub interval_seconds: u64,
    pub timeout_seconds: u64,
    pub result_buffer: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tor {
    pub enabled: bool,
    pub proxy: String,
    pub timeout_seconds: u64,
    pub check_timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Retry {
    /// 0 or 1 disables retrying
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Loki {
    pub url: Option<String>,
    pub user: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Telegram {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub api_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub timezone: String,
}

impl Default for Monitor {
    fn default() -> Self {
        Self { urls: Vec::new(), interval_seconds: 600, timeout_seconds: 10, result_buffer: 100 }
    }
}

impl Default for Tor {
    fn default() -> Self {
        Self {
            enabled: false,
            proxy: "127.0.0.1:9050".into(),
            timeout_seconds: 60,
            check_timeout_seconds: 5,
        }
    }
}

impl Default for Retry {
    fn default() -> Self {
        Self { max_attempts: 0, initial_backoff_ms: 1000 }
    }
}

impl Default for Telegram {
    fn default() -> Self {
        Self { bot_token: None, chat_id: None, api_url: DEFAULT_API_URL.into() }
    }
}

impl Default for Logging {
    fn default() -> Self {
        Self { timezone: "UTC".into() }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            monitor: Monitor::default(),
            tor: Tor::default(),
            retry: Retry::default(),
            loki: Loki::default(),
            telegram: Telegram::default(),
            logging: Logging::default(),
        }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/pingwatch/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("pingwatch/config.toml"))
}

/// Variables from `.env` in the working directory layered over the embedded defaults.
///
/// Nothing is written to the process environment; [`Config::load`] consults the
/// real environment first and falls back to these.
pub fn file_vars() -> HashMap<String, String> {
    let mut vars = HashMap::new();

    for item in dotenvy::from_read_iter(EMBEDDED_ENV.as_bytes()) {
        match item {
            Ok((key, value)) => {
                vars.insert(key, value);
            }
            Err(e) => warn!("Could not read embedded config: {}", e),
        }
    }

    match dotenvy::dotenv_iter() {
        Ok(iter) => {
            for item in iter {
                match item {
                    Ok((key, value)) => {
                        vars.insert(key, value);
                    }
                    Err(e) => warn!("Skipping malformed .env entry: {}", e),
                }
            }
            info!("Loaded variables from .env");
        }
        Err(_) => info!("No .env file found, will use embedded config or environment variables"),
    }

    vars
}

fn mask(secret: &Option<String>) -> &'static str {
    match secret {
        Some(s) if !s.is_empty() => "********",
        _ => "<unset>",
    }
}

fn or_unset(value: &Option<String>) -> &str {
    value.as_deref().filter(|v| !v.is_empty()).unwrap_or("<unset>")
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);
        let write_2 = write_indented(2);

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Monitor")?;
        write_1(f, "Targets", &self.monitor.urls.len())?;
        for url in &self.monitor.urls {
            write_2(f, "-", url)?;
        }
        write_1(f, "Interval", &humantime::format_duration(self.interval()))?;
        write_1(f, "HTTP Timeout (s)", &self.monitor.timeout_seconds)?;
        write_1(f, "Result Buffer", &self.monitor.result_buffer)?;

        write_title_1(f, "Tor")?;
        write_1(f, "Enabled", &self.tor.enabled)?;
        write_1(f, "Proxy", &self.tor.proxy)?;
        write_1(f, "Timeout (s)", &self.tor.timeout_seconds)?;
        write_1(f, "Proxy Check Timeout (s)", &self.tor.check_timeout_seconds)?;

        write_title_1(f, "Retry")?;
        write_1(f, "Max Attempts", &self.retry.max_attempts)?;
        write_1(f, "Initial Backoff (ms)", &self.retry.initial_backoff_ms)?;

        write_title_1(f, "Loki")?;
        write_1(f, "URL", &or_unset(&self.loki.url))?;
        write_1(f, "User", &or_unset(&self.loki.user))?;
        write_1(f, "API Key", &mask(&self.loki.api_key))?;

        write_title_1(f, "Telegram")?;
        write_1(f, "Bot Token", &mask(&self.telegram.bot_token))?;
        write_1(f, "Chat ID", &or_unset(&self.telegram.chat_id))?;
        write_1(f, "API URL", &self.telegram.api_url)?;

        write_title_1(f, "Logging")?;
        write_1(f, "Timezone", &self.logging.timezone)?;

        Ok(())
    }
}

/// Parse an env value, warning and keeping `current` when it is malformed.
fn parse_or_keep<T: std::str::FromStr>(key: &str, raw: &str, current: T) -> T {
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!("Invalid value {raw:?} for {key}, keeping default");
            current
        }
    }
}

fn parse_duration_or_keep(key: &str, raw: &str, current: Duration) -> Duration {
    match humantime::parse_duration(raw.trim()) {
        Ok(value) => value,
        Err(e) => {
            warn!("Invalid duration {raw:?} for {key} ({e}), keeping default");
            current
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    let value = value.trim().to_string();
    (!value.is_empty()).then_some(value)
}

impl Config {
    /// Generate Config structure from file and environment
    ///
    /// An explicit path that does not exist yet gets a default config written to
    /// it. Without a path, `~/.config/pingwatch/config.toml` is read when present.
    /// Environment variables, then `.env`, then the embedded `config.env` override
    /// file values.
    ///
    /// ```rust,ignore
    /// let cfg = config::Config::load(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn load(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let mut config = Self::from_config(optional_path)?;
        let files = file_vars();
        config.apply_env(|key| env::var(key).ok().or_else(|| files.get(key).cloned()));
        config.sanitize();
        Ok(config)
    }

    /// Read only the TOML layer.
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let (config_path, explicit) = match optional_path {
            Some(path) => (normalize_toml_path(path.as_ref()), true),
            None => match default_config_path() {
                Ok(path) => (path, false),
                Err(_) => return Ok(Self::default()),
            },
        };

        if config_path.exists() {
            let raw_string =
                fs::read_to_string(&config_path).map_err(|e| Error::ReadFailed(e.to_string()))?;
            info!("Loaded config from {}", config_path.display());
            toml::from_str(raw_string.as_str()).map_err(|e| Error::ParseFailed(e.to_string()))
        } else if explicit {
            let config = Self::default();
            config.write_config(&config_path)?;
            info!("Wrote default config to {}", config_path.display());
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &std::path::Path) -> Result<(), Error> {
        let config_str: String =
            toml::to_string_pretty(self).map_err(|e| Error::ParseFailed(e.to_string()))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::WriteFailed(e.to_string()))?;
        }

        std::fs::write(path, config_str).map_err(|e| Error::WriteFailed(e.to_string()))
    }

    /// Overlay environment variables, looked up through `lookup`.
    pub fn apply_env<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        if let Some(urls) = lookup("MONITOR_URLS") {
            self.monitor.urls = urls
                .split(',')
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(raw) = lookup("PING_INTERVAL") {
            let interval = parse_duration_or_keep("PING_INTERVAL", &raw, self.interval());
            if interval.subsec_nanos() != 0 {
                warn!(
                    "PING_INTERVAL {raw:?} has sub-second precision, using {}s",
                    interval.as_secs()
                );
            }
            self.monitor.interval_seconds = interval.as_secs();
        }
        if let Some(raw) = lookup("HTTP_TIMEOUT") {
            self.monitor.timeout_seconds =
                parse_or_keep("HTTP_TIMEOUT", &raw, self.monitor.timeout_seconds);
        }
        if let Some(raw) = lookup("RESULT_BUFFER") {
            self.monitor.result_buffer =
                parse_or_keep("RESULT_BUFFER", &raw, self.monitor.result_buffer);
        }

        if let Some(raw) = lookup("ENABLE_TOR") {
            self.tor.enabled = raw.trim().eq_ignore_ascii_case("true");
        }
        if let Some(proxy) = lookup("TOR_PROXY").and_then(non_empty) {
            self.tor.proxy = proxy;
        }
        if let Some(raw) = lookup("TOR_TIMEOUT") {
            self.tor.timeout_seconds = parse_or_keep("TOR_TIMEOUT", &raw, self.tor.timeout_seconds);
        }
        if let Some(raw) = lookup("PROXY_CHECK_TIMEOUT") {
            self.tor.check_timeout_seconds =
                parse_or_keep("PROXY_CHECK_TIMEOUT", &raw, self.tor.check_timeout_seconds);
        }

        if let Some(raw) = lookup("RETRY_MAX_ATTEMPTS") {
            self.retry.max_attempts =
                parse_or_keep("RETRY_MAX_ATTEMPTS", &raw, self.retry.max_attempts);
        }
        if let Some(raw) = lookup("RETRY_INITIAL_BACKOFF") {
            let current = Duration::from_millis(self.retry.initial_backoff_ms);
            self.retry.initial_backoff_ms =
                parse_duration_or_keep("RETRY_INITIAL_BACKOFF", &raw, current).as_millis() as u64;
        }

        if let Some(url) = lookup("LOKI_URL").and_then(non_empty) {
            self.loki.url = Some(url);
        }
        if let Some(user) = lookup("LOKI_USER").and_then(non_empty) {
            self.loki.user = Some(user);
        }
        if let Some(key) = lookup("LOKI_API_KEY").and_then(non_empty) {
            self.loki.api_key = Some(key);
        }

        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN").and_then(non_empty) {
            self.telegram.bot_token = Some(token);
        }
        if let Some(chat_id) = lookup("TELEGRAM_CHAT_ID").and_then(non_empty) {
            self.telegram.chat_id = Some(chat_id);
        }
        if let Some(api_url) = lookup("TELEGRAM_API_URL").and_then(non_empty) {
            self.telegram.api_url = api_url;
        }

        if let Some(timezone) = lookup("LOG_TIMEZONE").and_then(non_empty) {
            self.logging.timezone = timezone;
        }
    }

    /// Drop invalid targets and reset invalid timings to their defaults.
    pub fn sanitize(&mut self) {
        let defaults = Config::default();

        let tor_enabled = self.tor.enabled;
        self.monitor.urls.retain(|url| {
            if let Err(e) = validate_target(url) {
                warn!(url = %url, "Dropping invalid target: {}", e);
                return false;
            }
            if !tor_enabled && Target::new(url.as_str()).is_onion() {
                warn!(url = %url, "Tor monitoring is DISABLED, skipping .onion site");
                return false;
            }
            true
        });

        if let Err(e) = validate_check_interval(self.interval()) {
            warn!("{}, using default", e);
            self.monitor.interval_seconds = defaults.monitor.interval_seconds;
        }
        if let Err(e) = validate_timeout(self.monitor.timeout_seconds) {
            warn!("HTTP {}, using default", e);
            self.monitor.timeout_seconds = defaults.monitor.timeout_seconds;
        }
        if let Err(e) = validate_timeout(self.tor.timeout_seconds) {
            warn!("Tor {}, using default", e);
            self.tor.timeout_seconds = defaults.tor.timeout_seconds;
        }
        if let Err(e) = validate_timeout(self.tor.check_timeout_seconds) {
            warn!("Proxy check {}, using default", e);
            self.tor.check_timeout_seconds = defaults.tor.check_timeout_seconds;
        }
        if let Err(e) = validate_proxy_address(&self.tor.proxy) {
            warn!("Invalid Tor proxy {:?}: {}, using default", self.tor.proxy, e);
            self.tor.proxy = defaults.tor.proxy;
        }
        if self.monitor.result_buffer == 0 {
            warn!("Result buffer must be at least 1, using default");
            self.monitor.result_buffer = defaults.monitor.result_buffer;
        }
    }

    pub fn targets(&self) -> Vec<Target> {
        self.monitor.urls.iter().map(|url| Target::new(url.as_str())).collect()
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.monitor.interval_seconds)
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            direct: Duration::from_secs(self.monitor.timeout_seconds),
            proxied: Duration::from_secs(self.tor.timeout_seconds),
        }
    }

    pub fn proxy_settings(&self) -> ProxySettings {
        ProxySettings {
            address: self.tor.proxy.clone(),
            check_timeout: Duration::from_secs(self.tor.check_timeout_seconds),
        }
    }

    /// The retry policy, or `None` when retrying is disabled.
    pub fn retry_policy(&self) -> Option<RetryPolicy> {
        (self.retry.max_attempts > 1).then(|| {
            RetryPolicy::new(
                self.retry.max_attempts,
                Duration::from_millis(self.retry.initial_backoff_ms),
            )
        })
    }

    /// Loki settings, or `None` with a warning naming what is missing.
    pub fn loki_config(&self) -> Option<LokiConfig> {
        match (&self.loki.url, &self.loki.user, &self.loki.api_key) {
            (Some(url), Some(user), Some(api_key)) => Some(LokiConfig {
                url: url.clone(),
                user: user.clone(),
                api_key: api_key.clone(),
            }),
            _ => {
                warn!(
                    "Loki credentials not set (LOKI_URL, LOKI_USER, LOKI_API_KEY), \
                     log shipping disabled"
                );
                None
            }
        }
    }

    /// Telegram settings, or `None` with a warning naming what is missing.
    pub fn bot_config(&self) -> Option<BotConfig> {
        match (&self.telegram.bot_token, &self.telegram.chat_id) {
            (Some(token), Some(chat_id)) => {
                let bot = BotConfig::new(token.as_str(), chat_id.as_str());
                Some(bot.with_api_url(self.telegram.api_url.as_str()))
            }
            (None, _) => {
                warn!("TELEGRAM_BOT_TOKEN not set, Telegram notifications will not be sent");
                None
            }
            (Some(_), None) => {
                warn!("TELEGRAM_CHAT_ID not set, Telegram notifications will not be sent");
                None
            }
        }
    }
}
