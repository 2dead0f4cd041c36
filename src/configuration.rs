use std::fmt;
use std::time::Duration;

use config::builder::DefaultState;
use config::ConfigBuilder;
use serde::Deserialize;

use crate::error::ConfigError;

const DEFAULT_ACCESS_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);
const DEFAULT_REFRESH_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
const MAX_TOKEN_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);
const DEFAULT_LOGIN_ATTEMPTS_PER_MINUTE: u32 = 5;

/// Bare environment keys that take precedence over the file and `APP_` values.
const ENV_OVERRIDES: [(&str, &str); 3] = [
    ("SIGNING_SECRET", "auth.signing_secret"),
    ("ACCESS_TOKEN_TTL", "auth.access_token_ttl"),
    ("REFRESH_TOKEN_TTL", "auth.refresh_token_ttl"),
];

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    /// Postgres settings; without them the service runs on the in-memory user store.
    pub database: Option<DatabaseSettings>,
    pub application: ApplicationSettings,
    pub auth: AuthSettings,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }
}

/// Token signing and lifetime settings
///
/// The secret is read once at startup and handed to the token codec; it is
/// never re-read per request.
#[derive(Deserialize, Clone)]
pub struct AuthSettings {
    #[serde(default)]
    pub signing_secret: String,
    #[serde(default = "default_access_ttl", deserialize_with = "deserialize_ttl")]
    pub access_token_ttl: Duration,
    #[serde(default = "default_refresh_ttl", deserialize_with = "deserialize_ttl")]
    pub refresh_token_ttl: Duration,
    /// Persist the current refresh token per user (rotation with reuse detection).
    #[serde(default = "default_track_refresh_tokens")]
    pub track_refresh_tokens: bool,
    /// Login attempts allowed per username (or client IP) per minute.
    #[serde(default = "default_login_attempts_per_minute")]
    pub login_attempts_per_minute: u32,
}

impl AuthSettings {
    /// Reject settings the service must not start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.signing_secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("SIGNING_SECRET".to_string()));
        }
        for (name, ttl) in [
            ("ACCESS_TOKEN_TTL", self.access_token_ttl),
            ("REFRESH_TOKEN_TTL", self.refresh_token_ttl),
        ] {
            if ttl.as_secs() == 0 {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must be at least one second",
                    name
                )));
            }
            if ttl > MAX_TOKEN_TTL {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must not exceed ten years",
                    name
                )));
            }
        }
        if self.login_attempts_per_minute == 0 {
            return Err(ConfigError::InvalidValue(
                "login_attempts_per_minute must be at least one".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSettings")
            .field("signing_secret", &"[redacted]")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("track_refresh_tokens", &self.track_refresh_tokens)
            .field("login_attempts_per_minute", &self.login_attempts_per_minute)
            .finish()
    }
}

fn default_access_ttl() -> Duration {
    DEFAULT_ACCESS_TOKEN_TTL
}

fn default_refresh_ttl() -> Duration {
    DEFAULT_REFRESH_TOKEN_TTL
}

fn default_track_refresh_tokens() -> bool {
    true
}

fn default_login_attempts_per_minute() -> u32 {
    DEFAULT_LOGIN_ATTEMPTS_PER_MINUTE
}

/// Accepts a duration string (`15m`, `1h30m`, `7d`) or a bare number of seconds.
fn deserialize_ttl<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTtl {
        Seconds(u64),
        Text(String),
    }

    match RawTtl::deserialize(deserializer)? {
        RawTtl::Seconds(secs) => Ok(Duration::from_secs(secs)),
        RawTtl::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
    }
}

/// Parse a duration made of `<number><unit>` segments.
///
/// Units: `ms`, `s`, `m`, `h`, `d`. A bare number is a count of seconds, so
/// `ACCESS_TOKEN_TTL=900` works from the environment. Empty, signed, zero or
/// partially unit-less input (`1h30`) is rejected.
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidValue(format!("invalid duration: {:?}", input));

    let mut rest = input.trim();
    if rest.is_empty() {
        return Err(invalid());
    }

    if rest.chars().all(|c| c.is_ascii_digit()) {
        let secs: u64 = rest.parse().map_err(|_| invalid())?;
        if secs == 0 {
            return Err(invalid());
        }
        return Ok(Duration::from_secs(secs));
    }

    let mut total_millis: u64 = 0;
    while !rest.is_empty() {
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits_end == 0 {
            return Err(invalid());
        }
        let value: u64 = rest[..digits_end].parse().map_err(|_| invalid())?;
        rest = &rest[digits_end..];

        let unit_end = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let millis_per_unit: u64 = match &rest[..unit_end] {
            "ms" => 1,
            "s" => 1_000,
            "m" => 60_000,
            "h" => 3_600_000,
            "d" => 86_400_000,
            _ => return Err(invalid()),
        };
        rest = &rest[unit_end..];

        total_millis = value
            .checked_mul(millis_per_unit)
            .and_then(|millis| total_millis.checked_add(millis))
            .ok_or_else(invalid)?;
    }

    if total_millis == 0 {
        return Err(invalid());
    }
    Ok(Duration::from_millis(total_millis))
}

/// Load settings from `configuration.*`, `APP_`-prefixed variables and the
/// top-level `SIGNING_SECRET`, `ACCESS_TOKEN_TTL`, `REFRESH_TOKEN_TTL` keys.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        );

    build_settings(with_env_overrides(builder, |key| std::env::var(key).ok())?)
}

/// Layer the bare `SIGNING_SECRET`, `ACCESS_TOKEN_TTL` and `REFRESH_TOKEN_TTL`
/// keys, as resolved by `lookup`, over everything already in `builder`.
pub fn with_env_overrides(
    builder: ConfigBuilder<DefaultState>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let mut builder = builder;
    for (env_key, setting) in ENV_OVERRIDES {
        builder = builder.set_override_option(setting, lookup(env_key))?;
    }
    Ok(builder)
}

/// Apply defaults, deserialize and validate.
pub fn build_settings(builder: ConfigBuilder<DefaultState>) -> Result<Settings, ConfigError> {
    let settings = builder
        .set_default("application.host", "127.0.0.1")?
        .set_default("application.port", 8000)?
        .build()?
        .try_deserialize::<Settings>()?;

    settings.auth.validate()?;
    Ok(settings)
}
