use std::net::IpAddr;

use chrono::Duration;
use ipnet::IpNet;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub app_key: String,
    pub jwt_secret: String,
    pub host: IpAddr,
    pub port: u16,
    pub base_url: String,
    pub reset_token_ttl: Duration,
    pub verification_ttl: Duration,
    pub trusted_proxies: Vec<IpNet>,
    pub log_level: String,
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub from: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());
        let app_key = env_required("APP_KEY")?;
        let jwt_secret = env_required("JWT_SECRET")?;

        let host: IpAddr = env_or("USERBASE_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid USERBASE_HOST: {e}"))?;

        let port: u16 = env_or("USERBASE_PORT", "3000")
            .parse()
            .map_err(|e| format!("Invalid USERBASE_PORT: {e}"))?;

        let base_url = env_or("USERBASE_BASE_URL", &format!("http://{host}:{port}"));

        let reset_token_ttl = env_minutes("USERBASE_RESET_TOKEN_TTL_MINUTES", 60)?;
        let verification_ttl = env_minutes("USERBASE_VERIFICATION_TTL_MINUTES", 60)?;

        let trusted_proxies: Vec<IpNet> = env_or("USERBASE_TRUSTED_PROXIES", "")
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| {
                s.trim()
                    .parse()
                    .map_err(|e| format!("Invalid USERBASE_TRUSTED_PROXIES entry '{s}': {e}"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let log_level = env_or("USERBASE_LOG_LEVEL", "info");

        let smtp = match (
            std::env::var("USERBASE_SMTP_HOST").ok(),
            std::env::var("USERBASE_SMTP_PORT").ok(),
            std::env::var("USERBASE_SMTP_USER").ok(),
            std::env::var("USERBASE_SMTP_PASS").ok(),
            std::env::var("USERBASE_SMTP_FROM").ok(),
        ) {
            (Some(host), Some(port), Some(user), Some(pass), Some(from)) => Some(SmtpConfig {
                host,
                port: port
                    .parse()
                    .map_err(|e| format!("Invalid USERBASE_SMTP_PORT: {e}"))?,
                user,
                pass,
                from,
            }),
            _ => None,
        };

        Ok(Config {
            database_url,
            app_key,
            jwt_secret,
            host,
            port,
            base_url: base_url.trim_end_matches('/').to_string(),
            reset_token_ttl,
            verification_ttl,
            trusted_proxies,
            log_level,
            smtp,
        })
    }
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Upper bound for token lifetimes; keeps `now - ttl` representable.
const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;

fn env_minutes(key: &str, default: i64) -> Result<Duration, String> {
    parse_minutes(key, &env_or(key, &default.to_string()))
}

fn parse_minutes(key: &str, raw: &str) -> Result<Duration, String> {
    let minutes: i64 = raw.trim().parse().map_err(|e| format!("Invalid {key}: {e}"))?;
    if !(1..=MAX_TTL_MINUTES).contains(&minutes) {
        return Err(format!(
            "Invalid {key}: must be between 1 and {MAX_TTL_MINUTES} minutes"
        ));
    }
    Duration::try_minutes(minutes).ok_or_else(|| format!("Invalid {key}: out of range"))
}
