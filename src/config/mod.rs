pub mod nudges;

use anyhow::{anyhow, Result};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use std::net::SocketAddr;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub http_addr: String,
    pub app_mode: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_connect_timeout_seconds: u64,
    pub db_idle_timeout_seconds: u64,
    pub db_max_lifetime_seconds: u64,
    pub run_migrations: bool,
    pub admin_token: Option<String>,
    pub paseto_access_key: [u8; 32],
    pub token_issuer: String,
    pub vapid: Option<VapidConfig>,
    pub push_timeout_seconds: u64,
    pub push_ttl_seconds: u32,
    pub stream_buffer: usize,
    pub campaign_interval_seconds: u64,
    pub campaign_concurrency: usize,
}

/// Web push signing credentials. Push is disabled when absent.
#[derive(Clone, Debug)]
pub struct VapidConfig {
    pub public_key: String,
    pub private_key: String,
    pub subject: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let http_addr = env_or("HTTP_ADDR", "0.0.0.0:8080");
        let _parsed_http_addr = SocketAddr::from_str(&http_addr)
            .map_err(|err| anyhow!("invalid HTTP_ADDR: {}", err))?;
        let app_mode = env_or("APP_MODE", "api");

        let stream_buffer: usize = env_or_parse("STREAM_BUFFER", "32")?;
        if stream_buffer == 0 {
            return Err(anyhow!("invalid STREAM_BUFFER: must be positive"));
        }
        let campaign_concurrency: usize = env_or_parse("CAMPAIGN_CONCURRENCY", "8")?;
        if campaign_concurrency == 0 {
            return Err(anyhow!("invalid CAMPAIGN_CONCURRENCY: must be positive"));
        }

        Ok(Self {
            http_addr,
            app_mode,
            database_url: env_or_err("DATABASE_URL")?,
            db_max_connections: env_or_parse("DB_MAX_CONNECTIONS", "25")?,
            db_connect_timeout_seconds: env_or_parse("DB_CONNECT_TIMEOUT_SECONDS", "5")?,
            db_idle_timeout_seconds: env_or_parse("DB_IDLE_TIMEOUT_SECONDS", "300")?,
            db_max_lifetime_seconds: env_or_parse("DB_MAX_LIFETIME_SECONDS", "1800")?,
            run_migrations: env_or_parse("RUN_MIGRATIONS", "false")?,
            admin_token: std::env::var("ADMIN_TOKEN").ok(),
            paseto_access_key: env_key_32("PASETO_ACCESS_KEY")?,
            token_issuer: env_or("TOKEN_ISSUER", "nudge"),
            vapid: vapid_from_env()?,
            push_timeout_seconds: env_or_parse("PUSH_TIMEOUT_SECONDS", "10")?,
            push_ttl_seconds: env_or_parse("PUSH_TTL_SECONDS", "86400")?,
            stream_buffer,
            campaign_interval_seconds: env_or_parse("CAMPAIGN_INTERVAL_SECONDS", "3600")?,
            campaign_concurrency,
        })
    }
}

fn vapid_from_env() -> Result<Option<VapidConfig>> {
    let public_key = non_empty_env("VAPID_PUBLIC_KEY");
    let private_key = non_empty_env("VAPID_PRIVATE_KEY");
    let (Some(public_key), Some(private_key)) = (public_key, private_key) else {
        return Ok(None);
    };

    // Uncompressed P-256 point and raw scalar, both base64url
    let public_bytes = URL_SAFE_NO_PAD
        .decode(public_key.trim_end_matches('=').as_bytes())
        .map_err(|err| anyhow!("invalid VAPID_PUBLIC_KEY: {}", err))?;
    if public_bytes.len() != 65 || public_bytes[0] != 0x04 {
        return Err(anyhow!("invalid VAPID_PUBLIC_KEY: expected 65-byte uncompressed P-256 point"));
    }
    let private_bytes = URL_SAFE_NO_PAD
        .decode(private_key.trim_end_matches('=').as_bytes())
        .map_err(|err| anyhow!("invalid VAPID_PRIVATE_KEY: {}", err))?;
    if private_bytes.len() != 32 {
        return Err(anyhow!("invalid VAPID_PRIVATE_KEY: expected 32 bytes"));
    }

    Ok(Some(VapidConfig {
        public_key,
        private_key,
        subject: env_or("VAPID_SUBJECT", "mailto:admin@localhost"),
    }))
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_err(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| anyhow!("missing required env var: {}", key))
}

fn env_or_parse<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
    value
        .parse::<T>()
        .map_err(|err| anyhow!("invalid {}: {}", key, err))
}

fn env_key_32(key: &str) -> Result<[u8; 32]> {
    let value = env_or_err(key)?;
    let decoded = STANDARD
        .decode(value.as_bytes())
        .map_err(|err| anyhow!("invalid {}: {}", key, err))?;
    if decoded.len() != 32 {
        return Err(anyhow!("invalid {}: expected 32 bytes", key));
    }
    let mut key_bytes = [0u8; 32];
    key_bytes.copy_from_slice(&decoded);
    Ok(key_bytes)
}
