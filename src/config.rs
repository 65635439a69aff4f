use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub auth_url: String,
    pub auth_service_key: String,
    pub auth_anon_key: String,
    pub admin_emails: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let admin_emails: Vec<String> = env::var("ADMIN_EMAILS")
            .context("ADMIN_EMAILS must be set")?
            .split(',')
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty())
            .collect();
        if admin_emails.is_empty() {
            anyhow::bail!("ADMIN_EMAILS must contain at least one address");
        }

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            auth_url: env::var("AUTH_URL").context("AUTH_URL must be set")?,
            auth_service_key: env::var("AUTH_SERVICE_KEY")
                .context("AUTH_SERVICE_KEY must be set")?,
            auth_anon_key: env::var("AUTH_ANON_KEY").context("AUTH_ANON_KEY must be set")?,
            admin_emails,
        })
    }
}
