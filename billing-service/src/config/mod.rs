use anyhow::Result;
use dotenvy::dotenv;
use secrecy::Secret;
use serde::Deserialize;
use std::env;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub stripe: StripeConfig,
    pub notifier: NotifierConfig,
    pub service_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub db_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct StripeConfig {
    pub secret_key: Secret<String>,
    pub webhook_secret: Secret<String>,
    pub api_base_url: String,
    /// Maximum accepted age of a signed webhook timestamp, in seconds.
    pub signature_tolerance_secs: i64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct NotifierConfig {
    pub base_url: String,
    pub enabled: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("BILLING_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("BILLING_SERVICE_PORT")
            .unwrap_or_else(|_| "3004".to_string())
            .parse()?;

        let db_url = env::var("BILLING_DATABASE_URL")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
        let db_name =
            env::var("BILLING_DATABASE_NAME").unwrap_or_else(|_| "billing_db".to_string());

        let stripe_secret_key = env::var("STRIPE_SECRET_KEY").unwrap_or_default();
        let stripe_webhook_secret = env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default();
        let stripe_api_base_url = env::var("STRIPE_API_BASE_URL")
            .unwrap_or_else(|_| "https://api.stripe.com/v1".to_string());

        let notifier_base_url = env::var("NOTIFICATION_SERVICE_URL")
            .unwrap_or_else(|_| "http://localhost:3005".to_string());
        let notifier_enabled = env::var("NOTIFICATIONS_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);

        Ok(Self {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: Secret::new(db_url),
                db_name,
            },
            stripe: StripeConfig {
                secret_key: Secret::new(stripe_secret_key),
                webhook_secret: Secret::new(stripe_webhook_secret),
                api_base_url: stripe_api_base_url,
                signature_tolerance_secs: 300,
            },
            notifier: NotifierConfig {
                base_url: notifier_base_url,
                enabled: notifier_enabled,
            },
            service_name: "billing-service".to_string(),
        })
    }
}
