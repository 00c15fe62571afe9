use std::env;

use crate::rate_limit::RateLimitConfig;

pub const DEFAULT_GATEWAY_API_BASE: &str = "https://api.razorpay.com/v1";
pub const DEFAULT_NOTIFY_QUEUE_CAPACITY: usize = 256;

/// Gateway API credentials. Both halves are required for any gateway call.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub api_base: String,
}

/// How confirmation notices leave the system.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub resend_api_key: Option<String>,
    pub from: String,
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub dev_mode: bool,
    pub gateway: Option<GatewayConfig>,
    pub webhook_secret: Option<String>,
    pub admin_emails: Vec<String>,
    pub email: EmailConfig,
    pub notify_queue_capacity: usize,
    pub rate_limit: RateLimitConfig,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("TOURPAY_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let gateway = match (non_empty("GATEWAY_KEY_ID"), non_empty("GATEWAY_KEY_SECRET")) {
            (Some(key_id), Some(key_secret)) => Some(GatewayConfig {
                key_id,
                key_secret,
                api_base: non_empty("GATEWAY_API_BASE")
                    .unwrap_or_else(|| DEFAULT_GATEWAY_API_BASE.to_string()),
            }),
            (None, None) => None,
            _ => {
                tracing::warn!(
                    "Only one of GATEWAY_KEY_ID / GATEWAY_KEY_SECRET is set, gateway disabled"
                );
                None
            }
        };

        let admin_emails = env::var("ADMIN_EMAILS")
            .map(|v| parse_email_list(&v))
            .unwrap_or_default();

        let notify_queue_capacity = env::var("NOTIFY_QUEUE_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_NOTIFY_QUEUE_CAPACITY);

        let defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            strict_rpm: parse_rpm("RATE_LIMIT_STRICT_RPM", defaults.strict_rpm),
            standard_rpm: parse_rpm("RATE_LIMIT_STANDARD_RPM", defaults.standard_rpm),
        };

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "tourpay.db".to_string()),
            dev_mode,
            gateway,
            webhook_secret: non_empty("GATEWAY_WEBHOOK_SECRET"),
            admin_emails,
            email: EmailConfig {
                resend_api_key: non_empty("RESEND_API_KEY"),
                from: env::var("EMAIL_FROM")
                    .unwrap_or_else(|_| "Bookings <bookings@tourpay.local>".to_string()),
                webhook_url: non_empty("NOTIFY_WEBHOOK_URL"),
            },
            notify_queue_capacity,
            rate_limit,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// 0 disables the tier.
fn parse_rpm(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Split a comma-separated email list, dropping blanks and normalizing case.
pub fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}
