use {
    crate::services::poller::{DEFAULT_INTERVAL, DEFAULT_MAX_ATTEMPTS},
    rust_decimal::Decimal,
    std::{env, net::SocketAddr, str::FromStr, time::Duration},
    thiserror::Error,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    MissingVariable(&'static str),

    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub app_url: String,
    pub cop_per_usd: Decimal,
    pub provider_timeout: Duration,
    pub poller: PollerConfig,
    pub base_pay: Option<BasePayConfig>,
    pub stripe: Option<StripeConfig>,
    pub wompi: Option<WompiConfig>,
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

#[derive(Debug, Clone)]
pub struct BasePayConfig {
    pub api_url: String,
    pub recipient: String,
    pub testnet: bool,
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WompiEnv {
    Sandbox,
    Production,
}

impl WompiEnv {
    pub fn base_url(&self) -> &'static str {
        match self {
            Self::Sandbox => "https://sandbox.wompi.co/v1",
            Self::Production => "https://production.wompi.co/v1",
        }
    }
}

#[derive(Debug, Clone)]
pub struct WompiConfig {
    pub public_key: String,
    pub private_key: String,
    pub env: WompiEnv,
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NotificationConfig {
    pub resend: Option<ResendConfig>,
    pub twilio: Option<TwilioConfig>,
}

#[derive(Debug, Clone)]
pub struct ResendConfig {
    pub api_key: String,
    pub from: String,
    pub admin_email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub whatsapp_from: String,
    pub distributor_whatsapp: String,
}

impl AppConfig {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick
    /// up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as `from_env`, against any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::MissingVariable("DATABASE_URL"))?;
        let bind_addr = parse_or("BIND_ADDR", get("BIND_ADDR"), SocketAddr::from(([0, 0, 0, 0], 3000)))?;
        let app_url = get("APP_URL").unwrap_or_else(|| "http://localhost:3000".to_string());
        let cop_per_usd = parse_or("COP_PER_USD", get("COP_PER_USD"), Decimal::from(4200))?;
        if cop_per_usd <= Decimal::ZERO {
            return Err(ConfigError::InvalidValue {
                name: "COP_PER_USD",
                value: cop_per_usd.to_string(),
            });
        }

        let timeout_secs: u64 = parse_or("PROVIDER_TIMEOUT_SECS", get("PROVIDER_TIMEOUT_SECS"), 15)?;
        let interval_ms: u64 = parse_or(
            "POLL_INTERVAL_MS",
            get("POLL_INTERVAL_MS"),
            DEFAULT_INTERVAL.as_millis() as u64,
        )?;
        let max_attempts: u32 =
            parse_or("POLL_MAX_ATTEMPTS", get("POLL_MAX_ATTEMPTS"), DEFAULT_MAX_ATTEMPTS)?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                name: "POLL_MAX_ATTEMPTS",
                value: "0".into(),
            });
        }

        let base_pay = match (get("BASE_PAY_API_URL"), get("BASE_PAY_RECIPIENT")) {
            (Some(api_url), Some(recipient)) => Some(BasePayConfig {
                api_url: api_url.trim_end_matches('/').to_string(),
                recipient,
                testnet: parse_or("BASE_PAY_TESTNET", get("BASE_PAY_TESTNET"), false)?,
                webhook_secret: get("BASE_PAY_WEBHOOK_SECRET"),
            }),
            _ => None,
        };

        let stripe = get("STRIPE_SECRET_KEY").map(|secret_key| StripeConfig {
            secret_key,
            webhook_secret: get("STRIPE_WEBHOOK_SECRET"),
        });

        let wompi = match (get("WOMPI_PUBLIC_KEY"), get("WOMPI_PRIVATE_KEY")) {
            (Some(public_key), Some(private_key)) => Some(WompiConfig {
                public_key,
                private_key,
                env: match get("WOMPI_ENV").as_deref() {
                    None | Some("sandbox") => WompiEnv::Sandbox,
                    Some("production") => WompiEnv::Production,
                    Some(other) => {
                        return Err(ConfigError::InvalidValue {
                            name: "WOMPI_ENV",
                            value: other.to_string(),
                        });
                    }
                },
                webhook_secret: get("WOMPI_WEBHOOK_SECRET"),
            }),
            _ => None,
        };

        let resend = get("RESEND_API_KEY").map(|api_key| ResendConfig {
            api_key,
            from: get("EMAIL_FROM").unwrap_or_else(|| "Swag Shop <onboarding@resend.dev>".into()),
            admin_email: get("ADMIN_EMAIL"),
        });

        let twilio = match (
            get("TWILIO_ACCOUNT_SID"),
            get("TWILIO_AUTH_TOKEN"),
            get("TWILIO_WHATSAPP_FROM"),
            get("DISTRIBUTOR_WHATSAPP"),
        ) {
            (Some(account_sid), Some(auth_token), Some(whatsapp_from), Some(distributor_whatsapp)) => {
                Some(TwilioConfig {
                    account_sid,
                    auth_token,
                    whatsapp_from,
                    distributor_whatsapp,
                })
            }
            _ => None,
        };

        Ok(Self {
            database_url,
            bind_addr,
            app_url,
            cop_per_usd,
            provider_timeout: Duration::from_secs(timeout_secs),
            poller: PollerConfig {
                interval: Duration::from_millis(interval_ms),
                max_attempts,
            },
            base_pay,
            stripe,
            wompi,
            notifications: NotificationConfig { resend, twilio },
        })
    }
}

fn parse_or<T: FromStr>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
    }
}
