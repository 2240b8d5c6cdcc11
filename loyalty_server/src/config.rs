//! Server configuration.
//!
//! Settings are read once at startup. For each setting, the environment variable takes precedence over the
//! command-line flag, which takes precedence over the default. Invalid values are logged and replaced with the
//! default. See `cli-help.txt` for the full list of variables.
use std::{env, fmt::Display, str::FromStr, time::Duration};

use accrual_client::AccrualConfig;
use log::*;
use loyalty_common::{helpers::parse_boolean_flag, Secret};
use loyalty_engine::FanoutPolicy;
use rand::{distributions::Alphanumeric, thread_rng, Rng};

use crate::{cli::Arguments, errors::ServerError};

const DEFAULT_RUN_ADDRESS: &str = "localhost:8080";
const DEFAULT_DATABASE_URL: &str = "sqlite://data/loyalty.db";
const DEFAULT_ACCRUAL_ADDRESS: &str = "http://localhost:8081";
const DEFAULT_TOKEN_EXPIRY_HOURS: i64 = 3;
const DEFAULT_ACCRUAL_DEADLINE_SECS: u64 = 10;
const DEFAULT_ACCRUAL_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_ACCRUAL_TIMEOUT_SECS: u64 = 5;
const DEFAULT_DB_CONNECTIONS: u32 = 25;
const DEFAULT_BCRYPT_COST: u32 = 12;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// `host:port` to bind to.
    pub run_address: String,
    pub database_url: String,
    pub max_db_connections: u32,
    /// Apply the embedded migrations on startup.
    pub run_migrations: bool,
    pub auth: AuthConfig,
    pub accrual: AccrualSettings,
    /// bcrypt work factor for new password hashes.
    pub bcrypt_cost: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            run_address: DEFAULT_RUN_ADDRESS.to_string(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_db_connections: DEFAULT_DB_CONNECTIONS,
            run_migrations: true,
            auth: AuthConfig::default(),
            accrual: AccrualSettings::default(),
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }
}

impl ServerConfig {
    pub fn from_env_or_default(args: &Arguments) -> Self {
        let run_address = env_or_flag("RUN_ADDRESS", &args.run_address).unwrap_or_else(|| {
            info!("🪛️ RUN_ADDRESS is not set. Using the default, {DEFAULT_RUN_ADDRESS}.");
            DEFAULT_RUN_ADDRESS.into()
        });
        let database_url = env_or_flag("DATABASE_URI", &args.database_uri).unwrap_or_else(|| {
            warn!("🪛️ DATABASE_URI is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.into()
        });
        let run_migrations = parse_boolean_flag(env::var("LPS_RUN_MIGRATIONS").ok(), true);
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!("🪛️ Could not load the authentication configuration. {e}. Reverting to the default configuration.");
            AuthConfig { token_expiry: token_expiry_from_env(), ..AuthConfig::default() }
        });
        let accrual = AccrualSettings::from_env_or_default(args);
        let bcrypt_cost = env_or_default("LPS_BCRYPT_COST", DEFAULT_BCRYPT_COST);
        let bcrypt_cost = if (4..=31).contains(&bcrypt_cost) {
            bcrypt_cost
        } else {
            error!("🪛️ LPS_BCRYPT_COST must be between 4 and 31. Using the default instead.");
            DEFAULT_BCRYPT_COST
        };
        Self {
            run_address,
            database_url,
            max_db_connections: DEFAULT_DB_CONNECTIONS,
            run_migrations,
            auth,
            accrual,
            bcrypt_cost,
        }
    }
}

//-----------------------------------------------  AccrualSettings  ----------------------------------------------------
#[derive(Clone, Debug)]
pub struct AccrualSettings {
    pub base_url: String,
    /// Timeout for a single request to the accrual service.
    pub request_timeout: Duration,
    /// Time limit for resolving every order in one request.
    pub deadline: Duration,
    pub max_attempts: u32,
}

impl Default for AccrualSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ACCRUAL_ADDRESS.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_ACCRUAL_TIMEOUT_SECS),
            deadline: Duration::from_secs(DEFAULT_ACCRUAL_DEADLINE_SECS),
            max_attempts: DEFAULT_ACCRUAL_MAX_ATTEMPTS,
        }
    }
}

impl AccrualSettings {
    pub fn from_env_or_default(args: &Arguments) -> Self {
        let base_url = env_or_flag("ACCRUAL_SYSTEM_ADDRESS", &args.accrual_address).unwrap_or_else(|| {
            warn!("🪛️ ACCRUAL_SYSTEM_ADDRESS is not set. Using the default, {DEFAULT_ACCRUAL_ADDRESS}.");
            DEFAULT_ACCRUAL_ADDRESS.into()
        });
        let request_timeout = Duration::from_secs(env_or_default("LPS_ACCRUAL_TIMEOUT", DEFAULT_ACCRUAL_TIMEOUT_SECS));
        let deadline = Duration::from_secs(env_or_default("LPS_ACCRUAL_DEADLINE", DEFAULT_ACCRUAL_DEADLINE_SECS));
        let max_attempts = match env_or_default("LPS_ACCRUAL_MAX_ATTEMPTS", DEFAULT_ACCRUAL_MAX_ATTEMPTS) {
            0 => {
                warn!("🪛️ LPS_ACCRUAL_MAX_ATTEMPTS must be at least 1. Using 1.");
                1
            },
            n => n,
        };
        Self { base_url, request_timeout, deadline, max_attempts }
    }

    pub fn client_config(&self) -> AccrualConfig {
        AccrualConfig::new(&self.base_url).with_request_timeout(self.request_timeout)
    }

    pub fn fanout_policy(&self) -> FanoutPolicy {
        FanoutPolicy::default().with_max_attempts(self.max_attempts).with_deadline(self.deadline)
    }
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The HMAC secret used to sign and verify access tokens.
    pub jwt_secret: Secret<String>,
    pub token_expiry: chrono::Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!(
            "🚨️🚨️🚨️ The JWT signing secret has not been set. I'm using a random value for this session. DO NOT \
             operate on production like this since every access token is invalidated when the server restarts. Set \
             LPS_JWT_SECRET instead. 🚨️🚨️🚨️"
        );
        let secret = thread_rng().sample_iter(&Alphanumeric).take(64).map(char::from).collect::<String>();
        Self { jwt_secret: Secret::new(secret), token_expiry: chrono::Duration::hours(DEFAULT_TOKEN_EXPIRY_HOURS) }
    }
}

impl AuthConfig {
    pub fn new<S: Into<String>>(secret: S, token_expiry: chrono::Duration) -> Self {
        Self { jwt_secret: Secret::new(secret.into()), token_expiry }
    }

    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret = env::var("LPS_JWT_SECRET")
            .map_err(|e| ServerError::ConfigurationError(format!("{e} [LPS_JWT_SECRET]")))?;
        if secret.trim().is_empty() {
            return Err(ServerError::ConfigurationError("LPS_JWT_SECRET is empty".into()));
        }
        Ok(Self::new(secret, token_expiry_from_env()))
    }
}

fn token_expiry_from_env() -> chrono::Duration {
    let hours = env_or_default("LPS_TOKEN_EXPIRY_HOURS", DEFAULT_TOKEN_EXPIRY_HOURS);
    let hours = if hours > 0 {
        hours
    } else {
        warn!("🪛️ LPS_TOKEN_EXPIRY_HOURS must be positive. Using the default, {DEFAULT_TOKEN_EXPIRY_HOURS}.");
        DEFAULT_TOKEN_EXPIRY_HOURS
    };
    chrono::Duration::hours(hours)
}

//-------------------------------------------------  helpers  ----------------------------------------------------------
fn env_or_flag(name: &str, flag: &Option<String>) -> Option<String> {
    env::var(name).ok().filter(|s| !s.trim().is_empty()).or_else(|| flag.clone())
}

fn env_or_default<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default value of {default}.");
            default
        },
    }
}
