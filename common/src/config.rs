use std::{ env, fmt::Display, str::FromStr };

use anyhow::{ bail, Context, Result };
use tracing::{ info, warn };

const DEV_JWT_SECRET: &str = "metriks-dev-secret";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartMode {
	/// Hand the shopper a storefront add-to-cart link
	Redirect,
	/// Add items server side through the storefront's AJAX endpoint
	Ajax,
}

impl FromStr for CartMode {
	type Err = anyhow::Error;

	fn from_str(value: &str) -> Result<Self> {
		match value.trim().to_ascii_lowercase().as_str() {
			"redirect" => Ok(CartMode::Redirect),
			"ajax" => Ok(CartMode::Ajax),
			other => bail!("unknown cart mode '{}'", other),
		}
	}
}

impl Display for CartMode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			CartMode::Redirect => write!(f, "redirect"),
			CartMode::Ajax => write!(f, "ajax"),
		}
	}
}

#[derive(Debug, Clone)]
pub struct Config {
	pub port: u16,
	pub database_path: String,
	pub pool_size: usize,
	pub jwt_secret: String,
	pub token_ttl_days: i64,
	pub cart_base_url: String,
	pub cart_mode: CartMode,
	pub seed_demo_data: bool,
}

impl Config {
	/// Reads `.env` when present, then the process environment.
	pub fn from_env() -> Result<Self> {
		if let Err(e) = dotenvy::dotenv() {
			if !e.not_found() {
				return Err(e).context("failed to read .env");
			}
		}

		Self::from_lookup(|key| env::var(key).ok())
	}

	pub fn from_lookup<F>(lookup: F) -> Result<Self> where F: Fn(&str) -> Option<String> {
		let jwt_secret = match lookup("METRIKS_JWT_SECRET").filter(|s| !s.trim().is_empty()) {
			Some(secret) => secret,
			None => {
				warn!("METRIKS_JWT_SECRET not set, using the development secret");
				DEV_JWT_SECRET.to_string()
			}
		};

		let config = Self {
			port: load(&lookup, "METRIKS_PORT", 5001)?,
			database_path: load(&lookup, "METRIKS_DATABASE_PATH", "./data/metriks.db".to_string())?,
			pool_size: load(&lookup, "METRIKS_POOL_SIZE", 4)?,
			jwt_secret,
			token_ttl_days: load(&lookup, "METRIKS_TOKEN_TTL_DAYS", 30)?,
			cart_base_url: load(&lookup, "METRIKS_CART_BASE_URL", "https://hahishook.com".to_string())?,
			cart_mode: load(&lookup, "METRIKS_CART_MODE", CartMode::Redirect)?,
			seed_demo_data: load(&lookup, "METRIKS_SEED_DEMO_DATA", false)?,
		};

		if config.pool_size == 0 {
			bail!("METRIKS_POOL_SIZE must be at least 1");
		}
		if config.token_ttl_days <= 0 {
			bail!("METRIKS_TOKEN_TTL_DAYS must be positive");
		}

		Ok(config)
	}
}

fn load<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
	where F: Fn(&str) -> Option<String>, T: FromStr + Display, T::Err: Display
{
	match lookup(key) {
		Some(raw) =>
			raw
				.trim()
				.parse()
				.map_err(|e| anyhow::anyhow!("invalid {} value '{}': {}", key, raw, e)),
		None => {
			info!("{} not set, using default: {}", key, default);
			Ok(default)
		}
	}
}
