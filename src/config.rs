use crate::gateway::PharmacyDeletion;
use crate::profile::AdminPolicy;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Ten years.
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365 * 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
	#[error("{0} not set in env")]
	Missing(&'static str),
	#[error("{key} has invalid value {value:?}: {reason}")]
	Invalid {
		key: &'static str,
		value: String,
		reason: String,
	},
}

#[derive(Debug, Clone)]
pub struct Config {
	pub database_url: String,
	pub bind_addr: SocketAddr,
	pub max_connections: u32,
	pub admin: AdminPolicy,
	pub pharmacy_deletion: PharmacyDeletion,
	pub session_ttl: chrono::Duration,
	pub static_dir: PathBuf,
}

impl Config {
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
		let database_url = lookup("DATABASE_URL")
			.filter(|url| !url.trim().is_empty())
			.ok_or(ConfigError::Missing("DATABASE_URL"))?;

		let bind_addr: SocketAddr = parse_or(&lookup, "BIND_ADDR", "0.0.0.0:8080".parse().ok())?;
		let max_connections: u32 = parse_or(&lookup, "DB_MAX_CONNECTIONS", Some(5))?;
		if max_connections == 0 {
			return Err(ConfigError::Invalid {
				key: "DB_MAX_CONNECTIONS",
				value: "0".into(),
				reason: "pool needs at least one connection".into(),
			});
		}
		let pharmacy_deletion = parse_or(&lookup, "PHARMACY_DELETION", Some(PharmacyDeletion::default()))?;
		let ttl_hours: i64 = parse_or(&lookup, "SESSION_TTL_HOURS", Some(24 * 7))?;
		if !(1..=MAX_SESSION_TTL_HOURS).contains(&ttl_hours) {
			return Err(ConfigError::Invalid {
				key: "SESSION_TTL_HOURS",
				value: ttl_hours.to_string(),
				reason: format!("must be between 1 and {MAX_SESSION_TTL_HOURS}"),
			});
		}
		let session_ttl = chrono::Duration::try_hours(ttl_hours).ok_or_else(|| ConfigError::Invalid {
			key: "SESSION_TTL_HOURS",
			value: ttl_hours.to_string(),
			reason: "out of range".into(),
		})?;

		let admin = AdminPolicy::new(lookup("ADMIN_EMAILS").unwrap_or_default().split(','));
		let static_dir = lookup("STATIC_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("static"));

		Ok(Config {
			database_url,
			bind_addr,
			max_connections,
			admin,
			pharmacy_deletion,
			session_ttl,
			static_dir,
		})
	}
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: Option<T>) -> Result<T, ConfigError>
where
	T: std::str::FromStr,
	T::Err: std::fmt::Display,
{
	match lookup(key).filter(|v| !v.trim().is_empty()) {
		Some(value) => match value.trim().parse() {
			Ok(parsed) => Ok(parsed),
			Err(e) => Err(ConfigError::Invalid {
				key,
				reason: e.to_string(),
				value,
			}),
		},
		None => default.ok_or(ConfigError::Missing(key)),
	}
}
