use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// Runtime configuration. Built from an optional YAML file plus environment
/// variables; the environment wins.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
	pub sync: SyncSettings,
	pub authn: Authn,
	/// Reject unknown sync-op values instead of mapping them to FullSync.
	pub strict_ops: bool,
	/// Enforcement backend address; empty means dry-run publishing.
	pub sgroups_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
	pub enabled: bool,
	pub debounce: Duration,
	pub cleanup_interval: Duration,
	pub max_age: Duration,
	pub queue_capacity: usize,
	pub shutdown_grace: Duration,
	pub retry: RetrySettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrySettings {
	pub initial_delay: Duration,
	pub max_delay: Duration,
	pub backoff_factor: f64,
	pub max_retries: u32,
}

impl Default for SyncSettings {
	fn default() -> Self {
		Self {
			enabled: true,
			debounce: Duration::from_secs(5),
			cleanup_interval: Duration::from_secs(600),
			max_age: Duration::from_secs(3600),
			queue_capacity: 256,
			shutdown_grace: Duration::from_secs(10),
			retry: RetrySettings::default(),
		}
	}
}

impl Default for RetrySettings {
	fn default() -> Self {
		Self {
			initial_delay: Duration::from_secs(1),
			max_delay: Duration::from_secs(60),
			backoff_factor: 2.0,
			max_retries: 5,
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum Authn {
	None,
	Tls(TlsSettings),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TlsSettings {
	pub cert_file: PathBuf,
	pub key_file: PathBuf,
	pub ca_file: Option<PathBuf>,
}

/// File-level shape of the configuration; every knob optional so the
/// defaults and environment can fill the gaps.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawConfig {
	pub sync_enabled: Option<bool>,
	#[serde(default, deserialize_with = "duration_str::deserialize_option_duration")]
	pub sync_debounce_time: Option<Duration>,
	#[serde(default, deserialize_with = "duration_str::deserialize_option_duration")]
	pub sync_cleanup_interval: Option<Duration>,
	#[serde(default, deserialize_with = "duration_str::deserialize_option_duration")]
	pub sync_cleanup_max_age: Option<Duration>,
	pub sync_strict_ops: Option<bool>,
	pub sync_queue_capacity: Option<usize>,
	#[serde(default, deserialize_with = "duration_str::deserialize_option_duration")]
	pub sync_shutdown_grace: Option<Duration>,
	#[serde(default, deserialize_with = "duration_str::deserialize_option_duration")]
	pub retry_initial_delay: Option<Duration>,
	#[serde(default, deserialize_with = "duration_str::deserialize_option_duration")]
	pub retry_max_delay: Option<Duration>,
	pub retry_backoff_factor: Option<f64>,
	pub retry_max_retries: Option<u32>,
	pub sgroups_address: Option<String>,
	pub authn_type: Option<String>,
	pub tls_cert_file: Option<PathBuf>,
	pub tls_key_file: Option<PathBuf>,
	pub tls_ca_file: Option<PathBuf>,
}

pub fn parse_config(contents: Option<String>) -> anyhow::Result<Config> {
	let raw: RawConfig = match contents {
		Some(c) if !c.trim().is_empty() => serde_yaml::from_str(&c)?,
		_ => RawConfig::default(),
	};
	let defaults = SyncSettings::default();

	let sync = SyncSettings {
		enabled: parse("SYNC_ENABLED")?
			.or(raw.sync_enabled)
			.unwrap_or(defaults.enabled),
		debounce: parse_duration("SYNC_DEBOUNCE_TIME")?
			.or(raw.sync_debounce_time)
			.unwrap_or(defaults.debounce),
		cleanup_interval: parse_duration("SYNC_CLEANUP_INTERVAL")?
			.or(raw.sync_cleanup_interval)
			.unwrap_or(defaults.cleanup_interval),
		max_age: parse_duration("SYNC_CLEANUP_MAX_AGE")?
			.or(raw.sync_cleanup_max_age)
			.unwrap_or(defaults.max_age),
		queue_capacity: parse("SYNC_QUEUE_CAPACITY")?
			.or(raw.sync_queue_capacity)
			.unwrap_or(defaults.queue_capacity),
		shutdown_grace: parse_duration("SYNC_SHUTDOWN_GRACE")?
			.or(raw.sync_shutdown_grace)
			.unwrap_or(defaults.shutdown_grace),
		retry: RetrySettings {
			initial_delay: parse_duration("RETRY_INITIAL_DELAY")?
				.or(raw.retry_initial_delay)
				.unwrap_or(defaults.retry.initial_delay),
			max_delay: parse_duration("RETRY_MAX_DELAY")?
				.or(raw.retry_max_delay)
				.unwrap_or(defaults.retry.max_delay),
			backoff_factor: parse("RETRY_BACKOFF_FACTOR")?
				.or(raw.retry_backoff_factor)
				.unwrap_or(defaults.retry.backoff_factor),
			max_retries: parse("RETRY_MAX_RETRIES")?
				.or(raw.retry_max_retries)
				.unwrap_or(defaults.retry.max_retries),
		},
	};
	if sync.retry.backoff_factor < 1.0 {
		anyhow::bail!("RETRY_BACKOFF_FACTOR must be >= 1.0");
	}

	let authn_type = parse::<String>("AUTHN_TYPE")?
		.or(raw.authn_type)
		.unwrap_or_else(|| "none".to_string());
	let authn = match authn_type.as_str() {
		"none" => Authn::None,
		"tls" => {
			let cert_file = parse::<PathBuf>("TLS_CERT_FILE")?
				.or(raw.tls_cert_file)
				.ok_or_else(|| anyhow::anyhow!("AUTHN_TYPE=tls requires TLS_CERT_FILE"))?;
			let key_file = parse::<PathBuf>("TLS_KEY_FILE")?
				.or(raw.tls_key_file)
				.ok_or_else(|| anyhow::anyhow!("AUTHN_TYPE=tls requires TLS_KEY_FILE"))?;
			for f in [&cert_file, &key_file] {
				if !f.exists() {
					anyhow::bail!("TLS file {} not found", f.display());
				}
			}
			Authn::Tls(TlsSettings {
				cert_file,
				key_file,
				ca_file: parse::<PathBuf>("TLS_CA_FILE")?.or(raw.tls_ca_file),
			})
		},
		other => anyhow::bail!("unknown AUTHN_TYPE {other:?}"),
	};

	Ok(Config {
		sync,
		authn,
		strict_ops: parse("SYNC_STRICT_OPS")?
			.or(raw.sync_strict_ops)
			.unwrap_or(false),
		sgroups_address: empty_to_none(parse::<String>("SGROUPS_ADDRESS")?.or(raw.sgroups_address)),
	})
}

fn parse<T: FromStr>(env: &str) -> anyhow::Result<Option<T>>
where
	<T as FromStr>::Err: ToString,
{
	match env::var(env) {
		Ok(val) => val
			.parse()
			.map(|v| Some(v))
			.map_err(|e: <T as FromStr>::Err| {
				anyhow::anyhow!("invalid env var {}={} ({})", env, val, e.to_string())
			}),
		Err(_) => Ok(None),
	}
}

fn parse_duration(env: &str) -> anyhow::Result<Option<Duration>> {
	parse::<String>(env)?
		.map(|ds| {
			duration_str::parse(&ds).map_err(|e| anyhow::anyhow!("invalid env var {}={} ({})", env, ds, e))
		})
		.transpose()
}

pub fn empty_to_none<A: AsRef<str>>(inp: Option<A>) -> Option<A> {
	if let Some(inner) = &inp {
		if inner.as_ref().is_empty() {
			return None;
		}
	}
	inp
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_without_file_or_env() {
		let cfg = parse_config(None).unwrap();
		assert!(cfg.sync.enabled);
		assert_eq!(cfg.sync.debounce, Duration::from_secs(5));
		assert_eq!(cfg.sync.max_age, Duration::from_secs(3600));
		assert_eq!(cfg.sync.cleanup_interval, Duration::from_secs(600));
		assert_eq!(cfg.sync.retry.max_retries, 5);
		assert_eq!(cfg.authn, Authn::None);
		assert!(!cfg.strict_ops);
		assert_eq!(cfg.sgroups_address, None);
	}

	#[test]
	fn file_settings_apply() {
		let cfg = parse_config(Some(
			r#"
syncDebounceTime: 1s
retryMaxRetries: 2
sgroupsAddress: "https://sgroups.local:9000"
syncStrictOps: true
"#
			.to_string(),
		))
		.unwrap();
		assert_eq!(cfg.sync.debounce, Duration::from_secs(1));
		assert_eq!(cfg.sync.retry.max_retries, 2);
		assert_eq!(
			cfg.sgroups_address.as_deref(),
			Some("https://sgroups.local:9000")
		);
		assert!(cfg.strict_ops);
	}

	#[test]
	fn unknown_file_keys_are_rejected() {
		assert!(parse_config(Some("nope: true".to_string())).is_err());
	}

	#[test]
	fn unknown_authn_type_is_rejected() {
		let err = parse_config(Some("authnType: spiffe".to_string())).unwrap_err();
		assert!(err.to_string().contains("AUTHN_TYPE"));
	}
}
