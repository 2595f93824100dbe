//! Typed process configuration.
//!
//! [`PortalConfig`] is assembled once at start-up (defaults, then an optional TOML file, then
//! `PORTAL_`-prefixed environment variables with `__` separating nested keys) and turned into
//! the typed values each component takes. Nothing re-reads the environment per request.

// std
use std::{net::SocketAddr, path::PathBuf};
// self
use crate::{
	_prelude::*,
	controller::{
		ControllerDescriptor, ControllerEndpoints, ControllerQuirks, DefaultControllerStrategy,
		RetryPolicy, VariantMatrix,
	},
	error::ConfigError,
	ledger::LedgerSettings,
	membership::{EntitlementRules, PlanTier},
	model::{ControllerId, MacFormat, Secret},
	policy::{AccessPolicy, ChargeCode, ChargeRate, ChargeSchedule, LocalZone, PolicyWindow},
};

/// Prefix of environment overrides, e.g. `PORTAL_CONTROLLER__BASE_URL`.
pub const ENV_PREFIX: &str = "PORTAL_";

/// Complete portal configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
	/// HTTP listener.
	pub server: ServerConfig,
	/// Access windows and prices.
	pub policy: PolicyConfig,
	/// Monthly cap and debit bookkeeping.
	pub ledger: LedgerConfig,
	/// Network controller connection and negotiation matrix.
	pub controller: ControllerConfig,
	/// Network name → tiers that may join it. Unlisted networks accept any tier.
	pub entitlements: BTreeMap<String, Vec<PlanTier>>,
	/// Persistence.
	pub store: StoreConfig,
}
impl PortalConfig {
	/// Merges defaults, the TOML file at `path` (when given and present), and the environment.
	#[cfg(feature = "server")]
	pub fn load(path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
		// crates.io
		use figment::{
			Figment,
			providers::{Env, Format, Serialized, Toml},
		};

		let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));

		if let Some(path) = path.filter(|p| p.exists()) {
			figment = figment.merge(Toml::file(path));
		}

		let config: Self = figment
			.merge(Env::prefixed(ENV_PREFIX).split("__"))
			.extract()
			.map_err(|e| ConfigError::Load { message: e.to_string() })?;

		config.validate()?;

		Ok(config)
	}

	/// Builds every typed component once, surfacing the first problem.
	pub fn validate(&self) -> Result<(), ConfigError> {
		self.access_policy()?;
		self.ledger_settings()?;
		self.controller_descriptor()?;

		if self.controller.timeout_ms == 0 {
			return Err(ConfigError::Invalid {
				key: "controller.timeout_ms",
				reason: "must be positive".into(),
			});
		}

		Ok(())
	}

	/// Access policy described by the `policy` section.
	pub fn access_policy(&self) -> Result<AccessPolicy, ConfigError> {
		let section = &self.policy;
		let window =
			PolicyWindow::parse(&section.early_start, &section.day_end, &section.hard_cutoff)?;
		let mut schedule = ChargeSchedule::empty();

		for (code, rate) in &section.charges {
			schedule = schedule.with_rate(code.parse::<ChargeCode>()?, rate.clone());
		}

		Ok(AccessPolicy::new(window)
			.with_extension_cap(Duration::minutes(section.extension_cap_minutes))?
			.with_weekends_closed(section.closed_on_weekends)
			.with_zone(section.zone)?
			.with_schedule(schedule)?)
	}

	/// Ledger settings described by the `ledger` section.
	pub fn ledger_settings(&self) -> Result<LedgerSettings, ConfigError> {
		let section = &self.ledger;

		if section.monthly_cap_cents < 0 {
			return Err(ConfigError::Invalid {
				key: "ledger.monthly_cap_cents",
				reason: "cannot be negative".into(),
			});
		}
		if section.max_cas_attempts == 0 {
			return Err(ConfigError::Invalid {
				key: "ledger.max_cas_attempts",
				reason: "must be at least 1".into(),
			});
		}

		Ok(LedgerSettings {
			monthly_cap_cents: section.monthly_cap_cents,
			debit_retention: Duration::days(section.debit_retention_days.max(1)),
			max_cas_attempts: section.max_cas_attempts,
		})
	}

	/// Controller descriptor described by the `controller` section.
	pub fn controller_descriptor(&self) -> Result<ControllerDescriptor, ConfigError> {
		let section = &self.controller;
		let raw = section
			.base_url
			.as_deref()
			.filter(|u| !u.trim().is_empty())
			.ok_or(ConfigError::Missing { key: "controller.base_url" })?;
		let base_url = Url::parse(raw)
			.map_err(|source| ConfigError::InvalidUrl { value: raw.to_owned(), source })?;

		if section.operator_user.trim().is_empty() {
			return Err(ConfigError::Missing { key: "controller.operator_user" });
		}
		if section.operator_password.is_empty() {
			return Err(ConfigError::Missing { key: "controller.operator_password" });
		}

		let quirks = ControllerQuirks {
			csrf_header: section.csrf_header.clone(),
			session_ttl: Duration::seconds(section.session_ttl_secs),
			..Default::default()
		};

		Ok(ControllerDescriptor::builder(ControllerId::new(&section.controller_id)?)
			.base_url(base_url)
			.operator(section.operator_user.as_str(), section.operator_password.expose())
			.warm_up_path(section.warm_up_path.as_str())
			.login_path(section.login_path.as_str())
			.authorize_paths(section.authorize_paths.iter().map(String::as_str))
			.auth_types(section.auth_types.iter().copied())
			.mac_formats(section.mac_formats.iter().copied())
			.quirks(quirks)
			.build()?)
	}

	/// Login retry policy.
	pub fn retry_policy(&self) -> RetryPolicy {
		let section = &self.controller;

		RetryPolicy {
			max_attempts: section.login_attempts.max(1),
			base_delay: Duration::milliseconds(section.backoff_base_ms as i64),
			max_delay: Duration::milliseconds(section.backoff_max_ms as i64),
			jitter: true,
		}
	}

	/// Response classifier with the configured mismatch codes.
	pub fn controller_strategy(&self) -> DefaultControllerStrategy {
		DefaultControllerStrategy::with_mismatch_codes(self.controller.mismatch_codes.iter().copied())
	}

	/// Per-call controller timeout.
	pub fn controller_timeout(&self) -> std::time::Duration {
		std::time::Duration::from_millis(self.controller.timeout_ms)
	}

	/// Network entitlement rules.
	pub fn entitlement_rules(&self) -> EntitlementRules {
		EntitlementRules::new(self.entitlements.iter().map(|(n, t)| (n.as_str(), t.iter().copied())))
	}
}

/// `server` section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
	/// Listen address.
	pub bind: SocketAddr,
}
impl Default for ServerConfig {
	fn default() -> Self {
		Self { bind: SocketAddr::from(([0, 0, 0, 0], 3000)) }
	}
}

/// `policy` section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
	/// `HH:MM` before which access is charged as early.
	pub early_start: String,
	/// `HH:MM` after which only extensions are admitted.
	pub day_end: String,
	/// `HH:MM` after which nothing is admitted.
	pub hard_cutoff: String,
	/// Longest after-hours session.
	pub extension_cap_minutes: i64,
	/// Whether Saturdays and Sundays are closed.
	pub closed_on_weekends: bool,
	/// Zone the boundaries are expressed in.
	pub zone: LocalZone,
	/// Charge code → price and label.
	pub charges: BTreeMap<String, ChargeRate>,
}
impl Default for PolicyConfig {
	fn default() -> Self {
		Self {
			early_start: "08:50".into(),
			day_end: "16:10".into(),
			hard_cutoff: "17:15".into(),
			extension_cap_minutes: 60,
			closed_on_weekends: true,
			zone: LocalZone::default(),
			charges: [
				(ChargeCode::Early, "Early access before 8:50"),
				(ChargeCode::Daily, "Day access 9:00 to 4:10"),
				(ChargeCode::AfterHours, "After hours 4:10 to 5:15"),
			]
			.into_iter()
			.map(|(code, label)| (code.as_str().to_owned(), ChargeRate::new(500, label)))
			.collect(),
		}
	}
}

/// `ledger` section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
	/// Credit granted per calendar month.
	pub monthly_cap_cents: i64,
	/// Days a debit record is kept.
	pub debit_retention_days: i64,
	/// Compare-and-swap retries per ledger update.
	pub max_cas_attempts: u32,
}
impl Default for LedgerConfig {
	fn default() -> Self {
		let settings = LedgerSettings::default();

		Self {
			monthly_cap_cents: settings.monthly_cap_cents,
			debit_retention_days: settings.debit_retention.whole_days(),
			max_cas_attempts: settings.max_cas_attempts,
		}
	}
}

/// `controller` section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
	/// Controller origin, optionally with a path prefix.
	pub base_url: Option<String>,
	/// Controller instance id inserted after the base path.
	pub controller_id: String,
	/// Operator account name.
	pub operator_user: String,
	/// Operator account password.
	pub operator_password: Secret,
	/// Hotspot page fetched before login.
	pub warm_up_path: String,
	/// Operator login endpoint.
	pub login_path: String,
	/// Authorize endpoints, tried in order.
	pub authorize_paths: Vec<String>,
	/// `authType` codes, tried in order.
	pub auth_types: Vec<u8>,
	/// Address renderings, tried in order.
	pub mac_formats: Vec<MacFormat>,
	/// Header carrying the CSRF token.
	pub csrf_header: String,
	/// `errorCode` values meaning "try the next variant".
	pub mismatch_codes: Vec<i64>,
	/// Lifetime of a cached session.
	pub session_ttl_secs: i64,
	/// Per-call timeout.
	pub timeout_ms: u64,
	/// Login attempts, including the first.
	pub login_attempts: u32,
	/// First backoff delay.
	pub backoff_base_ms: u64,
	/// Backoff ceiling.
	pub backoff_max_ms: u64,
}
impl Default for ControllerConfig {
	fn default() -> Self {
		let endpoints = ControllerEndpoints::default();
		let matrix = VariantMatrix::default();
		let retry = RetryPolicy::default();
		let quirks = ControllerQuirks::default();

		Self {
			base_url: None,
			controller_id: "default".into(),
			operator_user: String::new(),
			operator_password: Secret::default(),
			warm_up_path: endpoints.warm_up,
			login_path: endpoints.login,
			authorize_paths: matrix.authorize_paths,
			auth_types: matrix.auth_types,
			mac_formats: matrix.mac_formats,
			csrf_header: quirks.csrf_header,
			mismatch_codes: DefaultControllerStrategy::default().mismatch_codes().to_vec(),
			session_ttl_secs: quirks.session_ttl.whole_seconds(),
			timeout_ms: 10_000,
			login_attempts: retry.max_attempts,
			backoff_base_ms: retry.base_delay.whole_milliseconds() as u64,
			backoff_max_ms: retry.max_delay.whole_milliseconds() as u64,
		}
	}
}

/// `store` section.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
	/// JSON file backing the key-value store; in-memory when absent.
	pub path: Option<PathBuf>,
	/// JSON roster loaded into the development membership directory.
	pub members_path: Option<PathBuf>,
}
