//! Dispatch configuration.
//!
//! Settings are plain data with serde defaults, so a config file only needs
//! the keys it changes. Keys are kebab-case and may appear at the top level or
//! under a `[dispatch]` table:
//!
//! ```toml
//! [dispatch]
//! overloads = "first-declared"
//! eager = true
//! ```

use serde::Deserialize;

/// How a delegate with several applicable same-name methods is narrowed to one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverloadPolicy {
	/// Fewest widened positions wins; declaration order breaks ties.
	#[default]
	PreferExact,
	/// The first applicable method in declaration order wins.
	FirstDeclared,
}

/// Per-instance dispatch settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct DispatchConfig {
	pub overloads: OverloadPolicy,
	/// Resolve every required method at construction instead of on first call.
	pub eager: bool,
	/// Reject delegate results whose runtime type does not fit the declared return.
	pub check_returns: bool,
}

impl Default for DispatchConfig {
	fn default() -> Self {
		Self {
			overloads: OverloadPolicy::default(),
			eager: false,
			check_returns: true,
		}
	}
}

/// Errors from loading a [`DispatchConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("invalid dispatch config: {0}")]
	Parse(#[from] toml::de::Error),
	#[error("`dispatch` must be a table")]
	NotATable,
}

impl DispatchConfig {
	/// Parses settings from TOML text.
	pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
		let mut table: toml::Table = toml::from_str(input)?;
		let section = match table.remove("dispatch") {
			Some(toml::Value::Table(section)) => section,
			Some(_) => return Err(ConfigError::NotATable),
			None => table,
		};
		let config: Self = toml::Value::Table(section).try_into()?;
		tracing::debug!(?config, "loaded dispatch config");
		Ok(config)
	}

	pub fn with_overloads(mut self, overloads: OverloadPolicy) -> Self {
		self.overloads = overloads;
		self
	}

	pub fn with_eager(mut self, eager: bool) -> Self {
		self.eager = eager;
		self
	}

	pub fn with_check_returns(mut self, check_returns: bool) -> Self {
		self.check_returns = check_returns;
		self
	}
}
