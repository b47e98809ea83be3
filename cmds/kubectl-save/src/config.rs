//! Optional per-project defaults.
//!
//! A `.kubectl-save.yaml` file in the working directory or any of its parents
//! supplies defaults for flags that were not given on the command line:
//!
//! ```yaml
//! namespace: controller
//! context: prod-eu
//! neat:
//!   dropAnnotations:
//!     - meta.helm.sh/
//!   dropLabels:
//!     - app.kubernetes.io/managed-by
//! ```

use std::{
	fs,
	path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use k8s::NeatOptions;
use serde::Deserialize;

/// The name of the config file kubectl-save looks for.
pub const CONFIG_FILE_NAME: &str = ".kubectl-save.yaml";

/// Namespace used when neither the flag nor the config file names one.
pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SaverConfig {
	pub namespace: Option<String>,

	/// Kubeconfig context to use instead of the current one.
	pub context: Option<String>,

	#[serde(default)]
	pub neat: NeatConfig,
}

/// Extra fields to strip from exported documents.
///
/// Entries ending in `/` match a whole key prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NeatConfig {
	#[serde(default)]
	pub drop_annotations: Vec<String>,
	#[serde(default)]
	pub drop_labels: Vec<String>,
}

impl From<NeatConfig> for NeatOptions {
	fn from(config: NeatConfig) -> Self {
		NeatOptions {
			drop_annotations: config.drop_annotations,
			drop_labels: config.drop_labels,
		}
	}
}

impl SaverConfig {
	/// Load config by searching from the given directory upward.
	pub fn load_from_directory(start_dir: &Path) -> Result<Option<Self>> {
		match find_config_file(start_dir) {
			Some(path) => Self::load_from_file(&path).map(Some),
			None => Ok(None),
		}
	}

	pub fn load_from_file(path: &Path) -> Result<Self> {
		let content = fs::read_to_string(path)
			.with_context(|| format!("failed to read config file: {}", path.display()))?;
		// An empty file is a valid, empty config.
		if content.trim().is_empty() {
			return Ok(Self::default());
		}
		serde_yaml_with_quirks::from_str(&content)
			.with_context(|| format!("failed to parse config file: {}", path.display()))
	}

	/// The namespace to export from: the flag, then the config file, then `default`.
	pub fn namespace<'a>(&'a self, flag: Option<&'a str>) -> &'a str {
		flag.or(self.namespace.as_deref())
			.unwrap_or(DEFAULT_NAMESPACE)
	}

	/// The kubeconfig context to use, if any was requested.
	pub fn context<'a>(&'a self, flag: Option<&'a str>) -> Option<&'a str> {
		flag.or(self.context.as_deref())
	}
}

/// Search for a config file starting from `start_dir` and walking up to the filesystem root.
pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
	let start = start_dir
		.canonicalize()
		.unwrap_or_else(|_| start_dir.to_path_buf());

	start
		.ancestors()
		.map(|dir| dir.join(CONFIG_FILE_NAME))
		.find(|candidate| candidate.is_file())
}
