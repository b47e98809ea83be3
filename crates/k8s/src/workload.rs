//! Supported workload kinds and their API coordinates.

use std::{fmt, str::FromStr};

use phf::phf_map;
use thiserror::Error;

/// A workload kind that can be exported.
///
/// This is a closed set: everything the exporter needs to know about a kind
/// (its API group, version and plural resource name) lives in the
/// [`WorkloadInfo`] record returned by [`WorkloadKind::info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkloadKind {
	Deployment,
	DaemonSet,
	StatefulSet,
}

/// Fixed API coordinates of a [`WorkloadKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkloadInfo {
	/// API group (`apps`).
	pub group: &'static str,
	/// API version within the group (`v1`).
	pub version: &'static str,
	/// Full `apiVersion` value stamped on exported documents.
	pub api_version: &'static str,
	/// `kind` value stamped on exported documents.
	pub kind: &'static str,
	/// Plural resource name used in API paths.
	pub plural: &'static str,
	/// Name accepted on the command line.
	pub arg: &'static str,
}

const DEPLOYMENT: WorkloadInfo = WorkloadInfo {
	group: "apps",
	version: "v1",
	api_version: "apps/v1",
	kind: "Deployment",
	plural: "deployments",
	arg: "deployment",
};

const DAEMON_SET: WorkloadInfo = WorkloadInfo {
	group: "apps",
	version: "v1",
	api_version: "apps/v1",
	kind: "DaemonSet",
	plural: "daemonsets",
	arg: "daemonset",
};

const STATEFUL_SET: WorkloadInfo = WorkloadInfo {
	group: "apps",
	version: "v1",
	api_version: "apps/v1",
	kind: "StatefulSet",
	plural: "statefulsets",
	arg: "statefulset",
};

/// Lowercased spellings accepted for each kind, including kubectl short names.
static ALIASES: phf::Map<&'static str, WorkloadKind> = phf_map! {
	"deployment" => WorkloadKind::Deployment,
	"deployments" => WorkloadKind::Deployment,
	"deploy" => WorkloadKind::Deployment,
	"daemonset" => WorkloadKind::DaemonSet,
	"daemonsets" => WorkloadKind::DaemonSet,
	"ds" => WorkloadKind::DaemonSet,
	"statefulset" => WorkloadKind::StatefulSet,
	"statefulsets" => WorkloadKind::StatefulSet,
	"sts" => WorkloadKind::StatefulSet,
};

/// The requested workload kind is not one of the supported kinds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid workload type: {0} (expected one of: deployment, daemonset, statefulset)")]
pub struct InvalidWorkload(pub String);

impl WorkloadKind {
	pub const ALL: [WorkloadKind; 3] = [
		WorkloadKind::Deployment,
		WorkloadKind::DaemonSet,
		WorkloadKind::StatefulSet,
	];

	pub const fn info(self) -> &'static WorkloadInfo {
		match self {
			WorkloadKind::Deployment => &DEPLOYMENT,
			WorkloadKind::DaemonSet => &DAEMON_SET,
			WorkloadKind::StatefulSet => &STATEFUL_SET,
		}
	}

	pub const fn api_version(self) -> &'static str {
		self.info().api_version
	}

	pub const fn kind(self) -> &'static str {
		self.info().kind
	}

	pub const fn plural(self) -> &'static str {
		self.info().plural
	}
}

impl FromStr for WorkloadKind {
	type Err = InvalidWorkload;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		ALIASES
			.get(s.trim().to_ascii_lowercase().as_str())
			.copied()
			.ok_or_else(|| InvalidWorkload(s.to_string()))
	}
}

impl fmt::Display for WorkloadKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.info().arg)
	}
}
