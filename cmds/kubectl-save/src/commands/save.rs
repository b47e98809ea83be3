//! The `kubectl save <WORKLOAD>` command.

use std::{error::Error, io::Write, path::PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use k8s::NeatCleaner;
use tracing::{info, instrument, Level};

use crate::{
	cluster::{client::ClusterConnection, lister::KubeLister},
	config::SaverConfig,
	pipeline::{self, ExportError, ExportReport, ExportRequest},
};

#[derive(Args, Debug)]
pub struct SaveArgs {
	/// Kind of workload to export: deployment, daemonset or statefulset
	#[arg(value_name = "WORKLOAD")]
	pub workload: String,

	/// Namespace to export from [default: from .kubectl-save.yaml, else "default"]
	#[arg(short, long)]
	pub namespace: Option<String>,

	/// Also write the documents to this file
	#[arg(short, long, value_name = "PATH")]
	pub output: Option<PathBuf>,

	/// Kubeconfig context to use instead of the current one
	#[arg(long)]
	pub context: Option<String>,

	/// Log level (trace, debug, info, warn, error) [default: $RUST_LOG, else info]
	#[arg(long)]
	pub log_level: Option<Level>,
}

pub fn run<W: Write>(args: SaveArgs, writer: W) -> Result<()> {
	let cwd = std::env::current_dir().context("determining current directory")?;
	let config = SaverConfig::load_from_directory(&cwd)?.unwrap_or_default();

	// Validated here so a bad kind never reaches the cluster.
	let request = ExportRequest::new(
		&args.workload,
		config.namespace(args.namespace.as_deref()),
		args.output.clone(),
	)?;
	let context = config.context(args.context.as_deref()).map(str::to_string);
	let cleaner = NeatCleaner::new(config.neat.into());

	let runtime = tokio::runtime::Builder::new_current_thread()
		.enable_all()
		.build()
		.context("creating tokio runtime")?;

	runtime.block_on(async {
		let connection = ClusterConnection::connect(context.as_deref())
			.await
			.context("connecting to cluster")?;
		save(request, &connection, &cleaner, writer).await?;
		Ok(())
	})
}

/// Export with an established connection and report the outcome.
///
/// Skipped objects are summarized on stderr but do not fail the command.
#[instrument(skip_all, fields(kind = %request.kind, namespace = %request.namespace))]
pub async fn save<W: Write>(
	request: ExportRequest,
	connection: &ClusterConnection,
	cleaner: &NeatCleaner,
	writer: W,
) -> Result<ExportReport> {
	info!(
		context = connection.context(),
		server = %connection.server_version().git_version,
		"connected to cluster"
	);
	let lister = KubeLister::new(connection.client().clone());

	match pipeline::export(request, &lister, cleaner, writer).await {
		Ok(report) => {
			log_report(&report);
			Ok(report)
		}
		Err(ExportError::SinkWriteFailed { failures, report }) => {
			log_report(&report);
			let details: Vec<String> = failures
				.iter()
				.map(|failure| error_chain(failure))
				.collect();
			bail!(
				"{} output(s) could not be fully written:\n  {}",
				failures.len(),
				details.join("\n  ")
			)
		}
		Err(e) => Err(e).context("exporting workloads"),
	}
}

fn log_report(report: &ExportReport) {
	match &report.output {
		Some(path) => info!(
			exported = report.exported,
			path = %path.display(),
			"saved workloads"
		),
		None => info!(exported = report.exported, "exported workloads"),
	}
	if let Some(summary) = skipped_summary(report) {
		eprintln!("{summary}");
	}
}

/// Human readable list of the objects left out of an export, if any.
pub fn skipped_summary(report: &ExportReport) -> Option<String> {
	if report.skipped.is_empty() {
		return None;
	}

	let mut summary = format!(
		"warning: skipped {} of {} {} in namespace {}:",
		report.skipped.len(),
		report.listed,
		report.kind.plural(),
		report.namespace
	);
	for item in &report.skipped {
		summary.push_str("\n  ");
		summary.push_str(&error_chain(item));
	}
	Some(summary)
}

/// `error: cause: root cause`
fn error_chain(err: &dyn Error) -> String {
	std::iter::successors(Some(err), |&e| e.source())
		.map(ToString::to_string)
		.collect::<Vec<_>>()
		.join(": ")
}

#[cfg(test)]
mod tests {
	use k8s::{CleanError, IdentityHints, NormalizeError, WorkloadKind};

	use super::*;
	use crate::pipeline::ItemError;

	fn report(skipped: Vec<ItemError>) -> ExportReport {
		ExportReport {
			kind: WorkloadKind::Deployment,
			namespace: "prod".to_string(),
			listed: 3,
			exported: 3 - skipped.len(),
			skipped,
			output: None,
		}
	}

	#[test]
	fn test_no_summary_without_skips() {
		assert_eq!(skipped_summary(&report(Vec::new())), None);
	}

	#[test]
	fn test_summary_lists_skipped_objects() {
		let identity = IdentityHints {
			kind: WorkloadKind::Deployment,
			name: Some("broken".to_string()),
			namespace: Some("prod".to_string()),
		};
		let skipped = vec![ItemError::NormalizationFailed {
			identity: identity.clone(),
			source: NormalizeError::Clean(CleanError::MetadataNotAnObject(identity)),
		}];

		let summary = skipped_summary(&report(skipped)).unwrap();

		assert_eq!(
			summary,
			"warning: skipped 1 of 3 deployments in namespace prod:\n  \
			 normalizing Deployment prod/broken: removing cluster-managed fields: \
			 Deployment prod/broken: metadata is not a mapping"
		);
	}
}
