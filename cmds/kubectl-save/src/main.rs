use anyhow::Result;
use clap::Parser;
use saver::commands::{self, save::SaveArgs, util::BrokenPipeGuard};

#[cfg(all(
	target_os = "linux",
	feature = "mimalloc",
	not(feature = "system-alloc")
))]
#[global_allocator]
static GLOBAL: mimallocator::Mimalloc = mimallocator::Mimalloc;

#[derive(Parser)]
#[command(name = "kubectl-save")]
#[command(about = "Export Deployments, DaemonSets and StatefulSets as clean YAML", long_about = None)]
#[command(version = env!("SAVER_VERSION"))]
struct Cli {
	#[command(flatten)]
	args: SaveArgs,
}

fn main() -> Result<()> {
	let cli = Cli::parse();

	let _telemetry = saver::telemetry::init(cli.args.log_level)?;

	let stdout = BrokenPipeGuard::new(std::io::stdout());
	commands::save::run(cli.args, stdout)
}

#[cfg(test)]
mod tests {
	use clap::CommandFactory;

	use super::*;

	#[test]
	fn test_cli_is_well_formed() {
		Cli::command().debug_assert();
	}

	#[test]
	fn test_parse_flags() {
		let cli = Cli::try_parse_from([
			"kubectl-save",
			"deployment",
			"-n",
			"controller",
			"-o",
			"controller-deployments.yaml",
			"--context",
			"prod",
			"--log-level",
			"debug",
		])
		.unwrap();

		assert_eq!(cli.args.workload, "deployment");
		assert_eq!(cli.args.namespace.as_deref(), Some("controller"));
		assert_eq!(
			cli.args.output.as_deref(),
			Some(std::path::Path::new("controller-deployments.yaml"))
		);
		assert_eq!(cli.args.context.as_deref(), Some("prod"));
		assert_eq!(cli.args.log_level, Some(tracing::Level::DEBUG));
	}

	#[test]
	fn test_workload_is_required() {
		let err = Cli::try_parse_from(["kubectl-save"]).err().unwrap();
		assert_eq!(
			err.kind(),
			clap::error::ErrorKind::MissingRequiredArgument
		);
	}
}
