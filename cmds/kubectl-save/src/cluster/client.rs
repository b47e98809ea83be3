//! Kubernetes cluster connection management.

use std::time::Duration;

use k8s_openapi::apimachinery::pkg::version::Info;
use kube::{
	config::{KubeConfigOptions, Kubeconfig, KubeconfigError},
	Client, Config,
};
use thiserror::Error;
use tracing::instrument;

/// Default timeout for Kubernetes API requests.
const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur when connecting to a Kubernetes cluster.
#[derive(Debug, Error)]
pub enum ConnectionError {
	#[error("no context named `{0}` was found. Please check your $KUBECONFIG")]
	ContextNotFound(String),

	#[error("no current context is set and --context was not given. Please check your $KUBECONFIG")]
	NoCurrentContext,

	#[error(transparent)]
	Kubeconfig(#[from] KubeconfigError),

	#[error(transparent)]
	Kube(#[from] kube::Error),
}

/// Represents a connection to a Kubernetes cluster.
#[derive(Clone)]
pub struct ClusterConnection {
	client: Client,
	server_version: Info,
	context: String,
}

impl std::fmt::Debug for ClusterConnection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ClusterConnection")
			.field("context", &self.context)
			.field("server_version", &self.server_version)
			.finish_non_exhaustive()
	}
}

impl ClusterConnection {
	/// Connect using the user's kubeconfig (`$KUBECONFIG` or `~/.kube/config`).
	///
	/// Uses `context` when given, the kubeconfig's current context otherwise.
	#[instrument(skip_all)]
	pub async fn connect(context: Option<&str>) -> Result<Self, ConnectionError> {
		let kubeconfig = Kubeconfig::read()?;
		Self::from_kubeconfig(kubeconfig, context).await
	}

	/// Connect using a provided kubeconfig.
	#[instrument(skip(kubeconfig))]
	pub async fn from_kubeconfig(
		kubeconfig: Kubeconfig,
		context: Option<&str>,
	) -> Result<Self, ConnectionError> {
		let context = resolve_context(&kubeconfig, context)?;
		tracing::debug!(context = %context, "using kubeconfig context");

		let mut config = Config::from_custom_kubeconfig(
			kubeconfig,
			&KubeConfigOptions {
				context: Some(context.clone()),
				..Default::default()
			},
		)
		.await?;

		config.read_timeout = Some(DEFAULT_API_TIMEOUT);
		let client = Client::try_from(config)?;

		// Probe the server so bad credentials fail before any output is produced
		let server_version = client.apiserver_version().await?;

		Ok(Self {
			client,
			server_version,
			context,
		})
	}

	/// Get a reference to the underlying kube client.
	pub fn client(&self) -> &Client {
		&self.client
	}

	/// Get the server version.
	pub fn server_version(&self) -> &Info {
		&self.server_version
	}

	/// Get the default namespace from the current context.
	pub fn default_namespace(&self) -> &str {
		self.client.default_namespace()
	}

	/// Name of the kubeconfig context in use.
	pub fn context(&self) -> &str {
		&self.context
	}
}

/// Pick the context to connect with: the requested one if it exists, else the current one.
fn resolve_context(
	kubeconfig: &Kubeconfig,
	requested: Option<&str>,
) -> Result<String, ConnectionError> {
	match requested {
		Some(name) => {
			if kubeconfig.contexts.iter().any(|c| c.name == name) {
				Ok(name.to_string())
			} else {
				Err(ConnectionError::ContextNotFound(name.to_string()))
			}
		}
		None => kubeconfig
			.current_context
			.clone()
			.filter(|name| !name.is_empty())
			.ok_or(ConnectionError::NoCurrentContext),
	}
}
