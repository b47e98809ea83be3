//! HTTP-based mock Kubernetes server using wiremock.
//!
//! Serves the version endpoint and namespaced list endpoints for the
//! `apps/v1` workload kinds, backed by a fixed set of manifests.

use std::sync::Arc;

use bon::Builder;
use k8s::WorkloadKind;
use kube::config::{
	AuthInfo, Cluster, Context, Kubeconfig, NamedAuthInfo, NamedCluster, NamedContext,
};
use tracing::{debug, trace};
use wiremock::{
	matchers::{method, path, path_regex},
	Mock, MockServer, Request, ResponseTemplate,
};

/// A failure the mock server injects into every list request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
	/// 401, as returned for expired or missing credentials.
	Unauthorized,
	/// 403, as returned when RBAC denies the list verb.
	Forbidden,
	/// 500 from the API server itself.
	InternalError,
}

impl MockFailure {
	fn response(self) -> ResponseTemplate {
		let (code, reason, message) = match self {
			MockFailure::Unauthorized => (401, "Unauthorized", "Unauthorized"),
			MockFailure::Forbidden => (
				403,
				"Forbidden",
				"workloads are forbidden: User \"mock-user\" cannot list resource",
			),
			MockFailure::InternalError => (500, "InternalError", "etcdserver: request timed out"),
		};
		ResponseTemplate::new(code).set_body_json(serde_json::json!({
			"kind": "Status",
			"apiVersion": "v1",
			"metadata": {},
			"status": "Failure",
			"message": message,
			"reason": reason,
			"code": code
		}))
	}
}

/// A mock Kubernetes server exposed over HTTP.
#[derive(Builder)]
pub struct HttpMockK8sServer {
	/// Workload manifests to serve, in listing order. Each needs `apiVersion`,
	/// `kind` and `metadata.name`; the namespace defaults to `default`.
	#[builder(default)]
	resources: Vec<serde_json::Value>,
	/// Strip `apiVersion`/`kind` from list items, like a real API server does.
	#[builder(default = true)]
	omit_item_types: bool,
	/// Answer every list request with this failure.
	failure: Option<MockFailure>,
}

/// A running HTTP mock server instance.
pub struct RunningHttpMockK8sServer {
	server: MockServer,
}

/// A manifest together with the collection path it is listed under.
struct StoredResource {
	collection: String,
	manifest: serde_json::Value,
}

impl HttpMockK8sServer {
	/// Start the mock server with all configured resources.
	pub async fn start(self) -> RunningHttpMockK8sServer {
		let server = MockServer::start().await;

		debug!(uri = %server.uri(), "Started mock K8s server");

		let stored: Vec<StoredResource> = self
			.resources
			.into_iter()
			.filter_map(|manifest| {
				let collection = collection_path_for_manifest(&manifest)?;
				trace!(collection = %collection, "Registered resource");
				Some(StoredResource {
					collection,
					manifest,
				})
			})
			.collect();

		mount_version(&server).await;
		mount_lists(
			&server,
			Arc::new(stored),
			self.omit_item_types,
			self.failure,
		)
		.await;

		RunningHttpMockK8sServer { server }
	}
}

/// Derive the namespaced list path for a workload manifest.
fn collection_path_for_manifest(manifest: &serde_json::Value) -> Option<String> {
	let api_version = manifest.get("apiVersion")?.as_str()?;
	let kind: WorkloadKind = manifest.get("kind")?.as_str()?.parse().ok()?;
	if api_version != kind.api_version() {
		return None;
	}
	let namespace = manifest
		.pointer("/metadata/namespace")
		.and_then(|n| n.as_str())
		.unwrap_or("default");

	Some(format!(
		"/apis/{}/namespaces/{}/{}",
		kind.api_version(),
		namespace,
		kind.plural()
	))
}

impl RunningHttpMockK8sServer {
	/// Get the server's URI (e.g., "http://127.0.0.1:12345").
	pub fn uri(&self) -> String {
		self.server.uri()
	}

	/// Create a Kubeconfig pointing to this mock server.
	pub fn kubeconfig(&self) -> Kubeconfig {
		self.kubeconfig_with_context("mock-context")
	}

	/// Create a Kubeconfig pointing to this mock server with a custom context name.
	pub fn kubeconfig_with_context(&self, context_name: &str) -> Kubeconfig {
		let cluster_name = "mock-cluster";
		let user_name = "mock-user";

		Kubeconfig {
			clusters: vec![NamedCluster {
				name: cluster_name.to_string(),
				cluster: Some(Cluster {
					server: Some(self.uri()),
					insecure_skip_tls_verify: Some(true),
					..Default::default()
				}),
			}],
			contexts: vec![NamedContext {
				name: context_name.to_string(),
				context: Some(Context {
					cluster: cluster_name.to_string(),
					user: Some(user_name.to_string()),
					namespace: Some("default".to_string()),
					..Default::default()
				}),
			}],
			auth_infos: vec![NamedAuthInfo {
				name: user_name.to_string(),
				auth_info: Some(AuthInfo::default()),
			}],
			current_context: Some(context_name.to_string()),
			..Default::default()
		}
	}

	/// Paths of every request the server has received so far.
	pub async fn received_paths(&self) -> Vec<String> {
		self.server
			.received_requests()
			.await
			.unwrap_or_default()
			.iter()
			.map(|request| request.url.path().to_string())
			.collect()
	}
}

async fn mount_version(server: &MockServer) {
	Mock::given(method("GET"))
		.and(path("/version"))
		.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
			"major": "1",
			"minor": "31",
			"gitVersion": "v1.31.0",
			"gitCommit": "fake",
			"gitTreeState": "clean",
			"buildDate": "2024-08-13T00:00:00Z",
			"goVersion": "go1.22.5",
			"compiler": "gc",
			"platform": "linux/amd64"
		})))
		.mount(server)
		.await;
}

async fn mount_lists(
	server: &MockServer,
	resources: Arc<Vec<StoredResource>>,
	omit_item_types: bool,
	failure: Option<MockFailure>,
) {
	Mock::given(method("GET"))
		.and(path_regex(r"^/apis/apps/v1/namespaces/[^/]+/[^/]+$"))
		.respond_with(move |req: &Request| {
			if let Some(failure) = failure {
				return failure.response();
			}

			let collection = req.url.path();
			let items: Vec<_> = resources
				.iter()
				.filter(|r| r.collection == collection)
				.map(|r| {
					let mut item = r.manifest.clone();
					if omit_item_types {
						if let Some(map) = item.as_object_mut() {
							map.remove("apiVersion");
							map.remove("kind");
						}
					}
					item
				})
				.collect();

			// A namespace that does not exist lists as empty, like the real API.
			ResponseTemplate::new(200).set_body_json(serde_json::json!({
				"kind": list_kind(collection),
				"apiVersion": "apps/v1",
				"metadata": {"resourceVersion": "1"},
				"items": items
			}))
		})
		.mount(server)
		.await;
}

/// `DeploymentList` for `/apis/apps/v1/namespaces/x/deployments`.
fn list_kind(collection: &str) -> String {
	collection
		.rsplit('/')
		.next()
		.and_then(|plural| plural.parse::<WorkloadKind>().ok())
		.map(|kind| format!("{}List", kind.kind()))
		.unwrap_or_else(|| "List".to_string())
}
