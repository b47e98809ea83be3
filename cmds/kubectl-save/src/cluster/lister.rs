//! Listing workload objects from the cluster.

use std::future::Future;

use k8s::WorkloadKind;
use kube::{
	api::{ApiResource, DynamicObject, GroupVersionKind, ListParams},
	Api, Client,
};
use tracing::instrument;

/// A source of live workload objects.
///
/// One call lists every object of `kind` in `namespace`, in the order the
/// source returns them. Implementations perform no retries.
pub trait WorkloadLister {
	type Error: std::error::Error + Send + Sync + 'static;

	fn list(
		&self,
		kind: WorkloadKind,
		namespace: &str,
	) -> impl Future<Output = Result<Vec<DynamicObject>, Self::Error>> + Send;
}

/// Lists workloads through the Kubernetes API.
#[derive(Clone)]
pub struct KubeLister {
	client: Client,
}

impl KubeLister {
	pub fn new(client: Client) -> Self {
		Self { client }
	}

	fn api(&self, kind: WorkloadKind, namespace: &str) -> Api<DynamicObject> {
		let info = kind.info();
		let gvk = GroupVersionKind::gvk(info.group, info.version, info.kind);
		let resource = ApiResource::from_gvk_with_plural(&gvk, info.plural);
		Api::namespaced_with(self.client.clone(), namespace, &resource)
	}
}

impl WorkloadLister for KubeLister {
	type Error = kube::Error;

	#[instrument(skip(self))]
	async fn list(
		&self,
		kind: WorkloadKind,
		namespace: &str,
	) -> Result<Vec<DynamicObject>, Self::Error> {
		let list = self.api(kind, namespace).list(&ListParams::default()).await?;
		tracing::debug!(count = list.items.len(), "listed workloads");
		Ok(list.items)
	}
}
