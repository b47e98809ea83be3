//! Removal of server-populated fields from workload documents.
//!
//! Objects read back from the API server carry a lot of state that only makes
//! sense inside the cluster they came from. [`NeatCleaner`] strips it so the
//! exported document can be re-applied elsewhere.

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::WorkloadKind;

/// Metadata fields assigned by the API server.
const SERVER_METADATA_FIELDS: &[&str] = &[
	"managedFields",
	"resourceVersion",
	"uid",
	"generation",
	"creationTimestamp",
	"selfLink",
	"deletionTimestamp",
	"deletionGracePeriodSeconds",
];

/// Annotations written by kubectl and the workload controllers.
const SERVER_ANNOTATIONS: &[&str] = &[
	"kubectl.kubernetes.io/last-applied-configuration",
	"deployment.kubernetes.io/revision",
];

/// Identity of the document handed to a [`FieldCleaner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityHints {
	pub kind: WorkloadKind,
	pub name: Option<String>,
	pub namespace: Option<String>,
}

impl IdentityHints {
	/// Read the identity of `document`, which is expected to be of `kind`.
	pub fn from_document(document: &Value, kind: WorkloadKind) -> Self {
		let field = |pointer: &str| {
			document
				.pointer(pointer)
				.and_then(Value::as_str)
				.map(str::to_string)
		};
		Self {
			kind,
			name: field("/metadata/name"),
			namespace: field("/metadata/namespace"),
		}
	}

	pub fn api_version(&self) -> &'static str {
		self.kind.api_version()
	}
}

impl fmt::Display for IdentityHints {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.kind.kind())?;
		if let Some(namespace) = &self.namespace {
			write!(f, " {namespace}/")?;
		} else {
			f.write_str(" ")?;
		}
		f.write_str(self.name.as_deref().unwrap_or("<unnamed>"))
	}
}

/// Errors reported by a [`FieldCleaner`].
#[derive(Debug, Error)]
pub enum CleanError {
	#[error("{0}: document is not a mapping")]
	NotAnObject(IdentityHints),

	#[error("{0}: metadata is not a mapping")]
	MetadataNotAnObject(IdentityHints),
}

/// Strips non-portable fields from an identity-stamped document.
pub trait FieldCleaner {
	fn clean(&self, document: Value, hints: &IdentityHints) -> Result<Value, CleanError>;
}

/// Extra keys to drop on top of the built-in set.
///
/// An entry ending in `/` matches every key with that prefix, so
/// `meta.helm.sh/` drops all Helm release annotations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NeatOptions {
	pub drop_annotations: Vec<String>,
	pub drop_labels: Vec<String>,
}

/// Default [`FieldCleaner`], modeled on what `kubectl neat` removes from workloads.
#[derive(Debug, Clone, Default)]
pub struct NeatCleaner {
	options: NeatOptions,
}

impl NeatCleaner {
	pub fn new(options: NeatOptions) -> Self {
		Self { options }
	}

	fn neat_metadata(&self, metadata: &mut Map<String, Value>) {
		for field in SERVER_METADATA_FIELDS {
			metadata.remove(*field);
		}

		prune_string_map(metadata, "annotations", |key| {
			SERVER_ANNOTATIONS.contains(&key) || matches_any(&self.options.drop_annotations, key)
		});
		prune_string_map(metadata, "labels", |key| {
			matches_any(&self.options.drop_labels, key)
		});
	}
}

impl FieldCleaner for NeatCleaner {
	fn clean(&self, document: Value, hints: &IdentityHints) -> Result<Value, CleanError> {
		let Value::Object(mut root) = document else {
			return Err(CleanError::NotAnObject(hints.clone()));
		};

		root.remove("status");

		match root.get_mut("metadata") {
			Some(Value::Object(metadata)) => self.neat_metadata(metadata),
			Some(Value::Null) | None => {}
			Some(_) => return Err(CleanError::MetadataNotAnObject(hints.clone())),
		}

		// Pod templates always serialize a null creationTimestamp.
		if let Some(template_metadata) = root
			.get_mut("spec")
			.and_then(|spec| spec.get_mut("template"))
			.and_then(|template| template.get_mut("metadata"))
			.and_then(Value::as_object_mut)
		{
			template_metadata.remove("creationTimestamp");
		}

		let mut document = Value::Object(root);
		drop_nulls(&mut document);
		Ok(document)
	}
}

fn matches_any(patterns: &[String], key: &str) -> bool {
	patterns.iter().any(|pattern| {
		pattern == key || (pattern.ends_with('/') && key.starts_with(pattern.as_str()))
	})
}

/// Remove entries of `metadata[field]` matching `drop`, and the map itself once empty.
fn prune_string_map(metadata: &mut Map<String, Value>, field: &str, drop: impl Fn(&str) -> bool) {
	let Some(Value::Object(entries)) = metadata.get_mut(field) else {
		return;
	};
	entries.retain(|key, _| !drop(key));
	if entries.is_empty() {
		metadata.remove(field);
	}
}

/// Remove null mapping values recursively. Empty mappings are kept: `emptyDir: {}` is meaningful.
fn drop_nulls(value: &mut Value) {
	match value {
		Value::Object(map) => {
			map.retain(|_, v| !v.is_null());
			map.values_mut().for_each(drop_nulls);
		}
		Value::Array(items) => items.iter_mut().for_each(drop_nulls),
		_ => {}
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn hints() -> IdentityHints {
		IdentityHints {
			kind: WorkloadKind::Deployment,
			name: Some("web".to_string()),
			namespace: Some("default".to_string()),
		}
	}

	fn live_deployment() -> Value {
		json!({
			"apiVersion": "apps/v1",
			"kind": "Deployment",
			"metadata": {
				"name": "web",
				"namespace": "default",
				"uid": "0b7c6d1e",
				"resourceVersion": "4411",
				"generation": 3,
				"creationTimestamp": "2024-01-01T00:00:00Z",
				"managedFields": [{"manager": "kubectl-client-side-apply"}],
				"annotations": {
					"deployment.kubernetes.io/revision": "3",
					"kubectl.kubernetes.io/last-applied-configuration": "{}"
				},
				"labels": {"app": "web"}
			},
			"spec": {
				"replicas": 2,
				"template": {
					"metadata": {"creationTimestamp": null, "labels": {"app": "web"}},
					"spec": {
						"containers": [{"name": "web", "image": "nginx:1.25"}],
						"volumes": [{"name": "scratch", "emptyDir": {}}]
					}
				}
			},
			"status": {"replicas": 2, "readyReplicas": 2}
		})
	}

	#[test]
	fn test_clean_live_deployment() {
		let cleaned = NeatCleaner::default()
			.clean(live_deployment(), &hints())
			.unwrap();

		assert_eq!(
			cleaned,
			json!({
				"apiVersion": "apps/v1",
				"kind": "Deployment",
				"metadata": {
					"name": "web",
					"namespace": "default",
					"labels": {"app": "web"}
				},
				"spec": {
					"replicas": 2,
					"template": {
						"metadata": {"labels": {"app": "web"}},
						"spec": {
							"containers": [{"name": "web", "image": "nginx:1.25"}],
							"volumes": [{"name": "scratch", "emptyDir": {}}]
						}
					}
				}
			})
		);
	}

	#[test]
	fn test_clean_keeps_user_annotations() {
		let mut doc = live_deployment();
		doc["metadata"]["annotations"]["team"] = json!("payments");

		let cleaned = NeatCleaner::default().clean(doc, &hints()).unwrap();

		assert_eq!(
			cleaned.pointer("/metadata/annotations"),
			Some(&json!({"team": "payments"}))
		);
	}

	#[test]
	fn test_clean_configured_prefixes() {
		let mut doc = live_deployment();
		doc["metadata"]["annotations"]["meta.helm.sh/release-name"] = json!("web");
		doc["metadata"]["annotations"]["meta.helm.sh/release-namespace"] = json!("default");
		doc["metadata"]["labels"]["helm.sh/chart"] = json!("web-1.0.0");

		let cleaner = NeatCleaner::new(NeatOptions {
			drop_annotations: vec!["meta.helm.sh/".to_string()],
			drop_labels: vec!["helm.sh/chart".to_string()],
		});
		let cleaned = cleaner.clean(doc, &hints()).unwrap();

		assert!(cleaned.pointer("/metadata/annotations").is_none());
		assert_eq!(
			cleaned.pointer("/metadata/labels"),
			Some(&json!({"app": "web"}))
		);
	}

	#[test]
	fn test_clean_is_idempotent() {
		let cleaner = NeatCleaner::default();
		let once = cleaner.clean(live_deployment(), &hints()).unwrap();
		let twice = cleaner.clean(once.clone(), &hints()).unwrap();
		assert_eq!(once, twice);
	}

	#[test]
	fn test_clean_rejects_non_mapping() {
		let err = NeatCleaner::default()
			.clean(json!(["not", "a", "workload"]), &hints())
			.unwrap_err();
		assert!(matches!(err, CleanError::NotAnObject(_)));
		assert_eq!(err.to_string(), "Deployment default/web: document is not a mapping");
	}

	#[test]
	fn test_clean_rejects_scalar_metadata() {
		let err = NeatCleaner::default()
			.clean(json!({"metadata": "web"}), &hints())
			.unwrap_err();
		assert!(matches!(err, CleanError::MetadataNotAnObject(_)));
	}

	#[test]
	fn test_identity_hints_from_document() {
		let hints = IdentityHints::from_document(&live_deployment(), WorkloadKind::Deployment);
		assert_eq!(hints.name.as_deref(), Some("web"));
		assert_eq!(hints.namespace.as_deref(), Some("default"));
		assert_eq!(hints.api_version(), "apps/v1");

		let unnamed = IdentityHints::from_document(&json!({}), WorkloadKind::StatefulSet);
		assert_eq!(unnamed.to_string(), "StatefulSet <unnamed>");
	}
}
