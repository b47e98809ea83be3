//! Turning a live workload object into a portable document.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::{CleanError, FieldCleaner, IdentityHints, WorkloadKind};

/// Errors that can occur while normalizing an object.
#[derive(Debug, Error)]
pub enum NormalizeError {
	#[error("converting object to a structured document")]
	Conversion(#[source] serde_json::Error),

	#[error("structured document is not a mapping")]
	NotAnObject,

	#[error("removing cluster-managed fields")]
	Clean(#[source] CleanError),
}

/// Convert `object` to a generic document and normalize it as `kind`.
pub fn normalize<T, C>(object: &T, kind: WorkloadKind, cleaner: &C) -> Result<Value, NormalizeError>
where
	T: Serialize + ?Sized,
	C: FieldCleaner + ?Sized,
{
	let document = serde_json::to_value(object).map_err(NormalizeError::Conversion)?;
	normalize_value(document, kind, cleaner)
}

/// Normalize an already structured document.
///
/// `apiVersion` and `kind` are forced to the values of `kind`, since list
/// responses usually omit them on items, and the cleaner is then asked to
/// strip cluster-managed fields. Normalizing the output again yields the
/// same document.
pub fn normalize_value<C>(
	mut document: Value,
	kind: WorkloadKind,
	cleaner: &C,
) -> Result<Value, NormalizeError>
where
	C: FieldCleaner + ?Sized,
{
	stamp_identity(&mut document, kind)?;
	let hints = IdentityHints::from_document(&document, kind);

	let mut cleaned = cleaner
		.clean(document, &hints)
		.map_err(NormalizeError::Clean)?;

	// The cleaner is not trusted to keep identity intact.
	stamp_identity(&mut cleaned, kind)?;
	Ok(cleaned)
}

fn stamp_identity(document: &mut Value, kind: WorkloadKind) -> Result<(), NormalizeError> {
	let map = document.as_object_mut().ok_or(NormalizeError::NotAnObject)?;
	map.insert(
		"apiVersion".to_string(),
		Value::String(kind.api_version().to_string()),
	);
	map.insert("kind".to_string(), Value::String(kind.kind().to_string()));
	Ok(())
}
