//! The export pipeline: list, normalize, serialize, emit.
//!
//! One call to [`export`] handles one `(kind, namespace)` request. Listing is
//! all-or-nothing: if it fails nothing is written anywhere and no output file
//! is created. After a successful listing every object is processed in
//! listing order; an object that cannot be normalized or serialized is
//! skipped and recorded in the [`ExportReport`]. Every produced document goes
//! to every sink that is still healthy, and a sink that fails is dropped
//! without affecting the others.

use std::{
	io::{self, Write},
	path::{Path, PathBuf},
};

use k8s::{normalize, FieldCleaner, IdentityHints, InvalidWorkload, NormalizeError, WorkloadKind};
use kube::api::DynamicObject;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::{
	cluster::lister::WorkloadLister,
	sink::{DocumentSink, FileSink, SinkError, StreamSink},
	yaml::{to_canonical, CanonicalText},
};

/// What to export and where to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
	pub kind: WorkloadKind,
	pub namespace: String,
	/// Also write the documents to this file.
	pub output: Option<PathBuf>,
}

impl ExportRequest {
	/// Build a request, rejecting unsupported kinds before anything touches the network.
	pub fn new(
		kind: &str,
		namespace: impl Into<String>,
		output: Option<PathBuf>,
	) -> Result<Self, ExportError> {
		Ok(Self {
			kind: kind.parse()?,
			namespace: namespace.into(),
			output,
		})
	}
}

/// Errors that end an export.
#[derive(Debug, Error)]
pub enum ExportError {
	#[error(transparent)]
	InvalidWorkload(#[from] InvalidWorkload),

	#[error("failed to list {plural} in namespace {namespace}", plural = .kind.plural())]
	ListingFailed {
		kind: WorkloadKind,
		namespace: String,
		#[source]
		source: Box<dyn std::error::Error + Send + Sync>,
	},

	/// At least one sink failed. The report describes what was produced.
	#[error("{} output(s) could not be fully written", .failures.len())]
	SinkWriteFailed {
		failures: Vec<SinkError>,
		report: Box<ExportReport>,
	},
}

/// Why a single listed object was left out of the export.
#[derive(Debug, Error)]
pub enum ItemError {
	#[error("normalizing {identity}")]
	NormalizationFailed {
		identity: IdentityHints,
		#[source]
		source: NormalizeError,
	},

	#[error("serializing {identity}")]
	SerializationFailed {
		identity: IdentityHints,
		#[source]
		source: serde_saphyr::ser_error::Error,
	},
}

impl ItemError {
	pub fn identity(&self) -> &IdentityHints {
		match self {
			ItemError::NormalizationFailed { identity, .. }
			| ItemError::SerializationFailed { identity, .. } => identity,
		}
	}
}

/// Outcome of an export whose listing succeeded.
#[derive(Debug)]
pub struct ExportReport {
	pub kind: WorkloadKind,
	pub namespace: String,
	/// Objects returned by the listing.
	pub listed: usize,
	/// Documents produced and handed to the sinks.
	pub exported: usize,
	pub skipped: Vec<ItemError>,
	pub output: Option<PathBuf>,
}

/// Export the objects described by `request`.
///
/// Documents are written to `stream` and, if the request names an output
/// file, to that file as well.
#[instrument(skip_all, fields(kind = %request.kind, namespace = %request.namespace))]
pub async fn export<L, C, W>(
	request: ExportRequest,
	lister: &L,
	cleaner: &C,
	stream: W,
) -> Result<ExportReport, ExportError>
where
	L: WorkloadLister,
	C: FieldCleaner + ?Sized,
	W: Write,
{
	let ExportRequest {
		kind,
		namespace,
		output,
	} = request;

	let objects = match lister.list(kind, &namespace).await {
		Ok(objects) => objects,
		Err(e) => {
			return Err(ExportError::ListingFailed {
				kind,
				namespace,
				source: Box::new(e),
			})
		}
	};
	info!(count = objects.len(), "listed workloads");

	let mut stream = SinkSlot::new(StreamSink::new(stream));
	let mut file = output.as_deref().map(SinkSlot::open_file);

	let mut report = ExportReport {
		kind,
		namespace,
		listed: objects.len(),
		exported: 0,
		skipped: Vec::new(),
		output,
	};

	for object in &objects {
		let text = match render(object, kind, cleaner) {
			Ok(text) => text,
			Err(e) => {
				warn!(object = %e.identity(), error = ?e, "skipping object");
				report.skipped.push(e);
				continue;
			}
		};

		stream.emit(&text);
		if let Some(file) = &mut file {
			file.emit(&text);
		}
		report.exported += 1;
	}

	let failures: Vec<SinkError> = stream
		.finish()
		.into_iter()
		.chain(file.and_then(SinkSlot::finish))
		.collect();

	if failures.is_empty() {
		Ok(report)
	} else {
		Err(ExportError::SinkWriteFailed {
			failures,
			report: Box::new(report),
		})
	}
}

/// Normalize and serialize one listed object.
fn render<C>(object: &DynamicObject, kind: WorkloadKind, cleaner: &C) -> Result<CanonicalText, ItemError>
where
	C: FieldCleaner + ?Sized,
{
	let identity = IdentityHints {
		kind,
		name: object.metadata.name.clone(),
		namespace: object.metadata.namespace.clone(),
	};

	let document = match normalize(object, kind, cleaner) {
		Ok(document) => document,
		Err(source) => return Err(ItemError::NormalizationFailed { identity, source }),
	};
	to_canonical(&document).map_err(|source| ItemError::SerializationFailed { identity, source })
}

/// A sink together with its health.
///
/// Once a write fails the sink is dropped, which closes it, and the slot
/// ignores every later document.
struct SinkSlot<S> {
	name: String,
	sink: Option<S>,
	written: usize,
	failure: Option<io::Error>,
}

impl<S: DocumentSink> SinkSlot<S> {
	fn new(sink: S) -> Self {
		Self {
			name: sink.name(),
			sink: Some(sink),
			written: 0,
			failure: None,
		}
	}

	fn emit(&mut self, document: &CanonicalText) {
		let Some(sink) = &mut self.sink else {
			return;
		};
		match sink.emit(document) {
			Ok(()) => self.written += 1,
			Err(e) => {
				warn!(sink = %self.name, written = self.written, error = %e, "abandoning output");
				self.sink = None;
				self.failure = Some(e);
			}
		}
	}

	fn finish(mut self) -> Option<SinkError> {
		if let Some(mut sink) = self.sink.take() {
			if let Err(e) = sink.finish() {
				self.failure = Some(e);
			}
		}
		self.failure.map(|source| SinkError {
			sink: self.name,
			written: self.written,
			source,
		})
	}
}

impl SinkSlot<FileSink> {
	/// Create the output file; a file that cannot be created is a failed sink from the start.
	fn open_file(path: &Path) -> Self {
		match FileSink::create(path) {
			Ok(sink) => Self::new(sink),
			Err(e) => {
				warn!(path = %path.display(), error = %e, "cannot create output file");
				Self {
					name: path.display().to_string(),
					sink: None,
					written: 0,
					failure: Some(e),
				}
			}
		}
	}
}
