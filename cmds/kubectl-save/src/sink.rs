//! Destinations for exported documents.

use std::{
	fs::{self, File},
	io::{self, BufWriter, IntoInnerError, Write},
	path::{Path, PathBuf},
};

use thiserror::Error;

use crate::yaml::CanonicalText;

/// A destination that receives the documents of one export, in order.
///
/// `finish` is called once after the last document; a sink may not be used
/// afterwards.
pub trait DocumentSink {
	/// Human readable name used in error messages.
	fn name(&self) -> String;

	fn emit(&mut self, document: &CanonicalText) -> io::Result<()>;

	fn finish(&mut self) -> io::Result<()>;
}

/// A sink that stopped accepting documents partway through an export.
#[derive(Debug, Error)]
#[error("writing to {sink} failed after {written} document(s), output may be partial")]
pub struct SinkError {
	pub sink: String,
	pub written: usize,
	#[source]
	pub source: io::Error,
}

/// Writes each document preceded by a `---` line, as `kubectl get -o yaml` users expect.
pub struct StreamSink<W> {
	writer: W,
}

impl<W: Write> StreamSink<W> {
	pub fn new(writer: W) -> Self {
		Self { writer }
	}

	pub fn into_inner(self) -> W {
		self.writer
	}
}

impl<W: Write> DocumentSink for StreamSink<W> {
	fn name(&self) -> String {
		"standard output".to_string()
	}

	fn emit(&mut self, document: &CanonicalText) -> io::Result<()> {
		self.writer.write_all(b"---\n")?;
		self.writer.write_all(document.as_str().as_bytes())
	}

	fn finish(&mut self) -> io::Result<()> {
		self.writer.flush()
	}
}

/// Writes each document followed by a `---` line to a file.
///
/// The file is truncated on creation and flushed to disk by
/// [`DocumentSink::finish`]. Dropping the sink without finishing still closes
/// the file, keeping whatever was written so far.
#[derive(Debug)]
pub struct FileSink {
	path: PathBuf,
	writer: Option<BufWriter<File>>,
}

impl FileSink {
	/// Create (or truncate) the file at `path`, creating missing parent directories.
	pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
		let path = path.into();
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent)?;
		}
		let file = File::create(&path)?;
		Ok(Self {
			path,
			writer: Some(BufWriter::new(file)),
		})
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	fn writer(&mut self) -> io::Result<&mut BufWriter<File>> {
		self.writer
			.as_mut()
			.ok_or_else(|| io::Error::other("file sink is already finished"))
	}
}

impl DocumentSink for FileSink {
	fn name(&self) -> String {
		self.path.display().to_string()
	}

	fn emit(&mut self, document: &CanonicalText) -> io::Result<()> {
		let writer = self.writer()?;
		writer.write_all(document.body().as_bytes())?;
		writer.write_all(b"\n---\n")
	}

	fn finish(&mut self) -> io::Result<()> {
		let Some(writer) = self.writer.take() else {
			return Ok(());
		};
		let file = writer.into_inner().map_err(IntoInnerError::into_error)?;
		file.sync_all()
	}
}

#[cfg(test)]
mod tests {
	use indoc::indoc;
	use serde_json::json;

	use super::*;
	use crate::yaml::to_canonical;

	fn document(name: &str) -> CanonicalText {
		to_canonical(&json!({
			"apiVersion": "apps/v1",
			"kind": "Deployment",
			"metadata": {"name": name}
		}))
		.unwrap()
	}

	#[test]
	fn test_stream_sink_prefixes_separator() {
		let mut sink = StreamSink::new(Vec::new());
		sink.emit(&document("web")).unwrap();
		sink.emit(&document("api")).unwrap();
		sink.finish().unwrap();

		let output = String::from_utf8(sink.into_inner()).unwrap();
		assert_eq!(
			output,
			indoc! {"
				---
				apiVersion: apps/v1
				kind: Deployment
				metadata:
				  name: web
				---
				apiVersion: apps/v1
				kind: Deployment
				metadata:
				  name: api
			"}
		);
	}

	#[test]
	fn test_file_sink_terminates_each_document() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("out.yaml");

		let mut sink = FileSink::create(&path).unwrap();
		for name in ["a", "b", "c"] {
			sink.emit(&document(name)).unwrap();
		}
		sink.finish().unwrap();

		let content = fs::read_to_string(&path).unwrap();
		let segments: Vec<&str> = content.split_terminator("\n---\n").collect();
		assert_eq!(segments.len(), 3);
		assert!(content.ends_with("\n---\n"));
		for (segment, name) in segments.iter().zip(["a", "b", "c"]) {
			assert!(segment.ends_with(&format!("name: {name}")), "{segment}");
		}
	}

	#[test]
	fn test_file_sink_truncates_existing_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("out.yaml");
		fs::write(&path, "stale content that is longer than the new output\n").unwrap();

		let mut sink = FileSink::create(&path).unwrap();
		sink.emit(&document("web")).unwrap();
		sink.finish().unwrap();

		let content = fs::read_to_string(&path).unwrap();
		assert!(!content.contains("stale"));
		assert!(content.starts_with("apiVersion: apps/v1\n"));
	}

	#[test]
	fn test_file_sink_creates_parent_directories() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("backups/2024/deployments.yaml");

		let mut sink = FileSink::create(&path).unwrap();
		sink.finish().unwrap();

		assert!(path.exists());
		assert_eq!(fs::read_to_string(&path).unwrap(), "");
	}

	#[test]
	fn test_file_sink_rejects_emit_after_finish() {
		let dir = tempfile::tempdir().unwrap();
		let mut sink = FileSink::create(dir.path().join("out.yaml")).unwrap();
		sink.finish().unwrap();

		assert!(sink.emit(&document("late")).is_err());
		// Finishing twice is harmless.
		sink.finish().unwrap();
	}

	#[test]
	fn test_file_sink_in_missing_location_fails() {
		let dir = tempfile::tempdir().unwrap();
		let blocker = dir.path().join("not-a-dir");
		fs::write(&blocker, "").unwrap();

		assert!(FileSink::create(blocker.join("out.yaml")).is_err());
	}
}
