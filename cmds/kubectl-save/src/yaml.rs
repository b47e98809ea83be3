//! Canonical YAML rendering of normalized documents.
//!
//! Output is a pure function of the document: mapping keys are sorted with
//! go-yaml's natural ordering (what `kubectl` and Go tooling produce), so the
//! same object always renders to the same bytes.

use std::{cmp::Ordering, fmt};

use serde_json::Value as JsonValue;
use tracing::instrument;

/// The YAML text of one normalized object, ending with a single newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalText(String);

impl CanonicalText {
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// The document without its trailing newline.
	pub fn body(&self) -> &str {
		self.0.trim_end_matches('\n')
	}

	pub fn into_string(self) -> String {
		self.0
	}
}

impl fmt::Display for CanonicalText {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Sort all mapping keys recursively with [`natural_key_cmp`].
pub fn sort_keys(value: JsonValue) -> JsonValue {
	match value {
		JsonValue::Object(map) => {
			let mut entries: Vec<(String, JsonValue)> = map.into_iter().collect();
			entries.sort_by(|(a, _), (b, _)| natural_key_cmp(a, b));
			JsonValue::Object(
				entries
					.into_iter()
					.map(|(k, v)| (k, sort_keys(v)))
					.collect(),
			)
		}
		JsonValue::Array(items) => JsonValue::Array(items.into_iter().map(sort_keys).collect()),
		other => other,
	}
}

/// go-yaml's key ordering (sorter.go).
///
/// Runs of digits compare by numeric value, so `item2` sorts before `item10`.
/// Where a letter meets a non-letter, the letter wins right after a digit and
/// loses everywhere else.
fn natural_key_cmp(a: &str, b: &str) -> Ordering {
	let a: Vec<char> = a.chars().collect();
	let b: Vec<char> = b.chars().collect();
	let mut after_digit = false;

	for (i, (&ca, &cb)) in a.iter().zip(&b).enumerate() {
		if ca == cb {
			after_digit = ca.is_ascii_digit();
			continue;
		}

		match (ca.is_alphabetic(), cb.is_alphabetic()) {
			(true, true) => return ca.cmp(&cb),
			(true, false) if after_digit => return Ordering::Less,
			(true, false) => return Ordering::Greater,
			(false, true) if after_digit => return Ordering::Greater,
			(false, true) => return Ordering::Less,
			(false, false) => {}
		}

		// A zero continuing a number that already has significant digits must
		// not be read as a leading zero.
		let seed = if (ca == '0' || cb == '0')
			&& a[..i]
				.iter()
				.rev()
				.take_while(|c| c.is_ascii_digit())
				.any(|&c| c != '0')
		{
			1
		} else {
			0
		};

		let (an, a_end) = digit_run(&a, i, seed);
		let (bn, b_end) = digit_run(&b, i, seed);
		return an
			.cmp(&bn)
			.then(a_end.cmp(&b_end))
			.then(ca.cmp(&cb));
	}

	a.len().cmp(&b.len())
}

/// Numeric value of the digit run starting at `start`, and the index just past it.
fn digit_run(chars: &[char], start: usize, seed: u128) -> (u128, usize) {
	let mut value = seed;
	let mut end = start;
	while let Some(digit) = chars.get(end).and_then(|c| c.to_digit(10)) {
		value = value.saturating_mul(10).saturating_add(u128::from(digit));
		end += 1;
	}
	(value, end)
}

/// Render a normalized document as canonical YAML.
#[instrument(skip_all)]
pub fn to_canonical(document: &JsonValue) -> Result<CanonicalText, serde_saphyr::ser_error::Error> {
	let sorted = sort_keys(document.clone());

	let options = serde_saphyr::SerializerOptions {
		indent_step: 2,
		indent_array: Some(0),
		prefer_block_scalars: true,
		empty_map_as_braces: true,
		empty_array_as_brackets: true,
		line_width: Some(80),
		quote_ambiguous_keys: true,
		quote_numeric_strings: true,
		..Default::default()
	};

	let mut output = String::new();
	serde_saphyr::to_fmt_writer_with_options(&mut output, &sorted, options)?;

	let trimmed = output.trim_end_matches('\n').len();
	output.truncate(trimmed);
	output.push('\n');
	Ok(CanonicalText(output))
}

#[cfg(test)]
mod tests {
	use indoc::indoc;
	use serde_json::json;

	use super::*;

	fn sorted(mut keys: Vec<&str>) -> Vec<&str> {
		keys.sort_by(|a, b| natural_key_cmp(a, b));
		keys
	}

	#[test]
	fn test_natural_key_order_numeric_runs() {
		assert_eq!(
			sorted(vec!["item10", "item2", "item1"]),
			vec!["item1", "item2", "item10"]
		);
	}

	#[test]
	fn test_natural_key_order_workload_fields() {
		assert_eq!(
			sorted(vec!["status", "spec", "metadata", "kind", "apiVersion"]),
			vec!["apiVersion", "kind", "metadata", "spec", "status"]
		);
	}

	#[test]
	fn test_natural_key_order_letters_vs_symbols() {
		// Outside a number, symbols sort before letters.
		assert_eq!(sorted(vec!["ab", "a_"]), vec!["a_", "ab"]);
		// Right after a digit, letters sort first.
		assert_eq!(sorted(vec!["1_", "1a"]), vec!["1a", "1_"]);
	}

	#[test]
	fn test_natural_key_order_prefix() {
		assert_eq!(sorted(vec!["names", "name"]), vec!["name", "names"]);
	}

	#[test]
	fn test_sort_keys_recurses_into_arrays() {
		let value = sort_keys(json!({"b": [{"z": 1, "a": 2}], "a": 0}));
		let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
		assert_eq!(keys, vec!["a", "b"]);
		let inner: Vec<_> = value["b"][0].as_object().unwrap().keys().cloned().collect();
		assert_eq!(inner, vec!["a", "z"]);
	}

	#[test]
	fn test_to_canonical_flat_document() {
		let doc = json!({
			"metadata": {"name": "web"},
			"kind": "Deployment",
			"apiVersion": "apps/v1"
		});

		let text = to_canonical(&doc).unwrap();

		assert_eq!(
			text.as_str(),
			indoc! {"
				apiVersion: apps/v1
				kind: Deployment
				metadata:
				  name: web
			"}
		);
		assert_eq!(text.body(), text.as_str().trim_end());
	}

	#[test]
	fn test_to_canonical_is_deterministic() {
		let doc = json!({
			"spec": {"replicas": 3, "selector": {"matchLabels": {"app": "web", "tier": "front"}}},
			"metadata": {"labels": {"z": "1", "a": "2"}, "name": "web"},
			"kind": "Deployment",
			"apiVersion": "apps/v1"
		});
		assert_eq!(to_canonical(&doc).unwrap(), to_canonical(&doc).unwrap());
	}

	#[test]
	fn test_to_canonical_does_not_depend_on_key_order() {
		let a = json!({"kind": "Deployment", "apiVersion": "apps/v1"});
		let b = json!({"apiVersion": "apps/v1", "kind": "Deployment"});
		assert_eq!(to_canonical(&a).unwrap(), to_canonical(&b).unwrap());
	}

	#[test]
	fn test_to_canonical_keeps_string_types() {
		let doc = json!({
			"metadata": {"annotations": {"version": "1.0", "enabled": "yes", "port": "8080"}},
			"spec": {"replicas": 1}
		});

		let text = to_canonical(&doc).unwrap();
		let parsed: JsonValue = serde_yaml::from_str(text.as_str()).unwrap();

		assert_eq!(parsed, doc);
	}

	#[test]
	fn test_to_canonical_ends_with_single_newline() {
		let text = to_canonical(&json!({"data": {"script": "echo hi\n"}})).unwrap();
		assert!(text.as_str().ends_with('\n'));
		assert!(!text.as_str().ends_with("\n\n"));
	}
}
