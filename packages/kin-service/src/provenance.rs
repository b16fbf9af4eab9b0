use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::Value as JsonValue;

use kin_model::Value;

/// Hands out per-query sequence numbers so that identical predicates still get unique tags.
#[derive(Debug, Default)]
pub struct TagSequence {
	next: u64,
}
impl TagSequence {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builds the tag `attribute:field:matcher:base64(value JSON):seq`.
	pub fn tag(&mut self, attribute: &str, field: &str, matcher: &str, value: &Value) -> String {
		let seq = self.next;

		self.next += 1;

		format!("{attribute}:{field}:{matcher}:{}:{seq}", STANDARD.encode(value.to_json().to_string()))
	}
}

/// A decoded provenance tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Provenance {
	pub attribute: String,
	pub field: String,
	pub matcher: String,
	/// The query value as typed JSON.
	pub value: JsonValue,
}
impl Provenance {
	/// Decodes a tag produced by [`TagSequence::tag`]; `None` for foreign or corrupt tags.
	///
	/// The attribute is split off the front and the matcher, value and sequence off the back, so
	/// field names may contain colons.
	pub fn decode(tag: &str) -> Option<Self> {
		let (rest, seq) = tag.rsplit_once(':')?;

		seq.parse::<u64>().ok()?;

		let (rest, encoded) = rest.rsplit_once(':')?;
		let (rest, matcher) = rest.rsplit_once(':')?;
		let (attribute, field) = rest.split_once(':')?;
		let bytes = STANDARD.decode(encoded).ok()?;
		let value = serde_json::from_slice(&bytes).ok()?;

		Some(Self {
			attribute: attribute.to_string(),
			field: field.to_string(),
			matcher: matcher.to_string(),
			value,
		})
	}
}
