use std::fmt::{Display, Formatter};

use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
	String,
	Number,
	Boolean,
	Date,
}
impl AttributeType {
	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"string" => Some(Self::String),
			"number" => Some(Self::Number),
			"boolean" => Some(Self::Boolean),
			"date" => Some(Self::Date),
			_ => None,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::String => "string",
			Self::Number => "number",
			Self::Boolean => "boolean",
			Self::Date => "date",
		}
	}
}
impl Display for AttributeType {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone)]
pub struct Attribute {
	pub name: String,
	pub attribute_type: AttributeType,
	pub params: Map<String, JsonValue>,
}
impl Attribute {
	/// The `format` param of a date attribute, if the model declares one.
	pub fn format(&self) -> Option<&str> {
		self.params.get("format").and_then(JsonValue::as_str)
	}
}
