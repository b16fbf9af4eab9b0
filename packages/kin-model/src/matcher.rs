use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value as JsonValue};

use crate::{Error, Result};

/// Matches `{{ name }}` placeholders, with or without inner whitespace.
static TEMPLATE_VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"\{\{\s*([^\s{}]+)\s*\}\}").expect("Template variable pattern must compile.")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Variable {
	Field,
	Value,
	Param(String),
}
impl Variable {
	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"field" => Some(Self::Field),
			"value" => Some(Self::Value),
			_ => raw
				.strip_prefix("params.")
				.filter(|name| !name.is_empty())
				.map(|name| Self::Param(name.to_string())),
		}
	}
}

#[derive(Debug, Clone)]
pub struct Matcher {
	pub name: String,
	/// The clause template as JSON text.
	pub clause: String,
	pub variables: Vec<Variable>,
	pub params: Map<String, JsonValue>,
}
impl Matcher {
	pub fn new(name: &str, clause: &JsonValue, params: Map<String, JsonValue>) -> Result<Self> {
		let path = format!("$.matchers.{name}.clause");

		match clause.as_object() {
			Some(object) if !object.is_empty() => {},
			_ => return Err(Error::validation(path, "clause must be a non-empty object.")),
		}

		let text = serde_json::to_string(clause)?;
		let mut variables = Vec::new();

		for capture in TEMPLATE_VARIABLE.captures_iter(&text) {
			let raw = &capture[1];
			let variable = Variable::parse(raw).ok_or_else(|| {
				Error::validation(&path, format!("'{raw}' is not a supported template variable."))
			})?;

			if !variables.contains(&variable) {
				variables.push(variable);
			}
		}

		if !variables.contains(&Variable::Value) {
			return Err(Error::validation(path, "clause must reference {{ value }}."));
		}

		Ok(Self { name: name.to_string(), clause: text, variables, params })
	}

	pub fn param_names(&self) -> impl Iterator<Item = &str> {
		self.variables.iter().filter_map(|variable| match variable {
			Variable::Param(name) => Some(name.as_str()),
			_ => None,
		})
	}
}
