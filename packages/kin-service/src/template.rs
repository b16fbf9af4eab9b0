use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value as JsonValue};

use kin_model::{Matcher, Model, Value, Variable};

use crate::{Error, Result, input::ResolutionInput};

/// Either a variable that is the entire content of a JSON string, quotes included (group 1), or
/// a variable embedded in a longer string (group 2).
static VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r#""\{\{\s*([^\s{}"]+)\s*\}\}"|\{\{\s*([^\s{}]+)\s*\}\}"#)
		.expect("Variable pattern must compile.")
});

/// Renders a matcher clause for one field and value.
///
/// Returns `Ok(None)` for blank values. A variable that forms a whole JSON string is replaced
/// by the typed JSON of its value, so numbers and booleans come out unquoted; a variable
/// embedded in a longer string is replaced by escaped text.
pub fn render(
	matcher: &Matcher,
	field: &str,
	value: &Value,
	params: &Map<String, JsonValue>,
) -> Result<Option<JsonValue>> {
	if value.is_blank() {
		return Ok(None);
	}

	for name in matcher.param_names() {
		if params.get(name).is_none_or(JsonValue::is_null) {
			return Err(Error::MissingParameter {
				matcher: matcher.name.clone(),
				variable: format!("params.{name}"),
			});
		}
	}

	// One pass over the template, so substituted text is never read as template text.
	let rendered = VARIABLE.replace_all(&matcher.clause, |caps: &Captures| {
		if let Some(name) = caps.get(1) {
			return match Variable::parse(name.as_str()) {
				Some(Variable::Field) => JsonValue::String(field.to_string()).to_string(),
				Some(Variable::Value) => value.to_json().to_string(),
				Some(Variable::Param(name)) =>
					params.get(&name).map(JsonValue::to_string).unwrap_or_default(),
				None => caps[0].to_string(),
			};
		}

		let text = match Variable::parse(&caps[2]) {
			Some(Variable::Field) => field.to_string(),
			Some(Variable::Value) => value.as_text(),
			Some(Variable::Param(name)) => match params.get(&name) {
				Some(JsonValue::String(text)) => text.clone(),
				Some(other) => other.to_string(),
				None => String::new(),
			},
			None => return caps[0].to_string(),
		};

		escape(&text)
	});
	let clause = serde_json::from_str(&rendered).map_err(|err| Error::Validation {
		message: format!("Matcher '{}' rendered an invalid clause: {err}.", matcher.name),
	})?;

	Ok(Some(clause))
}

/// Merges params for one attribute and matcher.
///
/// Job-supplied attribute params override model attribute params, which override matcher
/// defaults.
pub fn merged_params(
	model: &Model,
	input: &ResolutionInput,
	attribute: &str,
	matcher: &Matcher,
) -> Map<String, JsonValue> {
	let mut params = matcher.params.clone();

	if let Some(model_attribute) = model.attribute(attribute) {
		for (key, value) in &model_attribute.params {
			params.insert(key.clone(), value.clone());
		}
	}
	if let Some(input_attribute) = input.attributes.get(attribute) {
		for (key, value) in &input_attribute.params {
			params.insert(key.clone(), value.clone());
		}
	}

	params
}

/// JSON-escapes `text` for use inside an existing string literal.
fn escape(text: &str) -> String {
	let quoted = JsonValue::String(text.to_string()).to_string();

	quoted[1..quoted.len() - 1].to_string()
}
