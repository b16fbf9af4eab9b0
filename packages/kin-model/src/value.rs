use std::{
	collections::HashSet,
	fmt::{Display, Formatter},
};

use serde::{Serialize, Serializer};
use serde_json::{Number, Value as JsonValue};

use crate::{AttributeType, CoercionError, date_format};

/// A typed attribute value.
///
/// Equality and hashing follow the typed value, so `5` and `"5"` are distinct and a number
/// parsed from `"5.0"` equals the integer `5`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
	String(String),
	Number(Number),
	Boolean(bool),
	Date(String),
}
impl Value {
	/// Coerces a JSON value to `attribute_type`.
	///
	/// Returns `Ok(None)` for null and blank values, which never produce predicates.
	pub fn coerce(
		attribute_type: AttributeType,
		raw: &JsonValue,
	) -> Result<Option<Self>, CoercionError> {
		if is_blank(raw) {
			return Ok(None);
		}

		let mismatch =
			|| CoercionError { expected: attribute_type, value: raw.to_string() };
		let value = match (attribute_type, raw) {
			(AttributeType::String, JsonValue::String(text)) => Self::String(text.clone()),
			(AttributeType::String, JsonValue::Number(number)) => Self::String(number.to_string()),
			(AttributeType::String, JsonValue::Bool(flag)) => Self::String(flag.to_string()),
			(AttributeType::Number, JsonValue::Number(number)) => {
				Self::Number(normalize_number(number))
			},
			(AttributeType::Number, JsonValue::String(text)) => {
				Self::Number(parse_number(text).ok_or_else(mismatch)?)
			},
			(AttributeType::Boolean, JsonValue::Bool(flag)) => Self::Boolean(*flag),
			(AttributeType::Boolean, JsonValue::String(text)) => {
				Self::Boolean(parse_boolean(text).ok_or_else(mismatch)?)
			},
			(AttributeType::Date, JsonValue::String(text)) => Self::Date(text.clone()),
			(AttributeType::Date, JsonValue::Number(number)) => Self::Date(number.to_string()),
			_ => return Err(mismatch()),
		};

		Ok(Some(value))
	}

	/// Coerces a date value and checks it against the first usable format.
	///
	/// Formats are tried in order; a value is accepted when any of them parses it.
	pub fn coerce_date(raw: &JsonValue, formats: &[&str]) -> Result<Option<Self>, CoercionError> {
		let Some(value) = Self::coerce(AttributeType::Date, raw)? else {
			return Ok(None);
		};

		if formats.is_empty() {
			return Ok(Some(value));
		}

		let text = value.as_text();

		if formats.iter().any(|format| date_format::matches(format, &text)) {
			Ok(Some(value))
		} else {
			Err(CoercionError { expected: AttributeType::Date, value: text })
		}
	}

	/// Tentatively reads a free-form term as `attribute_type`.
	///
	/// `date_formats` lists candidate formats in precedence order. A date term without any
	/// candidate format is rejected.
	pub fn from_term(
		attribute_type: AttributeType,
		term: &str,
		date_formats: &[&str],
	) -> Result<Self, CoercionError> {
		let trimmed = term.trim();
		let mismatch = || CoercionError { expected: attribute_type, value: term.to_string() };

		if trimmed.is_empty() {
			return Err(mismatch());
		}

		match attribute_type {
			AttributeType::Boolean => parse_boolean(trimmed).map(Self::Boolean).ok_or_else(mismatch),
			AttributeType::Number => parse_number(trimmed).map(Self::Number).ok_or_else(mismatch),
			AttributeType::Date => {
				if date_formats.iter().any(|format| date_format::matches(format, trimmed)) {
					Ok(Self::Date(trimmed.to_string()))
				} else {
					Err(mismatch())
				}
			},
			AttributeType::String => Ok(Self::String(term.to_string())),
		}
	}

	pub fn attribute_type(&self) -> AttributeType {
		match self {
			Self::String(_) => AttributeType::String,
			Self::Number(_) => AttributeType::Number,
			Self::Boolean(_) => AttributeType::Boolean,
			Self::Date(_) => AttributeType::Date,
		}
	}

	/// Typed JSON: numbers and booleans unquoted, strings and dates quoted.
	pub fn to_json(&self) -> JsonValue {
		match self {
			Self::String(text) | Self::Date(text) => JsonValue::String(text.clone()),
			Self::Number(number) => JsonValue::Number(number.clone()),
			Self::Boolean(flag) => JsonValue::Bool(*flag),
		}
	}

	/// Bare text, used when a value is spliced into a longer string.
	pub fn as_text(&self) -> String {
		match self {
			Self::String(text) | Self::Date(text) => text.clone(),
			Self::Number(number) => number.to_string(),
			Self::Boolean(flag) => flag.to_string(),
		}
	}

	pub fn is_blank(&self) -> bool {
		match self {
			Self::String(text) | Self::Date(text) => text.trim().is_empty(),
			Self::Number(_) | Self::Boolean(_) => false,
		}
	}
}
impl Display for Value {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.as_text())
	}
}
impl Serialize for Value {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		self.to_json().serialize(serializer)
	}
}

/// Insertion-ordered set of distinct typed values.
#[derive(Debug, Clone, Default)]
pub struct ValueSet {
	values: Vec<Value>,
	index: HashSet<Value>,
}
impl ValueSet {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns `true` when the value was not present before.
	pub fn insert(&mut self, value: Value) -> bool {
		if self.index.contains(&value) {
			return false;
		}

		self.index.insert(value.clone());
		self.values.push(value);

		true
	}

	pub fn contains(&self, value: &Value) -> bool {
		self.index.contains(value)
	}

	pub fn iter(&self) -> impl Iterator<Item = &Value> {
		self.values.iter()
	}

	pub fn len(&self) -> usize {
		self.values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	pub fn is_superset(&self, other: &Self) -> bool {
		other.iter().all(|value| self.contains(value))
	}
}
impl Serialize for ValueSet {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		self.values.serialize(serializer)
	}
}
impl FromIterator<Value> for ValueSet {
	fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
		let mut set = Self::new();

		for value in iter {
			set.insert(value);
		}

		set
	}
}

pub fn is_blank(raw: &JsonValue) -> bool {
	match raw {
		JsonValue::Null => true,
		JsonValue::String(text) => text.trim().is_empty(),
		JsonValue::Array(items) => items.is_empty(),
		JsonValue::Object(map) => map.is_empty(),
		JsonValue::Bool(_) | JsonValue::Number(_) => false,
	}
}

fn parse_boolean(text: &str) -> Option<bool> {
	match text.trim().to_ascii_lowercase().as_str() {
		"true" => Some(true),
		"false" => Some(false),
		_ => None,
	}
}

fn parse_number(text: &str) -> Option<Number> {
	let trimmed = text.trim();

	if let Ok(int) = trimmed.parse::<i64>() {
		return Some(Number::from(int));
	}
	if let Ok(uint) = trimmed.parse::<u64>() {
		return Some(Number::from(uint));
	}

	let float = trimmed.parse::<f64>().ok().filter(|float| float.is_finite())?;

	Number::from_f64(float).map(|number| normalize_number(&number))
}

fn normalize_number(number: &Number) -> Number {
	match number.as_f64() {
		Some(float)
			if number.is_f64()
				&& float.fract() == 0.0
				&& float >= i64::MIN as f64
				&& float < i64::MAX as f64 =>
		{
			Number::from(float as i64)
		},
		_ => number.clone(),
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn blank_and_null_values_are_skipped() {
		assert_eq!(Value::coerce(AttributeType::String, &json!(null)), Ok(None));
		assert_eq!(Value::coerce(AttributeType::String, &json!("   ")), Ok(None));
		assert_eq!(Value::coerce(AttributeType::Number, &json!("")), Ok(None));
	}

	#[test]
	fn numbers_compare_by_typed_value() {
		let from_text = Value::coerce(AttributeType::Number, &json!("5.0")).unwrap().unwrap();
		let from_int = Value::coerce(AttributeType::Number, &json!(5)).unwrap().unwrap();

		assert_eq!(from_text, from_int);
		assert_ne!(from_int, Value::String("5".to_string()));
	}

	#[test]
	fn booleans_accept_literals_only() {
		assert_eq!(Value::from_term(AttributeType::Boolean, "TRUE", &[]), Ok(Value::Boolean(true)));
		assert!(Value::from_term(AttributeType::Boolean, "yes", &[]).is_err());
		assert!(Value::coerce(AttributeType::Boolean, &json!(1)).is_err());
	}

	#[test]
	fn date_terms_need_a_matching_format() {
		assert!(Value::from_term(AttributeType::Date, "1999-12-31", &[]).is_err());
		assert_eq!(
			Value::from_term(AttributeType::Date, "1999-12-31", &["dd/MM/yyyy", "yyyy-MM-dd"]),
			Ok(Value::Date("1999-12-31".to_string()))
		);
		assert!(Value::from_term(AttributeType::Date, "alice", &["yyyy-MM-dd"]).is_err());
	}

	#[test]
	fn value_set_keeps_insertion_order_and_dedups() {
		let mut set = ValueSet::new();

		assert!(set.insert(Value::String("b".to_string())));
		assert!(set.insert(Value::String("a".to_string())));
		assert!(!set.insert(Value::String("b".to_string())));
		assert_eq!(
			set.iter().map(Value::as_text).collect::<Vec<_>>(),
			vec!["b".to_string(), "a".to_string()]
		);
	}

	#[test]
	fn json_rendering_quotes_strings_only() {
		assert_eq!(Value::Number(Number::from(5)).to_json().to_string(), "5");
		assert_eq!(Value::Boolean(false).to_json().to_string(), "false");
		assert_eq!(Value::Date("2020-01-01".to_string()).to_json().to_string(), "\"2020-01-01\"");
	}

	#[test]
	fn integral_floats_beyond_i64_stay_floats() {
		let edge = Number::from_f64(9_223_372_036_854_775_808.0).expect("finite");
		let inside = Number::from_f64(-9_223_372_036_854_775_808.0).expect("finite");

		assert!(normalize_number(&edge).is_f64());
		assert_eq!(normalize_number(&edge).as_f64(), Some(9_223_372_036_854_775_808.0));
		assert_eq!(normalize_number(&inside).as_i64(), Some(i64::MIN));
	}
}
