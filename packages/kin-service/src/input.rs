use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

use kin_model::{AttributeType, Model, Value, ValueSet};

use crate::{Error, Result};

/// Known attribute values keyed by attribute name.
pub type Frontier = BTreeMap<String, ValueSet>;

/// Values and params supplied for one attribute.
#[derive(Debug, Clone, Default)]
pub struct AttributeInput {
	pub values: ValueSet,
	/// Overrides for model attribute and matcher params.
	pub params: Map<String, JsonValue>,
}

#[derive(Debug, Clone, Default)]
pub struct ScopeFilter {
	pub attributes: BTreeMap<String, ValueSet>,
	pub resolvers: BTreeSet<String>,
	pub indices: BTreeSet<String>,
}
impl ScopeFilter {
	fn is_empty(&self) -> bool {
		self.attributes.is_empty() && self.resolvers.is_empty() && self.indices.is_empty()
	}
}

/// Restricts which resolvers and indices a job uses and which documents it may match.
#[derive(Debug, Clone, Default)]
pub struct Scope {
	pub include: ScopeFilter,
	pub exclude: ScopeFilter,
}
impl Scope {
	pub fn allows_resolver(&self, name: &str) -> bool {
		(self.include.resolvers.is_empty() || self.include.resolvers.contains(name))
			&& !self.exclude.resolvers.contains(name)
	}

	pub fn allows_index(&self, name: &str) -> bool {
		(self.include.indices.is_empty() || self.include.indices.contains(name))
			&& !self.exclude.indices.contains(name)
	}

	pub fn is_empty(&self) -> bool {
		self.include.is_empty() && self.exclude.is_empty()
	}
}

/// Validated input of one resolution job.
#[derive(Debug, Clone, Default)]
pub struct ResolutionInput {
	pub attributes: BTreeMap<String, AttributeInput>,
	/// Seed document ids keyed by index name.
	pub ids: BTreeMap<String, Vec<String>>,
	/// Free-form terms tried against every attribute type.
	pub terms: Vec<String>,
	pub scope: Scope,
}
impl ResolutionInput {
	/// Parses and validates a job input against `model`.
	///
	/// Attribute values may be given as a scalar, a list, or an object with `values` and
	/// `params`. Values that cannot be read as the attribute's type are dropped with a warning.
	pub fn parse(model: &Model, raw: &JsonValue) -> Result<Self> {
		let raw = RawInput::deserialize(raw).map_err(|err| Error::Validation {
			message: format!("Job input is malformed: {err}."),
		})?;
		let mut attributes = BTreeMap::new();

		for (name, entry) in raw.attributes {
			let (values, params) = split_attribute_entry(&name, entry)?;

			attributes.insert(name.clone(), AttributeInput {
				values: coerce_values(model, &name, &values, &params)?,
				params,
			});
		}

		let mut ids = BTreeMap::new();

		for (index, values) in raw.ids {
			if model.index(&index).is_none() {
				return Err(Error::Validation {
					message: format!("Ids reference unknown index '{index}'."),
				});
			}

			let values = values
				.into_iter()
				.map(|id| id.trim().to_string())
				.filter(|id| !id.is_empty())
				.collect::<Vec<_>>();

			if !values.is_empty() {
				ids.insert(index, values);
			}
		}

		let terms = raw
			.terms
			.into_iter()
			.filter(|term| !term.trim().is_empty())
			.collect::<Vec<_>>();
		let scope = Scope {
			include: parse_scope_filter(model, "include", raw.scope.include)?,
			exclude: parse_scope_filter(model, "exclude", raw.scope.exclude)?,
		};

		if attributes.values().all(|attribute| attribute.values.is_empty())
			&& ids.is_empty()
			&& terms.is_empty()
		{
			return Err(Error::Validation {
				message: "Job input must contain attributes, ids, or terms.".to_string(),
			});
		}

		Ok(Self { attributes, ids, terms, scope })
	}

	/// The starting frontier: every supplied attribute that has values.
	pub fn seed_frontier(&self) -> Frontier {
		self.attributes
			.iter()
			.filter(|(_, attribute)| !attribute.values.is_empty())
			.map(|(name, attribute)| (name.clone(), attribute.values.clone()))
			.collect()
	}

	/// Date formats for `attribute`, job params first, then model params.
	pub fn date_formats<'a>(&'a self, model: &'a Model, attribute: &str) -> Vec<&'a str> {
		let mut formats = Vec::new();

		if let Some(format) = self
			.attributes
			.get(attribute)
			.and_then(|input| input.params.get("format"))
			.and_then(JsonValue::as_str)
		{
			formats.push(format);
		}
		if let Some(format) = model.attribute(attribute).and_then(|attribute| attribute.format()) {
			formats.push(format);
		}

		formats
	}
}

/// Traversal and output options of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOptions {
	/// Hop limit; negative means unlimited.
	pub max_hops: i32,
	pub max_docs_per_query: u32,
	pub include_attributes: bool,
	pub include_explanation: bool,
	pub include_hits: bool,
	pub include_queries: bool,
	pub include_source: bool,
	pub profile: bool,
}
impl JobOptions {
	/// Applies the overrides present in `raw` on top of `self`.
	pub fn merged(&self, raw: &JsonValue) -> Result<Self> {
		let overrides = RawOptions::deserialize(raw).map_err(|err| Error::Validation {
			message: format!("Job options are malformed: {err}."),
		})?;
		let mut options = self.clone();

		if let Some(max_hops) = overrides.max_hops {
			options.max_hops = max_hops;
		}
		if let Some(max_docs) = overrides.max_docs_per_query {
			if max_docs == 0 {
				return Err(Error::Validation {
					message: "max_docs_per_query must be greater than zero.".to_string(),
				});
			}

			options.max_docs_per_query = max_docs;
		}

		let flags = [
			(overrides.include_attributes, &mut options.include_attributes),
			(overrides.include_explanation, &mut options.include_explanation),
			(overrides.include_hits, &mut options.include_hits),
			(overrides.include_queries, &mut options.include_queries),
			(overrides.include_source, &mut options.include_source),
			(overrides.profile, &mut options.profile),
		];

		for (value, slot) in flags {
			if let Some(value) = value {
				*slot = value;
			}
		}

		Ok(options)
	}
}
impl Default for JobOptions {
	fn default() -> Self {
		Self::from(&kin_config::Resolution::default())
	}
}
impl From<&kin_config::Resolution> for JobOptions {
	fn from(cfg: &kin_config::Resolution) -> Self {
		Self {
			max_hops: cfg.max_hops,
			max_docs_per_query: cfg.max_docs_per_query,
			include_attributes: cfg.include_attributes,
			include_explanation: cfg.include_explanation,
			include_hits: cfg.include_hits,
			include_queries: cfg.include_queries,
			include_source: cfg.include_source,
			profile: cfg.profile,
		}
	}
}

/// A job input together with its effective options.
#[derive(Debug, Clone)]
pub struct JobSpec {
	pub input: ResolutionInput,
	pub options: JobOptions,
}
impl JobSpec {
	/// Parses a job document: the input fields plus an optional `options` object.
	pub fn parse(model: &Model, raw: &JsonValue, defaults: &JobOptions) -> Result<Self> {
		let Some(object) = raw.as_object() else {
			return Err(Error::Validation {
				message: "Job input must be a JSON object.".to_string(),
			});
		};
		let mut body = object.clone();
		let options = match body.remove("options") {
			Some(raw_options) => defaults.merged(&raw_options)?,
			None => defaults.clone(),
		};
		let input = ResolutionInput::parse(model, &JsonValue::Object(body))?;

		Ok(Self { input, options })
	}
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawInput {
	attributes: Map<String, JsonValue>,
	ids: BTreeMap<String, Vec<String>>,
	terms: Vec<String>,
	scope: RawScope,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawScope {
	include: RawScopeFilter,
	exclude: RawScopeFilter,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawScopeFilter {
	attributes: Map<String, JsonValue>,
	resolvers: Vec<String>,
	indices: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawOptions {
	max_hops: Option<i32>,
	max_docs_per_query: Option<u32>,
	include_attributes: Option<bool>,
	include_explanation: Option<bool>,
	include_hits: Option<bool>,
	include_queries: Option<bool>,
	include_source: Option<bool>,
	profile: Option<bool>,
}

fn split_attribute_entry(
	name: &str,
	entry: JsonValue,
) -> Result<(Vec<JsonValue>, Map<String, JsonValue>)> {
	match entry {
		JsonValue::Array(values) => Ok((values, Map::new())),
		JsonValue::Object(mut object) => {
			let params = match object.remove("params") {
				Some(JsonValue::Object(params)) => params,
				None | Some(JsonValue::Null) => Map::new(),
				Some(_) => {
					return Err(Error::Validation {
						message: format!("Params of attribute '{name}' must be an object."),
					});
				},
			};
			let values = match object.remove("values") {
				Some(JsonValue::Array(values)) => values,
				Some(value) => vec![value],
				None => Vec::new(),
			};

			if let Some(key) = object.keys().next() {
				return Err(Error::Validation {
					message: format!("Attribute '{name}' has unknown key '{key}'."),
				});
			}

			Ok((values, params))
		},
		scalar => Ok((vec![scalar], Map::new())),
	}
}

fn coerce_values(
	model: &Model,
	name: &str,
	values: &[JsonValue],
	params: &Map<String, JsonValue>,
) -> Result<ValueSet> {
	let Some(attribute) = model.attribute(name) else {
		return Err(Error::Validation {
			message: format!("Attribute '{name}' is not defined in the model."),
		});
	};
	let mut formats = Vec::new();

	if let Some(format) = params.get("format").and_then(JsonValue::as_str) {
		formats.push(format);
	}
	if let Some(format) = attribute.format() {
		formats.push(format);
	}

	let mut set = ValueSet::new();

	for raw in values {
		let coerced = match attribute.attribute_type {
			AttributeType::Date => Value::coerce_date(raw, &formats),
			other => Value::coerce(other, raw),
		};

		match coerced {
			Ok(Some(value)) => {
				set.insert(value);
			},
			Ok(None) => {},
			Err(err) => {
				tracing::warn!(attribute = name, error = %err, "Skipping input value.");
			},
		}
	}

	Ok(set)
}

fn parse_scope_filter(model: &Model, kind: &str, raw: RawScopeFilter) -> Result<ScopeFilter> {
	let mut filter = ScopeFilter::default();

	for name in raw.resolvers {
		if model.resolver(&name).is_none() {
			return Err(Error::Validation {
				message: format!("Scope {kind} references unknown resolver '{name}'."),
			});
		}

		filter.resolvers.insert(name);
	}
	for name in raw.indices {
		if model.index(&name).is_none() {
			return Err(Error::Validation {
				message: format!("Scope {kind} references unknown index '{name}'."),
			});
		}

		filter.indices.insert(name);
	}
	for (name, entry) in raw.attributes {
		let (values, params) = split_attribute_entry(&name, entry)?;
		let values = coerce_values(model, &name, &values, &params)?;

		if !values.is_empty() {
			filter.attributes.insert(name, values);
		}
	}

	Ok(filter)
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn model() -> Model {
		Model::from_value(json!({
			"attributes": {
				"name": { "type": "string" },
				"age": { "type": "number" },
				"dob": { "type": "date", "params": { "format": "yyyy-MM-dd" } }
			},
			"resolvers": { "name_age": { "attributes": ["name", "age"] } },
			"matchers": { "exact": { "clause": { "term": { "{{ field }}": "{{ value }}" } } } },
			"indices": { "people": { "fields": { "name": { "attribute": "name", "matcher": "exact" } } } }
		}))
		.expect("model")
	}

	#[test]
	fn accepts_every_attribute_shape() {
		let input = ResolutionInput::parse(
			&model(),
			&json!({
				"attributes": {
					"name": "Alice",
					"age": ["42", 42, "not a number"],
					"dob": { "values": ["04/01/1990"], "params": { "format": "MM/dd/yyyy" } }
				}
			}),
		)
		.expect("input");

		assert_eq!(input.attributes["name"].values.len(), 1);
		// "42" and 42 coerce to the same number; the invalid value is dropped.
		assert_eq!(input.attributes["age"].values.len(), 1);
		assert_eq!(input.attributes["dob"].values.len(), 1);
		assert_eq!(input.attributes["dob"].params.get("format"), Some(&json!("MM/dd/yyyy")));
	}

	#[test]
	fn blank_values_are_not_seeded() {
		let input = ResolutionInput::parse(
			&model(),
			&json!({ "attributes": { "name": ["", "  "], "age": [7] } }),
		)
		.expect("input");
		let frontier = input.seed_frontier();

		assert!(!frontier.contains_key("name"));
		assert_eq!(frontier["age"].len(), 1);
	}

	#[test]
	fn rejects_unknown_references() {
		let model = model();

		for raw in [
			json!({ "attributes": { "height": [1] } }),
			json!({ "ids": { "missing": ["1"] } }),
			json!({ "terms": ["x"], "scope": { "include": { "resolvers": ["nope"] } } }),
			json!({ "terms": ["x"], "scope": { "exclude": { "indices": ["nope"] } } }),
		] {
			assert!(matches!(
				ResolutionInput::parse(&model, &raw),
				Err(Error::Validation { .. })
			));
		}
	}

	#[test]
	fn rejects_empty_inputs() {
		let err = ResolutionInput::parse(&model(), &json!({ "attributes": { "name": [""] } }))
			.expect_err("Expected empty input error.");

		assert!(matches!(err, Error::Validation { .. }));
	}

	#[test]
	fn options_override_defaults() {
		let defaults = JobOptions::default();
		let spec = JobSpec::parse(
			&model(),
			&json!({ "terms": ["alice"], "options": { "max_hops": 2, "include_queries": true } }),
			&defaults,
		)
		.expect("spec");

		assert_eq!(spec.options.max_hops, 2);
		assert!(spec.options.include_queries);
		assert_eq!(spec.options.max_docs_per_query, defaults.max_docs_per_query);
		assert!(defaults.merged(&json!({ "max_docs_per_query": 0 })).is_err());
		assert!(defaults.merged(&json!({ "unknown": true })).is_err());
	}

	#[test]
	fn scope_filters_resolvers_and_indices() {
		let input = ResolutionInput::parse(
			&model(),
			&json!({
				"terms": ["alice"],
				"scope": { "exclude": { "indices": ["people"] }, "include": { "resolvers": ["name_age"] } }
			}),
		)
		.expect("input");

		assert!(input.scope.allows_resolver("name_age"));
		assert!(!input.scope.allows_index("people"));
	}
}
