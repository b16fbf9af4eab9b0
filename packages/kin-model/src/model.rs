use std::{collections::BTreeMap, fs, path::Path};

use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

use crate::{
	Attribute, AttributeType, Error, Index, IndexField, Matcher, Resolver, Result, date_format,
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawModel {
	#[serde(default)]
	attributes: BTreeMap<String, RawAttribute>,
	#[serde(default)]
	resolvers: BTreeMap<String, RawResolver>,
	#[serde(default)]
	matchers: BTreeMap<String, RawMatcher>,
	#[serde(default)]
	indices: BTreeMap<String, RawIndex>,
}

#[derive(Debug, Deserialize)]
struct RawAttribute {
	#[serde(rename = "type", default = "default_attribute_type")]
	attribute_type: String,
	#[serde(default)]
	params: Map<String, JsonValue>,
}

#[derive(Debug, Deserialize)]
struct RawResolver {
	attributes: Vec<String>,
	#[serde(default)]
	weight: i32,
}

#[derive(Debug, Deserialize)]
struct RawMatcher {
	clause: JsonValue,
	#[serde(default)]
	params: Map<String, JsonValue>,
}

#[derive(Debug, Deserialize)]
struct RawIndex {
	#[serde(default)]
	fields: BTreeMap<String, RawIndexField>,
}

#[derive(Debug, Deserialize)]
struct RawIndexField {
	attribute: String,
	matcher: Option<String>,
}

/// The resolution model: attributes, resolvers, matchers and index mappings.
///
/// Immutable once loaded. All maps iterate in name order.
#[derive(Debug, Clone, Default)]
pub struct Model {
	attributes: BTreeMap<String, Attribute>,
	resolvers: BTreeMap<String, Resolver>,
	matchers: BTreeMap<String, Matcher>,
	indices: BTreeMap<String, Index>,
}
impl Model {
	pub fn load(path: &Path) -> Result<Self> {
		let raw = fs::read_to_string(path).map_err(|err| {
			Error::validation(path.display().to_string(), format!("Failed to read model: {err}."))
		})?;

		Self::parse(&raw)
	}

	pub fn parse(raw: &str) -> Result<Self> {
		let value: JsonValue = serde_json::from_str(raw)?;

		Self::from_value(value)
	}

	pub fn from_value(value: JsonValue) -> Result<Self> {
		let raw: RawModel = serde_json::from_value(value)?;
		let mut model = Self::default();

		for (name, attribute) in raw.attributes {
			let attribute_type = AttributeType::parse(&attribute.attribute_type).ok_or_else(|| {
				Error::validation(
					format!("$.attributes.{name}.type"),
					format!("'{}' is not a supported attribute type.", attribute.attribute_type),
				)
			})?;

			model.attributes.insert(
				name.clone(),
				Attribute { name, attribute_type, params: attribute.params },
			);
		}
		for (name, matcher) in raw.matchers {
			let parsed = Matcher::new(&name, &matcher.clause, matcher.params)?;

			model.matchers.insert(name, parsed);
		}
		for (name, resolver) in raw.resolvers {
			let parsed = Resolver::new(&name, &resolver.attributes, resolver.weight);

			model.resolvers.insert(name, parsed);
		}
		for (name, index) in raw.indices {
			let fields = index
				.fields
				.iter()
				.map(|(field, mapping)| {
					IndexField::new(field, &mapping.attribute, mapping.matcher.as_deref())
				})
				.collect();

			model.indices.insert(name.clone(), Index { name, fields });
		}

		model.validate()?;

		Ok(model)
	}

	/// Checks every cross reference in the model.
	pub fn validate(&self) -> Result<()> {
		for attribute in self.attributes.values() {
			if attribute.attribute_type == AttributeType::Date
				&& let Some(format) = attribute.params.get("format")
			{
				let valid = format.as_str().map(date_format::is_valid).unwrap_or(false);

				if !valid {
					return Err(Error::validation(
						format!("$.attributes.{}.params.format", attribute.name),
						"format must be a valid date pattern.",
					));
				}
			}
		}
		for resolver in self.resolvers.values() {
			let path = format!("$.resolvers.{}.attributes", resolver.name);

			if resolver.attributes.is_empty() {
				return Err(Error::validation(path, "attributes must be non-empty."));
			}

			for attribute in &resolver.attributes {
				if !self.attributes.contains_key(attribute) {
					return Err(Error::validation(
						&path,
						format!("'{attribute}' is not a defined attribute."),
					));
				}
			}
		}
		for index in self.indices.values() {
			for field in &index.fields {
				let path = format!("$.indices.{}.fields.{}", index.name, field.name);

				if field.path.iter().any(String::is_empty) {
					return Err(Error::validation(
						path,
						"field names must not contain empty path segments.",
					));
				}
				if !self.attributes.contains_key(&field.attribute) {
					return Err(Error::validation(
						format!("{path}.attribute"),
						format!("'{}' is not a defined attribute.", field.attribute),
					));
				}
				if let Some(matcher) = field.matcher.as_deref()
					&& !self.matchers.contains_key(matcher)
				{
					return Err(Error::validation(
						format!("{path}.matcher"),
						format!("'{matcher}' is not a defined matcher."),
					));
				}
			}
		}

		Ok(())
	}

	pub fn attribute(&self, name: &str) -> Option<&Attribute> {
		self.attributes.get(name)
	}

	pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
		self.attributes.values()
	}

	pub fn matcher(&self, name: &str) -> Option<&Matcher> {
		self.matchers.get(name)
	}

	pub fn resolver(&self, name: &str) -> Option<&Resolver> {
		self.resolvers.get(name)
	}

	pub fn resolvers(&self) -> impl Iterator<Item = &Resolver> {
		self.resolvers.values()
	}

	pub fn index(&self, name: &str) -> Option<&Index> {
		self.indices.get(name)
	}

	pub fn indices(&self) -> impl Iterator<Item = &Index> {
		self.indices.values()
	}
}

fn default_attribute_type() -> String {
	"string".to_string()
}
