pub mod dsl;
pub mod elasticsearch;

mod error;
mod expr;

pub use error::{Error, Result};
pub use expr::{Expr, Leaf, Predicate};

use std::{collections::BTreeMap, future::Future, pin::Pin};

use serde::Serialize;
use serde_json::Value;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The one call the resolution engine makes against a search cluster.
pub trait SearchBackend
where
	Self: Send + Sync,
{
	fn search<'a>(&'a self, request: &'a SearchRequest) -> BoxFuture<'a, Result<SearchResponse>>;
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest {
	pub index: String,
	pub query: Expr,
	/// Result cap for this query.
	pub size: u32,
	pub profile: bool,
	/// Fields the backend should return normalized, e.g. dates in a given format.
	pub docvalue_fields: Vec<DocValueField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocValueField {
	pub field: String,
	pub format: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchResponse {
	pub took_ms: u64,
	pub hits: Vec<SearchHit>,
	pub profile: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct SearchHit {
	pub index: String,
	pub id: String,
	/// Raw document source.
	pub source: Value,
	/// Backend-normalized field values keyed by field name.
	pub fields: BTreeMap<String, Vec<Value>>,
	/// Provenance tags of the named predicates this document matched.
	pub matched_queries: Vec<String>,
}
impl SearchHit {
	/// Reads a value from `source` by path segments; arrays yield their first element.
	pub fn source_value(&self, path: &[String]) -> Option<&Value> {
		let mut current = &self.source;

		for segment in path {
			current = match current {
				Value::Object(map) => map.get(segment)?,
				Value::Array(items) => items.first()?.get(segment)?,
				_ => return None,
			};
		}

		match current {
			Value::Array(items) => items.first(),
			Value::Null => None,
			other => Some(other),
		}
	}
}
