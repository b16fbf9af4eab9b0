//! In-memory search backend and fixtures for resolution tests.
//!
//! [`InMemoryBackend`] evaluates [`Expr`] trees directly against JSON documents. It supports the
//! clause shapes used by the fixture matchers (`term`, `match`, `range`, `exists`, `ids` and
//! nested `bool`), reports matched provenance tags the way the real backend reports named
//! queries, and can inject failures and latency per index.

pub mod fixtures;

use std::{
	cmp::Ordering,
	collections::{BTreeMap, HashMap},
	sync::{Mutex, RwLock},
	time::Duration,
};

use serde_json::{Map, Value};

use kin_search::{
	BoxFuture, Error, Expr, Predicate, Result, SearchBackend, SearchHit, SearchRequest,
	SearchResponse,
};

#[derive(Debug, Clone)]
struct StoredDoc {
	id: String,
	source: Value,
}

#[derive(Default)]
pub struct InMemoryBackend {
	indices: RwLock<BTreeMap<String, Vec<StoredDoc>>>,
	requests: Mutex<Vec<SearchRequest>>,
	failures: Mutex<HashMap<String, String>>,
	delays: Mutex<HashMap<String, Duration>>,
}
impl InMemoryBackend {
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts or replaces a document.
	pub fn insert(&self, index: &str, id: &str, source: Value) {
		let mut indices = self.indices.write().unwrap_or_else(|err| err.into_inner());
		let docs = indices.entry(index.to_string()).or_default();

		match docs.iter_mut().find(|doc| doc.id == id) {
			Some(doc) => doc.source = source,
			None => docs.push(StoredDoc { id: id.to_string(), source }),
		}
	}

	/// Makes every search against `index` fail with `message`.
	pub fn fail_index(&self, index: &str, message: &str) {
		self.failures
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.insert(index.to_string(), message.to_string());
	}

	/// Delays every search against `index` by `delay`.
	pub fn delay_index(&self, index: &str, delay: Duration) {
		self.delays.lock().unwrap_or_else(|err| err.into_inner()).insert(index.to_string(), delay);
	}

	/// Every request received so far, in arrival order.
	pub fn requests(&self) -> Vec<SearchRequest> {
		self.requests.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	pub fn request_count(&self) -> usize {
		self.requests.lock().unwrap_or_else(|err| err.into_inner()).len()
	}

	async fn run(&self, request: &SearchRequest) -> Result<SearchResponse> {
		self.requests.lock().unwrap_or_else(|err| err.into_inner()).push(request.clone());

		let delay =
			self.delays.lock().unwrap_or_else(|err| err.into_inner()).get(&request.index).copied();

		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}

		let failure =
			self.failures.lock().unwrap_or_else(|err| err.into_inner()).get(&request.index).cloned();

		if let Some(message) = failure {
			return Err(Error::Status { index: request.index.clone(), status: 500, body: message });
		}

		let docs = self
			.indices
			.read()
			.unwrap_or_else(|err| err.into_inner())
			.get(&request.index)
			.cloned()
			.unwrap_or_default();
		let mut hits = Vec::new();

		for doc in docs {
			if hits.len() >= request.size as usize {
				break;
			}

			let mut tags = Vec::new();

			if !evaluate(&request.query, &doc, &mut tags) {
				continue;
			}

			tags.sort();
			tags.dedup();

			let fields = request
				.docvalue_fields
				.iter()
				.filter_map(|field| {
					let values = field_values(&doc.source, &field.field);

					(!values.is_empty()).then(|| (field.field.clone(), values))
				})
				.collect();

			hits.push(SearchHit {
				index: request.index.clone(),
				id: doc.id.clone(),
				source: doc.source.clone(),
				fields,
				matched_queries: tags,
			});
		}

		Ok(SearchResponse { took_ms: 1, hits, profile: request.profile.then(|| Value::Null) })
	}
}
impl SearchBackend for InMemoryBackend {
	fn search<'a>(&'a self, request: &'a SearchRequest) -> BoxFuture<'a, Result<SearchResponse>> {
		Box::pin(self.run(request))
	}
}

/// Evaluates every node so that all matching tags are collected, like named queries.
fn evaluate(expr: &Expr, doc: &StoredDoc, tags: &mut Vec<String>) -> bool {
	match expr {
		Expr::And(children) => {
			children.iter().map(|child| evaluate(child, doc, tags)).fold(true, |acc, hit| acc && hit)
		},
		Expr::Or(children) => {
			children.iter().map(|child| evaluate(child, doc, tags)).fold(false, |acc, hit| acc || hit)
		},
		Expr::Not(children) => {
			!children.iter().map(|child| evaluate(child, doc, tags)).fold(false, |acc, hit| acc || hit)
		},
		Expr::Leaf(leaf) => {
			let matched = match &leaf.predicate {
				Predicate::Clause(clause) => evaluate_clause(clause, doc),
				Predicate::Exists { field } => !field_values(&doc.source, field).is_empty(),
				Predicate::Ids { values } => values.iter().any(|id| id == &doc.id),
			};

			if matched && let Some(tag) = leaf.tag.as_ref() {
				tags.push(tag.clone());
			}

			matched
		},
	}
}

fn evaluate_clause(clause: &Value, doc: &StoredDoc) -> bool {
	let Some((kind, body)) = clause.as_object().and_then(|object| object.iter().next()) else {
		return false;
	};

	match kind.as_str() {
		"term" => single_field(body).is_some_and(|(field, expected)| {
			let expected = expected.get("value").unwrap_or(expected);

			field_values(&doc.source, field).iter().any(|actual| json_eq(actual, expected))
		}),
		"match" => single_field(body).is_some_and(|(field, expected)| {
			let expected = expected.get("query").unwrap_or(expected);

			field_values(&doc.source, field).iter().any(|actual| text_eq(actual, expected))
		}),
		"range" => single_field(body).is_some_and(|(field, bounds)| {
			field_values(&doc.source, field).iter().any(|actual| in_range(actual, bounds))
		}),
		"exists" => body
			.get("field")
			.and_then(Value::as_str)
			.is_some_and(|field| !field_values(&doc.source, field).is_empty()),
		"ids" => body
			.get("values")
			.and_then(Value::as_array)
			.is_some_and(|ids| ids.iter().any(|id| id.as_str() == Some(doc.id.as_str()))),
		"bool" => evaluate_bool(body, doc),
		other => {
			tracing::warn!(clause = other, "Unsupported clause in in-memory backend.");

			false
		},
	}
}

fn evaluate_bool(body: &Value, doc: &StoredDoc) -> bool {
	let list = |key: &str| -> Vec<Value> {
		match body.get(key) {
			Some(Value::Array(items)) => items.clone(),
			Some(item) => vec![item.clone()],
			None => Vec::new(),
		}
	};
	let required = list("filter").into_iter().chain(list("must"));
	let should = list("should");
	let must_not = list("must_not");

	required.into_iter().all(|clause| evaluate_clause(&clause, doc))
		&& (should.is_empty() || should.iter().any(|clause| evaluate_clause(clause, doc)))
		&& !must_not.iter().any(|clause| evaluate_clause(clause, doc))
}

fn single_field(body: &Value) -> Option<(&str, &Value)> {
	body.as_object().and_then(|object: &Map<String, Value>| {
		object.iter().next().map(|(field, value)| (field.as_str(), value))
	})
}

/// Values of `field` in `source`, flattening arrays.
///
/// A dotted field missing from the source falls back to its parent object, which emulates
/// multi-fields such as `name.keyword`.
fn field_values(source: &Value, field: &str) -> Vec<Value> {
	let path: Vec<&str> = field.split('.').collect();
	let mut values = lookup(source, &path);

	if values.is_empty() && path.len() > 1 {
		values = lookup(source, &path[..path.len() - 1]);
	}

	values.into_iter().filter(|value| !value.is_null() && !value.is_object()).collect()
}

fn lookup(current: &Value, path: &[&str]) -> Vec<Value> {
	match (current, path.split_first()) {
		(Value::Array(items), _) => items.iter().flat_map(|item| lookup(item, path)).collect(),
		(value, None) => vec![value.clone()],
		(Value::Object(map), Some((head, rest))) => {
			map.get(*head).map(|child| lookup(child, rest)).unwrap_or_default()
		},
		_ => Vec::new(),
	}
}

fn json_eq(actual: &Value, expected: &Value) -> bool {
	match (actual, expected) {
		(Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
		(Value::Number(a), Value::String(b)) | (Value::String(b), Value::Number(a)) => {
			b.parse::<f64>().ok() == a.as_f64()
		},
		(Value::Bool(a), Value::String(b)) | (Value::String(b), Value::Bool(a)) => {
			b == &a.to_string()
		},
		_ => actual == expected,
	}
}

fn text_eq(actual: &Value, expected: &Value) -> bool {
	let text = |value: &Value| match value {
		Value::String(text) => text.trim().to_lowercase(),
		other => other.to_string(),
	};

	text(actual) == text(expected)
}

fn in_range(actual: &Value, bounds: &Value) -> bool {
	let checks = [
		("gte", [Ordering::Greater, Ordering::Equal].as_slice()),
		("gt", [Ordering::Greater].as_slice()),
		("lte", [Ordering::Less, Ordering::Equal].as_slice()),
		("lt", [Ordering::Less].as_slice()),
	];

	checks.iter().all(|(key, allowed)| match bounds.get(*key) {
		Some(bound) => compare(actual, bound).is_some_and(|ordering| allowed.contains(&ordering)),
		None => true,
	})
}

fn compare(actual: &Value, bound: &Value) -> Option<Ordering> {
	let as_f64 = |value: &Value| match value {
		Value::Number(number) => number.as_f64(),
		Value::String(text) => text.parse::<f64>().ok(),
		_ => None,
	};

	if let (Some(a), Some(b)) = (as_f64(actual), as_f64(bound)) {
		return a.partial_cmp(&b);
	}

	match (actual, bound) {
		(Value::String(a), Value::String(b)) => Some(a.cmp(b)),
		_ => None,
	}
}
