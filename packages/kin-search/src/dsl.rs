//! Elasticsearch query DSL at the serialization boundary.

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

use crate::{
	DocValueField, Error, Expr, Predicate, Result, SearchHit, SearchRequest, SearchResponse,
};

/// Compiles an [`Expr`] into a query DSL object.
///
/// Tagged leaves are wrapped in a `bool` with `_name` so the backend reports them in
/// `matched_queries`.
pub fn compile(expr: &Expr) -> Value {
	match expr {
		Expr::And(children) => json!({ "bool": { "filter": compile_all(children) } }),
		Expr::Or(children) if children.is_empty() => {
			json!({ "bool": { "must_not": [{ "match_all": {} }] } })
		},
		Expr::Or(children) => {
			json!({ "bool": { "should": compile_all(children), "minimum_should_match": 1 } })
		},
		Expr::Not(children) => json!({ "bool": { "must_not": compile_all(children) } }),
		Expr::Leaf(leaf) => {
			let clause = match &leaf.predicate {
				Predicate::Clause(clause) => clause.clone(),
				Predicate::Exists { field } => json!({ "exists": { "field": field } }),
				Predicate::Ids { values } => json!({ "ids": { "values": values } }),
			};

			match leaf.tag.as_deref() {
				Some(tag) => json!({ "bool": { "_name": tag, "filter": [clause] } }),
				None => clause,
			}
		},
	}
}

fn compile_all(children: &[Expr]) -> Vec<Value> {
	children.iter().map(compile).collect()
}

pub fn request_body(request: &SearchRequest) -> Value {
	let mut body = Map::new();

	body.insert("query".to_string(), compile(&request.query));
	body.insert("size".to_string(), json!(request.size));
	body.insert("_source".to_string(), Value::Bool(true));

	if !request.docvalue_fields.is_empty() {
		let fields: Vec<Value> = request.docvalue_fields.iter().map(docvalue_field).collect();

		body.insert("docvalue_fields".to_string(), Value::Array(fields));
	}
	if request.profile {
		body.insert("profile".to_string(), Value::Bool(true));
	}

	Value::Object(body)
}

fn docvalue_field(field: &DocValueField) -> Value {
	match field.format.as_deref() {
		Some(format) => json!({ "field": field.field, "format": format }),
		None => json!({ "field": field.field }),
	}
}

pub fn parse_response(json: Value) -> Result<SearchResponse> {
	let took_ms = json.get("took").and_then(Value::as_u64).unwrap_or(0);
	let hits = json
		.get("hits")
		.and_then(|hits| hits.get("hits"))
		.and_then(Value::as_array)
		.ok_or_else(|| Error::InvalidResponse {
			message: "Search response is missing hits.hits array.".to_string(),
		})?;
	let mut parsed = Vec::with_capacity(hits.len());

	for hit in hits {
		let id = hit.get("_id").and_then(Value::as_str).ok_or_else(|| Error::InvalidResponse {
			message: "Search hit is missing _id.".to_string(),
		})?;
		let index = hit.get("_index").and_then(Value::as_str).unwrap_or_default();
		let source = hit.get("_source").cloned().unwrap_or(Value::Null);
		let fields: BTreeMap<String, Vec<Value>> = hit
			.get("fields")
			.and_then(Value::as_object)
			.map(|fields| {
				fields
					.iter()
					.map(|(name, values)| {
						let values = match values {
							Value::Array(items) => items.clone(),
							other => vec![other.clone()],
						};

						(name.clone(), values)
					})
					.collect()
			})
			.unwrap_or_default();
		// `matched_queries` is a list, or a name-to-score object when scores are requested.
		let matched_queries = match hit.get("matched_queries") {
			Some(Value::Array(names)) => {
				names.iter().filter_map(Value::as_str).map(str::to_string).collect()
			},
			Some(Value::Object(scores)) => scores.keys().cloned().collect(),
			_ => Vec::new(),
		};

		parsed.push(SearchHit {
			index: index.to_string(),
			id: id.to_string(),
			source,
			fields,
			matched_queries,
		});
	}

	Ok(SearchResponse { took_ms, hits: parsed, profile: json.get("profile").cloned() })
}
