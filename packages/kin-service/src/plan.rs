use std::collections::BTreeSet;

use serde_json::Value as JsonValue;

use kin_model::{AttributeType, Index, Model, Resolver, Value, ValueSet};
use kin_search::{DocValueField, Expr};

use crate::{
	Result,
	input::{Frontier, ResolutionInput},
	tree::PredicateBuilder,
};

/// The query for one index at one hop.
#[derive(Debug, Clone)]
pub struct QueryPlan {
	pub query: Expr,
	pub docvalue_fields: Vec<DocValueField>,
}

pub(crate) struct PlanArgs<'a> {
	pub(crate) model: &'a Model,
	pub(crate) index: &'a Index,
	pub(crate) input: &'a ResolutionInput,
	pub(crate) frontier: &'a Frontier,
	/// In-scope resolvers.
	pub(crate) resolvers: &'a [&'a Resolver],
	/// Ids already returned from this index.
	pub(crate) seen: &'a BTreeSet<String>,
	pub(crate) hop: u32,
}

/// Assembles the query for one index, or `None` when nothing in it can be matched.
///
/// The query is the conjunction of: exclusion of seen ids, scope exclude and include
/// predicates, and the disjunction of seed ids (hop 0 only), the resolver tree over the
/// frontier, and the resolver tree over free-form terms.
pub(crate) fn plan(args: &PlanArgs<'_>) -> Result<Option<QueryPlan>> {
	let PlanArgs { model, index, input, frontier, resolvers, seen, hop } = *args;
	let mut builder = PredicateBuilder::new(model, index, input);
	let mut candidates = Vec::new();

	if hop == 0
		&& let Some(ids) = input.ids.get(&index.name)
	{
		candidates.push(Expr::ids(ids.iter().cloned()));
	}

	candidates.extend(builder.resolvers(frontier, resolvers)?);

	if !input.terms.is_empty() {
		let terms = term_frontier(model, index, input, resolvers);

		candidates.extend(builder.resolvers(&terms, resolvers)?);
	}

	let Some(candidates) = Expr::any(candidates) else {
		return Ok(None);
	};
	let mut filters = Vec::new();

	if !seen.is_empty() {
		filters.push(Expr::Not(vec![Expr::ids(seen.iter().cloned())]));
	}

	let mut excluded = Vec::new();

	for (attribute, values) in &input.scope.exclude.attributes {
		if let Some(predicate) = builder.attribute(attribute, values, false)? {
			excluded.push(predicate);
		}
	}

	if !excluded.is_empty() {
		filters.push(Expr::Not(excluded));
	}

	for (attribute, values) in &input.scope.include.attributes {
		if let Some(predicate) = builder.attribute(attribute, values, false)? {
			filters.push(predicate);
		}
	}

	filters.push(candidates);

	let query = match Expr::all(filters) {
		Some(query) => query,
		None => return Ok(None),
	};

	Ok(Some(QueryPlan { query, docvalue_fields: docvalue_fields(model, index, input) }))
}

/// Reads every term as each attribute type used by `resolvers`.
///
/// Date terms are checked against the job, model, and matcher formats of the attribute.
fn term_frontier(
	model: &Model,
	index: &Index,
	input: &ResolutionInput,
	resolvers: &[&Resolver],
) -> Frontier {
	let attributes = resolvers
		.iter()
		.flat_map(|resolver| resolver.attributes.iter().map(String::as_str))
		.collect::<BTreeSet<_>>();
	let mut frontier = Frontier::new();

	for name in attributes {
		let Some(attribute) = model.attribute(name) else { continue };
		let mut formats = input.date_formats(model, name);

		if attribute.attribute_type == AttributeType::Date {
			for field in index.matcher_fields_for(name) {
				if let Some(format) = field
					.matcher
					.as_deref()
					.and_then(|matcher| model.matcher(matcher))
					.and_then(|matcher| matcher.params.get("format"))
					.and_then(JsonValue::as_str)
					&& !formats.contains(&format)
				{
					formats.push(format);
				}
			}
		}

		let mut values = ValueSet::new();

		for term in &input.terms {
			if let Ok(value) = Value::from_term(attribute.attribute_type, term, &formats) {
				values.insert(value);
			}
		}

		if !values.is_empty() {
			frontier.insert(name.to_string(), values);
		}
	}

	frontier
}

/// Date fields are requested as doc values in the attribute's format, so harvested dates are
/// comparable across documents.
fn docvalue_fields(model: &Model, index: &Index, input: &ResolutionInput) -> Vec<DocValueField> {
	index
		.fields
		.iter()
		.filter(|field| {
			model
				.attribute(&field.attribute)
				.is_some_and(|attribute| attribute.attribute_type == AttributeType::Date)
		})
		.map(|field| DocValueField {
			field: field.name.clone(),
			format: input.date_formats(model, &field.attribute).first().map(|format| format.to_string()),
		})
		.collect()
}
