use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use kin_model::{Index, Model, Resolver};
use kin_search::SearchHit;

use crate::{input::ResolutionInput, job, provenance::Provenance, template};

/// Why a document was matched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Explanation {
	/// Resolvers whose attributes were all matched.
	pub resolvers: BTreeMap<String, ExplainedResolver>,
	pub matches: Vec<MatchRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplainedResolver {
	pub attributes: Vec<String>,
}

/// One matched predicate, reconstructed from its provenance tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchRecord {
	pub attribute: String,
	pub target_field: String,
	/// The document's value of `target_field`.
	pub target_value: JsonValue,
	/// The frontier value the predicate was built from.
	pub input_value: JsonValue,
	pub input_matcher: String,
	pub input_matcher_params: Map<String, JsonValue>,
}

/// Rebuilds the explanation of `hit` from its matched provenance tags.
///
/// Tags that repeat a (attribute, field, matcher, value) tuple are reported once; tags that do
/// not decode are ignored.
pub(crate) fn explain(
	model: &Model,
	input: &ResolutionInput,
	index: &Index,
	hit: &SearchHit,
	resolvers: &[&Resolver],
) -> Explanation {
	let mut seen = HashSet::new();
	let mut matched = BTreeSet::new();
	let mut matches = Vec::new();

	for tag in &hit.matched_queries {
		let Some(provenance) = Provenance::decode(tag) else {
			tracing::debug!(index = %index.name, id = %hit.id, tag = %tag, "Ignoring foreign match tag.");

			continue;
		};
		let key = (
			provenance.attribute.clone(),
			provenance.field.clone(),
			provenance.matcher.clone(),
			provenance.value.to_string(),
		);

		if !seen.insert(key) {
			continue;
		}

		let target_value = index
			.field(&provenance.field)
			.and_then(|field| job::document_value(hit, field))
			.cloned()
			.unwrap_or(JsonValue::Null);
		let input_matcher_params = model
			.matcher(&provenance.matcher)
			.map(|matcher| template::merged_params(model, input, &provenance.attribute, matcher))
			.unwrap_or_default();

		matched.insert(provenance.attribute.clone());
		matches.push(MatchRecord {
			attribute: provenance.attribute,
			target_field: provenance.field,
			target_value,
			input_value: provenance.value,
			input_matcher: provenance.matcher,
			input_matcher_params,
		});
	}

	let resolvers = resolvers
		.iter()
		.filter(|resolver| resolver.attributes.iter().all(|attribute| matched.contains(attribute)))
		.map(|resolver| {
			(resolver.name.clone(), ExplainedResolver { attributes: resolver.attributes.clone() })
		})
		.collect();

	Explanation { resolvers, matches }
}
