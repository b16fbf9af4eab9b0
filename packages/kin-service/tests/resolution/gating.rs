use serde_json::{Value, json};

use kin_testkit::InMemoryBackend;

use super::{hit_keys, service};

fn tiered_model() -> Value {
	json!({
		"attributes": { "a": {}, "b": {} },
		"resolvers": {
			"high": { "attributes": ["a"], "weight": 10 },
			"low": { "attributes": ["b"] }
		},
		"matchers": { "exact": { "clause": { "term": { "{{ field }}": "{{ value }}" } } } },
		"indices": {
			"idx": {
				"fields": {
					"a": { "attribute": "a", "matcher": "exact" },
					"b": { "attribute": "b", "matcher": "exact" }
				}
			}
		}
	})
}

fn tiered_backend() -> InMemoryBackend {
	let backend = InMemoryBackend::new();

	backend.insert("idx", "both", json!({ "a": "x", "b": "y" }));
	backend.insert("idx", "conflict", json!({ "a": "other", "b": "y" }));
	backend.insert("idx", "low_only", json!({ "b": "y" }));

	backend
}

#[tokio::test]
async fn higher_weight_values_veto_lower_weight_matches() {
	let (service, _) = service(tiered_model(), tiered_backend());
	let response = service
		.resolve(&json!({ "attributes": { "a": ["x"], "b": ["y"] } }))
		.await
		.expect("Failed to resolve.");

	// "conflict" matches the low resolver but disagrees on the high one.
	assert_eq!(hit_keys(&response), vec!["idx/both", "idx/low_only"]);
}

#[tokio::test]
async fn gates_only_apply_to_queryable_tiers() {
	let (service, _) = service(tiered_model(), tiered_backend());
	let response = service
		.resolve(&json!({ "attributes": { "b": ["y"] } }))
		.await
		.expect("Failed to resolve.");

	assert_eq!(hit_keys(&response), vec!["idx/both", "idx/conflict", "idx/low_only"]);
	assert!(response.hits.iter().all(|hit| hit.hop == 0));
}
