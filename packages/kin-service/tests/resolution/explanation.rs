use std::collections::BTreeSet;

use serde_json::json;

use super::{alice, people_service};

#[tokio::test]
async fn every_explained_resolver_is_backed_by_matches() {
	let (service, _) = people_service();
	let mut input = alice();

	input["options"] = json!({ "include_explanation": true });

	let response = service.resolve(&input).await.expect("Failed to resolve.");

	assert_eq!(response.hits.len(), 3);

	for hit in &response.hits {
		let explanation = hit.explanation.as_ref().expect("explanation");
		let matched = explanation
			.matches
			.iter()
			.map(|record| record.attribute.as_str())
			.collect::<BTreeSet<_>>();

		assert!(!explanation.resolvers.is_empty(), "{} has no resolver.", hit.id);

		for resolver in explanation.resolvers.values() {
			for attribute in &resolver.attributes {
				assert!(matched.contains(attribute.as_str()), "{} lacks {attribute}.", hit.id);
			}
		}
	}
}

#[tokio::test]
async fn explanations_name_fields_values_and_matchers() {
	let (service, _) = people_service();
	let mut input = alice();

	input["options"] = json!({ "include_explanation": true, "include_source": false });

	let response = service.resolve(&input).await.expect("Failed to resolve.");
	let first = serde_json::to_value(&response.hits[0]).expect("json");

	assert_eq!(first["_explanation"]["resolvers"], json!({ "email": { "attributes": ["email"] } }));
	assert_eq!(
		first["_explanation"]["matches"],
		json!([{
			"attribute": "email",
			"target_field": "contact.email.keyword",
			"target_value": "alice@example.com",
			"input_value": "alice@example.com",
			"input_matcher": "exact",
			"input_matcher_params": {}
		}])
	);
	assert!(first.get("_source").is_none());

	let hr = serde_json::to_value(&response.hits[2]).expect("json");
	let matches = hr["_explanation"]["matches"].as_array().expect("matches");
	let dob = matches.iter().find(|record| record["attribute"] == "dob").expect("dob match");

	assert_eq!(hr["_explanation"]["resolvers"]["name_dob"]["attributes"], json!(["dob", "name"]));
	assert_eq!(dob["target_value"], "1990-04-01");
	assert_eq!(dob["input_matcher_params"], json!({ "format": "yyyy-MM-dd" }));
}
