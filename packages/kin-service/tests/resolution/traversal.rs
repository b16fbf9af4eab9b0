use std::collections::BTreeSet;

use serde_json::json;

use kin_model::Value;
use kin_service::{Error, JobState};

use super::{alice, hit_keys, people_service};

#[tokio::test]
async fn follows_links_across_hops_and_indices() {
	let (service, _) = people_service();
	let response = service.resolve(&alice()).await.expect("Failed to resolve.");

	assert_eq!(hit_keys(&response), vec!["crm/c1", "crm/c2", "hr/h1"]);
	assert_eq!(response.hits.iter().map(|hit| hit.hop).collect::<Vec<_>>(), vec![0, 1, 2]);
	assert!(response.queries.is_none());
}

#[tokio::test]
async fn stops_at_a_fixpoint_and_keeps_the_frontier_growing() {
	let (service, _) = people_service();
	let spec = service.parse_job(&alice()).expect("spec");
	let seed = spec.input.seed_frontier();
	let mut job = service.job(spec);
	let response = job.run().await.expect("Failed to resolve.");

	// Hop 3 finds nothing new.
	assert_eq!(job.hop(), 3);
	assert_eq!(job.state(), JobState::Done);

	for (attribute, values) in &seed {
		assert!(job.frontier()[attribute].is_superset(values));
	}
	for hit in &response.hits {
		for (attribute, values) in hit.attributes.as_ref().expect("attributes") {
			assert!(job.frontier()[attribute].is_superset(values));
		}
	}

	assert!(job.frontier()["ssn"].contains(&Value::Number(123_456_789.into())));
}

#[tokio::test]
async fn never_returns_a_document_twice() {
	let (service, backend) = people_service();
	let response = service
		.resolve(&json!({ "terms": ["Alice Jones", "555-0100"], "attributes": { "email": "alice@example.com" } }))
		.await
		.expect("Failed to resolve.");
	let keys = hit_keys(&response);
	let unique = keys.iter().collect::<BTreeSet<_>>();

	assert_eq!(keys.len(), unique.len());

	// Once c1 is seen, later queries against crm exclude it.
	let later = backend
		.requests()
		.into_iter()
		.filter(|request| request.index == "crm")
		.skip(1)
		.map(|request| serde_json::to_string(&request.query).expect("json"))
		.collect::<Vec<_>>();

	assert!(!later.is_empty());
	assert!(later.iter().all(|query| query.contains("\"c1\"")));
}

#[tokio::test]
async fn hop_limit_bounds_the_traversal() {
	let (service, _) = people_service();
	let mut input = alice();

	input["options"] = json!({ "max_hops": 0 });

	let response = service.resolve(&input).await.expect("Failed to resolve.");

	assert_eq!(hit_keys(&response), vec!["crm/c1"]);

	input["options"] = json!({ "max_hops": 1 });

	let response = service.resolve(&input).await.expect("Failed to resolve.");

	assert_eq!(hit_keys(&response), vec!["crm/c1", "crm/c2"]);
}

#[tokio::test]
async fn unmatched_seeds_stop_after_one_hop() {
	let (service, backend) = people_service();
	let response = service
		.resolve(&json!({ "attributes": { "email": ["nobody@example.com"] } }))
		.await
		.expect("Failed to resolve.");

	assert!(response.hits.is_empty());
	assert_eq!(backend.request_count(), 2);
}

#[tokio::test]
async fn seed_ids_start_the_traversal() {
	let (service, backend) = people_service();
	let response = service
		.resolve(&json!({ "ids": { "hr": ["h2"] } }))
		.await
		.expect("Failed to resolve.");

	assert_eq!(hit_keys(&response), vec!["hr/h2"]);
	// crm has nothing to query at hop 0 and is skipped.
	assert_eq!(backend.requests()[0].index, "hr");
}

#[tokio::test]
async fn terms_match_without_typed_attributes() {
	let (service, _) = people_service();
	let response = service
		.resolve(&json!({ "terms": ["Alice Jones", "555-0100"] }))
		.await
		.expect("Failed to resolve.");

	assert_eq!(hit_keys(&response), vec!["crm/c1", "crm/c2", "hr/h1"]);
	assert_eq!(response.hits.iter().map(|hit| hit.hop).collect::<Vec<_>>(), vec![0, 0, 1]);
}

#[tokio::test]
async fn scope_limits_indices_and_documents() {
	let (service, backend) = people_service();
	let response = service
		.resolve(&json!({
			"attributes": { "email": ["alice@example.com"] },
			"scope": {
				"include": { "indices": ["crm"] },
				"exclude": { "attributes": { "dob": ["1990-04-01"] } }
			}
		}))
		.await
		.expect("Failed to resolve.");

	assert_eq!(hit_keys(&response), vec!["crm/c1"]);
	assert!(backend.requests().iter().all(|request| request.index == "crm"));
}

#[tokio::test]
async fn queries_are_reported_on_request() {
	let (service, _) = people_service();
	let mut input = alice();

	input["options"] = json!({ "include_queries": true, "max_hops": 0 });

	let response = service.resolve(&input).await.expect("Failed to resolve.");
	let queries = response.queries.expect("queries");

	assert_eq!(queries.iter().map(|query| query.index.as_str()).collect::<Vec<_>>(), vec!["crm", "hr"]);
	assert_eq!(queries[0].hits, 1);
	assert_eq!(queries[0].query["size"], 1000);
	assert!(queries[0].query["query"]["bool"]["_name"].is_string());
}

#[tokio::test]
async fn jobs_run_once_until_reset() {
	let (service, _) = people_service();
	let mut job = service.job(service.parse_job(&alice()).expect("spec"));
	let first = job.run().await.expect("Failed to resolve.");

	assert!(matches!(job.run().await, Err(Error::JobAlreadyRan)));

	job.reset();

	assert_eq!(job.state(), JobState::Idle);

	let second = job.run().await.expect("Failed to resolve after reset.");

	assert_eq!(super::hit_keys(&first), super::hit_keys(&second));
}

#[tokio::test]
async fn backend_failures_abort_the_job() {
	let (service, backend) = people_service();

	backend.fail_index("hr", "cluster unavailable");

	let mut job = service.job(service.parse_job(&alice()).expect("spec"));

	match job.run().await {
		Err(Error::Backend { message }) => assert!(message.contains("cluster unavailable")),
		other => panic!("Unexpected result: {other:?}"),
	}

	assert!(matches!(job.run().await, Err(Error::JobAlreadyRan)));
}

#[tokio::test]
async fn missing_matcher_params_are_reported() {
	let (service, _) = super::service(
		json!({
			"attributes": { "name": {} },
			"resolvers": { "name": { "attributes": ["name"] } },
			"matchers": {
				"fuzzy": {
					"clause": { "match": { "{{ field }}": { "query": "{{ value }}", "fuzziness": "{{ params.fuzziness }}" } } }
				}
			},
			"indices": { "people": { "fields": { "name": { "attribute": "name", "matcher": "fuzzy" } } } }
		}),
		kin_testkit::InMemoryBackend::new(),
	);

	match service.resolve(&json!({ "attributes": { "name": ["Alice"] } })).await {
		Err(Error::MissingParameter { matcher, variable }) => {
			assert_eq!(matcher, "fuzzy");
			assert_eq!(variable, "params.fuzziness");
		},
		other => panic!("Unexpected result: {other:?}"),
	}

	let response = service
		.resolve(&json!({ "attributes": { "name": { "values": ["Alice"], "params": { "fuzziness": 1 } } } }))
		.await
		.expect("Job params must satisfy the matcher.");

	assert!(response.hits.is_empty());
}
