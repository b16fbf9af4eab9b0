use std::time::Duration;

use serde_json::json;

use kin_service::{BatchMode, BatchOptions, Error};

use super::{alice, hit_keys, people_service};

#[tokio::test]
async fn items_keep_input_order_when_later_jobs_finish_first() {
	let (service, backend) = people_service();

	backend.delay_index("crm", Duration::from_millis(40));

	let response = service
		.resolve_batch(vec![
			alice(),
			json!({ "ids": { "hr": ["h2"] }, "scope": { "include": { "indices": ["hr"] } } }),
		])
		.await
		.expect("Failed to run batch.");

	assert!(!response.errors);
	assert!(response.items[0].took_ms > response.items[1].took_ms);

	let first = response.items[0].result.as_ref().expect("first job");
	let second = response.items[1].result.as_ref().expect("second job");

	assert_eq!(hit_keys(first), vec!["crm/c1", "crm/c2", "hr/h1"]);
	assert_eq!(hit_keys(second), vec!["hr/h2"]);
}

#[tokio::test]
async fn invalid_jobs_fail_only_their_slot() {
	let (service, _) = people_service();
	let response = service
		.resolve_batch(vec![alice(), json!({ "attributes": { "height": [180] } })])
		.await
		.expect("Failed to run batch.");

	assert!(response.errors);
	assert!(response.items[0].result.is_ok());
	assert!(matches!(response.items[1].result, Err(Error::Validation { .. })));
	assert!(matches!(
		response.combined_error(),
		Some(Error::Batch { failures }) if failures.len() == 1 && failures[0].slot == 1
	));

	let json = serde_json::to_value(&response).expect("json");

	assert_eq!(json["items"][1]["error"]["type"], "validation_error");
	assert!(json["items"][0]["result"]["hits"].is_array());
}

#[tokio::test]
async fn fail_fast_batches_stop_at_the_first_failure() {
	let (mut service, backend) = people_service();

	service.batch = BatchOptions { concurrency: 1, mode: BatchMode::FailFast };

	let result = service
		.resolve_batch(vec![json!({ "terms": [] }), alice(), alice()])
		.await;

	assert!(matches!(result, Err(Error::Validation { .. })));

	tokio::time::sleep(Duration::from_millis(20)).await;

	assert_eq!(backend.request_count(), 0);
}

#[tokio::test]
async fn empty_batches_are_rejected() {
	let (service, _) = people_service();

	assert!(matches!(service.resolve_batch(Vec::new()).await, Err(Error::EmptyBatch)));
}
