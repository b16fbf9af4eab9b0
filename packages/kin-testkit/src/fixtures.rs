use serde_json::{Value, json};

use kin_model::Model;

use crate::InMemoryBackend;

/// A people model with two indices and resolvers in two confidence tiers.
pub fn people_model_json() -> Value {
	json!({
		"attributes": {
			"name": { "type": "string" },
			"dob": { "type": "date", "params": { "format": "yyyy-MM-dd" } },
			"email": { "type": "string" },
			"phone": { "type": "string" },
			"ssn": { "type": "number" }
		},
		"resolvers": {
			"name_dob": { "attributes": ["name", "dob"] },
			"name_phone": { "attributes": ["name", "phone"] },
			"email": { "attributes": ["email"] },
			"ssn": { "attributes": ["ssn"], "weight": 10 }
		},
		"matchers": {
			"exact": { "clause": { "term": { "{{ field }}": "{{ value }}" } } },
			"text": { "clause": { "match": { "{{ field }}": { "query": "{{ value }}" } } } },
			"date": {
				"clause": {
					"range": {
						"{{ field }}": {
							"gte": "{{ value }}",
							"lte": "{{ value }}",
							"format": "{{ params.format }}"
						}
					}
				},
				"params": { "format": "yyyy-MM-dd" }
			}
		},
		"indices": {
			"crm": {
				"fields": {
					"full_name": { "attribute": "name", "matcher": "text" },
					"birth_date": { "attribute": "dob", "matcher": "date" },
					"contact.email.keyword": { "attribute": "email", "matcher": "exact" },
					"contact.phone": { "attribute": "phone", "matcher": "exact" }
				}
			},
			"hr": {
				"fields": {
					"name": { "attribute": "name", "matcher": "text" },
					"dob": { "attribute": "dob", "matcher": "date" },
					"email": { "attribute": "email", "matcher": "exact" },
					"ssn": { "attribute": "ssn", "matcher": "exact" }
				}
			}
		}
	})
}

pub fn people_model() -> Model {
	Model::from_value(people_model_json()).expect("People model fixture must be valid.")
}

/// Documents forming one entity reachable only through multiple hops, plus noise.
///
/// `crm/c1` holds the seed email and a phone; `crm/c2` shares name and phone with `c1`;
/// `hr/h1` shares name and dob with `c2`; `hr/h2` is an unrelated person.
pub fn people_backend() -> InMemoryBackend {
	let backend = InMemoryBackend::new();

	backend.insert(
		"crm",
		"c1",
		json!({
			"full_name": "Alice Jones",
			"contact": { "email": "alice@example.com", "phone": "555-0100" }
		}),
	);
	backend.insert(
		"crm",
		"c2",
		json!({
			"full_name": "Alice Jones",
			"birth_date": "1990-04-01",
			"contact": { "phone": "555-0100" }
		}),
	);
	backend.insert(
		"hr",
		"h1",
		json!({ "name": "alice jones", "dob": "1990-04-01", "ssn": 123456789 }),
	);
	backend.insert(
		"hr",
		"h2",
		json!({ "name": "Bob Smith", "dob": "1985-07-15", "email": "bob@example.com" }),
	);

	backend
}
