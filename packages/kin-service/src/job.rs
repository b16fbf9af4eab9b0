use std::{
	collections::{BTreeMap, BTreeSet},
	sync::Arc,
	time::Instant,
};

use serde::Serialize;
use serde_json::Value as JsonValue;

use kin_model::{Index, IndexField, Model, Resolver, Value, ValueSet};
use kin_search::{SearchBackend, SearchHit, SearchRequest, dsl};

use crate::{
	Error, Result,
	explain::{self, Explanation},
	input::{Frontier, JobOptions, JobSpec, ResolutionInput},
	plan::{self, PlanArgs},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
	Idle,
	Running,
	Done,
}

/// One document reached by a job.
#[derive(Debug, Clone, Serialize)]
pub struct Hit {
	#[serde(rename = "_index")]
	pub index: String,
	#[serde(rename = "_id")]
	pub id: String,
	/// Hop at which the document was first returned.
	#[serde(rename = "_hop")]
	pub hop: u32,
	#[serde(rename = "_attributes", skip_serializing_if = "Option::is_none")]
	pub attributes: Option<BTreeMap<String, ValueSet>>,
	#[serde(rename = "_explanation", skip_serializing_if = "Option::is_none")]
	pub explanation: Option<Explanation>,
	#[serde(rename = "_source", skip_serializing_if = "Option::is_none")]
	pub source: Option<JsonValue>,
}

/// One query issued by a job.
#[derive(Debug, Clone, Serialize)]
pub struct QueryRecord {
	pub hop: u32,
	pub index: String,
	/// The request body as sent to the backend.
	pub query: JsonValue,
	pub took_ms: u64,
	pub hits: usize,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub profile: Option<JsonValue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobResponse {
	pub took_ms: u64,
	pub hits: Vec<Hit>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub queries: Option<Vec<QueryRecord>>,
}

/// A single resolution job.
///
/// Each hop queries every in-scope index with the current frontier, harvests attribute values
/// from new documents, and merges them into the frontier once all indices have been queried.
/// The job stops at a fixpoint (a hop adds no value) or at the hop limit.
pub struct Job {
	model: Arc<Model>,
	backend: Arc<dyn SearchBackend>,
	input: ResolutionInput,
	options: JobOptions,
	state: JobState,
	hop: u32,
	frontier: Frontier,
	/// Returned ids per index.
	seen: BTreeMap<String, BTreeSet<String>>,
	hits: Vec<Hit>,
	queries: Vec<QueryRecord>,
}
impl Job {
	pub fn new(model: Arc<Model>, backend: Arc<dyn SearchBackend>, spec: JobSpec) -> Self {
		let frontier = spec.input.seed_frontier();

		Self {
			model,
			backend,
			input: spec.input,
			options: spec.options,
			state: JobState::Idle,
			hop: 0,
			frontier,
			seen: BTreeMap::new(),
			hits: Vec::new(),
			queries: Vec::new(),
		}
	}

	pub fn state(&self) -> JobState {
		self.state
	}

	/// The last hop that was traversed.
	pub fn hop(&self) -> u32 {
		self.hop
	}

	pub fn frontier(&self) -> &Frontier {
		&self.frontier
	}

	pub fn hits(&self) -> &[Hit] {
		&self.hits
	}

	/// Clears traversal state so the job can run again from its input.
	pub fn reset(&mut self) {
		self.state = JobState::Idle;
		self.hop = 0;
		self.frontier = self.input.seed_frontier();
		self.seen.clear();
		self.hits.clear();
		self.queries.clear();
	}

	/// Runs the job to completion. A job runs once; call [`Job::reset`] to run it again.
	///
	/// Any backend error aborts the traversal and no partial result is returned.
	pub async fn run(&mut self) -> Result<JobResponse> {
		if self.state != JobState::Idle {
			return Err(Error::JobAlreadyRan);
		}

		let started = Instant::now();

		self.state = JobState::Running;

		let outcome = self.traverse().await;

		self.state = JobState::Done;

		outcome?;

		let took_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

		tracing::info!(hops = self.hop + 1, hits = self.hits.len(), took_ms, "Resolution job finished.");

		Ok(JobResponse {
			took_ms,
			hits: if self.options.include_hits { self.hits.clone() } else { Vec::new() },
			queries: self.options.include_queries.then(|| self.queries.clone()),
		})
	}

	async fn traverse(&mut self) -> Result<()> {
		loop {
			if !self.traverse_hop().await? {
				tracing::debug!(hop = self.hop, "Frontier reached a fixpoint.");

				return Ok(());
			}
			if let Ok(limit) = u32::try_from(self.options.max_hops)
				&& self.hop >= limit
			{
				tracing::debug!(hop = self.hop, "Hop limit reached.");

				return Ok(());
			}

			self.hop += 1;
		}
	}

	/// Traverses one hop and reports whether it added any value to the frontier.
	async fn traverse_hop(&mut self) -> Result<bool> {
		let model = Arc::clone(&self.model);
		let backend = Arc::clone(&self.backend);
		let resolvers = model
			.resolvers()
			.filter(|resolver| self.input.scope.allows_resolver(&resolver.name))
			.collect::<Vec<&Resolver>>();
		let hop = self.hop;
		let mut staged = Frontier::new();

		for index in model.indices().filter(|index| self.input.scope.allows_index(&index.name)) {
			let seen = self.seen.entry(index.name.clone()).or_default();
			let args = PlanArgs {
				model: &model,
				index,
				input: &self.input,
				frontier: &self.frontier,
				resolvers: &resolvers,
				seen: &*seen,
				hop,
			};
			let Some(planned) = plan::plan(&args)? else {
				tracing::debug!(index = %index.name, hop, "No queryable resolvers; skipping index.");

				continue;
			};
			let request = SearchRequest {
				index: index.name.clone(),
				query: planned.query,
				size: self.options.max_docs_per_query,
				profile: self.options.profile,
				docvalue_fields: planned.docvalue_fields,
			};
			let response = backend.search(&request).await.map_err(|err| {
				tracing::warn!(index = %index.name, hop, error = %err, "Search failed.");

				Error::from(err)
			})?;

			tracing::debug!(index = %index.name, hop, hits = response.hits.len(), "Search finished.");

			if self.options.include_queries {
				self.queries.push(QueryRecord {
					hop,
					index: index.name.clone(),
					query: dsl::request_body(&request),
					took_ms: response.took_ms,
					hits: response.hits.len(),
					profile: response.profile.clone(),
				});
			}

			for hit in response.hits {
				if !seen.insert(hit.id.clone()) {
					continue;
				}

				let attributes = harvest(&model, index, &hit);

				for (name, values) in &attributes {
					let staged_values = staged.entry(name.clone()).or_default();

					for value in values.iter() {
						staged_values.insert(value.clone());
					}
				}

				let explanation = self
					.options
					.include_explanation
					.then(|| explain::explain(&model, &self.input, index, &hit, &resolvers));

				self.hits.push(Hit {
					index: index.name.clone(),
					id: hit.id,
					hop,
					attributes: self.options.include_attributes.then_some(attributes),
					explanation,
					source: self.options.include_source.then_some(hit.source),
				});
			}
		}

		let mut productive = false;

		for (name, values) in staged {
			let known = self.frontier.entry(name).or_default();

			for value in values.iter() {
				productive |= known.insert(value.clone());
			}
		}

		Ok(productive)
	}
}

/// Reads a field's value from a hit: backend-normalized fields first, then the source path,
/// then the parent path for multi-fields.
pub(crate) fn document_value<'h>(hit: &'h SearchHit, field: &IndexField) -> Option<&'h JsonValue> {
	if let Some(value) = hit.fields.get(&field.name).and_then(|values| values.first()) {
		return Some(value);
	}

	hit.source_value(&field.path).or_else(|| {
		if field.path_parent.is_empty() { None } else { hit.source_value(&field.path_parent) }
	})
}

/// Typed values of every mapped attribute present in `hit`.
fn harvest(model: &Model, index: &Index, hit: &SearchHit) -> BTreeMap<String, ValueSet> {
	let mut attributes: BTreeMap<String, ValueSet> = BTreeMap::new();

	for field in &index.fields {
		let Some(attribute) = model.attribute(&field.attribute) else { continue };
		let Some(raw) = document_value(hit, field) else { continue };

		match Value::coerce(attribute.attribute_type, raw) {
			Ok(Some(value)) => {
				attributes.entry(field.attribute.clone()).or_default().insert(value);
			},
			Ok(None) => {},
			Err(err) => {
				tracing::debug!(
					index = %index.name,
					id = %hit.id,
					field = %field.name,
					error = %err,
					"Skipping unreadable document value."
				);
			},
		}
	}

	attributes
}
