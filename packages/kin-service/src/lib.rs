pub mod batch;
pub mod explain;
pub mod input;
pub mod job;
pub mod plan;
pub mod provenance;
pub mod template;
pub mod tree;

mod error;

pub use batch::{BatchItem, BatchMode, BatchOptions, BatchResponse};
pub use error::{Error, Result, SlotFailure};
pub use explain::{ExplainedResolver, Explanation, MatchRecord};
pub use input::{Frontier, JobOptions, JobSpec, ResolutionInput};
pub use job::{Hit, Job, JobResponse, JobState, QueryRecord};

use std::sync::Arc;

use serde_json::Value;

use kin_config::Config;
use kin_model::Model;
use kin_search::{SearchBackend, elasticsearch::ElasticsearchBackend};

/// Entry point for resolution jobs against one model and one backend.
#[derive(Clone)]
pub struct KinService {
	pub model: Arc<Model>,
	pub backend: Arc<dyn SearchBackend>,
	/// Options applied to jobs that do not override them.
	pub options: JobOptions,
	pub batch: BatchOptions,
}
impl KinService {
	pub fn new(model: Model, backend: Arc<dyn SearchBackend>) -> Self {
		Self {
			model: Arc::new(model),
			backend,
			options: JobOptions::default(),
			batch: BatchOptions::default(),
		}
	}

	/// Loads the model and connects the Elasticsearch backend named in `cfg`.
	pub fn from_config(cfg: &Config) -> Result<Self> {
		let model = Model::load(&cfg.model.path)?;
		let backend = ElasticsearchBackend::new(&cfg.backend)?;

		Self::new(model, Arc::new(backend)).with_config(cfg)
	}

	/// Applies the resolution defaults and batch settings of `cfg`.
	pub fn with_config(mut self, cfg: &Config) -> Result<Self> {
		self.options = JobOptions::from(&cfg.resolution);
		self.batch = BatchOptions::try_from(&cfg.batch)?;

		Ok(self)
	}

	pub fn parse_job(&self, raw: &Value) -> Result<JobSpec> {
		JobSpec::parse(&self.model, raw, &self.options)
	}

	pub fn job(&self, spec: JobSpec) -> Job {
		Job::new(Arc::clone(&self.model), Arc::clone(&self.backend), spec)
	}

	/// Parses and runs one job.
	pub async fn resolve(&self, raw: &Value) -> Result<JobResponse> {
		let spec = self.parse_job(raw)?;

		self.job(spec).run().await
	}

	/// Runs many jobs concurrently; a job whose input is invalid fails its own slot.
	pub async fn resolve_batch(&self, raws: Vec<Value>) -> Result<BatchResponse<JobResponse>> {
		let service = self.clone();

		batch::run_batch(raws, self.batch, move |raw| {
			let service = service.clone();

			async move { service.resolve(&raw).await }
		})
		.await
	}
}
