use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub backend: Backend,
	pub model: ModelSource,
	#[serde(default)]
	pub resolution: Resolution,
	#[serde(default)]
	pub batch: Batch,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Backend {
	/// Base URL of the search cluster, e.g. "http://127.0.0.1:9200".
	pub url: String,
	pub timeout_ms: u64,
	/// Optional. Sent as `Authorization: ApiKey <key>` when present.
	pub api_key: Option<String>,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelSource {
	pub path: std::path::PathBuf,
}

/// Defaults applied to every job unless the job overrides them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Resolution {
	/// Negative values disable the hop limit.
	pub max_hops: i32,
	pub max_docs_per_query: u32,
	pub include_attributes: bool,
	pub include_explanation: bool,
	pub include_hits: bool,
	pub include_queries: bool,
	pub include_source: bool,
	pub profile: bool,
}
impl Default for Resolution {
	fn default() -> Self {
		Self {
			max_hops: 100,
			max_docs_per_query: 1_000,
			include_attributes: true,
			include_explanation: false,
			include_hits: true,
			include_queries: false,
			include_source: true,
			profile: false,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Batch {
	pub concurrency: usize,
	/// One of "fail_fast" or "error_suppressing".
	pub mode: String,
}
impl Default for Batch {
	fn default() -> Self {
		Self { concurrency: 4, mode: "error_suppressing".to_string() }
	}
}

fn default_log_level() -> String {
	"info".to_string()
}
