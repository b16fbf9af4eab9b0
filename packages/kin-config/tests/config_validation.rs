use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use kin_config::{Config, Error};

const SAMPLE_CONFIG_TOML: &str = include_str!("fixtures/sample_config.toml");

fn sample_toml_with(section: &str, key: &str, value: Value) -> String {
	let mut root: Value = toml::from_str(SAMPLE_CONFIG_TOML).expect("Failed to parse sample config.");
	let table = root
		.as_table_mut()
		.and_then(|root| root.get_mut(section))
		.and_then(Value::as_table_mut)
		.expect("Sample config must include the requested section.");

	table.insert(key.to_string(), value);

	toml::to_string(&root).expect("Failed to render sample config.")
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("kin_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn load_payload(payload: String) -> kin_config::Result<Config> {
	let path = write_temp_config(payload);
	let result = kin_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	result
}

#[test]
fn sample_config_loads_and_normalizes() {
	let cfg = load_payload(SAMPLE_CONFIG_TOML.to_string()).expect("Sample config must load.");

	assert_eq!(cfg.backend.url, "http://127.0.0.1:9200");
	assert!(cfg.backend.api_key.is_none());
	assert_eq!(cfg.batch.mode, "fail_fast");
	assert_eq!(cfg.batch.concurrency, 8);
	assert_eq!(cfg.resolution.max_hops, 10);
	assert_eq!(cfg.resolution.max_docs_per_query, 500);
	assert!(cfg.resolution.include_explanation);
	assert!(cfg.resolution.include_hits);
	assert!(cfg.model.path.is_absolute() || cfg.model.path.starts_with(env::temp_dir()));
	assert!(cfg.model.path.ends_with("model.json"));
}

#[test]
fn resolution_and_batch_sections_are_optional() {
	let payload = r#"
[service]
log_level = "debug"

[backend]
url        = "https://search.internal:9200"
timeout_ms = 1000

[model]
path = "/etc/kin/model.json"
"#;
	let cfg = load_payload(payload.to_string()).expect("Minimal config must load.");

	assert_eq!(cfg.resolution.max_hops, 100);
	assert_eq!(cfg.resolution.max_docs_per_query, 1_000);
	assert!(!cfg.resolution.include_queries);
	assert_eq!(cfg.batch.mode, "error_suppressing");
	assert_eq!(cfg.model.path, PathBuf::from("/etc/kin/model.json"));
}

#[test]
fn backend_timeout_must_be_positive() {
	let payload = sample_toml_with("backend", "timeout_ms", Value::Integer(0));
	let err = load_payload(payload).expect_err("Expected timeout validation error.");

	match err {
		Error::Validation { key, message } => {
			assert_eq!(key, "backend.timeout_ms");
			assert_eq!(message, "must be greater than zero.");
		},
		other => panic!("Unexpected error: {other:?}"),
	}
}

#[test]
fn backend_url_requires_http_scheme() {
	let payload = sample_toml_with("backend", "url", Value::String("localhost:9200".to_string()));
	let err = load_payload(payload).expect_err("Expected url validation error.");

	assert!(err.to_string().contains("backend.url must start with"));
}

#[test]
fn batch_mode_must_be_known() {
	let payload = sample_toml_with("batch", "mode", Value::String("eventually".to_string()));
	let err = load_payload(payload).expect_err("Expected batch mode validation error.");

	assert!(err.to_string().contains("batch.mode must be one of"));
}

#[test]
fn batch_concurrency_must_be_positive() {
	let payload = sample_toml_with("batch", "concurrency", Value::Integer(0));
	let err = load_payload(payload).expect_err("Expected concurrency validation error.");

	assert!(err.to_string().contains("batch.concurrency"));
}

#[test]
fn missing_file_reports_read_error() {
	let err = kin_config::load(&PathBuf::from("/nonexistent/kin/config.toml"))
		.expect_err("Expected read error.");

	assert!(matches!(err, Error::ReadConfig { .. }));
}

#[test]
fn header_errors_name_the_header() {
	let mut headers = toml::Table::new();

	headers.insert("x-retries".to_string(), Value::Integer(3));

	let payload = sample_toml_with("backend", "default_headers", Value::Table(headers));
	let err = load_payload(payload).expect_err("Expected header validation error.");

	assert_eq!(err.to_string(), "backend.default_headers.x-retries must be a string.");
	assert!(matches!(err, Error::Validation { key, .. } if key == "backend.default_headers.x-retries"));
}
