mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Backend, Batch, Config, ModelSource, Resolution, Service};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg, path);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::invalid("service.log_level", "must be non-empty."));
	}
	if cfg.backend.url.trim().is_empty() {
		return Err(Error::invalid("backend.url", "must be non-empty."));
	}
	if !cfg.backend.url.starts_with("http://") && !cfg.backend.url.starts_with("https://") {
		return Err(Error::invalid("backend.url", "must start with http:// or https://."));
	}
	if cfg.backend.timeout_ms == 0 {
		return Err(Error::invalid("backend.timeout_ms", "must be greater than zero."));
	}

	for (key, value) in &cfg.backend.default_headers {
		if !value.is_string() {
			return Err(Error::invalid(format!("backend.default_headers.{key}"), "must be a string."));
		}
	}

	if cfg.model.path.as_os_str().is_empty() {
		return Err(Error::invalid("model.path", "must be non-empty."));
	}
	if cfg.resolution.max_docs_per_query == 0 {
		return Err(Error::invalid("resolution.max_docs_per_query", "must be greater than zero."));
	}
	if cfg.batch.concurrency == 0 {
		return Err(Error::invalid("batch.concurrency", "must be greater than zero."));
	}
	if !matches!(cfg.batch.mode.as_str(), "fail_fast" | "error_suppressing") {
		return Err(Error::invalid("batch.mode", "must be one of fail_fast or error_suppressing."));
	}

	Ok(())
}

fn normalize(cfg: &mut Config, config_path: &Path) {
	cfg.backend.url = cfg.backend.url.trim().trim_end_matches('/').to_string();
	cfg.batch.mode = cfg.batch.mode.trim().to_ascii_lowercase();

	if cfg.backend.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.backend.api_key = None;
	}
	// Relative model paths resolve against the config file's directory.
	if cfg.model.path.is_relative()
		&& let Some(dir) = config_path.parent()
	{
		cfg.model.path = dir.join(&cfg.model.path);
	}
}
