use std::time::Duration;

use reqwest::{
	Client,
	header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue},
};
use serde_json::Value;

use crate::{BoxFuture, Error, Result, SearchBackend, SearchRequest, SearchResponse, dsl};

/// HTTP backend speaking the Elasticsearch `_search` API.
pub struct ElasticsearchBackend {
	client: Client,
	base_url: String,
}
impl ElasticsearchBackend {
	pub fn new(cfg: &kin_config::Backend) -> Result<Self> {
		let client = Client::builder()
			.timeout(Duration::from_millis(cfg.timeout_ms))
			.default_headers(default_headers(cfg)?)
			.build()?;

		Ok(Self { client, base_url: cfg.url.trim_end_matches('/').to_string() })
	}

	pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
		if request.index.is_empty() || request.index.contains('/') {
			return Err(Error::InvalidConfig {
				message: format!("'{}' is not a searchable index name.", request.index),
			});
		}

		let url = format!("{}/{}/_search", self.base_url, request.index);
		let body = dsl::request_body(request);

		tracing::debug!(index = %request.index, size = request.size, "Sending search request.");

		let res = self.client.post(url).json(&body).send().await?;
		let status = res.status();

		if !status.is_success() {
			let body = res.text().await.unwrap_or_default();

			return Err(Error::Status {
				index: request.index.clone(),
				status: status.as_u16(),
				body,
			});
		}

		let json: Value = res.json().await?;

		dsl::parse_response(json)
	}
}
impl SearchBackend for ElasticsearchBackend {
	fn search<'a>(&'a self, request: &'a SearchRequest) -> BoxFuture<'a, Result<SearchResponse>> {
		Box::pin(ElasticsearchBackend::search(self, request))
	}
}

fn default_headers(cfg: &kin_config::Backend) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	if let Some(api_key) = cfg.api_key.as_deref() {
		headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("ApiKey {api_key}"))?);
	}

	for (key, value) in &cfg.default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: "Default header values must be strings.".to_string(),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, HeaderValue::from_str(raw)?);
	}

	Ok(headers)
}
