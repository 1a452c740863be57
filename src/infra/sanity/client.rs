use std::time::Instant;

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tracing::{debug, warn};
use url::Url;

use super::{groq, wire};
use crate::{
    application::content::{ContentError, ContentQuery},
    config::ContentSettings,
    domain::{
        pagination::PageRequest,
        posts::{PostDetail, PostSummary},
    },
};

/// Read-only client for the hosted GROQ query endpoint.
#[derive(Clone, Debug)]
pub struct SanityClient {
    http: Client,
    endpoint: Url,
    token: Option<String>,
}

impl SanityClient {
    pub fn new(settings: &ContentSettings) -> Result<Self, ContentError> {
        let project_id = settings
            .project_id
            .as_deref()
            .ok_or_else(|| ContentError::configuration("`content.project_id` is not set"))?;
        let host = if settings.use_cdn { "apicdn" } else { "api" };
        let base = Url::parse(&format!("https://{project_id}.{host}.sanity.io/"))
            .map_err(|err| ContentError::configuration(format!("invalid project id: {err}")))?;
        Self::with_base_url(base, settings)
    }

    /// Point the client at `base` instead of the hosted API.
    pub fn with_base_url(base: Url, settings: &ContentSettings) -> Result<Self, ContentError> {
        let endpoint = base
            .join(&format!(
                "v{}/data/query/{}",
                settings.api_version, settings.dataset
            ))
            .map_err(|err| ContentError::configuration(format!("invalid query endpoint: {err}")))?;

        let http = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ContentError::configuration(err.to_string()))?;

        Ok(Self {
            http,
            endpoint,
            token: settings.token.clone(),
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("travelora/", env!("CARGO_PKG_VERSION"))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Build the GET url for `query`. Parameters are JSON-encoded under `$name`.
    fn query_url(&self, query: &str, params: &[(&str, Value)]) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("query", query);
            for (name, value) in params {
                pairs.append_pair(&format!("${name}"), &value.to_string());
            }
        }
        url
    }

    async fn query(
        &self,
        query: &str,
        params: &[(&str, Value)],
    ) -> Result<Option<Value>, ContentError> {
        let url = self.query_url(query, params);
        let mut request = self.http.get(url);
        if let Some(token) = self.token.as_deref() {
            request = request.bearer_auth(token);
        }

        let started = Instant::now();
        let outcome = self.execute(request).await;
        histogram!("travelora_content_query_ms")
            .record(started.elapsed().as_secs_f64() * 1000.0);

        if let Err(err) = &outcome {
            counter!("travelora_content_query_error_total").increment(1);
            warn!(
                target = "travelora::sanity",
                error = %err,
                "content query failed"
            );
        }
        outcome
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<Option<Value>, ContentError> {
        let response = request
            .send()
            .await
            .map_err(|err| ContentError::transport(err.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| ContentError::transport(err.to_string()))?;

        if !status.is_success() {
            return Err(ContentError::status(
                status.as_u16(),
                error_description(status, &body),
            ));
        }

        let envelope: wire::Envelope = serde_json::from_slice(&body)
            .map_err(|err| ContentError::decode(err.to_string()))?;
        Ok(envelope.result)
    }
}

/// The store's own error description when the body carries one.
fn error_description(status: StatusCode, body: &[u8]) -> String {
    let described = serde_json::from_slice::<Value>(body).ok().and_then(|value| {
        value
            .pointer("/error/description")
            .or_else(|| value.pointer("/message"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });

    described.unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string()
    })
}

#[async_trait]
impl ContentQuery for SanityClient {
    async fn fetch_page(&self, range: PageRequest) -> Result<Vec<PostSummary>, ContentError> {
        let result = self
            .query(
                groq::PAGE_QUERY,
                &[("start", json!(range.start())), ("end", json!(range.end()))],
            )
            .await?;

        let wire::DecodedPage { posts: mut page, dropped } = wire::decode_page(result);
        if dropped > 0 && page.len() < range.len() && page.len() + dropped >= range.len() {
            warn!(
                target = "travelora::sanity",
                range = %range,
                dropped,
                "malformed records shortened a full page; the list ends here"
            );
        }
        if page.len() > range.len() {
            warn!(
                target = "travelora::sanity",
                range = %range,
                returned = page.len(),
                "store returned more posts than requested; truncating"
            );
            page.truncate(range.len());
        }
        debug!(
            target = "travelora::sanity",
            range = %range,
            returned = page.len(),
            "fetched post page"
        );
        Ok(page)
    }

    async fn fetch_post(&self, slug: &str) -> Result<Option<PostDetail>, ContentError> {
        let result = self
            .query(groq::POST_BY_SLUG_QUERY, &[("slug", json!(slug))])
            .await?;
        let detail = wire::decode_detail(result);
        debug!(
            target = "travelora::sanity",
            slug,
            found = detail.is_some(),
            "fetched post detail"
        );
        Ok(detail)
    }
}
