//! Sending resolved requests to the server under test.
//!
//! The [`HttpInvoker`] trait is the seam between the workflows and the network;
//! [`ReqwestInvoker`] is the implementation used by the CLI. [`fetch_responses`]
//! runs a batch through the scheduler and never fails as a whole: a request that
//! could not be sent becomes an error-shaped [`FetchedResponse`].

// Internal imports (std, crate)
use crate::endpoints::{RequestConfig, RequestDescriptor};
use crate::scheduler::run_bounded;
use crate::Error;

// External imports (alphabetized)
use futures::future::BoxFuture;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use serde_json::Value as JsonValue;

/// Status and decoded body of a response
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// JSON body; `null` when empty, a string when the body is not JSON
    pub body: JsonValue,
}

/// Performs one HTTP request
pub trait HttpInvoker: Send + Sync {
    fn invoke<'a>(
        &'a self,
        url: &'a str,
        request: &'a RequestConfig,
    ) -> BoxFuture<'a, crate::Result<HttpResponse>>;
}

/// [`HttpInvoker`] backed by a shared `reqwest` client
#[derive(Debug, Clone, Default)]
pub struct ReqwestInvoker {
    client: Client,
}

impl ReqwestInvoker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HttpInvoker for ReqwestInvoker {
    fn invoke<'a>(
        &'a self,
        url: &'a str,
        request: &'a RequestConfig,
    ) -> BoxFuture<'a, crate::Result<HttpResponse>> {
        Box::pin(async move {
            let method = Method::from_bytes(request.method.to_uppercase().as_bytes())
                .map_err(|e| Error::unsupported(format!("HTTP method {}: {}", request.method, e)))?;

            let mut builder = self.client.request(method, url);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = &request.body {
                let has_content_type = request
                    .headers
                    .keys()
                    .any(|name| name.eq_ignore_ascii_case(CONTENT_TYPE.as_str()));
                if !has_content_type {
                    builder = builder.header(CONTENT_TYPE, "application/json");
                }
                builder = builder.body(body.clone());
            }

            let response = builder.send().await?;
            let status = response.status().as_u16();
            let text = response.text().await?;
            Ok(HttpResponse {
                status,
                body: parse_body(&text),
            })
        })
    }
}

/// Decode a response body leniently
pub fn parse_body(text: &str) -> JsonValue {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return JsonValue::Null;
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| JsonValue::String(text.to_string()))
}

/// Absolute URL of a descriptor on `server_url`
pub fn request_url(server_url: &str, descriptor: &RequestDescriptor) -> String {
    format!("{}{}", server_url.trim_end_matches('/'), descriptor.url)
}

/// A descriptor together with what the server answered
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub descriptor: RequestDescriptor,
    /// The response, or why none could be obtained
    pub outcome: Result<HttpResponse, String>,
}

/// Send every descriptor, at most `max_concurrent` at a time, keeping input order
pub async fn fetch_responses<I: HttpInvoker + ?Sized>(
    invoker: &I,
    server_url: &str,
    descriptors: Vec<RequestDescriptor>,
    max_concurrent: usize,
) -> Vec<FetchedResponse> {
    let tasks: Vec<_> = descriptors
        .into_iter()
        .map(|descriptor| {
            move |ordinal: usize, total: usize| async move {
                let url = request_url(server_url, &descriptor);
                log::info!(
                    "Fetching {} of {}: {} {}",
                    ordinal,
                    total,
                    url,
                    descriptor.method.to_uppercase()
                );
                let outcome = invoker
                    .invoke(&url, &descriptor.request)
                    .await
                    .map_err(|e| {
                        log::error!("Request failed - {}: {}", descriptor.short_name(), e);
                        e.to_string()
                    });
                FetchedResponse { descriptor, outcome }
            }
        })
        .collect();

    run_bounded(tasks, max_concurrent).await
}
