//! Turns request descriptors into concrete requests.
//!
//! Resolution runs in three passes over the enumerated descriptors:
//!
//! 1. parameters and request bodies, batched through the scheduler because
//!    script-backed values may be slow;
//! 2. security, which adds headers or query values for the first security
//!    requirement of each operation;
//! 3. URL finalization, which appends the staged query values.
//!
//! Query values staged by the security pass therefore follow the parameters in
//! the final URL.
//!
//! # Examples
//!
//! ```no_run
//! use specrec_core::config::Config;
//! use specrec_core::endpoints::enumerate;
//! use specrec_core::openapi::SpecDocument;
//! use specrec_core::resolver::{ParameterResolver, ProviderContext, ScriptProvider};
//!
//! # #[tokio::main]
//! # async fn main() -> specrec_core::Result<()> {
//! let spec = SpecDocument::from_file("openapi.yaml").await?;
//! let config = Config::default();
//! let provider = ScriptProvider::new();
//! let context = ProviderContext {
//!     server_url: "http://localhost:3000".into(),
//!     base_dir: ".".into(),
//! };
//! let resolver = ParameterResolver::new(&spec, &provider, context, &config.global);
//! let requests = resolver.resolve_all(enumerate(&spec)).await?;
//! for request in &requests {
//!     println!("{} {}", request.method, request.url);
//! }
//! # Ok(())
//! # }
//! ```

mod provider;
pub mod security;

pub use provider::{resolve_source, ProviderContext, ScriptProvider, ValueProvider, ValueSource};

// Internal imports (std, crate)
use crate::config::GlobalConfig;
use crate::endpoints::RequestDescriptor;
use crate::examples::{self, EXAMPLES_KEY};
use crate::openapi::{OpenApiParameter, ParamLocation, SpecDocument};
use crate::scheduler::run_bounded;
use crate::Error;
use security::{required_schemes, value_to_string, SecurityScheme};

// External imports (alphabetized)
use futures::future::try_join_all;
use indexmap::IndexMap;
use serde_json::{Map, Value as JsonValue};

/// Resolves parameter, body and security values for descriptors of one document
pub struct ParameterResolver<'a, P: ?Sized> {
    spec: &'a SpecDocument,
    provider: &'a P,
    context: ProviderContext,
    security_values: &'a IndexMap<String, ValueSource>,
    max_concurrent: usize,
}

impl<'a, P: ValueProvider + ?Sized> ParameterResolver<'a, P> {
    pub fn new(
        spec: &'a SpecDocument,
        provider: &'a P,
        context: ProviderContext,
        config: &'a GlobalConfig,
    ) -> Self {
        Self {
            spec,
            provider,
            context,
            security_values: &config.security_schemes,
            max_concurrent: config.simultaneous_requests.max(1),
        }
    }

    pub fn context(&self) -> &ProviderContext {
        &self.context
    }

    /// Resolve every descriptor, returning finalized requests in input order
    ///
    /// The first failure aborts the batch.
    pub async fn resolve_all(
        &self,
        descriptors: Vec<RequestDescriptor>,
    ) -> crate::Result<Vec<RequestDescriptor>> {
        let tasks: Vec<_> = descriptors
            .into_iter()
            .map(|descriptor| {
                move |ordinal: usize, total: usize| async move {
                    log::debug!(
                        "Resolving {} of {}: {}",
                        ordinal,
                        total,
                        descriptor.location()
                    );
                    self.resolve(&descriptor).await
                }
            })
            .collect();

        let resolved = run_bounded(tasks, self.max_concurrent)
            .await
            .into_iter()
            .collect::<crate::Result<Vec<_>>>()?;

        let mut finalized = Vec::with_capacity(resolved.len());
        for descriptor in resolved {
            let secured = self.apply_security(descriptor).await?;
            finalized.push(finalize_url(secured));
        }
        Ok(finalized)
    }

    /// Resolve the parameters and request body of one descriptor
    ///
    /// Returns a new descriptor; the input is left as it was.
    pub async fn resolve(&self, descriptor: &RequestDescriptor) -> crate::Result<RequestDescriptor> {
        let operation = self.spec.operation(&descriptor.endpoint).ok_or_else(|| {
            Error::openapi(format!("{} is not in the document", descriptor.short_name()))
        })?;
        let example = self
            .spec
            .response(&descriptor.endpoint)
            .and_then(|response| examples::get_example(response, Some(&descriptor.example_name)));
        let parameters = self.spec.operation_parameters(operation)?;
        let mut resolved = descriptor.clone();

        if !parameters.is_empty() {
            if let Some(cookie) = parameters
                .iter()
                .find(|param| param.location == ParamLocation::Cookie)
            {
                return Err(Error::unsupported(format!(
                    "cookie parameter \"{}\" in {}",
                    cookie.name,
                    descriptor.short_name()
                )));
            }

            let entries = example
                .and_then(|e| e.get("parameters"))
                .and_then(JsonValue::as_array);
            let values = try_join_all(parameters.iter().enumerate().map(|(index, _)| {
                let location = format!("{} parameter #{}", descriptor.location(), index);
                self.resolve_entry(location, entries.and_then(|e| e.get(index)))
            }))
            .await?;

            for (param, value) in parameters.iter().zip(&values) {
                apply_parameter(&mut resolved, param, value);
            }
            resolved.resolved_params = Some(values);
        }

        if operation.get("requestBody").is_some_and(|body| !body.is_null()) {
            let location = format!("{} requestBody", descriptor.location());
            let body = self
                .resolve_entry(location, example.and_then(|e| e.get("requestBody")))
                .await?;
            resolved.request.body = Some(serde_json::to_string(&body)?);
            resolved.resolved_request_body = Some(body);
        }

        Ok(resolved)
    }

    /// Attach the values of the security schemes the operation requires
    pub async fn apply_security(
        &self,
        mut descriptor: RequestDescriptor,
    ) -> crate::Result<RequestDescriptor> {
        let Some(operation) = self.spec.operation(&descriptor.endpoint) else {
            return Ok(descriptor);
        };

        for name in required_schemes(self.spec, operation) {
            let source = self
                .security_values
                .get(&name)
                .ok_or_else(|| Error::SecurityMissing(name.clone()))?;
            let definition = self.spec.security_scheme(&name).ok_or_else(|| {
                Error::openapi(format!(
                    "Security scheme \"{}\" is not defined in components.securitySchemes",
                    name
                ))
            })?;
            let scheme = SecurityScheme::from_definition(&name, definition)?;
            let value = resolve_source(self.provider, source, &self.context)
                .await
                .map_err(|e| Error::resolution(format!("security scheme \"{}\"", name), e.to_string()))?;
            scheme.bind(&name, &value)?.apply(&mut descriptor);
        }
        Ok(descriptor)
    }

    async fn resolve_entry(
        &self,
        location: String,
        entry: Option<&JsonValue>,
    ) -> crate::Result<JsonValue> {
        let entry = entry.ok_or_else(|| {
            Error::resolution(&location, format!("no entry in {}", EXAMPLES_KEY))
        })?;
        let source = ValueSource::from_entry(entry).ok_or_else(|| {
            Error::resolution(
                &location,
                format!(
                    "{} entries must contain a `script` or `value` property. Received: {}",
                    EXAMPLES_KEY, entry
                ),
            )
        })?;
        resolve_source(self.provider, &source, &self.context)
            .await
            .map_err(|e| match e {
                Error::ParameterResolution { message, .. } => Error::resolution(location, message),
                other => Error::resolution(location, other.to_string()),
            })
    }
}

fn apply_parameter(descriptor: &mut RequestDescriptor, param: &OpenApiParameter, value: &JsonValue) {
    match param.location {
        ParamLocation::Path => {
            let placeholder = format!("{{{}}}", param.name);
            descriptor.url = descriptor.url.replacen(&placeholder, &value_to_string(value), 1);
        }
        // A null query value means the parameter is left out
        ParamLocation::Query => {
            if !value.is_null() {
                descriptor.query.insert(param.name.clone(), value.clone());
            }
        }
        ParamLocation::Header => {
            descriptor
                .request
                .headers
                .insert(param.name.clone(), value_to_string(value));
        }
        ParamLocation::Cookie => {}
    }
}

/// Append the staged query values to the URL
pub fn finalize_url(mut descriptor: RequestDescriptor) -> RequestDescriptor {
    let query = query_string(&descriptor.query);
    if !query.is_empty() {
        descriptor.url.push('?');
        descriptor.url.push_str(&query);
    }
    descriptor
}

/// Encode query values, repeating the key for each element of an array
pub fn query_string(query: &Map<String, JsonValue>) -> String {
    let mut pairs = Vec::new();
    for (key, value) in query {
        let values: Vec<&JsonValue> = match value {
            JsonValue::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        for value in values.into_iter().filter(|v| !v.is_null()) {
            pairs.push(format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(&value_to_string(value))
            ));
        }
    }
    pairs.join("&")
}
