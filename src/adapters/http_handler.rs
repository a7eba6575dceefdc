use std::sync::Arc;

use axum::{
    Router,
    body::{Body, Bytes},
    extract::Request,
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::any,
};
use eyre::Result;
use tower_http::trace::TraceLayer;
use url::Url;

use crate::{
    config::{
        models::{AdapterConfig, HEALTH_CHECK_PATH, split_header_line},
        settings::Settings,
    },
    core::{EndpointTable, IncomingRequest, ProxyTarget, RuleExecutor},
    ports::http_client::{HttpClient, HttpClientError, OutboundRequest, UpstreamResponse},
};

/// Body of every `/health-check` response.
pub const HEALTH_CHECK_BODY: &str = r#"{"alive": true}"#;

const NOT_FOUND_BODY: &str = "404 page not found\n";

/// Upstream headers describing the upstream connection's framing; the server
/// recomputes them for the client.
const HOP_BY_HOP: [HeaderName; 3] = [
    header::TRANSFER_ENCODING,
    header::CONNECTION,
    header::CONTENT_LENGTH,
];

/// Request handler for one adapter.
pub struct HttpHandler {
    adapter: String,
    endpoints: Arc<EndpointTable>,
    executor: Arc<RuleExecutor>,
    http_client: Arc<dyn HttpClient>,
    max_body_bytes: usize,
    upstream_error_status: StatusCode,
    relay_upstream_status: bool,
}

impl HttpHandler {
    pub fn new(
        adapter: &AdapterConfig,
        executor: Arc<RuleExecutor>,
        http_client: Arc<dyn HttpClient>,
        settings: &Settings,
    ) -> Result<Self> {
        Ok(Self {
            adapter: adapter.display_name(),
            endpoints: Arc::new(EndpointTable::new(&adapter.rules)),
            executor,
            http_client,
            max_body_bytes: settings.max_body_bytes,
            upstream_error_status: settings.upstream_error_status()?,
            relay_upstream_status: settings.relay_upstream_status,
        })
    }

    pub fn endpoints(&self) -> &EndpointTable {
        &self.endpoints
    }

    /// Axum router serving the health check and every configured endpoint.
    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route(HEALTH_CHECK_PATH, any(health_check))
            .fallback(move |req: Request| {
                let handler = self.clone();
                async move { handler.handle_request(req).await }
            })
            .layer(TraceLayer::new_for_http())
    }

    /// Main request handler: resolve the endpoint, run its chain, respond.
    pub async fn handle_request(&self, req: Request) -> Response {
        let (parts, body) = req.into_parts();

        let Some(endpoint) = self.endpoints.find(parts.uri.path()) else {
            tracing::debug!(adapter = %self.adapter, "No endpoint for {}", parts.uri.path());
            return (StatusCode::NOT_FOUND, NOT_FOUND_BODY).into_response();
        };

        tracing::info!(
            adapter = %self.adapter,
            endpoint = endpoint.path(),
            "Handling {} request to {}",
            parts.method,
            parts.uri
        );

        let body = match axum::body::to_bytes(body, self.max_body_bytes).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(adapter = %self.adapter, "Failed to buffer request body: {}", e);
                return (StatusCode::PAYLOAD_TOO_LARGE, "request body too large\n").into_response();
            }
        };

        let request = IncomingRequest::from_parts(&parts.method, &parts.uri, &parts.headers, body);
        let outcome = self.executor.execute(endpoint.rules(), &request).await;

        match outcome.forward {
            None => local_response(&outcome.headers, outcome.body),
            Some(target) => self.proxy(&target, &request, outcome.body).await,
        }
    }

    async fn proxy(
        &self,
        target: &ProxyTarget,
        request: &IncomingRequest,
        body: Bytes,
    ) -> Response {
        let outbound = match build_outbound(target, request, body) {
            Ok(outbound) => outbound,
            Err(e) => {
                tracing::error!(adapter = %self.adapter, "Failed to build upstream request: {}", e);
                return self.upstream_error(&e);
            }
        };

        match self.http_client.send_request(outbound).await {
            Ok(upstream) => relay(upstream, self.relay_upstream_status),
            Err(e) => {
                tracing::error!(adapter = %self.adapter, "Upstream request failed: {}", e);
                self.upstream_error(&e)
            }
        }
    }

    fn upstream_error(&self, err: &HttpClientError) -> Response {
        let body = serde_json::json!({ "error": err.to_string() }).to_string();
        let mut response = Response::new(Body::from(body));
        *response.status_mut() = self.upstream_error_status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        response
    }
}

async fn health_check() -> Response {
    (
        [(header::CONTENT_TYPE, "application/json")],
        HEALTH_CHECK_BODY,
    )
        .into_response()
}

fn local_response(headers: &[String], body: Bytes) -> Response {
    let mut response = Response::new(Body::from(body));
    apply_header_lines(response.headers_mut(), headers);
    response
}

/// Set each `Name: Value` line on `headers`, replacing earlier values of the same name.
fn apply_header_lines(headers: &mut HeaderMap, lines: &[String]) {
    for line in lines {
        let Some((name, value)) = split_header_line(line) else {
            tracing::warn!("Skipping header line without ':': {}", line);
            continue;
        };
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::warn!("Skipping invalid header line: {}", line),
        }
    }
}

/// Outbound request for `target`: the original query values are appended to
/// the configured URL and the configured headers replace same-named ones.
fn build_outbound(
    target: &ProxyTarget,
    request: &IncomingRequest,
    body: Bytes,
) -> Result<OutboundRequest, HttpClientError> {
    let method = if target.http_method.is_empty() {
        Method::GET
    } else {
        Method::from_bytes(target.http_method.as_bytes()).map_err(|_| {
            HttpClientError::InvalidRequest(format!(
                "invalid HTTP method '{}'",
                target.http_method
            ))
        })?
    };

    let mut url = Url::parse(&target.url).map_err(|e| {
        HttpClientError::InvalidRequest(format!("invalid upstream URL '{}': {e}", target.url))
    })?;
    append_raw_query(&mut url, &request.raw_query);

    let mut headers = HeaderMap::new();
    apply_header_lines(&mut headers, &target.headers);

    Ok(OutboundRequest {
        method,
        url,
        headers,
        body,
    })
}

/// Append the inbound `name=value` segments to `url` without re-encoding them,
/// after any query the configured URL already carries.
fn append_raw_query(url: &mut Url, raw_query: &str) {
    let segments: Vec<&str> = url
        .query()
        .into_iter()
        .chain(raw_query.split('&'))
        .filter(|segment| !segment.is_empty())
        .collect();
    if segments.is_empty() {
        return;
    }
    let query = segments.join("&");
    url.set_query(Some(&query));
}

/// Client response carrying the upstream headers and body. The status is
/// `200 OK` unless `relay_status` asks for the upstream one.
fn relay(upstream: UpstreamResponse, relay_status: bool) -> Response {
    let mut response = Response::new(Body::from(upstream.body));
    if relay_status {
        *response.status_mut() = upstream.status;
    }

    let headers = response.headers_mut();
    for (name, value) in upstream.headers.iter() {
        if HOP_BY_HOP.contains(name) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    response
}
