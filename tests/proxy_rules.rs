// Forwarding rules against a real upstream listening on an ephemeral port.
#[cfg(test)]
mod test {
    use std::{sync::Arc, time::Duration};

    use axum::{
        Router,
        body::{Body, Bytes},
        extract::RawQuery,
        http::{HeaderMap, Method, Request, StatusCode, header},
        response::IntoResponse,
        routing::{self, any},
    };
    use service_bus::{
        AdapterServer, FileSystemAdapter, HttpClientAdapter, HttpHandler, RuleExecutor,
        TemplateCache,
        config::{Settings, parse_config},
        utils::graceful_shutdown::{GracefulShutdown, ShutdownReason},
    };
    use tokio::net::TcpListener;
    use tower::ServiceExt;

    /// Echoes what it received: method, query, content type and body.
    async fn spawn_upstream() -> String {
        let app = Router::new()
            .route(
                "/post",
                any(
                    |method: Method,
                     RawQuery(query): RawQuery,
                     headers: HeaderMap,
                     body: Bytes| async move {
                        let content_type = headers
                            .get(header::CONTENT_TYPE)
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("")
                            .to_string();
                        (
                            StatusCode::OK,
                            [
                                ("x-upstream-method", method.to_string()),
                                ("x-upstream-query", query.unwrap_or_default()),
                                ("x-upstream-content-type", content_type),
                                ("content-type", "application/xml".to_string()),
                            ],
                            body,
                        )
                            .into_response()
                    },
                ),
            )
            .route(
                "/slow",
                routing::get(|| async {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    "late"
                }),
            )
            .route(
                "/missing",
                routing::get(|| async { (StatusCode::NOT_FOUND, "upstream says no") }),
            );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn handler_for(document: &str, settings: Settings) -> Arc<HttpHandler> {
        let config = parse_config(document.as_bytes()).unwrap();
        let executor = Arc::new(RuleExecutor::new(Arc::new(TemplateCache::new(Arc::new(
            FileSystemAdapter::new(),
        )))));
        let client = Arc::new(HttpClientAdapter::new(settings.proxy_timeout).unwrap());
        Arc::new(HttpHandler::new(&config.adapters[0], executor, client, &settings).unwrap())
    }

    fn forward_rule(url: &str, method: &str, headers: &[&str], data: &str) -> String {
        serde_json::json!({
            "adapters": [{
                "name": "proxy",
                "port": 7000,
                "rules": [{
                    "from": {"path": "/forward", "http-method": "GET"},
                    "to": {"url": url, "http-method": method, "headers": headers, "data": data}
                }]
            }]
        })
        .to_string()
    }

    async fn call(
        handler: Arc<HttpHandler>,
        request: Request<Body>,
    ) -> (StatusCode, HeaderMap, Bytes) {
        let response = handler.router().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_query_parameters_are_appended() {
        let upstream = spawn_upstream().await;
        let handler = handler_for(
            &forward_rule(&format!("{upstream}/post?p=2"), "POST", &[], ""),
            Settings::default(),
        );

        let (status, headers, _) = call(handler, get("/forward?p=1&q=x")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["x-upstream-method"], "POST");
        assert_eq!(headers["x-upstream-query"], "p=2&p=1&q=x");
    }

    #[tokio::test]
    async fn test_rendered_body_and_headers_are_forwarded() {
        let upstream = spawn_upstream().await;
        let handler = handler_for(
            &forward_rule(
                &format!("{upstream}/post"),
                "PUT",
                &["Content-Type: text/xml"],
                "<test>%QUERY[v]%</test>",
            ),
            Settings::default(),
        );

        let (status, headers, body) = call(handler, get("/forward?v=post")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["x-upstream-method"], "PUT");
        assert_eq!(headers["x-upstream-content-type"], "text/xml");
        assert_eq!(headers[header::CONTENT_TYPE], "application/xml");
        assert_eq!(&body[..], b"<test>post</test>");
    }

    #[tokio::test]
    async fn test_request_body_feeds_the_outbound_payload() {
        let upstream = spawn_upstream().await;
        let handler = handler_for(
            &forward_rule(
                &format!("{upstream}/post"),
                "POST",
                &["Content-Type: application/json"],
                r#"{"id": "%REGEX[<id>([^<]+)</id>][1]%", "raw": "%BODY%"}"#,
            ),
            Settings::default(),
        );

        let request = Request::builder()
            .method(Method::POST)
            .uri("/forward")
            .body(Body::from("<id>abc</id>"))
            .unwrap();
        let (_, _, body) = call(handler, request).await;
        assert_eq!(&body[..], br#"{"id": "abc", "raw": "<id>abc</id>"}"#);
    }

    #[tokio::test]
    async fn test_empty_method_defaults_to_get() {
        let upstream = spawn_upstream().await;
        let handler = handler_for(
            &forward_rule(&format!("{upstream}/post"), "", &[], ""),
            Settings::default(),
        );

        let (_, headers, _) = call(handler, get("/forward")).await;
        assert_eq!(headers["x-upstream-method"], "GET");
    }

    #[tokio::test]
    async fn test_successful_exchange_answers_ok_by_default() {
        let upstream = spawn_upstream().await;
        let handler = handler_for(
            &forward_rule(&format!("{upstream}/missing"), "GET", &[], ""),
            Settings::default(),
        );

        let (status, _, body) = call(handler, get("/forward")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"upstream says no");
    }

    #[tokio::test]
    async fn test_upstream_status_is_relayed_when_enabled() {
        let upstream = spawn_upstream().await;
        let settings = Settings {
            relay_upstream_status: true,
            ..Settings::default()
        };
        let handler = handler_for(
            &forward_rule(&format!("{upstream}/missing"), "GET", &[], ""),
            settings,
        );

        let (status, _, body) = call(handler, get("/forward")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(&body[..], b"upstream says no");
    }

    #[tokio::test]
    async fn test_legacy_charset_query_reaches_upstream_unchanged() {
        let upstream = spawn_upstream().await;
        let handler = handler_for(
            &forward_rule(&format!("{upstream}/post"), "POST", &[], "%QUERY[q]%"),
            Settings::default(),
        );

        let (_, headers, body) = call(handler, get("/forward?q=%EF%F0%E8")).await;
        assert_eq!(headers["x-upstream-query"], "q=%EF%F0%E8");
        assert_eq!(&body[..], b"\xEF\xF0\xE8");
    }

    #[tokio::test]
    async fn test_unreachable_upstream_yields_error_json() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let handler = handler_for(
            &forward_rule(&format!("http://{addr}/post"), "POST", &[], "x"),
            Settings::default(),
        );

        let (status, headers, body) = call(handler, get("/forward")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let upstream = spawn_upstream().await;
        let settings = Settings {
            proxy_timeout: Duration::from_millis(100),
            upstream_error_status: 504,
            ..Settings::default()
        };
        let handler = handler_for(
            &forward_rule(&format!("{upstream}/slow"), "GET", &[], ""),
            settings,
        );

        let (status, _, body) = call(handler, get("/forward")).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["error"].as_str().unwrap().contains("Timeout"));
    }

    #[tokio::test]
    async fn test_adapter_server_forwards_over_the_network() {
        let upstream = spawn_upstream().await;
        let document = forward_rule(
            &format!("{upstream}/post"),
            "POST",
            &["Content-Type: text/plain"],
            "hello %QUERY[who]%",
        );
        let config = parse_config(document.as_bytes()).unwrap();
        let handler = handler_for(&document, Settings::default());
        let server = AdapterServer::new(&config.adapters[0], handler, "127.0.0.1");

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = GracefulShutdown::new();
        let running = tokio::spawn(server.serve(listener, shutdown.shutdown_token()));

        let response = reqwest::get(format!("http://{addr}/forward?who=world"))
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(response.headers()["x-upstream-query"], "who=world");
        assert_eq!(response.text().await.unwrap(), "hello world");

        shutdown.trigger_shutdown(ShutdownReason::Graceful);
        tokio::time::timeout(Duration::from_secs(5), running)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
