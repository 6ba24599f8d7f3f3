use auth_redirect::{
    build_app,
    config::{AuthRedirectConfig, GatewayConfig, RouteConfig, ServerConfig},
};
use axum::body::Body;
use http::{Request, StatusCode};
use tower::ServiceExt;
use wiremock::{
    matchers::{body_string, header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

fn route(path: &str, backend: &str, auth_url: Option<String>) -> RouteConfig {
    RouteConfig {
        path: path.into(),
        backend: backend.into(),
        methods: Vec::new(),
        strip_prefix: false,
        auth_redirect: auth_url.map(AuthRedirectConfig::new),
    }
}

fn gateway(routes: Vec<RouteConfig>) -> axum::Router {
    build_app(&GatewayConfig {
        server: ServerConfig::default(),
        routes,
    })
    .unwrap()
}

/// Backend, authorization service, and a gateway in front of both with an
/// open `/public/*rest` route and a gated `/api/*rest` route
async fn gated_gateway() -> (axum::Router, MockServer, MockServer) {
    let backend = MockServer::start().await;
    let auth = MockServer::start().await;

    let app = gateway(vec![
        route("/public/*rest", &backend.uri(), None),
        route(
            "/api/*rest",
            &backend.uri(),
            Some(format!("{}/auth", auth.uri())),
        ),
    ]);
    (app, backend, auth)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

async fn send(app: axum::Router, req: Request<Body>) -> (StatusCode, http::HeaderMap, String) {
    let response = app.oneshot(req).await.unwrap();
    let (parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    (
        parts.status,
        parts.headers,
        String::from_utf8(bytes.to_vec()).unwrap(),
    )
}

#[tokio::test]
async fn test_unguarded_route_skips_auth() {
    let (app, backend, auth) = gated_gateway().await;

    Mock::given(path("/public/status"))
        .respond_with(ResponseTemplate::new(200).set_body_string("up"))
        .expect(1)
        .mount(&backend)
        .await;
    Mock::given(path("/auth"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&auth)
        .await;

    let (status, _, body) = send(app, get("/public/status")).await;
    assert_eq!((status, body.as_str()), (StatusCode::OK, "up"));
}

#[tokio::test]
async fn test_authorized_get_reaches_backend() {
    let (app, backend, auth) = gated_gateway().await;

    Mock::given(method("GET"))
        .and(path("/auth"))
        .and(query_param("session", "s1"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_string("auth says ok"))
        .expect(1)
        .mount(&auth)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/invoices"))
        .and(query_param("session", "s1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("invoice list"))
        .expect(1)
        .mount(&backend)
        .await;

    let req = Request::get("/api/invoices?session=s1")
        .header("authorization", "Bearer secret")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(app, req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "invoice list");
}

#[tokio::test]
async fn test_denied_request_relays_auth_response() {
    let (app, backend, auth) = gated_gateway().await;

    Mock::given(path("/auth"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("X-Reason", "blocked")
                .set_body_raw(r#"{"error":"denied"}"#, "application/json"),
        )
        .expect(1)
        .mount(&auth)
        .await;
    Mock::given(path("/api/invoices"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&backend)
        .await;

    let (status, headers, body) = send(app, get("/api/invoices")).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(headers["x-reason"], "blocked");
    assert_eq!(headers["content-type"], "application/json");
    assert_eq!(body, r#"{"error":"denied"}"#);
}

#[tokio::test]
async fn test_post_body_reaches_auth_and_backend() {
    let (app, backend, auth) = gated_gateway().await;
    let payload = r#"{"amount":120,"currency":"EUR"}"#;

    Mock::given(method("POST"))
        .and(path("/auth"))
        .and(body_string(payload))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&auth)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/payments"))
        .and(body_string(payload))
        .respond_with(ResponseTemplate::new(201).set_body_string("payment 7"))
        .expect(1)
        .mount(&backend)
        .await;

    let req = Request::post("/api/payments")
        .header("content-type", "application/json")
        .body(Body::from(payload))
        .unwrap();
    let (status, _, body) = send(app, req).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, "payment 7");
}

#[tokio::test]
async fn test_strip_prefix_forwards_path_after_route_prefix() {
    let backend = MockServer::start().await;
    let auth = MockServer::start().await;

    Mock::given(path("/auth"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&auth)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("user 1"))
        .expect(1)
        .mount(&backend)
        .await;

    let mut api = route(
        "/api/*rest",
        &backend.uri(),
        Some(format!("{}/auth", auth.uri())),
    );
    api.strip_prefix = true;

    let (status, _, body) = send(gateway(vec![api]), get("/api/users/1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "user 1");
}

#[tokio::test]
async fn test_unreachable_auth_service_is_bad_gateway() {
    let backend = MockServer::start().await;

    let unused = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let auth_url = format!("http://{}/auth", unused.local_addr().unwrap());
    drop(unused);

    Mock::given(path("/api/invoices"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&backend)
        .await;

    let app = gateway(vec![route("/api/*rest", &backend.uri(), Some(auth_url))]);
    let (status, _, body) = send(app, get("/api/invoices")).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let body: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["status"], 502);
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let (app, _backend, auth) = gated_gateway().await;
    Mock::given(path("/auth"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&auth)
        .await;

    let (status, _, _) = send(app, get("/elsewhere")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[test]
fn test_empty_auth_url_blocks_startup() {
    let config = GatewayConfig {
        server: ServerConfig::default(),
        routes: vec![
            route(
                "/ok",
                "http://localhost:3000",
                Some("http://localhost:4000/auth".into()),
            ),
            route("/broken", "http://localhost:3000", Some(String::new())),
        ],
    };

    assert!(config.validate().is_err());
    assert!(build_app(&config).is_err());
}
