//! Remote client tests against a local stub of the sibling services

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::Path,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use service_resilience::config::RemoteConfig;
use service_resilience::remote::{
    CatalogSource, HttpCatalogSource, RemoteError, ServiceClient, ServiceTokenSigner,
};

// == Stub Server ==

async fn package(Path(id): Path<String>, headers: HeaderMap) -> Response {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("Bearer "));
    if !authorized {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    match id.as_str() {
        "limited" => (StatusCode::TOO_MANY_REQUESTS, [(header::RETRY_AFTER, "3")]).into_response(),
        "missing" => StatusCode::NOT_FOUND.into_response(),
        "garbled" => (StatusCode::OK, "not json").into_response(),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Json(json!({"data": {}})).into_response()
        }
        _ => Json(json!({"data": {"id": id, "price": 100}})).into_response(),
    }
}

async fn courses(Path(id): Path<String>) -> Json<Value> {
    Json(json!({"data": [{"id": "c1", "package_id": id}, {"id": "c2", "package_id": id}]}))
}

async fn enrollment_count(Path(id): Path<String>) -> Json<Value> {
    let count = if id == "c1" { 12 } else { 0 };
    Json(json!({"data": {"count": count}}))
}

async fn spawn_stub() -> SocketAddr {
    let app = Router::new()
        .route("/api/packages/:id", get(package))
        .route("/api/packages/:id/courses", get(courses))
        .route("/api/courses/:id/enrollments/count", get(enrollment_count))
        .route(
            "/api/enrollments/summary",
            get(|| async { Json(json!({"data": {"total": 40}})) }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client(addr: SocketAddr, timeout: Duration) -> ServiceClient {
    ServiceClient::new(
        "package-service",
        format!("http://{addr}"),
        timeout,
        Arc::new(ServiceTokenSigner::new("payment-service", "secret")),
    )
    .unwrap()
}

// == Tests ==

#[tokio::test]
async fn test_envelope_is_unwrapped() {
    let addr = spawn_stub().await;

    let data: Value = client(addr, Duration::from_secs(5))
        .get_data("/api/packages/p1")
        .await
        .unwrap();

    assert_eq!(data, json!({"id": "p1", "price": 100}));
}

#[tokio::test]
async fn test_rate_limit_carries_retry_after() {
    let addr = spawn_stub().await;

    let err = client(addr, Duration::from_secs(5))
        .get_data::<Value>("/api/packages/limited")
        .await
        .unwrap_err();

    assert_eq!(
        err,
        RemoteError::RateLimited {
            service: "package-service".to_string(),
            retry_after: Some(Duration::from_secs(3)),
        }
    );
}

#[tokio::test]
async fn test_not_found_maps_to_http_error() {
    let addr = spawn_stub().await;

    let err = client(addr, Duration::from_secs(5))
        .get_data::<Value>("/api/packages/missing")
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn test_bad_body_is_malformed() {
    let addr = spawn_stub().await;

    let err = client(addr, Duration::from_secs(5))
        .get_data::<Value>("/api/packages/garbled")
        .await
        .unwrap_err();

    assert!(matches!(err, RemoteError::Malformed { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let addr = spawn_stub().await;

    let err = client(addr, Duration::from_millis(100))
        .get_data::<Value>("/api/packages/slow")
        .await
        .unwrap_err();

    assert_eq!(
        err,
        RemoteError::Timeout {
            service: "package-service".to_string()
        }
    );
}

#[tokio::test]
async fn test_refused_connection_is_network_error() {
    // Bind then drop to get a port nothing listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(addr, Duration::from_secs(5))
        .get_data::<Value>("/api/packages/p1")
        .await
        .unwrap_err();

    assert!(matches!(err, RemoteError::Network { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_http_catalog_source() {
    let addr = spawn_stub().await;
    let config = RemoteConfig {
        jwt_secret: "secret".to_string(),
        course_service_url: format!("http://{addr}"),
        package_service_url: format!("http://{addr}"),
        ..RemoteConfig::default()
    };
    let source = HttpCatalogSource::from_config(&config).unwrap();

    assert_eq!(source.fetch_package("p1").await.unwrap()["price"], 100);
    assert_eq!(source.fetch_courses_in_package("p1").await.unwrap().len(), 2);
    assert_eq!(source.fetch_enrollment_count("c1").await.unwrap(), 12);
    assert_eq!(
        source.fetch_enrollment_summary().await.unwrap(),
        json!({"total": 40})
    );
}
