//! End-to-end request handling over a real socket.

use std::fs;

use chrono::Utc;
use config_server::audit::{EventType, Status};
use config_server::auth::Claims;
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::Value;

mod common;

use common::{start_server, token, SECRET};

#[tokio::test]
async fn test_returns_value_as_json() {
    let server = start_server(|_, _| {}).await;

    let res = server.get("/sample/development/version").await;
    assert_eq!(res.status(), StatusCode::OK);

    let headers = res.headers();
    assert_eq!(headers["content-type"], "application/json");
    assert_eq!(headers["content-security-policy"], "default-src 'self'");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["x-xss-protection"], "1; mode=block");
    assert!(headers.contains_key("x-request-id"));

    let body: Value = res.json().await.unwrap();
    assert_eq!(body, serde_json::json!({ "version": "1.0" }));

    server.stop().await;
}

#[tokio::test]
async fn test_environment_does_not_partition_values() {
    let server = start_server(|_, _| {}).await;

    for env in ["development", "staging", "production"] {
        let res = server.get(&format!("/sample/{}/feature_1", env)).await;
        assert_eq!(res.status(), StatusCode::OK, "{}", env);
        assert_eq!(res.text().await.unwrap(), r#"{"feature_1":"true"}"#);
    }

    server.stop().await;
}

#[tokio::test]
async fn test_not_found_cases() {
    let server = start_server(|_, _| {}).await;

    let res = server.get("/sample/qa/version").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.text().await.unwrap(), "Environment not supported");

    for path in ["/unknown/production/version", "/sample/production/missing"] {
        let res = server.get(path).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND, "{}", path);
        assert_eq!(res.text().await.unwrap(), "Configuration not found");
    }

    let denied = server.sink.of_type(EventType::ConfigAccess);
    assert_eq!(denied.len(), 3);
    assert!(denied.iter().all(|e| e.status == Status::Denied));
    assert_eq!(denied[1].details["reason"], "product not found");
    assert_eq!(denied[2].details["reason"], "key not found");

    server.stop().await;
}

#[tokio::test]
async fn test_malformed_paths() {
    let server = start_server(|_, _| {}).await;

    for path in ["/", "/sample", "/sample/development", "/sample/development/version/extra"] {
        let res = server.get(path).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{}", path);
        assert_eq!(res.text().await.unwrap(), "Invalid request path");
    }

    server.stop().await;
}

#[tokio::test]
async fn test_token_is_required_and_checked() {
    let server = start_server(|_, _| {}).await;
    let url = server.url("/sample/development/version");

    let res = server.client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = server.client.get(&url).header("Authorization", "Basic abc").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let forged = config_server::auth::issue_token("other-secret", "mallory", std::time::Duration::from_secs(60)).unwrap();
    let res = server.client.get(&url).bearer_auth(forged).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let expired = encode(
        &Header::default(),
        &Claims {
            user_id: Some("alice".into()),
            sub: None,
            exp: Utc::now().timestamp() - 3_600,
        },
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();
    let res = server.client.get(&url).bearer_auth(expired).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = server.client.get(&url).bearer_auth(token("bob")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let auth = server.sink.of_type(EventType::Auth);
    assert_eq!(auth.iter().filter(|e| e.status == Status::Failed).count(), 4);
    let success: Vec<_> = auth.iter().filter(|e| e.status == Status::Success).collect();
    assert_eq!(success.len(), 1);
    assert_eq!(success[0].user_id.as_deref(), Some("bob"));

    server.stop().await;
}

#[tokio::test]
async fn test_token_with_only_expiry_is_accepted() {
    let server = start_server(|_, _| {}).await;
    let now = Utc::now().timestamp();
    let bare = encode(
        &Header::default(),
        &serde_json::json!({ "exp": now + 3_600, "iat": now }),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();

    let res = server
        .client
        .get(server.url("/sample/development/version"))
        .bearer_auth(bare)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), r#"{"version":"1.0"}"#);

    let auth = server.sink.of_type(EventType::Auth);
    assert_eq!(auth[0].status, Status::Success);
    assert_eq!(auth[0].user_id.as_deref(), Some(""));

    server.stop().await;
}

#[tokio::test]
async fn test_client_outside_allow_list_is_forbidden() {
    let server = start_server(|root, _| {
        fs::write(root.join("allowed_ips.txt"), "10.1.2.3\n").unwrap();
    })
    .await;

    let res = server.get("/sample/development/version").await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(res.text().await.unwrap(), "IP not allowed");
    assert_eq!(server.sink.of_type(EventType::IpFilter)[0].client_ip, "127.0.0.1");
    assert!(server.sink.of_type(EventType::Auth).is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_listed_client_is_served() {
    let server = start_server(|root, _| {
        fs::write(root.join("allowed_ips.txt"), "# local\n127.0.0.1 # loopback\n").unwrap();
    })
    .await;

    let res = server.get("/sample/development/version").await;
    assert_eq!(res.status(), StatusCode::OK);

    server.stop().await;
}

#[tokio::test]
async fn test_rate_limit_applies_before_authentication() {
    let server = start_server(|_, config| {
        config.rate_limit.capacity = 2;
        config.rate_limit.refill_per_second = 1;
    })
    .await;
    let url = server.url("/sample/development/version");

    assert_eq!(server.get("/sample/development/version").await.status(), StatusCode::OK);
    assert_eq!(server.get("/sample/development/version").await.status(), StatusCode::OK);

    // no token at all: still rate limited rather than unauthorized
    let res = server.client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.text().await.unwrap(), "Too Many Requests");

    tokio::time::sleep(std::time::Duration::from_millis(1_100)).await;
    assert_eq!(server.get("/sample/development/version").await.status(), StatusCode::OK);

    server.stop().await;
}

#[tokio::test]
async fn test_only_get_is_routed() {
    let server = start_server(|_, _| {}).await;

    let res = server
        .client
        .post(server.url("/sample/development/version"))
        .bearer_auth(token("alice"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);

    server.stop().await;
}

#[tokio::test]
async fn test_every_request_is_audited() {
    let server = start_server(|_, _| {}).await;

    server.get("/sample/development/version").await;
    server.get("/sample/development/nope").await;

    let requests = server.sink.of_type(EventType::Request);
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].status, Status::Success);
    assert_eq!(requests[0].details["path"], "/sample/development/version");
    assert_eq!(requests[0].details["method"], "GET");
    assert_eq!(requests[1].status, Status::Failed);
    assert_eq!(requests[1].details["status"], 404);

    server.stop().await;
}
