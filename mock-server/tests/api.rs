use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, TokenResponse, Whoami, CLIENT_ID, CLIENT_SECRET};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn get(uri: &str) -> Request<String> {
    Request::builder().uri(uri).body(String::new()).unwrap()
}

fn form_request(uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            http::header::CONTENT_TYPE,
            "application/x-www-form-urlencoded",
        )
        .body(body.to_string())
        .unwrap()
}

fn credentials(id: &str, secret: &str) -> String {
    format!("grant_type=client_credentials&client_id={id}&client_secret={secret}")
}

// --- plain responses ---

#[tokio::test]
async fn ok_returns_ok() {
    let resp = app().oneshot(get("/ok")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(&body_bytes(resp).await[..], b"ok");
}

#[tokio::test]
async fn bytes_returns_exact_length() {
    let resp = app().oneshot(get("/bytes/4096")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_bytes(resp).await.len(), 4096);
}

#[tokio::test]
async fn bytes_rejects_non_numeric_length() {
    let resp = app().oneshot(get("/bytes/lots")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn slow_eventually_answers() {
    let resp = app().oneshot(get("/slow/10")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(&body_bytes(resp).await[..], b"slow");
}

#[tokio::test]
async fn stall_sends_headers_then_first_chunk() {
    let resp = app().oneshot(get("/stall")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let mut body = resp.into_body();
    let frame = body.frame().await.unwrap().unwrap();
    assert_eq!(&frame.into_data().unwrap()[..], b"partial");

    let next = tokio::time::timeout(std::time::Duration::from_millis(50), body.frame()).await;
    assert!(next.is_err(), "stalled body should not produce more frames");
}

// --- auth ---

#[tokio::test]
async fn whoami_echoes_authorization() {
    let req = Request::builder()
        .uri("/whoami")
        .header(http::header::AUTHORIZATION, "Bearer xyz")
        .body(String::new())
        .unwrap();
    let resp = app().oneshot(req).await.unwrap();
    let who: Whoami = body_json(resp).await;
    assert_eq!(who.authorization.as_deref(), Some("Bearer xyz"));
}

#[tokio::test]
async fn whoami_without_authorization() {
    let resp = app().oneshot(get("/whoami")).await.unwrap();
    let who: Whoami = body_json(resp).await;
    assert!(who.authorization.is_none());
}

#[tokio::test]
async fn token_rejects_bad_secret() {
    let resp = app()
        .oneshot(form_request("/oauth/token", &credentials(CLIENT_ID, "wrong")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_rejects_other_grant_types() {
    let resp = app()
        .oneshot(form_request(
            "/oauth/token",
            &format!("grant_type=password&client_id={CLIENT_ID}&client_secret={CLIENT_SECRET}"),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn protected_rejects_unknown_token() {
    let req = Request::builder()
        .uri("/protected")
        .header(http::header::AUTHORIZATION, "Bearer never-issued")
        .body(String::new())
        .unwrap();
    let resp = app().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// --- issued tokens unlock /protected ---

#[tokio::test]
async fn token_lifecycle() {
    use tower::Service;

    let mut app = app().into_service();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request(
            "/oauth/token",
            &credentials(CLIENT_ID, CLIENT_SECRET),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let token: TokenResponse = body_json(resp).await;
    assert_eq!(token.token_type, "Bearer");
    assert!(!token.access_token.is_empty());

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(
            Request::builder()
                .uri("/protected")
                .header(
                    http::header::AUTHORIZATION,
                    format!("Bearer {}", token.access_token),
                )
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(&body_bytes(resp).await[..], b"granted");
}
