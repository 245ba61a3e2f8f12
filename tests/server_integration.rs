//! HTTP-level tests for the function and store endpoints.
//!
//! Each test starts a fake chat-completion API on a free local port, points
//! the server at it, and talks to the server with `reqwest`.

use axum::{http::StatusCode, routing::post, Json, Router};
use decision_desk::config::{Config, Credentials};
use decision_desk::llm::HttpChatClient;
use decision_desk::server::{router, AppState};
use decision_desk::{db, migrate};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const DOG_REPLY: &str = r#"{"pros":["Companionship","Exercise motivation","Teaches responsibility"],"cons":["Cost","Time commitment","Travel limitations"]}"#;

struct FakeUpstream {
    base: String,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl FakeUpstream {
    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

/// Serves `POST /chat/completions` with a fixed status and body.
async fn fake_upstream(status: StatusCode, body: Value) -> FakeUpstream {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = requests.clone();

    let app = Router::new().route(
        "/chat/completions",
        post(move |Json(req): Json<Value>| {
            let seen = seen.clone();
            let body = body.clone();
            async move {
                seen.lock().unwrap().push(req);
                (status, Json(body))
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    FakeUpstream {
        base: format!("http://{}", addr),
        requests,
    }
}

fn completion(content: &str) -> Value {
    json!({
        "id": "chatcmpl-test",
        "choices": [
            { "index": 0, "message": { "role": "assistant", "content": content } }
        ]
    })
}

fn all_keys() -> Credentials {
    Credentials {
        openai_api_key: Some("sk-test".to_string()),
        search_api_key: Some("pplx-test".to_string()),
    }
}

/// Starts the app against `upstream` and returns `(tmp, base_url)`.
async fn start_app(upstream: &FakeUpstream, credentials: Credentials) -> (TempDir, String) {
    start_app_against(&upstream.base, credentials).await
}

async fn start_app_against(api_base: &str, credentials: Credentials) -> (TempDir, String) {
    let tmp = TempDir::new().unwrap();
    let mut cfg = Config::minimal(tmp.path().join("decide.sqlite"));
    cfg.suggestions.api_base = api_base.to_string();
    cfg.search.api_base = api_base.to_string();

    migrate::run_migrations(&cfg).await.unwrap();
    let pool = db::connect(&cfg).await.unwrap();
    let chat = Arc::new(HttpChatClient::new(None).unwrap());
    let app = router(AppState::new(cfg, credentials, pool, chat));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    (tmp, format!("http://{}", addr))
}

async fn post_json(url: &str, body: Value) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(url)
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    let body: Value = resp.json().await.unwrap_or(Value::Null);
    (status, body)
}

// ─── Suggestion function ────────────────────────────────────────────

#[tokio::test]
async fn test_suggestions_pass_through_unchanged() {
    let upstream = fake_upstream(StatusCode::OK, completion(DOG_REPLY)).await;
    let (_tmp, base) = start_app(&upstream, all_keys()).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/functions/v1/generate-suggestions", base))
        .json(&json!({ "title": "Should I adopt a dog?" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
    assert!(resp
        .headers()
        .get("access-control-allow-headers")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .contains("content-type"));

    let body: Value = resp.json().await.unwrap();
    let expected: Value = serde_json::from_str(DOG_REPLY).unwrap();
    assert_eq!(body, expected);

    let sent = upstream.requests.lock().unwrap()[0].clone();
    assert_eq!(sent["messages"][0]["role"], "system");
    assert!(sent["messages"][1]["content"]
        .as_str()
        .unwrap()
        .contains("Should I adopt a dog?"));
    assert!(sent.get("max_tokens").is_some());
    assert!(sent.get("temperature").is_some());
}

#[tokio::test]
async fn test_non_json_completion_is_500_envelope() {
    let upstream = fake_upstream(StatusCode::OK, completion("not json")).await;
    let (_tmp, base) = start_app(&upstream, all_keys()).await;

    let (status, body) = post_json(
        &format!("{}/functions/v1/generate-suggestions", base),
        json!({ "title": "X", "description": "Y" }),
    )
    .await;

    assert_eq!(status, 500);
    assert!(body["error"].is_string());
    assert!(body.get("pros").is_none());
    assert!(body.get("cons").is_none());
}

#[tokio::test]
async fn test_wrong_shape_completion_is_500_envelope() {
    let upstream = fake_upstream(StatusCode::OK, completion(r#"{"pros": "many"}"#)).await;
    let (_tmp, base) = start_app(&upstream, all_keys()).await;

    let (status, body) = post_json(
        &format!("{}/functions/v1/generate-suggestions", base),
        json!({ "title": "X" }),
    )
    .await;

    assert_eq!(status, 500);
    assert!(body["error"].as_str().unwrap().contains("unexpected shape"));
}

#[tokio::test]
async fn test_missing_openai_key_is_500_without_upstream_call() {
    let upstream = fake_upstream(StatusCode::OK, completion(DOG_REPLY)).await;
    let (_tmp, base) = start_app(&upstream, Credentials::default()).await;

    for input in [json!({ "title": "Anything" }), json!({ "title": "X", "description": "Y" })] {
        let (status, body) =
            post_json(&format!("{}/functions/v1/generate-suggestions", base), input).await;
        assert_eq!(status, 500);
        assert_eq!(body["error"], "OpenAI API key not configured");
    }
    assert_eq!(upstream.request_count(), 0);
}

#[tokio::test]
async fn test_upstream_error_status_is_500() {
    let upstream = fake_upstream(
        StatusCode::TOO_MANY_REQUESTS,
        json!({ "error": { "message": "rate limited" } }),
    )
    .await;
    let (_tmp, base) = start_app(&upstream, all_keys()).await;

    let (status, body) = post_json(
        &format!("{}/functions/v1/generate-suggestions", base),
        json!({ "title": "X" }),
    )
    .await;

    assert_eq!(status, 500);
    let msg = body["error"].as_str().unwrap();
    assert!(msg.contains("OpenAI API error"));
    assert!(msg.contains("429"));
}

#[tokio::test]
async fn test_unreachable_upstream_is_500_envelope() {
    // Nothing listens on port 1.
    let (_tmp, base) = start_app_against("http://127.0.0.1:1", all_keys()).await;

    let (status, body) = post_json(
        &format!("{}/functions/v1/generate-suggestions", base),
        json!({ "title": "Should I adopt a dog?" }),
    )
    .await;

    assert_eq!(status, 500);
    let msg = body["error"].as_str().unwrap();
    assert!(msg.starts_with("request to OpenAI failed"), "{}", msg);
    assert!(msg.contains("127.0.0.1:1"));
}

#[tokio::test]
async fn test_extra_reply_keys_pass_through() {
    let content = r#"{"pros":["a"],"cons":["b"],"summary":"lean yes"}"#;
    let upstream = fake_upstream(StatusCode::OK, completion(content)).await;
    let (_tmp, base) = start_app(&upstream, all_keys()).await;

    let (status, body) = post_json(
        &format!("{}/functions/v1/generate-suggestions", base),
        json!({ "title": "X" }),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body, serde_json::from_str::<Value>(content).unwrap());
}

#[tokio::test]
async fn test_malformed_request_body_is_500_envelope() {
    let upstream = fake_upstream(StatusCode::OK, completion(DOG_REPLY)).await;
    let (_tmp, base) = start_app(&upstream, all_keys()).await;

    let (status, body) = post_json(
        &format!("{}/functions/v1/generate-suggestions", base),
        json!({ "description": "no title" }),
    )
    .await;

    assert_eq!(status, 500);
    assert!(body["error"].is_string());
    assert_eq!(upstream.request_count(), 0);
}

#[tokio::test]
async fn test_options_is_empty_200_with_cors_headers() {
    let upstream = fake_upstream(StatusCode::OK, completion(DOG_REPLY)).await;
    let (_tmp, base) = start_app(&upstream, Credentials::default()).await;
    let client = reqwest::Client::new();

    for path in ["/functions/v1/generate-suggestions", "/functions/v1/web-search"] {
        let resp = client
            .request(reqwest::Method::OPTIONS, format!("{}{}", base, path))
            .header("Origin", "http://localhost:5173")
            .header("Access-Control-Request-Method", "POST")
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        assert_eq!(
            resp.headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
        assert!(resp.headers().contains_key("access-control-allow-headers"));
        assert!(resp.text().await.unwrap().is_empty());
    }

    // A bare OPTIONS without preflight headers is answered the same way.
    let resp = client
        .request(
            reqwest::Method::OPTIONS,
            format!("{}/functions/v1/generate-suggestions", base),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.text().await.unwrap().is_empty());
    assert_eq!(upstream.request_count(), 0);
}

// ─── Web search function ────────────────────────────────────────────

#[tokio::test]
async fn test_web_search_normalizes_answer() {
    let upstream = fake_upstream(
        StatusCode::OK,
        json!({
            "choices": [{ "message": { "role": "assistant", "content": "Dogs need daily walks." } }],
            "related_questions": ["How much does a dog cost per year?"]
        }),
    )
    .await;
    let (_tmp, base) = start_app(&upstream, all_keys()).await;

    let (status, body) = post_json(
        &format!("{}/functions/v1/web-search", base),
        json!({ "query": "dog ownership time commitment" }),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(
        body,
        json!({
            "content": "Dogs need daily walks.",
            "related_questions": ["How much does a dog cost per year?"]
        })
    );

    let sent = upstream.requests.lock().unwrap()[0].clone();
    assert_eq!(sent["return_related_questions"], true);
    assert_eq!(sent["model"], "sonar");
}

#[tokio::test]
async fn test_web_search_without_related_questions() {
    let upstream = fake_upstream(StatusCode::OK, completion("Plain answer")).await;
    let (_tmp, base) = start_app(&upstream, all_keys()).await;

    let (status, body) = post_json(
        &format!("{}/functions/v1/web-search", base),
        json!({ "query": "q" }),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["related_questions"], json!([]));
}

#[tokio::test]
async fn test_web_search_missing_key() {
    let upstream = fake_upstream(StatusCode::OK, completion("unused")).await;
    let (_tmp, base) = start_app(&upstream, Credentials::default()).await;

    let (status, body) = post_json(
        &format!("{}/functions/v1/web-search", base),
        json!({ "query": "q" }),
    )
    .await;

    assert_eq!(status, 500);
    assert_eq!(body["error"], "Perplexity API key not configured");
}

// ─── Store endpoints ────────────────────────────────────────────────

async fn register(base: &str) -> String {
    let (status, body) = post_json(&format!("{}/users", base), json!({ "display_name": "Sam" })).await;
    assert_eq!(status, 201);
    assert_eq!(body["display_name"], "Sam");
    body["user_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_decision_lifecycle_over_http() {
    let upstream = fake_upstream(StatusCode::OK, completion(DOG_REPLY)).await;
    let (_tmp, base) = start_app(&upstream, all_keys()).await;
    let client = reqwest::Client::new();
    let user = register(&base).await;

    // Missing identity.
    let resp = client.get(format!("{}/decisions", base)).send().await.unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .post(format!("{}/decisions", base))
        .header("X-User-Id", &user)
        .json(&json!({ "title": "Should I adopt a dog?", "description": "Small flat" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let decision: Value = resp.json().await.unwrap();
    let id = decision["id"].as_str().unwrap().to_string();

    let resp = client
        .post(format!("{}/decisions/{}/items", base, id))
        .header("X-User-Id", &user)
        .json(&json!({ "content": "Company on walks", "item_type": "pro" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let resp = client
        .post(format!("{}/decisions/{}/items", base, id))
        .header("X-User-Id", &user)
        .json(&json!({ "content": "Vet bills", "item_type": "maybe" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let detail: Value = client
        .get(format!("{}/decisions/{}", base, id))
        .header("X-User-Id", &user)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["title"], "Should I adopt a dog?");
    assert_eq!(detail["tally"], json!({ "pros": 1, "cons": 0 }));
    assert_eq!(detail["leaning"], "affirmative");

    // Suggestions are persisted as one batch.
    let resp = client
        .post(format!("{}/decisions/{}/suggestions", base, id))
        .header("X-User-Id", &user)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let detail: Value = resp.json().await.unwrap();
    assert_eq!(detail["items"].as_array().unwrap().len(), 7);
    assert_eq!(detail["tally"], json!({ "pros": 4, "cons": 3 }));
    assert_eq!(detail["leaning"], "affirmative");

    // Another user sees nothing.
    let other = register(&base).await;
    let resp = client
        .get(format!("{}/decisions/{}", base, id))
        .header("X-User-Id", &other)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let listed: Value = client
        .get(format!("{}/decisions", base))
        .header("X-User-Id", &other)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed, json!([]));

    let resp = client
        .delete(format!("{}/decisions/{}", base, id))
        .header("X-User-Id", &user)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let resp = client
        .get(format!("{}/decisions/{}", base, id))
        .header("X-User-Id", &user)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "decision not found");
}

#[tokio::test]
async fn test_failed_suggestions_store_nothing() {
    let upstream = fake_upstream(StatusCode::OK, completion("not json")).await;
    let (_tmp, base) = start_app(&upstream, all_keys()).await;
    let client = reqwest::Client::new();
    let user = register(&base).await;

    let decision: Value = client
        .post(format!("{}/decisions", base))
        .header("X-User-Id", &user)
        .json(&json!({ "title": "X" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = decision["id"].as_str().unwrap();

    let resp = client
        .post(format!("{}/decisions/{}/suggestions", base, id))
        .header("X-User-Id", &user)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);

    let detail: Value = client
        .get(format!("{}/decisions/{}", base, id))
        .header("X-User-Id", &user)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["items"], json!([]));
    assert_eq!(detail["leaning"], "neutral");
}

#[tokio::test]
async fn test_blank_suggestions_are_skipped_when_saving() {
    let upstream = fake_upstream(
        StatusCode::OK,
        completion(r#"{"pros":["", "Fun"],"cons":["Cost","Time","  "]}"#),
    )
    .await;
    let (_tmp, base) = start_app(&upstream, all_keys()).await;
    let client = reqwest::Client::new();
    let user = register(&base).await;

    let decision: Value = client
        .post(format!("{}/decisions", base))
        .header("X-User-Id", &user)
        .json(&json!({ "title": "Get a kayak?" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = decision["id"].as_str().unwrap();

    let resp = client
        .post(format!("{}/decisions/{}/suggestions", base, id))
        .header("X-User-Id", &user)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let detail: Value = resp.json().await.unwrap();

    let contents: Vec<&str> = detail["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["Fun", "Cost", "Time"]);
    assert_eq!(detail["tally"], json!({ "pros": 1, "cons": 2 }));
    assert_eq!(detail["leaning"], "negative");
}

#[tokio::test]
async fn test_update_decision_and_delete_item() {
    let upstream = fake_upstream(StatusCode::OK, completion(DOG_REPLY)).await;
    let (_tmp, base) = start_app(&upstream, all_keys()).await;
    let client = reqwest::Client::new();
    let user = register(&base).await;

    let decision: Value = client
        .post(format!("{}/decisions", base))
        .header("X-User-Id", &user)
        .json(&json!({ "title": "Old" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = decision["id"].as_str().unwrap();

    let updated: Value = client
        .put(format!("{}/decisions/{}", base, id))
        .header("X-User-Id", &user)
        .json(&json!({ "title": "New", "description": "more context" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(updated["title"], "New");
    assert_eq!(updated["description"], "more context");

    let item: Value = client
        .post(format!("{}/decisions/{}/items", base, id))
        .header("X-User-Id", &user)
        .json(&json!({ "content": "Cost", "item_type": "con" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let item_id = item["id"].as_str().unwrap();

    let resp = client
        .delete(format!("{}/decisions/{}/items/{}", base, id, item_id))
        .header("X-User-Id", &user)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let resp = client
        .delete(format!("{}/decisions/{}/items/{}", base, id, item_id))
        .header("X-User-Id", &user)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_health() {
    let upstream = fake_upstream(StatusCode::OK, completion("unused")).await;
    let (_tmp, base) = start_app(&upstream, Credentials::default()).await;

    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
}
