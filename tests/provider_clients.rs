//! Provider clients against local fake upstreams

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use futures::StreamExt;
use serde_json::{Value, json};

use seaguard::SeaguardError;
use seaguard::config::{LlmConfig, MarineConfig};
use seaguard::llm::{CompletionRequest, LanguageModel, OpenAiClient, collect_text};
use seaguard::marine::{KhoaClient, MarineDataSource};
use seaguard::models::StreamChunk;
use tokio::sync::oneshot;

/// Serve `app` on an ephemeral port and return its base URL
async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn sse(body: &'static str) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/event-stream")], body)
}

async fn chat(headers: HeaderMap, body: String) -> axum::response::Response {
    let request: Value = serde_json::from_str(&body).unwrap();
    if headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) != Some("Bearer sk-test") {
        return (
            StatusCode::UNAUTHORIZED,
            axum::Json(json!({"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}})),
        )
            .into_response();
    }

    let prompt = request["messages"].as_array().unwrap().last().unwrap()["content"]
        .as_str()
        .unwrap()
        .to_string();
    if request["stream"] == true {
        return match prompt.as_str() {
            "truncate" => {
                sse("data: {\"choices\":[{\"delta\":{\"content\":\"Hal\"}}]}\n\n").into_response()
            }
            _ => sse(concat!(
                "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"High \"}}]}\n\n",
                ": keep-alive\n\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"tide\"}}]}\n\n",
                "data: [DONE]\n\n",
            ))
            .into_response(),
        };
    }

    // Echo what the request carried so tests can check the encoding
    let content = json!({
        "model": request["model"],
        "system": request["messages"][0]["content"],
        "json": request["response_format"]["type"],
        "temperature": request["temperature"],
    });
    axum::Json(json!({
        "choices": [{"message": {"role": "assistant", "content": content.to_string()}}]
    }))
    .into_response()
}

async fn openai(api_key: &str) -> OpenAiClient {
    let base_url = spawn(Router::new().route("/v1/chat/completions", post(chat))).await;
    OpenAiClient::new(&LlmConfig {
        api_key: Some(api_key.to_string()),
        base_url: format!("{base_url}/v1/"),
        model: "gpt-test".to_string(),
        max_retries: 0,
        ..LlmConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_openai_complete_encodes_request() {
    let client = openai("sk-test").await;
    let request = CompletionRequest::new("hello")
        .with_system("be brief")
        .with_json_output();

    let text = client.complete(&request).await.unwrap();
    let echoed: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(echoed["model"], "gpt-test");
    assert_eq!(echoed["system"], "be brief");
    assert_eq!(echoed["json"], "json_object");
    assert!(echoed["temperature"].is_number());
}

#[tokio::test]
async fn test_openai_stream_ends_with_done() {
    let client = openai("sk-test").await;
    let chunks: Vec<StreamChunk> = client.stream(CompletionRequest::new("tides")).collect().await;

    assert_eq!(
        chunks,
        vec![
            StreamChunk::content("High "),
            StreamChunk::content("tide"),
            StreamChunk::done(),
        ]
    );
    let text = collect_text(client.stream(CompletionRequest::new("tides"))).await.unwrap();
    assert_eq!(text, "High tide");
}

#[tokio::test]
async fn test_openai_stream_truncated() {
    let client = openai("sk-test").await;
    let chunks: Vec<StreamChunk> = client
        .stream(CompletionRequest::new("truncate"))
        .collect()
        .await;

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0], StreamChunk::content("Hal"));
    match &chunks[1] {
        StreamChunk::Error { error } => assert!(error.contains("truncated"), "{error}"),
        other => panic!("expected error chunk, got {other:?}"),
    }
}

#[tokio::test]
async fn test_openai_upstream_error_message() {
    let client = openai("sk-wrong").await;
    let err = client.complete(&CompletionRequest::new("hello")).await.unwrap_err();
    match err {
        SeaguardError::LlmProvider { status, message } => {
            assert_eq!(status, Some(401));
            assert_eq!(message, "Incorrect API key provided");
        }
        other => panic!("unexpected error {other:?}"),
    }

    // A failed stream still ends with exactly one terminal chunk
    let chunks: Vec<StreamChunk> = client.stream(CompletionRequest::new("hello")).collect().await;
    assert_eq!(chunks.len(), 1);
    assert!(matches!(&chunks[0], StreamChunk::Error { error } if error.contains("401")));
}

/// Fires its sender when the upstream response body is dropped
struct BodyDropped(Option<oneshot::Sender<()>>);

impl Drop for BodyDropped {
    fn drop(&mut self) {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(());
        }
    }
}

type DropSignal = Arc<Mutex<Option<oneshot::Sender<()>>>>;

/// Streams a token every 10ms and never finishes
async fn endless_chat(State(signal): State<DropSignal>) -> axum::response::Response {
    let guard = BodyDropped(signal.lock().unwrap().take());
    let body = futures::stream::unfold(guard, |guard| async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        let event = "data: {\"choices\":[{\"delta\":{\"content\":\"wave \"}}]}\n\n";
        Some((Ok::<_, Infallible>(event), guard))
    });
    (
        [(header::CONTENT_TYPE, "text/event-stream")],
        Body::from_stream(body),
    )
        .into_response()
}

#[tokio::test]
async fn test_dropping_stream_releases_upstream() {
    let (tx, dropped) = oneshot::channel();
    let app = Router::new()
        .route("/v1/chat/completions", post(endless_chat))
        .with_state(Arc::new(Mutex::new(Some(tx))));
    let base_url = spawn(app).await;
    let client = OpenAiClient::new(&LlmConfig {
        api_key: Some("sk-test".to_string()),
        base_url: format!("{base_url}/v1"),
        max_retries: 0,
        ..LlmConfig::default()
    })
    .unwrap();

    let mut stream = client.stream(CompletionRequest::new("forever"));
    assert_eq!(stream.next().await, Some(StreamChunk::content("wave ")));
    assert_eq!(stream.next().await, Some(StreamChunk::content("wave ")));
    drop(stream);

    tokio::time::timeout(Duration::from_secs(5), dropped)
        .await
        .expect("upstream response was not released after the stream was dropped")
        .unwrap();
}

async fn oceangrid(
    Path(data_type): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> axum::Json<Value> {
    assert_eq!(params.get("ResultType").map(String::as_str), Some("json"));
    if params.get("ServiceKey").map(String::as_str) != Some("key/with+chars") {
        return axum::Json(json!({"result": {"error": "Invalid ServiceKey"}}));
    }

    let payload = match (data_type.as_str(), params.get("ObsCode").map(String::as_str)) {
        ("ObsServiceObj", _) => json!({"result": {"data": [
            {"obs_post_id": "DT_0001", "obs_post_name": "인천", "obs_lat": "37.451", "obs_lon": "126.592",
             "data_type": "조위관측소", "obs_object": "조위,수온"},
            {"obs_post_id": "TW_0062", "obs_lat": "35.0", "obs_lon": "129.0",
             "data_type": "해수유동관측소", "obs_object": "조류"}
        ]}}),
        ("tideObs", Some("DT_0001")) => {
            assert_eq!(params.get("Date").map(String::as_str), Some("20250115"));
            json!({"result": {
                "meta": {"obs_post_id": "DT_0001"},
                "data": [{"record_time": "2025-01-15 00:00:00", "tide_level": "512"}]
            }})
        }
        _ => json!({"result": {"error": "No search data"}}),
    };
    axum::Json(payload)
}

async fn khoa(service_key: &str) -> KhoaClient {
    let app = Router::new().route("/oceangrid/{data_type}/search.do", get(oceangrid));
    let base_url = spawn(app).await;
    KhoaClient::new(&MarineConfig {
        service_key: Some(service_key.to_string()),
        base_url: format!("{base_url}/oceangrid"),
        max_retries: 0,
        ..MarineConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_khoa_station_list() {
    let client = khoa("key/with+chars").await;
    let stations = client.list_stations("ObsServiceObj").await.unwrap();

    assert_eq!(stations.len(), 2);
    assert_eq!(stations[0].code, "DT_0001");
    assert_eq!(stations[0].kind.as_deref(), Some("조위관측소"));
    let coordinate = stations[0].coordinate.unwrap();
    assert!((coordinate.latitude - 37.451).abs() < 1e-9);
    assert_eq!(stations[1].code, "TW_0062");
}

#[tokio::test]
async fn test_khoa_observation() {
    let client = khoa("key/with+chars").await;
    let payload = client
        .get_observation("DT_0001", "20250115", "tideObs")
        .await
        .unwrap();
    assert_eq!(payload["result"]["data"][0]["tide_level"], "512");
}

#[tokio::test]
async fn test_khoa_error_payloads() {
    let client = khoa("key/with+chars").await;
    let err = client
        .get_observation("DT_9999", "20250115", "tideObs")
        .await
        .unwrap_err();
    assert!(matches!(&err, SeaguardError::MarineProvider { body, .. } if body == "No search data"));

    let client = khoa("wrong").await;
    let err = client.list_stations("ObsServiceObj").await.unwrap_err();
    assert!(err.to_string().contains("Invalid ServiceKey"));
}
