//! End-to-end conversations against a mock OpenAI-compatible endpoint.

use std::sync::Arc;

use bytes::Bytes;
use rill_ai::providers::openai::OpenAiCompatGateway;
use rill_ai::{Error as AiError, Gateway, GatewayStream, RequestConfig, Role};
use rill_chat::{ChatEvent, Controller, ControllerConfig, Phase, Submission, TurnStatus};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sse(fragments: &[&str]) -> String {
    let mut body = String::from(": OPENROUTER PROCESSING\n\n");
    for fragment in fragments {
        body.push_str(&format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"delta": {"content": fragment}}]})
        ));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

fn controller_for(server: &MockServer, key: Option<&str>) -> Controller {
    let gateway = OpenAiCompatGateway::with_optional_key(key.map(str::to_string))
        .with_base_url(server.uri());
    Controller::new(Arc::new(gateway), ControllerConfig::default())
}

#[tokio::test]
async fn test_two_turn_conversation() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "messages": [
                {"role": "user", "content": "Hi"},
                {"role": "assistant", "content": "Hello!"},
                {"role": "user", "content": "How are you?"}
            ]
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse(&["Fine, ", "thanks."]), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "stream": true,
            "messages": [{"role": "user", "content": "Hi"}]
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse(&["Hel", "lo!"]), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let chat = controller_for(&server, Some("sk-or-test"));
    let mut events = chat.events();

    assert_eq!(chat.submit("Hi").await, Submission::Completed);
    assert_eq!(chat.submit("How are you?").await, Submission::Completed);

    let transcript = chat.transcript();
    let contents: Vec<_> = transcript.turns().iter().map(|t| t.content.as_str()).collect();
    assert_eq!(contents, vec!["Hi", "Hello!", "How are you?", "Fine, thanks."]);
    assert!(transcript.turns().iter().all(|t| t.status == TurnStatus::Complete));
    assert!(transcript.alternation_violations().is_empty());

    let mut deltas = Vec::new();
    let mut ends = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            ChatEvent::TurnUpdate { delta, .. } => deltas.push(delta),
            ChatEvent::TurnEnd { turn } => {
                assert_eq!(turn.role, Role::Assistant);
                ends += 1;
            }
            _ => {}
        }
    }
    assert_eq!(deltas.concat(), "Hello!Fine, thanks.");
    assert_eq!(ends, 2);
}

#[tokio::test]
async fn test_rejected_request_then_recovery() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_string(r#"{"error":{"message":"No auth credentials found","code":401}}"#),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse(&["ok"]), "text/event-stream"))
        .mount(&server)
        .await;

    let chat = controller_for(&server, Some("sk-or-test"));

    let first = chat.submit("Hi").await;
    assert!(matches!(
        first,
        Submission::Failed(AiError::Gateway { status: 401, .. })
    ));
    assert_eq!(chat.phase(), Phase::Idle);

    assert_eq!(chat.submit("Hi again").await, Submission::Completed);
    let transcript = chat.transcript();
    assert_eq!(transcript.len(), 4);
    assert_eq!(transcript.turns()[1].status, TurnStatus::Errored);
    assert!(transcript.turns()[1].content.contains("No auth credentials found"));
    assert_eq!(transcript.turns()[3].content, "ok");
}

#[tokio::test]
async fn test_missing_key_never_reaches_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let chat = controller_for(&server, None);
    let outcome = chat.submit("Hi").await;
    assert!(matches!(outcome, Submission::Failed(AiError::Configuration(_))));
    assert_eq!(chat.transcript().turns()[1].status, TurnStatus::Errored);
}

/// Serves a fixed chunk sequence, then a transport failure.
struct FlakyGateway;

#[async_trait::async_trait]
impl Gateway for FlakyGateway {
    async fn open_stream(&self, _config: &RequestConfig) -> rill_ai::Result<GatewayStream> {
        let body = async_stream::stream! {
            yield Ok(Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"content\":\"half \"}}]}\n\ndata: {\"choi"));
            yield Ok(Bytes::from_static(b"ces\":[{\"delta\":{\"content\":\"an answer\"}}]}\n\n"));
            yield Err(AiError::StreamRead("connection reset by peer".into()));
        };
        Ok(GatewayStream {
            status: 200,
            body: Box::pin(body),
        })
    }
}

#[tokio::test]
async fn test_transport_failure_mid_stream() {
    let chat = Controller::new(Arc::new(FlakyGateway), ControllerConfig::default());

    let outcome = chat.submit("explain").await;
    assert!(matches!(outcome, Submission::Failed(AiError::StreamRead(_))));

    let reply = chat.transcript().turns()[1].clone();
    assert_eq!(reply.status, TurnStatus::Errored);
    assert!(reply.content.starts_with("half an answer\n\n[error: "));
    assert!(reply.content.contains("connection reset by peer"));
}
