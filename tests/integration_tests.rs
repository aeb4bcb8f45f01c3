//! Integration tests for the confab library.
//! The live backend test requires CONFAB_BACKEND_URL in the environment.

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use confab::chat::{BACKEND_ERROR_MESSAGE, ChatConfig, ChatManager, Renderer, TurnOutcome};
    use confab::{
        BackendClient, ChatRequest, ChatResponse, CompletionClient, Error, FileStorage,
        HistoryStorage, Message, Provider, Result, SessionStore, store::HISTORY_KEY,
    };

    struct Script(Mutex<VecDeque<Result<String>>>);

    impl Script {
        fn new(replies: impl IntoIterator<Item = Result<String>>) -> Self {
            Self(Mutex::new(replies.into_iter().collect()))
        }
    }

    #[async_trait::async_trait]
    impl CompletionClient for Script {
        async fn complete(&self, _request: &ChatRequest) -> Result<ChatResponse> {
            let reply = self
                .0
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::connection("script exhausted", None)));
            reply.map(|response| ChatResponse { response })
        }
    }

    struct Quiet;

    impl Renderer for Quiet {
        fn print_reveal(&mut self, _frame: &str) {}
        fn finish_response(&mut self, _message: &Message) {}
        fn print_error(&mut self, _error: &str) {}
        fn print_info(&mut self, _info: &str) {}
        fn print_interrupted(&mut self) {}
    }

    fn config(dir: &std::path::Path) -> ChatConfig {
        ChatConfig::new()
            .with_history_dir(dir)
            .with_reveal_interval(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn history_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());

        let manager = ChatManager::open(Script::new([Ok("Hi there".to_string())]), &config).unwrap();
        let TurnOutcome::Committed(session) = manager.submit("Hello", &mut Quiet).await.unwrap()
        else {
            panic!("turn not committed");
        };
        drop(manager);

        let manager = ChatManager::open(Script::new([Ok("Again".to_string())]), &config).unwrap();
        assert_eq!(manager.history(), vec![session.clone()]);
        assert_eq!(manager.current_id(), None);

        manager.load_session(&session.id).unwrap();
        manager.submit("One more", &mut Quiet).await.unwrap();
        let history = manager.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, session.id);
        assert_eq!(history[0].title, "Hello");
        assert_eq!(history[0].messages.len(), 4);
    }

    #[tokio::test]
    async fn failed_turn_is_persisted_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let manager = ChatManager::open(
            Script::new([Err(Error::timeout("too slow", Some(1.0)))]),
            &config,
        )
        .unwrap();

        let outcome = manager.submit("ping", &mut Quiet).await.unwrap();
        assert!(matches!(outcome, TurnOutcome::Failed(_)));

        let raw = FileStorage::new(dir.path())
            .load(HISTORY_KEY)
            .unwrap()
            .unwrap();
        let saved: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let messages = saved[0]["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[1]["content"], BACKEND_ERROR_MESSAGE);
        assert_eq!(messages[1]["model"], "gpt-3.5-turbo");
        assert!(saved[0]["timestamp"].is_i64());
    }

    #[tokio::test]
    async fn deleting_sessions_rewrites_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let manager = ChatManager::open(
            Script::new([Ok("a".to_string()), Ok("b".to_string())]),
            &config,
        )
        .unwrap();
        manager.submit("first", &mut Quiet).await.unwrap();
        manager.start_new_chat().unwrap();
        manager.submit("second", &mut Quiet).await.unwrap();
        let doomed = manager.history()[1].id.clone();

        manager.delete_session(&doomed).unwrap();

        let reopened = SessionStore::open(FileStorage::new(dir.path())).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.list_sessions()[0].title, "second");
    }

    /// Serves one canned HTTP response and returns the request it received.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())?
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length || n == 0 {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });
        (base, server)
    }

    #[tokio::test]
    async fn backend_client_posts_the_conversation() {
        let (base, server) = serve_once("200 OK", r#"{"response":"Hello back"}"#).await;
        let client = BackendClient::new(Some(base)).unwrap();
        let request = ChatRequest::new(
            &[
                Message::user("Hello"),
                Message::assistant("Hi", "gpt2"),
                Message::user("Again"),
            ],
            Provider::HuggingFace,
            "gpt2",
        );

        let response = client.complete(&request).await.unwrap();
        assert_eq!(response.response, "Hello back");

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /chat HTTP/1.1"), "request was: {raw}");
        let body = &raw[raw.find("\r\n\r\n").unwrap() + 4..];
        let body: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "messages": [
                    {"role": "user", "content": "Hello"},
                    {"role": "assistant", "content": "Hi"},
                    {"role": "user", "content": "Again"},
                ],
                "provider": "huggingface",
                "model": "gpt2",
            })
        );
    }

    #[tokio::test]
    async fn backend_client_rejects_other_shapes() {
        let (base, _server) = serve_once("200 OK", r#"{"text":"wrong field"}"#).await;
        let client = BackendClient::new(Some(base)).unwrap();
        let request = ChatRequest::new(&[Message::user("hi")], Provider::Local, "local-mock");
        let err = client.complete(&request).await.unwrap_err();
        assert!(err.is_request_failure(), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn backend_client_reports_status_codes() {
        let (base, _server) = serve_once("500 Internal Server Error", r#"{"detail":"boom"}"#).await;
        let client = BackendClient::new(Some(base)).unwrap();
        let request = ChatRequest::new(&[Message::user("hi")], Provider::Local, "local-mock");
        let err = client.complete(&request).await.unwrap_err();
        assert_eq!(err.status_code(), Some(500));
        assert!(err.is_request_failure());
    }

    #[tokio::test]
    async fn unreachable_backend_becomes_an_error_message() {
        let dir = tempfile::tempdir().unwrap();
        let client = BackendClient::with_options(
            Some("http://127.0.0.1:9/".to_string()),
            Some(Duration::from_secs(5)),
        )
        .unwrap();
        let manager = ChatManager::open(client, &config(dir.path())).unwrap();

        let outcome = manager.submit("hello?", &mut Quiet).await.unwrap();
        assert!(matches!(outcome, TurnOutcome::Failed(_)));
        assert_eq!(
            manager.messages().last().map(|m| m.content.as_str()),
            Some(BACKEND_ERROR_MESSAGE)
        );
        assert!(!manager.is_busy());
    }

    #[tokio::test]
    async fn test_live_backend() {
        // This test requires CONFAB_BACKEND_URL to point at a running backend
        let url = std::env::var("CONFAB_BACKEND_URL").ok();
        if url.is_none() {
            eprintln!("Skipping test: CONFAB_BACKEND_URL not set");
            return;
        }

        let client = BackendClient::new(url).expect("Failed to create client");
        let request = ChatRequest::new(&[Message::user("Say 'test passed'")], Provider::Local, "local-mock");
        let response = client.complete(&request).await;
        assert!(response.is_ok(), "Request should succeed against a live backend");
    }
}
