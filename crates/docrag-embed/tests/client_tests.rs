use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use docrag_core::credentials::{EnvCredential, StaticCredential};
use docrag_core::http::AzureDeployment;
use docrag_core::retry::{Deadline, RetryPolicy};
use docrag_core::traits::EmbeddingService;
use docrag_core::{Error, RemoteError};
use docrag_embed::{AzureOpenAiEmbeddings, EmbeddingClient, HashEmbeddings};

/// Fails with the scripted errors first, then embeds each text as `[len, 1]`.
#[derive(Default)]
struct ScriptedService {
    failures: Mutex<VecDeque<RemoteError>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    latency: Duration,
    dim: usize,
}

impl ScriptedService {
    fn new(failures: Vec<RemoteError>) -> Self {
        Self { failures: Mutex::new(failures.into()), dim: 2, ..Self::default() }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingService for ScriptedService {
    fn dim(&self) -> usize {
        self.dim
    }

    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
    }
}

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy { max_attempts, base_delay_ms: 10, max_delay_ms: 100, jitter: 0.0 }
}

fn texts(n: usize) -> Vec<String> {
    (0..n).map(|i| "x".repeat(i + 1)).collect()
}

#[tokio::test(start_paused = true)]
async fn batches_preserve_input_order() {
    let service = Arc::new(ScriptedService { latency: Duration::from_millis(5), ..ScriptedService::new(Vec::new()) });
    let client = EmbeddingClient::new(service.clone()).with_batch_size(3).with_max_in_flight(2);
    let vectors = client.embed(&texts(10)).await.unwrap();
    assert_eq!(service.calls(), 4);
    let lens: Vec<f32> = vectors.iter().map(|v| v[0]).collect();
    assert_eq!(lens, (1..=10).map(|n| n as f32).collect::<Vec<_>>());
    assert!(service.max_in_flight.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn empty_input_makes_no_call() {
    let service = Arc::new(ScriptedService::new(Vec::new()));
    let client = EmbeddingClient::new(service.clone());
    assert!(client.embed(&[]).await.unwrap().is_empty());
    assert_eq!(service.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried() {
    let service = Arc::new(ScriptedService::new(vec![
        RemoteError::Unavailable("503".into()),
        RemoteError::RateLimited { retry_after: Some(Duration::from_millis(20)) },
    ]));
    let client = EmbeddingClient::new(service.clone()).with_retry(fast_retry(4));
    let v = client.embed_query("abc", Deadline::none()).await.unwrap();
    assert_eq!(v, vec![3.0, 1.0]);
    assert_eq!(service.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn permanent_failure_is_not_retried() {
    let service = Arc::new(ScriptedService::new(vec![RemoteError::Rejected { status: 400, body: "bad".into() }]));
    let client = EmbeddingClient::new(service.clone()).with_retry(fast_retry(4));
    let err = client.embed(&texts(2)).await.unwrap_err();
    assert!(matches!(err, Error::EmbeddingService { attempts: 1, cause: RemoteError::Rejected { status: 400, .. } }));
    assert_eq!(service.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn retries_stop_at_max_attempts() {
    let failures = (0..10).map(|_| RemoteError::Timeout).collect();
    let service = Arc::new(ScriptedService::new(failures));
    let client = EmbeddingClient::new(service.clone()).with_retry(fast_retry(3));
    let err = client.embed(&texts(1)).await.unwrap_err();
    assert!(matches!(err, Error::EmbeddingService { attempts: 3, cause: RemoteError::Timeout }));
    assert_eq!(service.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn deadline_cancels_slow_calls() {
    let service = Arc::new(ScriptedService { latency: Duration::from_secs(5), ..ScriptedService::new(Vec::new()) });
    let client = EmbeddingClient::new(service);
    let err = client.embed_query("slow", Deadline::after(Duration::from_secs(1))).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled(_)), "got {err:?}");
}

#[tokio::test]
async fn vectors_of_the_wrong_dimension_are_rejected() {
    let service = Arc::new(ScriptedService { dim: 3, ..ScriptedService::new(Vec::new()) });
    let err = EmbeddingClient::new(service).embed(&texts(1)).await.unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 2 }));
}

#[tokio::test]
async fn hash_embeddings_through_the_client() {
    let client = EmbeddingClient::new(Arc::new(HashEmbeddings::new(64)));
    let vectors = client.embed(&["alpha beta".to_string(), "alpha beta".to_string(), "gamma".to_string()]).await.unwrap();
    assert_eq!(vectors.len(), 3);
    assert_eq!(vectors[0], vectors[1]);
    assert_ne!(vectors[0], vectors[2]);
    assert_eq!(client.model_name(), "hash-64");
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&buf[..pos]).to_lowercase();
            let len = headers
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= pos + 4 + len {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[tokio::test]
async fn azure_embeddings_request_and_response() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        let body = r#"{"data":[{"index":1,"embedding":[0.0,1.0]},{"index":0,"embedding":[1.0,0.0]}],"model":"ada"}"#;
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        request
    });

    let deployment = AzureDeployment::new(endpoint, "ada", "2023-05-15");
    let service =
        AzureOpenAiEmbeddings::new(&deployment, &StaticCredential::new("secret"), 2, Duration::from_secs(5)).unwrap();
    let vectors = service.embed_batch(&["first".to_string(), "second".to_string()]).await.unwrap();
    assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /openai/deployments/ada/embeddings?api-version=2023-05-15 "));
    assert!(request.to_lowercase().contains("api-key: secret"));
    assert!(request.contains(r#""input":["first","second"]"#));
}

#[test]
fn azure_embeddings_require_an_endpoint() {
    let deployment = AzureDeployment::new("", "ada", "2023-05-15");
    let err = AzureOpenAiEmbeddings::new(&deployment, &StaticCredential::new("k"), 2, Duration::from_secs(1)).err().unwrap();
    assert!(matches!(err, Error::InvalidConfiguration(_)));
}

#[test]
fn azure_embeddings_need_an_api_key_up_front() {
    let deployment = AzureDeployment::new("http://127.0.0.1:9", "ada", "2023-05-15");
    let missing = EnvCredential::new("DOCRAG_TEST_UNSET_EMBEDDING_KEY");
    let err = AzureOpenAiEmbeddings::new(&deployment, &missing, 2, Duration::from_secs(1)).err().unwrap();
    assert!(matches!(err, Error::InvalidConfiguration(ref msg) if msg.contains("DOCRAG_TEST_UNSET_EMBEDDING_KEY")), "{err:?}");

    let blank = AzureOpenAiEmbeddings::new(&deployment, &StaticCredential::new("  "), 2, Duration::from_secs(1)).err().unwrap();
    assert!(matches!(blank, Error::InvalidConfiguration(_)));
}
