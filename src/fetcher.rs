use log::warn;
use reqwest::{Client, ClientBuilder, Method, StatusCode};
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server returned {0}")]
    Status(StatusCode),
}

/// Issues commands against the scoreboard controller. Every request is
/// stamped with an issue timestamp and a fresh random id so the server can
/// detect duplicate delivery; the client itself never retries.
#[derive(Debug, Clone)]
pub struct Fetcher {
    base_url: String,
    default_timeout: Option<Duration>,
    client: Client,
}

impl Fetcher {
    pub fn new(base_url: &str, default_timeout: Option<Duration>) -> Result<Self, CommandError> {
        let client = ClientBuilder::new().build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            default_timeout,
            client,
        })
    }

    /// A fetcher rooted at a sub-resource, sharing the connection pool.
    pub fn scoped(&self, prefix: &str) -> Self {
        Self {
            base_url: format!("{}/{}", self.base_url, prefix.trim_matches('/')),
            default_timeout: self.default_timeout,
            client: self.client.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn send(
        &self,
        path: &str,
        method: Method,
        params: &[(&str, String)],
        timeout: Option<Duration>,
    ) -> Result<(), CommandError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let ts = epoch_millis().to_string();
        let id = Uuid::new_v4().to_string();

        let mut request = self
            .client
            .request(method, &url)
            .query(params)
            .query(&[("ts", ts.as_str()), ("id", id.as_str())]);
        if let Some(timeout) = timeout.or(self.default_timeout) {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(CommandError::Status(response.status()))
        }
    }

    pub async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<(), CommandError> {
        self.send(path, Method::GET, params, None).await
    }

    pub async fn put(&self, path: &str, params: &[(&str, String)]) -> Result<(), CommandError> {
        self.send(path, Method::PUT, params, None).await
    }

    pub async fn post(&self, path: &str, params: &[(&str, String)]) -> Result<(), CommandError> {
        self.send(path, Method::POST, params, None).await
    }

    pub async fn delete(&self, path: &str, params: &[(&str, String)]) -> Result<(), CommandError> {
        self.send(path, Method::DELETE, params, None).await
    }

    /// Fire-and-forget command. The outcome is only confirmed indirectly by
    /// the next snapshot, so failures are logged and otherwise dropped.
    pub fn dispatch(&self, path: &str, params: &[(&str, String)]) {
        let fetcher = self.clone();
        let path = path.to_string();
        let params: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        tokio::spawn(async move {
            let params: Vec<(&str, String)> = params
                .iter()
                .map(|(k, v)| (k.as_str(), v.clone()))
                .collect();
            if let Err(e) = fetcher.send(&path, Method::POST, &params, None).await {
                warn!("Command {path} failed: {e}");
            }
        });
    }
}

pub fn epoch_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

#[cfg(test)]
mod test {
    use super::*;
    use more_asserts::*;
    use std::collections::HashMap;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        sync::mpsc,
    };

    /// Minimal HTTP responder: accepts one connection per status code given,
    /// records the request line, and replies with an empty body.
    async fn serve_one(listener: TcpListener, status_line: &str, tx: mpsc::Sender<String>) {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 4096];
        let mut read = 0;
        loop {
            read += stream.read(&mut buf[read..]).await.unwrap();
            if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                break;
            }
        }
        let request_line = String::from_utf8_lossy(&buf[..read])
            .lines()
            .next()
            .unwrap()
            .to_string();
        tx.send(request_line).await.unwrap();
        let response = format!("HTTP/1.1 {status_line}\r\ncontent-length: 0\r\n\r\n");
        stream.write_all(response.as_bytes()).await.unwrap();
    }

    fn query_of(request_line: &str) -> HashMap<String, String> {
        let target = request_line.split_whitespace().nth(1).unwrap();
        let (_, query) = target.split_once('?').unwrap();
        query
            .split('&')
            .map(|pair| {
                let (k, v) = pair.split_once('=').unwrap();
                (k.to_string(), v.to_string())
            })
            .collect()
    }

    #[tokio::test]
    async fn test_send_stamps_ts_and_id() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, mut rx) = mpsc::channel(1);
        tokio::spawn(async move { serve_one(listener, "200 OK", tx).await });

        let fetcher = Fetcher::new(&format!("http://{addr}"), None).unwrap();
        let before = epoch_millis();
        fetcher
            .post("game_clock/set", &[("value", "45000".to_string())])
            .await
            .unwrap();
        let after = epoch_millis();

        let request_line = rx.recv().await.unwrap();
        assert!(request_line.starts_with("POST /game_clock/set?"));
        let query = query_of(&request_line);
        assert_eq!(query["value"], "45000");
        let ts: i64 = query["ts"].parse().unwrap();
        assert_ge!(ts, before);
        assert_le!(ts, after);
        // 122 random bits, hyphenated
        assert_eq!(query["id"].len(), 36);
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let mut ids = vec![];
        for _ in 0..2 {
            let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
            let addr = listener.local_addr().unwrap();
            let (tx, mut rx) = mpsc::channel(1);
            tokio::spawn(async move { serve_one(listener, "200 OK", tx).await });

            let fetcher = Fetcher::new(&format!("http://{addr}"), None).unwrap();
            if ids.is_empty() {
                fetcher.post("siren/toggle", &[]).await.unwrap();
            } else {
                fetcher.delete("siren", &[]).await.unwrap();
            }
            ids.push(query_of(&rx.recv().await.unwrap())["id"].clone());
        }
        assert_ne!(ids[0], ids[1]);
    }

    #[tokio::test]
    async fn test_non_success_is_an_error() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, _rx) = mpsc::channel(1);
        tokio::spawn(async move { serve_one(listener, "500 Internal Server Error", tx).await });

        let fetcher = Fetcher::new(&format!("http://{addr}"), None).unwrap();
        let outcome = fetcher.get("reset", &[]).await;
        assert!(matches!(
            outcome,
            Err(CommandError::Status(StatusCode::INTERNAL_SERVER_ERROR))
        ));
    }

    #[tokio::test]
    async fn test_timeout_aborts_the_request() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept but never respond
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
            drop(stream);
        });

        let fetcher =
            Fetcher::new(&format!("http://{addr}"), Some(Duration::from_millis(50))).unwrap();
        let outcome = fetcher.put("period/increment", &[]).await;
        match outcome {
            Err(CommandError::Request(e)) => assert!(e.is_timeout()),
            other => panic!("expected a timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_scoped_shares_base_url() {
        let fetcher = Fetcher::new("http://localhost:8000/", None).unwrap();
        assert_eq!(fetcher.base_url(), "http://localhost:8000");
        let scoped = fetcher.scoped("home/");
        assert_eq!(scoped.base_url(), "http://localhost:8000/home");
    }
}
