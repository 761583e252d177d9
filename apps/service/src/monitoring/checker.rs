use anyhow::Result;
use std::time::{Duration, Instant};
use tracing::debug;

use super::types::{SiteStatus, StatusSample};

/// Responses slower than this are degraded even when the status code is fine.
pub const DEFAULT_DEGRADED_THRESHOLD_MS: u64 = 1000;

/// Performs one reachability check against a site.
///
/// Implementations never fail: every transport problem is folded into a
/// `down` sample so the scheduler only has to deal with storage errors.
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, url: &str) -> StatusSample;
}

/// Classify a finished probe.
///
/// `status_code` is `None` when no response arrived (timeout, refused
/// connection, DNS failure, malformed URL).
pub fn classify(status_code: Option<u16>, elapsed_ms: u64, degraded_threshold_ms: u64) -> SiteStatus {
    match status_code {
        None => SiteStatus::Down,
        Some(code) if (500..600).contains(&code) => SiteStatus::Down,
        Some(code) if (400..500).contains(&code) => SiteStatus::Degraded,
        Some(_) if elapsed_ms > degraded_threshold_ms => SiteStatus::Degraded,
        Some(_) => SiteStatus::Operational,
    }
}

/// HEAD-request prober backed by a shared reqwest client
pub struct HttpProber {
    client: reqwest::Client,
    degraded_threshold_ms: u64,
}

impl HttpProber {
    pub fn new(timeout_seconds: u64, degraded_threshold_ms: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .user_agent(concat!("quickstatus/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, degraded_threshold_ms })
    }
}

#[async_trait::async_trait]
impl Prober for HttpProber {
    async fn probe(&self, url: &str) -> StatusSample {
        let start = Instant::now();

        let status_code = match self.client.head(url).send().await {
            Ok(response) => Some(response.status().as_u16()),
            Err(e) => {
                debug!(url, error = %e, "Probe request failed");
                None
            }
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        let status = classify(status_code, elapsed_ms, self.degraded_threshold_ms);

        StatusSample::new(status, elapsed_ms as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve a single canned status line on an ephemeral port
    async fn serve_once(status_line: &'static str, delay: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                tokio::time::sleep(delay).await;
                let response =
                    format!("HTTP/1.1 {status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        format!("http://{addr}/")
    }

    #[test]
    fn test_classification_order() {
        assert_eq!(classify(None, 5, 1000), SiteStatus::Down);
        assert_eq!(classify(Some(503), 5, 1000), SiteStatus::Down);
        assert_eq!(classify(Some(599), 5000, 1000), SiteStatus::Down);
        assert_eq!(classify(Some(404), 5, 1000), SiteStatus::Degraded);
        assert_eq!(classify(Some(200), 1001, 1000), SiteStatus::Degraded);
        assert_eq!(classify(Some(200), 1000, 1000), SiteStatus::Operational);
        assert_eq!(classify(Some(204), 12, 1000), SiteStatus::Operational);
    }

    #[tokio::test]
    async fn test_http_probe_ok() {
        let url = serve_once("200 OK", Duration::ZERO).await;
        let prober = HttpProber::new(5, 1000).unwrap();

        let sample = prober.probe(&url).await;

        assert_eq!(sample.status, SiteStatus::Operational);
        assert!(sample.response_time_ms >= 0);
    }

    #[tokio::test]
    async fn test_http_probe_server_error_is_down() {
        let url = serve_once("502 Bad Gateway", Duration::ZERO).await;
        let prober = HttpProber::new(5, 1000).unwrap();

        assert_eq!(prober.probe(&url).await.status, SiteStatus::Down);
    }

    #[tokio::test]
    async fn test_http_probe_client_error_is_degraded() {
        let url = serve_once("404 Not Found", Duration::ZERO).await;
        let prober = HttpProber::new(5, 1000).unwrap();

        assert_eq!(prober.probe(&url).await.status, SiteStatus::Degraded);
    }

    #[tokio::test]
    async fn test_http_probe_slow_response_is_degraded() {
        let url = serve_once("200 OK", Duration::from_millis(150)).await;
        let prober = HttpProber::new(5, 50).unwrap();

        let sample = prober.probe(&url).await;

        assert_eq!(sample.status, SiteStatus::Degraded);
        assert!(sample.response_time_ms >= 150);
    }

    #[tokio::test]
    async fn test_http_probe_timeout_is_down() {
        let url = serve_once("200 OK", Duration::from_secs(3)).await;
        let prober = HttpProber::new(1, 1000).unwrap();

        let sample = prober.probe(&url).await;

        assert_eq!(sample.status, SiteStatus::Down);
        assert!(sample.response_time_ms >= 900);
    }

    #[tokio::test]
    async fn test_http_probe_refused_connection_is_down() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let prober = HttpProber::new(2, 1000).unwrap();
        let sample = prober.probe(&format!("http://{addr}/")).await;

        assert_eq!(sample.status, SiteStatus::Down);
    }

    #[tokio::test]
    async fn test_http_probe_invalid_url_is_down() {
        let prober = HttpProber::new(2, 1000).unwrap();
        assert_eq!(prober.probe("not a url").await.status, SiteStatus::Down);
    }
}
