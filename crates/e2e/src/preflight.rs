//! Reachability probe for the QA base URL

use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub timeout: Duration,
    pub request_timeout: Duration,
    pub interval: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(3),
            interval: Duration::from_millis(500),
        }
    }
}

/// Poll `url` until it answers with a non-5xx status.
///
/// Redirects are not followed: an unauthenticated QA server usually answers
/// with a redirect to its login page, which counts as reachable.
pub async fn check_reachable(url: &str, config: &ProbeConfig) -> E2eResult<u16> {
    let client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .redirect(reqwest::redirect::Policy::none())
        .build()?;

    let start = Instant::now();
    let mut attempts = 0;

    loop {
        attempts += 1;

        match client.get(url).send().await {
            Ok(resp) if !resp.status().is_server_error() => {
                let status = resp.status().as_u16();
                info!("{} is reachable (HTTP {})", url, status);
                return Ok(status);
            }
            Ok(resp) => {
                warn!("{} returned {}", url, resp.status());
            }
            Err(e) => {
                if e.is_connect() {
                    debug!("{} refused connection (attempt {})", url, attempts);
                } else {
                    warn!("Probe of {} failed: {}", url, e);
                }
            }
        }

        if start.elapsed() + config.interval >= config.timeout {
            break;
        }
        sleep(config.interval).await;
    }

    Err(E2eError::Unreachable {
        url: url.to_string(),
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn serve_once(status_line: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let response = format!("{}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n", status_line);
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        format!("http://{}/", addr)
    }

    fn quick() -> ProbeConfig {
        ProbeConfig {
            timeout: Duration::from_millis(300),
            request_timeout: Duration::from_millis(200),
            interval: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn test_redirect_counts_as_reachable() {
        let url = serve_once("HTTP/1.1 302 Found\r\nlocation: /login").await;
        assert_eq!(check_reachable(&url, &quick()).await.unwrap(), 302);
    }

    #[tokio::test]
    async fn test_closed_port_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        drop(listener);

        let err = check_reachable(&url, &quick()).await.unwrap_err();
        match err {
            E2eError::Unreachable { attempts, .. } => assert!(attempts >= 1),
            other => panic!("unexpected error: {}", other),
        }
    }
}
