//! Shared HTTP agent and bounded response helpers for corpus acquisition.

use std::io::{self, Read, Write};
use std::sync::OnceLock;
use std::time::Duration;

use tracing::warn;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(30);
const WRITE_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("chirpset/", env!("CARGO_PKG_VERSION"));

/// Retry settings for network operations with exponential backoff.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RetryConfig {
    /// Maximum number of attempts, including the first try.
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(4),
        }
    }
}

/// Shared agent with bounded timeouts. GitHub rejects requests without a user agent.
pub(crate) fn agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(READ_TIMEOUT)
            .timeout_write(WRITE_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
    })
}

/// GET `url`, retrying transport failures, rate limiting and server errors.
pub(crate) fn get_with_retry(url: &str, config: RetryConfig) -> Result<ureq::Response, ureq::Error> {
    retry_with_backoff(config, || agent().get(url).call(), |err| {
        let transient = is_transient(err);
        if transient {
            warn!("Request to {url} failed, retrying: {err}");
        }
        transient
    })
}

fn is_transient(err: &ureq::Error) -> bool {
    match err {
        ureq::Error::Status(code, _) => *code == 429 || *code >= 500,
        ureq::Error::Transport(_) => true,
    }
}

/// Run `action` up to `config.max_attempts` times while `should_retry` accepts the error.
pub(crate) fn retry_with_backoff<T, E>(
    config: RetryConfig,
    mut action: impl FnMut() -> Result<T, E>,
    mut should_retry: impl FnMut(&E) -> bool,
) -> Result<T, E> {
    let attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match action() {
            Err(err) if attempt < attempts && should_retry(&err) => {
                std::thread::sleep(backoff_delay(config.base_delay, config.max_delay, attempt));
                attempt += 1;
            }
            done => return done,
        }
    }
}

/// Read a response into memory, enforcing a maximum byte size.
pub(crate) fn read_response_bytes(response: ureq::Response, max_bytes: usize) -> io::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    copy_response_to_writer(response, &mut bytes, max_bytes)?;
    Ok(bytes)
}

/// Stream a response to `writer`, enforcing a maximum byte size. Returns bytes written.
pub(crate) fn copy_response_to_writer(
    response: ureq::Response,
    writer: &mut dyn Write,
    max_bytes: usize,
) -> io::Result<u64> {
    let limit = max_bytes as u64;
    if let Some(declared) = declared_length(&response)
        && declared > limit
    {
        return Err(too_large(format!("declared body of {declared} bytes exceeds {limit}")));
    }
    // One byte past the limit tells an exact-size body from an oversized one.
    let mut body = response.into_reader().take(limit + 1);
    let copied = io::copy(&mut body, &mut LimitedWriter { inner: writer, left: limit })?;
    Ok(copied)
}

struct LimitedWriter<'a> {
    inner: &'a mut dyn Write,
    left: u64,
}

impl Write for LimitedWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.len() as u64 > self.left {
            return Err(too_large("body exceeded the size limit".to_string()));
        }
        let written = self.inner.write(buf)?;
        self.left -= written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn declared_length(response: &ureq::Response) -> Option<u64> {
    response.header("Content-Length")?.trim().parse().ok()
}

fn too_large(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

fn backoff_delay(base: Duration, max: Duration, attempt: usize) -> Duration {
    let doublings = attempt.saturating_sub(1).min(16) as u32;
    base.saturating_mul(1 << doublings).min(max)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    /// Serve canned HTTP responses, one per connection, and return the base URL.
    pub(crate) fn serve(responses: Vec<String>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            for response in responses {
                if let Ok((mut stream, _)) = listener.accept() {
                    let mut buf = [0u8; 4096];
                    let _ = stream.read(&mut buf);
                    let _ = stream.write_all(response.as_bytes());
                }
            }
        });
        format!("http://{addr}")
    }

    pub(crate) fn ok_response(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    #[test]
    fn declared_length_over_limit_is_rejected() {
        let url = serve(vec!["HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nok".to_string()]);
        let response = agent().get(&url).call().unwrap();
        let err = read_response_bytes(response, 10).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn streamed_body_over_limit_is_rejected() {
        let url = serve(vec![format!("HTTP/1.0 200 OK\r\n\r\n{}", "a".repeat(32))]);
        let response = agent().get(&url).call().unwrap();
        let err = read_response_bytes(response, 16).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn body_under_limit_is_returned() {
        let url = serve(vec![ok_response("hello")]);
        let response = agent().get(&url).call().unwrap();
        assert_eq!(read_response_bytes(response, 16).unwrap(), b"hello");
    }

    #[test]
    fn server_errors_are_retried() {
        let url = serve(vec![
            "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string(),
            ok_response("[]"),
        ]);
        let config = RetryConfig {
            max_attempts: 3,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        };
        let response = get_with_retry(&url, config).unwrap();
        assert_eq!(response.status(), 200);
    }

    #[test]
    fn retry_honors_predicate() {
        let mut attempts = 0usize;
        let config = RetryConfig {
            max_attempts: 3,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        };
        let result: Result<u32, &'static str> = retry_with_backoff(
            config,
            || {
                attempts += 1;
                Err("fail")
            },
            |_| false,
        );
        assert_eq!(result, Err("fail"));
        assert_eq!(attempts, 1);
    }

    #[test]
    fn backoff_is_capped() {
        let base = Duration::from_millis(100);
        let max = Duration::from_millis(250);
        assert_eq!(backoff_delay(base, max, 1), base);
        assert_eq!(backoff_delay(base, max, 2), Duration::from_millis(200));
        assert_eq!(backoff_delay(base, max, 5), max);
    }
}
