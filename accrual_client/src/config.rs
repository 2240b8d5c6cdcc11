use std::time::Duration;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct AccrualConfig {
    /// The base URL of the accrual service, e.g. `http://localhost:8081`. A missing scheme defaults to `http`.
    pub base_url: String,
    /// Upper bound on a single request, including reading the body.
    pub request_timeout: Duration,
    /// The wait assumed when the service answers 429 without a usable `Retry-After` header.
    pub default_retry_after: Duration,
}

impl Default for AccrualConfig {
    fn default() -> Self {
        Self::new("http://localhost:8081")
    }
}

impl AccrualConfig {
    pub fn new<S: AsRef<str>>(base_url: S) -> Self {
        Self {
            base_url: normalize_base_url(base_url.as_ref()),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            default_retry_after: DEFAULT_RETRY_AFTER,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_default_retry_after(mut self, wait: Duration) -> Self {
        self.default_retry_after = wait;
        self
    }
}

fn normalize_base_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.contains("://") {
        url.to_string()
    } else {
        format!("http://{url}")
    }
}
