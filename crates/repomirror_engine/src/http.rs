//! HTTP client abstraction.
//!
//! The actual HTTP client is abstracted via a trait so different
//! implementations (reqwest, ureq, fakes for testing) can plug into
//! [`crate::GitHubRemote`].

use std::time::Duration;

/// User agent sent by the bundled client; the remote host rejects
/// anonymous requests without one.
const USER_AGENT: &str = concat!("repomirror/", env!("CARGO_PKG_VERSION"));

/// Response to a GET request: status code and raw body.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Returns true for 2xx status codes.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client abstraction.
///
/// Implementations issue the request, follow redirects, and enforce the
/// configured timeout. A non-2xx status is a *response*, not an error;
/// the error arm is for transport failures only.
pub trait HttpClient: Send + Sync {
    /// Issues a GET request and returns status code plus body.
    fn get(&self, url: &str) -> Result<HttpResponse, String>;
}

/// Production client backed by `reqwest`'s blocking API.
#[derive(Debug)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Builds a client with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, String> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| e.to_string())?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str) -> Result<HttpResponse, String> {
        let response = self.client.get(url).send().map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        let body = response.bytes().map_err(|e| e.to_string())?.to_vec();
        Ok(HttpResponse { status, body })
    }
}
