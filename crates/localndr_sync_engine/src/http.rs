//! HTTP client seam and the write-back client built on it.

use crate::error::{SyncError, SyncResult};
use localndr_protocol::{ApplyChangesResponse, ChangeSet};
use std::sync::Arc;
use std::time::Duration;

/// Path of the write-back endpoint on the write server.
pub const APPLY_CHANGES_PATH: &str = "/apply-changes";

/// A raw HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: String,
}

impl HttpResponse {
    /// Returns true for 2xx responses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Minimal HTTP client the engine needs: POST a JSON document.
pub trait HttpClient: Send + Sync {
    /// Posts a JSON body and returns the raw response.
    ///
    /// An `Err` means the request never produced a response (connection
    /// refused, timeout); HTTP error statuses come back as `Ok`.
    fn post_json(&self, url: &str, body: &str) -> SyncResult<HttpResponse>;
}

/// Client for the write-back endpoint.
///
/// Translates the endpoint's status-code contract into engine errors:
/// 400 means the batch was rejected as invalid, 500 means the server
/// failed to apply it.
pub struct WriteBackClient<C: HttpClient> {
    client: C,
    url: String,
}

impl<C: HttpClient> WriteBackClient<C> {
    /// Creates a client against a write-server base URL.
    pub fn new(client: C, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            client,
            url: format!("{base}{APPLY_CHANGES_PATH}"),
        }
    }

    /// The full endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Ships a change-set and interprets the response.
    pub fn apply_changes(&self, set: &ChangeSet) -> SyncResult<ApplyChangesResponse> {
        let body = serde_json::to_string(set).map_err(|e| SyncError::Protocol(e.to_string()))?;
        let response = self.client.post_json(&self.url, &body)?;

        if response.is_success() {
            let parsed = serde_json::from_str(&response.body)
                .unwrap_or_else(|_| ApplyChangesResponse::ok());
            return Ok(parsed);
        }

        let message = serde_json::from_str::<ApplyChangesResponse>(&response.body)
            .ok()
            .and_then(|r| r.error)
            .unwrap_or_else(|| format!("HTTP {}", response.status));
        Err(if (400..500).contains(&response.status) {
            SyncError::ApplyRejected(message)
        } else {
            SyncError::ApplyFailed(message)
        })
    }
}

/// [`HttpClient`] backed by a blocking reqwest client.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Creates a client with the given request timeout.
    pub fn new(timeout: Duration) -> SyncResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::transport_fatal(e.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn post_json(&self, url: &str, body: &str) -> SyncResult<HttpResponse> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .map_err(|e| SyncError::transport_retryable(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| SyncError::transport_retryable(e.to_string()))?;
        Ok(HttpResponse { status, body })
    }
}

/// Server side of the in-process loopback transport.
pub trait LoopbackServer: Send + Sync {
    /// Handles a POST by path.
    fn handle_post(&self, path: &str, body: &str) -> HttpResponse;
}

/// [`HttpClient`] that dispatches straight into a [`LoopbackServer`].
///
/// Used by integration tests to wire the engine to a real write server
/// without sockets.
pub struct LoopbackClient<S: LoopbackServer> {
    server: Arc<S>,
}

impl<S: LoopbackServer> LoopbackClient<S> {
    /// Creates a client over the given server.
    pub fn new(server: Arc<S>) -> Self {
        Self { server }
    }
}

impl<S: LoopbackServer> HttpClient for LoopbackClient<S> {
    fn post_json(&self, url: &str, body: &str) -> SyncResult<HttpResponse> {
        let path = url
            .splitn(4, '/')
            .nth(3)
            .map(|rest| format!("/{rest}"))
            .unwrap_or_else(|| "/".into());
        Ok(self.server.handle_post(&path, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use localndr_protocol::EventChange;
    use parking_lot::Mutex;

    struct CannedClient {
        response: HttpResponse,
        requests: Mutex<Vec<(String, String)>>,
    }

    impl CannedClient {
        fn new(status: u16, body: &str) -> Self {
            Self {
                response: HttpResponse {
                    status,
                    body: body.into(),
                },
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl HttpClient for CannedClient {
        fn post_json(&self, url: &str, body: &str) -> SyncResult<HttpResponse> {
            self.requests.lock().push((url.into(), body.into()));
            Ok(self.response.clone())
        }
    }

    fn delete_set() -> ChangeSet {
        ChangeSet::new(vec![EventChange {
            id: "a1".into(),
            title: None,
            description: None,
            start_date: None,
            end_date: None,
            created: "2024-01-01T09:00:00Z".into(),
            modified: Some("2024-01-01T10:00:00Z".into()),
            modified_columns: None,
            deleted: Some(true),
            is_new: None,
        }])
    }

    #[test]
    fn success_response_parses() {
        let client = CannedClient::new(200, r#"{"success":true}"#);
        let writeback = WriteBackClient::new(client, "http://localhost:3001/");
        assert_eq!(writeback.url(), "http://localhost:3001/apply-changes");

        let response = writeback.apply_changes(&delete_set()).unwrap();
        assert!(response.is_success());

        let requests = writeback.client.requests.lock();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].1.contains(r#""deleted":true"#));
    }

    #[test]
    fn rejection_maps_to_apply_rejected() {
        let client = CannedClient::new(400, r#"{"error":"Invalid changes"}"#);
        let writeback = WriteBackClient::new(client, "http://localhost:3001");
        let err = writeback.apply_changes(&delete_set()).unwrap_err();
        assert!(matches!(err, SyncError::ApplyRejected(ref m) if m == "Invalid changes"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn server_failure_maps_to_apply_failed() {
        let client = CannedClient::new(500, r#"{"error":"db down"}"#);
        let writeback = WriteBackClient::new(client, "http://localhost:3001");
        let err = writeback.apply_changes(&delete_set()).unwrap_err();
        assert!(matches!(err, SyncError::ApplyFailed(ref m) if m == "db down"));
        assert!(err.is_retryable());
    }

    #[test]
    fn opaque_error_body_falls_back_to_status() {
        let client = CannedClient::new(502, "bad gateway");
        let writeback = WriteBackClient::new(client, "http://localhost:3001");
        let err = writeback.apply_changes(&delete_set()).unwrap_err();
        assert!(matches!(err, SyncError::ApplyFailed(ref m) if m == "HTTP 502"));
    }

    #[test]
    fn loopback_extracts_the_path() {
        struct Echo;
        impl LoopbackServer for Echo {
            fn handle_post(&self, path: &str, _body: &str) -> HttpResponse {
                HttpResponse {
                    status: 200,
                    body: path.into(),
                }
            }
        }

        let client = LoopbackClient::new(Arc::new(Echo));
        let response = client
            .post_json("http://localhost:3001/apply-changes", "{}")
            .unwrap();
        assert_eq!(response.body, "/apply-changes");
    }
}
