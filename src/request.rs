//! The request-side view handed to endpoints and dynamic handlers.

/// Method, path and headers of an accepted request.
///
/// This is a plain value detached from the connection, so endpoints and
/// handlers can be exercised without a socket.
#[derive(Debug, Clone)]
pub struct RequestHead {
    method: String,
    url: String,
    headers: Vec<(String, String)>,
}

impl RequestHead {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
        }
    }

    pub fn with_headers(
        method: impl Into<String>,
        url: impl Into<String>,
        headers: Vec<(String, String)>,
    ) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers,
        }
    }

    /// The request method, e.g. `GET`.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The raw path portion of the request, as received.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Look up a request header value, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }
}
