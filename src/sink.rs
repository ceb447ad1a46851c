//! The response sink contract between endpoints and a listener.

use std::io;

/// Where an endpoint writes its response.
///
/// The listener hands one of these to
/// [`Endpoint::respond`](crate::Endpoint::respond). Methods mirror the
/// usual order of an HTTP response writer: status first, then headers,
/// then the header terminator, then body bytes. Implementations may
/// buffer or stream as they see fit.
pub trait ResponseSink {
    /// Set the numeric status code. Called once, before any header.
    fn status(&mut self, code: u16);

    /// Add a response header.
    fn header(&mut self, name: &str, value: &str);

    /// Finish the header section.
    fn end_headers(&mut self);

    /// Append body bytes.
    fn body(&mut self, bytes: &[u8]) -> io::Result<()>;
}

/// An in-memory sink collecting status, headers and body.
///
/// The tiny_http listener adapter drains one of these into a real
/// response; tests inspect it directly.
#[derive(Debug, Default)]
pub struct BufferedResponse {
    pub status: Option<u16>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a header value, case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl ResponseSink for BufferedResponse {
    fn status(&mut self, code: u16) {
        self.status = Some(code);
    }

    fn header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn end_headers(&mut self) {}

    fn body(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.body.extend_from_slice(bytes);
        Ok(())
    }
}
