//! Polymorphic responders bound to routes.
//!
//! An [`Endpoint`] is everything a URL can resolve to. The set is
//! closed: dispatch is an exhaustive match over exactly these variants,
//! and request-time failures are converted into an [`InternalError`]
//! response here rather than crossing back into the listener.

mod dynamic;

pub use dynamic::{Content, DynamicEndpoint, DynamicHandler, DynamicScope};

use std::io;

use crate::asset::Asset;
use crate::request::RequestHead;
use crate::server::DevServer;
use crate::sink::ResponseSink;
use crate::utils::{html, mime};

/// A responder bound to a URL.
#[derive(Debug, Clone)]
pub enum Endpoint {
    /// Serves a registered asset as-is.
    Static(StaticEndpoint),
    /// Invokes a registered handler to build the body.
    Dynamic(DynamicEndpoint),
    /// Catch-all for unknown routes.
    NotFound,
    /// Carries a request-time failure back to the client.
    InternalError(InternalError),
}

impl Endpoint {
    /// Write a complete response for `request` into `sink`.
    ///
    /// Handler and content-read failures are rendered as a 500 response
    /// and never escape; only sink IO errors (the client hung up)
    /// propagate, for the listener to log.
    pub fn respond(
        &self,
        server: &DevServer,
        request: &RequestHead,
        sink: &mut dyn ResponseSink,
    ) -> io::Result<()> {
        match self {
            Endpoint::Static(ep) => match ep.asset().content() {
                Ok(body) => ep.write(sink, &body),
                Err(err) => InternalError::new("io error", err.to_string())
                    .with_detail(format!("failed to read content for `{}`", ep.asset().name()))
                    .respond(sink),
            },
            Endpoint::Dynamic(ep) => ep.respond(server, request, sink),
            Endpoint::NotFound => respond_not_found(sink),
            Endpoint::InternalError(err) => err.respond(sink),
        }
    }

    /// The asset behind a static endpoint, if this is one.
    pub fn static_asset(&self) -> Option<&Asset> {
        match self {
            Endpoint::Static(ep) => Some(ep.asset()),
            _ => None,
        }
    }
}

/// Serves one asset: 200, metadata headers, raw bytes.
#[derive(Debug, Clone)]
pub struct StaticEndpoint {
    asset: Asset,
}

impl StaticEndpoint {
    pub fn new(asset: Asset) -> Self {
        Self { asset }
    }

    pub fn asset(&self) -> &Asset {
        &self.asset
    }

    /// Headers reflect registration-time metadata: either may be absent
    /// when it never resolved.
    fn write(&self, sink: &mut dyn ResponseSink, body: &[u8]) -> io::Result<()> {
        sink.status(200);
        if let Some(ct) = self.asset.content_type() {
            sink.header("Content-Type", ct);
        }
        if let Some(size) = self.asset.size() {
            sink.header("Content-Length", &size.to_string());
        }
        sink.end_headers();
        sink.body(body)
    }
}

const NOT_FOUND_BODY: &[u8] = b"<h1>404 Not Found</h1>";

// No Content-Length here: the body is delimited by connection close.
fn respond_not_found(sink: &mut dyn ResponseSink) -> io::Result<()> {
    sink.status(404);
    sink.end_headers();
    sink.body(NOT_FOUND_BODY)
}

/// A 500 response describing a request-time failure.
///
/// Renders the failure's kind, an optional line naming the operation
/// that failed, and the error message. Everything is HTML-escaped
/// before it reaches the page.
#[derive(Debug, Clone)]
pub struct InternalError {
    kind: String,
    detail: Option<String>,
    message: String,
}

impl InternalError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            detail: None,
            message: message.into(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Wrap a failed dynamic handler, naming its route.
    pub(crate) fn from_handler(route: &str, err: &anyhow::Error) -> Self {
        Self::new("handler error", format!("{err:#}"))
            .with_detail(format!("failed to call dynamic content generator for `{route}`"))
    }

    pub(crate) fn respond(&self, sink: &mut dyn ResponseSink) -> io::Result<()> {
        let body = format!(
            "<html><body><h1>{}</h1><div>{}</div><pre>{}</pre></body></html>",
            html::escape(&self.kind),
            html::escape(self.detail.as_deref().unwrap_or("")),
            html::escape(&self.message),
        );

        sink.status(500);
        sink.header("Content-Type", mime::types::HTML);
        sink.end_headers();
        sink.body(body.as_bytes())
    }
}
