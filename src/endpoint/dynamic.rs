//! Dynamic endpoints and the scope handed to their handlers.

use std::fmt;
use std::io;
use std::sync::Arc;

use crate::request::RequestHead;
use crate::server::{DevServer, ServerState};
use crate::sink::ResponseSink;

use super::InternalError;

/// What a handler produces. Text is UTF-8 encoded on the way out.
pub enum Content {
    Text(String),
    Bytes(Vec<u8>),
}

impl Content {
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Content::Text(text) => text.into_bytes(),
            Content::Bytes(bytes) => bytes,
        }
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Content {
    fn from(bytes: Vec<u8>) -> Self {
        Content::Bytes(bytes)
    }
}

/// Signature of a dynamic content generator.
///
/// Handlers run on listener threads and must be thread safe; shared
/// state lives in the server and is reached through the scope.
pub type DynamicHandler =
    Arc<dyn Fn(&RequestHead, &mut DynamicScope<'_>) -> anyhow::Result<Content> + Send + Sync>;

/// Access token handed to dynamic handlers.
///
/// Under `autolock` the server guard is already held for the whole
/// handler call and [`with_state`](Self::with_state) reuses it, so
/// nested access cannot deadlock. Without `autolock` every
/// `with_state` call takes the guard for exactly the closure's
/// duration, and the handler owns its critical sections.
pub struct DynamicScope<'a> {
    server: &'a DevServer,
    held: Option<&'a mut ServerState>,
}

impl<'a> DynamicScope<'a> {
    pub(crate) fn locked(server: &'a DevServer, state: &'a mut ServerState) -> Self {
        Self {
            server,
            held: Some(state),
        }
    }

    pub(crate) fn unlocked(server: &'a DevServer) -> Self {
        Self { server, held: None }
    }

    /// The server this request is being handled by.
    ///
    /// Do not call its locking methods from an autolocked handler; use
    /// [`with_state`](Self::with_state), which already has the guard.
    pub fn server(&self) -> &DevServer {
        self.server
    }

    /// Run `f` with exclusive access to the server state.
    pub fn with_state<R>(&mut self, f: impl FnOnce(&mut ServerState) -> R) -> R {
        match &mut self.held {
            Some(state) => f(state),
            None => self.server.with_state(f),
        }
    }

    /// Fetch the bytes of a named asset.
    ///
    /// The asset handle is cloned out under the guard and read after,
    /// so file IO never runs inside the critical section.
    pub fn asset_content(&mut self, name: &str) -> anyhow::Result<Vec<u8>> {
        let asset = self
            .with_state(|state| state.asset(name).cloned())
            .ok_or_else(|| anyhow::anyhow!("no asset named `{name}`"))?;
        Ok(asset.content()?)
    }

    /// Fetch a named asset as UTF-8 text, template sources and the like.
    pub fn asset_text(&mut self, name: &str) -> anyhow::Result<String> {
        Ok(String::from_utf8(self.asset_content(name)?)?)
    }
}

/// Calls a registered handler to produce the response body.
#[derive(Clone)]
pub struct DynamicEndpoint {
    route: String,
    handler: DynamicHandler,
    content_type: Option<String>,
    autolock: bool,
}

impl fmt::Debug for DynamicEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicEndpoint")
            .field("route", &self.route)
            .field("content_type", &self.content_type)
            .field("autolock", &self.autolock)
            .finish()
    }
}

impl DynamicEndpoint {
    pub(crate) fn new(
        route: String,
        handler: DynamicHandler,
        content_type: Option<String>,
        autolock: bool,
    ) -> Self {
        Self {
            route,
            handler,
            content_type,
            autolock,
        }
    }

    pub fn autolock(&self) -> bool {
        self.autolock
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub(crate) fn respond(
        &self,
        server: &DevServer,
        request: &RequestHead,
        sink: &mut dyn ResponseSink,
    ) -> io::Result<()> {
        // The guard covers the handler call only, never header or body
        // writes to the client.
        let produced = if self.autolock {
            let mut state = server.lock_state();
            let mut scope = DynamicScope::locked(server, &mut state);
            (self.handler)(request, &mut scope)
        } else {
            let mut scope = DynamicScope::unlocked(server);
            (self.handler)(request, &mut scope)
        };

        let body = match produced {
            Ok(content) => content.into_bytes(),
            Err(err) => return InternalError::from_handler(&self.route, &err).respond(sink),
        };

        sink.status(200);
        if let Some(ct) = &self.content_type {
            sink.header("Content-Type", ct);
        }
        sink.header("Content-Length", &body.len().to_string());
        sink.end_headers();
        sink.body(&body)
    }
}
