//! An embeddable HTTP server for local development.
//!
//! A [`DevServer`] owns a registry of routes: static files, dynamically
//! generated responses and one-hop redirects. A threaded listener feeds
//! every accepted request through [`DevServer::dispatch`], and the whole
//! content set can be packed into a single portable archive blob and
//! restored later, which makes it easy to ship a small web UI inside a
//! bigger tool.
//!
//! ```no_run
//! use std::net::{IpAddr, Ipv4Addr};
//! use std::sync::Arc;
//!
//! use devserve::{Content, DevServer};
//!
//! let server = Arc::new(DevServer::new());
//! server.add_static("index.html", "site/index.html", None, None)?;
//! server.redirect("", "index.html")?;
//! server.add_dynamic("version.txt", |_request, _scope| {
//!     Ok(Content::Text(env!("CARGO_PKG_VERSION").to_string()))
//! })?;
//! server.serve_forever(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod archive;
pub mod asset;
pub mod endpoint;
pub mod error;
pub mod request;
pub mod serve;
pub mod server;
pub mod sink;
pub mod utils;

pub use archive::SharedReader;
pub use asset::{Asset, AssetKind, AssetMetadata};
pub use endpoint::{Content, DynamicScope, Endpoint, InternalError, StaticEndpoint};
pub use error::{ArchiveError, RegisterError};
pub use request::RequestHead;
pub use server::{DevServer, ServerState};
pub use sink::{BufferedResponse, ResponseSink};
