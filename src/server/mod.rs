//! The endpoint registry and its concurrency guard.
//!
//! A [`DevServer`] owns three maps - routes, named assets and redirect
//! aliases - behind a single mutex. Registration happens at setup time,
//! dispatch happens on listener threads, and both sides see a
//! consistent snapshot for exactly as long as the guard is held.

use std::io;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use rustc_hash::FxHashMap;

use crate::archive::{self, SharedReader};
use crate::asset::{Asset, AssetKind};
use crate::endpoint::{Content, DynamicEndpoint, DynamicScope, Endpoint, StaticEndpoint};
use crate::error::{ArchiveError, RegisterError};
use crate::request::RequestHead;
use crate::serve;
use crate::utils::url::normalize_url;
use crate::utils::{fs as fsutil, mime};

/// Everything behind the server guard.
#[derive(Default)]
pub struct ServerState {
    pub(crate) endpoints: FxHashMap<String, Endpoint>,
    pub(crate) assets: FxHashMap<String, Asset>,
    /// One-hop aliases; values were registered endpoints at alias time.
    pub(crate) redirects: FxHashMap<String, String>,
    vars: FxHashMap<String, serde_json::Value>,
}

impl ServerState {
    /// Look up a registered endpoint by its normalized route key.
    pub fn endpoint(&self, url: &str) -> Option<&Endpoint> {
        self.endpoints.get(url)
    }

    /// Look up a named asset.
    pub fn asset(&self, name: &str) -> Option<&Asset> {
        self.assets.get(name)
    }

    pub fn asset_names(&self) -> impl Iterator<Item = &str> {
        self.assets.keys().map(String::as_str)
    }

    /// Read a shared handler variable.
    pub fn var(&self, key: &str) -> Option<&serde_json::Value> {
        self.vars.get(key)
    }

    /// Set a shared handler variable.
    pub fn set_var(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.vars.insert(key.into(), value.into());
    }
}

/// An embeddable development HTTP server.
///
/// Safe to share across threads: hand an `Arc<DevServer>` to the
/// listener and keep registering while it serves. See the crate docs
/// for a usage sketch.
#[derive(Default)]
pub struct DevServer {
    state: Mutex<ServerState>,
}

impl DevServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with exclusive access to the shared state.
    ///
    /// For setup code and for handlers registered without autolock;
    /// autolocked handlers already hold the guard and must go through
    /// their [`DynamicScope`] instead.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut ServerState) -> R) -> R {
        let mut state = self.state.lock();
        f(&mut state)
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock()
    }

    /// Resolve a request path to its endpoint.
    ///
    /// Normalizes the path, follows at most one redirect hop and looks
    /// the route up. Unknown routes come back as [`Endpoint::NotFound`];
    /// this never fails. The guard is held for the lookup only and the
    /// returned endpoint is a cheap clone, so a slow response never
    /// blocks other lookups.
    ///
    /// `method` is accepted for parity with the listener contract;
    /// routing does not discriminate on it.
    pub fn dispatch(&self, url_path: &str, method: &str) -> Endpoint {
        let _ = method;
        let mut key = normalize_url(url_path);

        let state = self.state.lock();
        if let Some(target) = state.redirects.get(&key) {
            key = target.clone();
        }
        state
            .endpoints
            .get(&key)
            .cloned()
            .unwrap_or(Endpoint::NotFound)
    }

    /// Register a file to be served at `url`.
    ///
    /// `content_type` and `size` override detection when given. A
    /// duplicate URL logs a warning and replaces the previous endpoint:
    /// static content is swappable mid-session, that is the point of a
    /// dev server.
    pub fn add_static(
        &self,
        url: &str,
        path: impl Into<PathBuf>,
        content_type: Option<&str>,
        size: Option<u64>,
    ) -> Result<(), RegisterError> {
        let url = normalize_url(url);
        // File probing happens before the guard; only the insert needs it.
        let asset = Asset::from_file(AssetKind::Direct, &url, content_type, path, size)?;

        let mut state = self.state.lock();
        if state.endpoints.contains_key(&url) {
            log::warn!("duplicate route `{url}`, replacing previous endpoint");
        }
        state
            .endpoints
            .insert(url, Endpoint::Static(StaticEndpoint::new(asset)));
        Ok(())
    }

    /// Register every file under `dir` at `url_prefix + relative path`.
    ///
    /// Files are enumerated recursively in stable lexical order.
    pub fn add_static_dir(&self, url_prefix: &str, dir: &Path) -> Result<(), RegisterError> {
        self.add_static_dir_filtered(url_prefix, dir, |_| true)
    }

    /// Like [`add_static_dir`](Self::add_static_dir), keeping only the
    /// relative paths the filter accepts.
    pub fn add_static_dir_filtered(
        &self,
        url_prefix: &str,
        dir: &Path,
        mut filter: impl FnMut(&Path) -> bool,
    ) -> Result<(), RegisterError> {
        let prefix = normalize_url(url_prefix);
        let files = fsutil::find_files(dir).map_err(|e| RegisterError::Io(dir.to_path_buf(), e))?;

        for rel in files {
            if !filter(&rel) {
                continue;
            }
            let rel_url = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let url = if prefix.is_empty() {
                rel_url
            } else {
                format!("{prefix}/{rel_url}")
            };
            self.add_static(&url, dir.join(&rel), None, None)?;
        }
        Ok(())
    }

    /// Register a named asset for dynamic handlers to read.
    ///
    /// Assets never get a URL; they are reachable only through a
    /// handler's scope. Duplicate names warn and overwrite, like
    /// [`add_static`](Self::add_static).
    pub fn add_asset(&self, name: &str, path: impl Into<PathBuf>) -> Result<(), RegisterError> {
        let asset = Asset::from_file(AssetKind::Referenced, name, None, path, None)?;

        let mut state = self.state.lock();
        if state.assets.contains_key(name) {
            log::warn!("duplicate asset key `{name}`, replacing previous asset");
        }
        state.assets.insert(name.to_string(), asset);
        Ok(())
    }

    /// Register a dynamic route with the default options: content type
    /// guessed from the route's basename, autolock on.
    pub fn add_dynamic<F>(&self, url: &str, handler: F) -> Result<(), RegisterError>
    where
        F: Fn(&RequestHead, &mut DynamicScope<'_>) -> anyhow::Result<Content>
            + Send
            + Sync
            + 'static,
    {
        self.add_dynamic_opts(url, handler, None, true)
    }

    /// Register a dynamic route.
    ///
    /// `content_type` is either a literal `type/subtype`, or a file
    /// name / `.ext` to guess from; `None` guesses from the route's
    /// basename. An unresolvable type logs a warning and the response
    /// omits the header.
    ///
    /// With `autolock` the server guard is held around each handler
    /// call, serializing all autolocked handlers; long-running handlers
    /// should pass `false` and take their critical sections through the
    /// scope. Unlike static routes, a duplicate URL is an error and the
    /// existing registration stays active.
    pub fn add_dynamic_opts<F>(
        &self,
        url: &str,
        handler: F,
        content_type: Option<&str>,
        autolock: bool,
    ) -> Result<(), RegisterError>
    where
        F: Fn(&RequestHead, &mut DynamicScope<'_>) -> anyhow::Result<Content>
            + Send
            + Sync
            + 'static,
    {
        let url = normalize_url(url);

        let resolved = match content_type {
            Some(hint) => mime::resolve_hint(hint),
            None => {
                let basename = url.rsplit('/').next().unwrap_or(url.as_str());
                mime::from_path(Path::new(basename)).map(str::to_string)
            }
        };
        if resolved.is_none() {
            log::warn!("cannot determine mime type for dynamic route `{url}`");
        }

        let mut state = self.state.lock();
        if state.endpoints.contains_key(&url) {
            return Err(RegisterError::DuplicateRoute(url));
        }
        let endpoint = DynamicEndpoint::new(url.clone(), Arc::new(handler), resolved, autolock);
        state.endpoints.insert(url, Endpoint::Dynamic(endpoint));
        Ok(())
    }

    /// Alias `from_url` to an existing endpoint at `to_url`.
    ///
    /// Resolution is single-hop: an alias to an alias will not chain.
    /// The target must already be registered.
    pub fn redirect(&self, from_url: &str, to_url: &str) -> Result<(), RegisterError> {
        let from = normalize_url(from_url);
        let to = normalize_url(to_url);

        let mut state = self.state.lock();
        if !state.endpoints.contains_key(&to) {
            return Err(RegisterError::UnknownTarget(to));
        }
        state.redirects.insert(from, to);
        Ok(())
    }

    /// Pack all static routes and named assets into a portable blob.
    ///
    /// Dynamic endpoints are skipped: they are code, not content.
    /// Saving an unchanged server twice yields byte-identical blobs.
    pub fn save_archive(&self) -> io::Result<Vec<u8>> {
        let state = self.state.lock();
        archive::save(&state)
    }

    /// Write [`save_archive`](Self::save_archive) output to a file.
    pub fn save_archive_file(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let blob = self.save_archive()?;
        std::fs::write(path, blob)
    }

    /// Restore routes and assets from an archive blob.
    ///
    /// Content stays inside the archive and is decompressed per
    /// request. A malformed archive leaves the server untouched.
    pub fn load_archive(&self, bytes: Vec<u8>) -> Result<(), ArchiveError> {
        let reader = SharedReader::from_bytes(bytes)?;
        let mut state = self.state.lock();
        archive::load(&mut state, &reader)
    }

    /// Restore from an archive file without reading it into memory;
    /// entries are fetched lazily through a shared handle for as long
    /// as any restored asset lives.
    pub fn load_archive_file(&self, path: impl AsRef<Path>) -> Result<(), ArchiveError> {
        let file = std::fs::File::open(path)?;
        let reader = SharedReader::new(Box::new(file))?;
        let mut state = self.state.lock();
        archive::load(&mut state, &reader)
    }

    /// Bind `interface:port` (retrying the next few ports if taken) and
    /// serve until the process exits, one thread per request.
    pub fn serve_forever(self: Arc<Self>, interface: IpAddr, port: u16) -> anyhow::Result<()> {
        let (listener, addr) = serve::bind_with_retry(interface, port)?;
        log::info!("serving on http://{addr}");
        serve::serve(self, listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::thread;
    use std::time::Duration;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        path
    }

    fn body_of(server: &DevServer, url: &str) -> Vec<u8> {
        let mut sink = crate::sink::BufferedResponse::new();
        let request = RequestHead::new("GET", url);
        server
            .dispatch(url, "GET")
            .respond(server, &request, &mut sink)
            .unwrap();
        sink.body
    }

    #[test]
    fn test_static_dispatch_serves_file_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "hello.txt", "hello world");

        let server = DevServer::new();
        server.add_static("hello.txt", &path, None, None).unwrap();

        assert_eq!(body_of(&server, "hello.txt"), b"hello world");
    }

    #[test]
    fn test_unknown_route_is_not_found() {
        let server = DevServer::new();
        assert!(matches!(
            server.dispatch("nope/nothing.html", "GET"),
            Endpoint::NotFound
        ));
    }

    #[test]
    fn test_duplicate_static_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_file(dir.path(), "first.txt", "first");
        let second = write_file(dir.path(), "second.txt", "second");

        let server = DevServer::new();
        server.add_static("page.txt", &first, None, None).unwrap();
        server.add_static("page.txt", &second, None, None).unwrap();

        assert_eq!(body_of(&server, "page.txt"), b"second");
    }

    #[test]
    fn test_duplicate_dynamic_fails_and_first_wins() {
        let server = DevServer::new();
        server
            .add_dynamic("gen.txt", |_r, _s| Ok(Content::from("one")))
            .unwrap();
        let err = server
            .add_dynamic("gen.txt", |_r, _s| Ok(Content::from("two")))
            .unwrap_err();

        assert!(matches!(err, RegisterError::DuplicateRoute(_)));
        assert_eq!(body_of(&server, "gen.txt"), b"one");
    }

    #[test]
    fn test_redirect_requires_registered_target() {
        let server = DevServer::new();
        let err = server.redirect("", "index.html").unwrap_err();
        assert!(matches!(err, RegisterError::UnknownTarget(_)));
    }

    #[test]
    fn test_redirect_resolves_one_hop() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "index.html", "<p>home</p>");

        let server = DevServer::new();
        server.add_static("index.html", &path, None, None).unwrap();
        server.redirect("", "index.html").unwrap();

        assert_eq!(body_of(&server, ""), b"<p>home</p>");
        let direct = server.dispatch("index.html", "GET");
        let aliased = server.dispatch("", "GET");
        assert_eq!(
            direct.static_asset().map(Asset::name),
            aliased.static_asset().map(Asset::name)
        );
    }

    #[test]
    fn test_path_normalization_variants_hit_one_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "b.txt", "deep");

        let server = DevServer::new();
        server.add_static("a/b", &path, None, None).unwrap();

        for variant in ["/a/b", "a/b/", "a\\b", "a/b"] {
            assert_eq!(body_of(&server, variant), b"deep", "variant {variant}");
        }
    }

    #[test]
    fn test_add_static_dir_registers_tree() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "index.html", "root");
        write_file(dir.path(), "css/site.css", "body{}");
        write_file(dir.path(), "css/skip.tmp", "scratch");

        let server = DevServer::new();
        server
            .add_static_dir_filtered("ui", dir.path(), |rel| {
                rel.extension().is_none_or(|ext| ext != "tmp")
            })
            .unwrap();

        assert_eq!(body_of(&server, "ui/index.html"), b"root");
        assert_eq!(body_of(&server, "ui/css/site.css"), b"body{}");
        assert!(matches!(
            server.dispatch("ui/css/skip.tmp", "GET"),
            Endpoint::NotFound
        ));
    }

    #[test]
    fn test_missing_file_fails_registration() {
        let server = DevServer::new();
        let err = server
            .add_static("ghost.txt", "/no/such/ghost.txt", None, None)
            .unwrap_err();
        assert!(matches!(err, RegisterError::FileNotFound(_)));
    }

    #[test]
    fn test_dynamic_content_type_from_basename() {
        let server = DevServer::new();
        server
            .add_dynamic("api/data.json", |_r, _s| Ok(Content::from("{}")))
            .unwrap();

        let mut sink = crate::sink::BufferedResponse::new();
        let request = RequestHead::new("GET", "/api/data.json");
        server
            .dispatch("api/data.json", "GET")
            .respond(&server, &request, &mut sink)
            .unwrap();
        assert_eq!(
            sink.header_value("Content-Type"),
            Some(crate::utils::mime::types::JSON)
        );
    }

    #[test]
    fn test_dynamic_content_type_unresolved_is_omitted() {
        let server = DevServer::new();
        server
            .add_dynamic("stream", |_r, _s| Ok(Content::from("...")))
            .unwrap();

        let mut sink = crate::sink::BufferedResponse::new();
        let request = RequestHead::new("GET", "/stream");
        server
            .dispatch("stream", "GET")
            .respond(&server, &request, &mut sink)
            .unwrap();
        assert_eq!(sink.header_value("Content-Type"), None);
    }

    #[test]
    fn test_concurrent_dispatch_is_consistent() {
        let dir = tempfile::tempdir().unwrap();
        let server = DevServer::new();
        for i in 0..100 {
            let path = write_file(dir.path(), &format!("f{i}.txt"), &format!("file-{i}"));
            server
                .add_static(&format!("f{i}.txt"), &path, None, None)
                .unwrap();
        }

        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for i in 0..100 {
                        let url = format!("f{i}.txt");
                        assert_eq!(body_of(&server, &url), format!("file-{i}").as_bytes());
                    }
                });
            }
        });
    }

    #[test]
    fn test_autolocked_handlers_are_serialized() {
        let server = DevServer::new();
        server.with_state(|state| state.set_var("hits", 0));
        server
            .add_dynamic("count", |_r, scope| {
                // Read-sleep-write: only serialized execution keeps every
                // increment.
                let n = scope.with_state(|s| s.var("hits").and_then(|v| v.as_i64()).unwrap_or(0));
                thread::sleep(Duration::from_millis(1));
                scope.with_state(|s| s.set_var("hits", n + 1));
                Ok(Content::Text(n.to_string()))
            })
            .unwrap();

        thread::scope(|scope| {
            for _ in 0..16 {
                scope.spawn(|| {
                    for _ in 0..5 {
                        body_of(&server, "count");
                    }
                });
            }
        });

        let total = server.with_state(|s| s.var("hits").and_then(|v| v.as_i64()).unwrap());
        assert_eq!(total, 80);
    }

    #[test]
    fn test_unlocked_handler_takes_its_own_critical_sections() {
        let server = DevServer::new();
        server
            .add_dynamic_opts(
                "slow",
                |_r, scope| {
                    scope.with_state(|s| s.set_var("a", 1));
                    scope.with_state(|s| s.set_var("b", 2));
                    Ok(Content::from("done"))
                },
                Some(".txt"),
                false,
            )
            .unwrap();

        assert_eq!(body_of(&server, "slow"), b"done");
        assert_eq!(
            server.with_state(|s| s.var("b").and_then(|v| v.as_i64())),
            Some(2)
        );
    }
}
