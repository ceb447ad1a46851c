//! tiny_http listener glue.
//!
//! Accepts connections, spawns one thread per request and feeds each
//! request through the server's dispatch path. The endpoint writes into
//! a [`BufferedResponse`], which is drained into a real `tiny_http`
//! response at the end, keeping endpoints free of any listener types.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::thread;

use anyhow::Result;
use tiny_http::{Header, Response, Server, StatusCode};

use crate::request::RequestHead;
use crate::server::DevServer;
use crate::sink::BufferedResponse;

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

/// Bind to the given interface and port, with automatic port retry.
///
/// Returns the listener and the address it actually bound.
pub fn bind_with_retry(interface: IpAddr, base_port: u16) -> Result<(Server, SocketAddr)> {
    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log::info!("port {base_port} in use, using {port} instead");
                }
                let bound = server.server_addr().to_ip().unwrap_or(addr);
                return Ok((server, bound));
            }
            Err(_) if offset + 1 < MAX_PORT_RETRIES => continue,
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "failed to bind after {} attempts (ports {}-{}): {}",
                    MAX_PORT_RETRIES,
                    base_port,
                    port,
                    e
                ));
            }
        }
    }
    unreachable!()
}

/// Serve requests until the listener shuts down.
///
/// One thread per accepted request, unbounded; a slow handler or a slow
/// client only ever blocks its own thread.
pub fn serve(server: Arc<DevServer>, listener: Server) -> Result<()> {
    for request in listener.incoming_requests() {
        let server = Arc::clone(&server);
        thread::spawn(move || {
            if let Err(e) = handle_request(&server, request) {
                log::warn!("request failed: {e}");
            }
        });
    }
    Ok(())
}

/// Dispatch one request and send back whatever the endpoint produced.
fn handle_request(server: &DevServer, request: tiny_http::Request) -> io::Result<()> {
    let head = request_head(&request);
    log::debug!("{} {}", head.method(), head.url());

    let endpoint = server.dispatch(head.url(), head.method());

    let mut sink = BufferedResponse::new();
    endpoint.respond(server, &head, &mut sink)?;
    reply(request, sink)
}

/// Detach the request metadata from the connection.
fn request_head(request: &tiny_http::Request) -> RequestHead {
    let headers = request
        .headers()
        .iter()
        .map(|h| (h.field.as_str().as_str().to_string(), h.value.to_string()))
        .collect();
    RequestHead::with_headers(request.method().to_string(), request.url(), headers)
}

/// Drain a buffered response into the connection.
///
/// tiny_http emits `Content-Length` itself from the declared data
/// length, so the header is translated rather than passed through; a
/// response without one is delimited by connection close.
fn reply(request: tiny_http::Request, sink: BufferedResponse) -> io::Result<()> {
    let BufferedResponse {
        status,
        headers,
        body,
    } = sink;

    let mut out_headers = Vec::new();
    let mut data_length = None;
    for (name, value) in headers {
        if name.eq_ignore_ascii_case("content-length") {
            data_length = Some(body.len());
            continue;
        }
        if let Ok(header) = Header::from_bytes(name.as_bytes(), value.as_bytes()) {
            out_headers.push(header);
        }
    }

    let response = Response::new(
        StatusCode(status.unwrap_or(500)),
        out_headers,
        io::Cursor::new(body),
        data_length,
        None,
    );
    request.respond(response)
}
