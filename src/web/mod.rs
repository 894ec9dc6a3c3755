pub mod http;
pub mod pages;
pub mod routes;
pub mod session;

use anyhow::{Result, anyhow};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tiny_http::{Header, Request, Response, Server};

use self::http::{HttpRequest, HttpResponse};
use self::routes::App;

/// Serve `app` on `bind` one request at a time until `running` goes false.
pub fn serve(app: &App, bind: &str, running: &AtomicBool) -> Result<()> {
    let server = Server::http(bind).map_err(|e| anyhow!("cannot listen on {bind}: {e}"))?;
    info!("listening on http://{bind}");

    while running.load(Ordering::SeqCst) {
        let Some(request) = accepted(server.recv_timeout(Duration::from_millis(500))) else {
            continue;
        };

        let req = incoming(&request);
        let resp = app.handle(&req);
        debug!("{} {} -> {}", req.method, req.path, resp.status);
        if let Err(e) = respond(request, resp) {
            warn!("failed to send response: {e}");
        }
    }

    info!("server stopped");
    Ok(())
}

// `None` on a poll timeout or a failed accept.
fn accepted<T>(polled: std::io::Result<Option<T>>) -> Option<T> {
    polled.unwrap_or_else(|e| {
        warn!("failed to accept request: {e}");
        None
    })
}

fn incoming(request: &Request) -> HttpRequest {
    request.headers().iter().fold(
        HttpRequest::new(&request.method().to_string(), request.url()),
        |req, h| req.with_header(&h.field.to_string(), &h.value.to_string()),
    )
}

fn respond(request: Request, resp: HttpResponse) -> std::io::Result<()> {
    let mut response = Response::from_data(resp.body).with_status_code(resp.status);
    for (name, value) in &resp.headers {
        match Header::from_bytes(name.as_bytes(), value.as_bytes()) {
            Ok(header) => response.add_header(header),
            Err(()) => warn!("dropping invalid response header {name}"),
        }
    }
    request.respond(response)
}
