//! Request-side plumbing: the consulted marker and internal redirects.

use axum::extract::{OriginalUri, Request};
use axum::http::header;
use axum::http::uri::{InvalidUri, Uri};
use sysguard_core::GuardedRequest;

/// Request extension set once the guard has run for a request.
///
/// Internal redirects re-dispatch the same request value, so the marker
/// follows the request through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Consulted;

/// [`GuardedRequest`] view of an HTTP request.
pub(crate) struct HttpRequest<'a>(pub(crate) &'a mut Request);

impl GuardedRequest for HttpRequest<'_> {
    fn is_consulted(&self) -> bool {
        self.0.extensions().get::<Consulted>().is_some()
    }

    fn mark_consulted(&mut self) {
        self.0.extensions_mut().insert(Consulted);
    }

    fn host(&self) -> Option<&str> {
        self.0
            .headers()
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .or_else(|| self.0.uri().host())
    }

    fn target(&self) -> &str {
        self.0
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
    }
}

/// Points `req` at `path`, keeping the original query string.
///
/// The pre-redirect URI is kept as [`OriginalUri`] unless an outer layer
/// already recorded one.
pub(crate) fn internal_redirect(mut req: Request, path: &str) -> Result<Request, InvalidUri> {
    let original = req.uri().clone();
    let target: Uri = match original.query() {
        Some(query) => format!("{}?{}", path, query).parse()?,
        None => path.parse()?,
    };

    if req.extensions().get::<OriginalUri>().is_none() {
        req.extensions_mut().insert(OriginalUri(original));
    }
    *req.uri_mut() = target;
    Ok(req)
}
