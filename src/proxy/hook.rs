//! Response hook invoked with every proxied body.

use axum::http::{HeaderMap, Method, StatusCode, Uri};
use bytes::Bytes;

/// The request and outcome a hook sees.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub status: StatusCode,
}

/// Side-effecting observer of proxied responses.
///
/// Runs on its own task after the response has been built; whatever it
/// does cannot change or fail the response.
pub trait ResponseHook: Send + Sync {
    fn on_response(&self, ctx: &HookContext, body: &Bytes);
}
