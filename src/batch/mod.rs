//! Batch Module
//!
//! Fans one client request out into several passthrough requests,
//! dispatched in-process against the same router, cache and upstream
//! client, and merges the results into a single JSON array whose cache
//! lifetime is the shortest of its items.

mod lifetime;

use std::collections::BTreeMap;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use futures::future::join_all;
use tower::ServiceExt;
use tracing::{debug, info, warn};
use url::form_urlencoded;

use crate::api::AppState;
use crate::error::{ProxyError, Result};
use crate::models::BatchItem;
use crate::proxy::{apply_identity_headers, options_response};

pub use lifetime::{parse_max_age, AggregateLifetime};

/// Request extension carried by every sub-request of a batch.
///
/// The batch route refuses requests that carry it.
#[derive(Debug, Clone, Copy)]
pub struct BatchDispatch;

// == Batch Query ==
/// Parsed `?x=..&x=..&h=1` query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchQuery {
    pub paths: Vec<String>,
    pub include_headers: bool,
}

impl BatchQuery {
    /// Parses and validates the batch parameters against `max` sub-paths.
    pub fn parse(query: Option<&str>, max: usize) -> Result<Self> {
        let mut paths = Vec::new();
        let mut flag: Option<String> = None;
        for (name, value) in form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
            match name.as_ref() {
                "x" => paths.push(value.into_owned()),
                "h" if flag.is_none() => flag = Some(value.into_owned()),
                _ => {}
            }
        }

        if paths.is_empty() {
            return Err(ProxyError::InvalidRequest("parameter x missing for batch request".to_string()));
        }
        if paths.len() > max {
            return Err(ProxyError::Forbidden(format!(
                "too many requests in batch ({} > {})",
                paths.len(),
                max
            )));
        }
        let include_headers = match flag.as_deref() {
            None | Some("") => false,
            Some("1") => true,
            Some(_) => {
                return Err(ProxyError::InvalidRequest(
                    "parameter h must be 1 or unset for batch request".to_string(),
                ))
            }
        };

        Ok(Self { paths, include_headers })
    }
}

// == Batch Handler ==
/// Handler for the batch route (`/{host}` and `/{host}/`).
pub async fn batch_handler(State(state): State<AppState>, req: Request) -> Response {
    let (parts, _body) = req.into_parts();

    match parts.method {
        Method::OPTIONS => return options_response(),
        Method::GET | Method::HEAD => {}
        _ => return ProxyError::MethodNotAllowed.into_response(),
    }

    if parts.extensions.get::<BatchDispatch>().is_some() {
        warn!(uri = %parts.uri, "recursive batch");
        return ProxyError::Forbidden("batch recursion not allowed".to_string()).into_response();
    }

    let query = match BatchQuery::parse(parts.uri.query(), state.config.max_batch) {
        Ok(query) => query,
        Err(err) => {
            match &err {
                ProxyError::Forbidden(msg) => warn!("batch rejected: {}", msg),
                other => debug!("batch rejected: {}", other),
            }
            return err.into_response();
        }
    };

    info!(n = query.paths.len(), "processing batch request");
    match run(&state, &query).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn run(state: &AppState, query: &BatchQuery) -> Result<Response> {
    let router = &state.dispatch;
    let mount = state.config.mount();

    let results = join_all(
        query
            .paths
            .iter()
            .map(|path| dispatch(router.clone(), &mount, path, query.include_headers)),
    )
    .await;

    let mut lifetime = AggregateLifetime::new(state.config.batch_ttl());
    let mut items = Vec::with_capacity(results.len());
    for (item, cache_control) in results {
        lifetime.observe(
            StatusCode::from_u16(item.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            cache_control.as_deref(),
        );
        items.push(item);
    }
    debug!(cacheable = lifetime.cacheable, max_age = lifetime.max_age, "batch lifetime reduced");

    let body = serde_json::to_vec(&items)
        .map_err(|e| ProxyError::Internal(format!("failed to encode batch: {}", e)))?;

    let mut headers = HeaderMap::new();
    apply_identity_headers(&mut headers);
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    lifetime.apply(&mut headers, state.clock.now());

    Ok((StatusCode::OK, headers, body).into_response())
}

/// Runs one sub-path through `router`, capturing the result in memory.
async fn dispatch(router: Router, mount: &str, path: &str, include_headers: bool) -> (BatchItem, Option<String>) {
    let uri = format!("{}/{}", mount, path.trim_start_matches('/'));
    let request = match Request::builder()
        .method(Method::GET)
        .uri(&uri)
        .extension(BatchDispatch)
        .body(Body::empty())
    {
        Ok(request) => request,
        Err(err) => {
            debug!(path, "malformed batch sub-path: {}", err);
            return (BatchItem::new(StatusCode::BAD_REQUEST.as_u16(), err.to_string()), None);
        }
    };

    let response = router.oneshot(request).await.unwrap_or_else(|never| match never {});
    let status = response.status();
    let cache_control = response
        .headers()
        .get(header::CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let header = include_headers.then(|| {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in response.headers() {
            map.entry(name.as_str().to_string())
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }
        map
    });

    match axum::body::to_bytes(response.into_body(), usize::MAX).await {
        Ok(body) => (
            BatchItem {
                status: status.as_u16(),
                header,
                body: String::from_utf8_lossy(&body).into_owned(),
            },
            cache_control,
        ),
        Err(err) => {
            warn!(uri = %uri, "failed to read batch item body: {}", err);
            (BatchItem::new(StatusCode::BAD_GATEWAY.as_u16(), err.to_string()), None)
        }
    }
}
