//! Latest-version endpoints.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::api::AppState;
use crate::latest::Version;
use crate::proxy::apply_identity_headers;

fn no_store() -> HeaderMap {
    let mut headers = HeaderMap::new();
    apply_identity_headers(&mut headers);
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store, must-revalidate"));
    headers
}

fn text(body: String) -> Response {
    let mut headers = no_store();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    (StatusCode::OK, headers, body).into_response()
}

fn redirect(url: &str) -> Response {
    let mut headers = no_store();
    match HeaderValue::from_str(url) {
        Ok(location) if !url.is_empty() => {
            headers.insert(header::LOCATION, location);
            (StatusCode::TEMPORARY_REDIRECT, headers).into_response()
        }
        _ => (StatusCode::NOT_FOUND, headers, "not seen yet").into_response(),
    }
}

/// Handler for GET /latest/version
pub async fn version_handler(State(state): State<AppState>) -> Response {
    text(state.latest.snapshot().version.to_string())
}

/// Handler for GET /latest/notes
pub async fn notes_handler(State(state): State<AppState>) -> Response {
    text(state.latest.snapshot().notes.to_string())
}

/// Handler for GET /latest/version/redirect
pub async fn version_redirect_handler(State(state): State<AppState>) -> Response {
    redirect(&state.latest.snapshot().version_url)
}

/// Handler for GET /latest/notes/redirect
pub async fn notes_redirect_handler(State(state): State<AppState>) -> Response {
    redirect(&state.latest.snapshot().notes_url)
}

// == Version Badge ==
/// Query overrides for the SVG badge: width, height (also the font size),
/// font family and fill colour.
#[derive(Debug, Default, Deserialize)]
pub struct BadgeParams {
    pub fw: Option<String>,
    pub fh: Option<String>,
    pub ff: Option<String>,
    pub fc: Option<String>,
}

impl BadgeParams {
    /// Renders `version` as a single line of SVG text.
    ///
    /// Double quotes in overrides become single quotes so a value can never
    /// close its attribute.
    pub fn render(&self, version: Version, now: DateTime<Utc>) -> String {
        let width = attr(&self.fw, "72");
        let height = attr(&self.fh, "12");
        let family = attr(&self.ff, "Verdana, Arial, Helvetica, sans-serif");
        let fill = attr(&self.fc, "#000");

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><svg xmlns="http://www.w3.org/2000/svg" version="1.1" width="{width}" height="{height}"><text x="0" y="{height}" font-size="{height}" font-family="{family}" fill="{fill}">{version}</text><!--{}--></svg>"#,
            now.to_rfc3339()
        )
    }
}

fn attr(value: &Option<String>, default: &str) -> String {
    match value.as_deref() {
        Some(v) if !v.is_empty() => v.replace('&', "&amp;").replace('<', "&lt;").replace('"', "'"),
        _ => default.to_string(),
    }
}

/// Handler for GET /latest/version/svg
pub async fn version_svg_handler(State(state): State<AppState>, Query(params): Query<BadgeParams>) -> Response {
    let mut headers = no_store();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/svg+xml"));
    let body = params.render(state.latest.snapshot().version, state.clock.now());
    (StatusCode::OK, headers, body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_badge_defaults() {
        let svg = BadgeParams::default().render(Version([4, 20, 14601]), now());

        assert!(svg.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?><svg"#));
        assert!(svg.contains(r#"width="72" height="12""#));
        assert!(svg.contains(r##"font-family="Verdana, Arial, Helvetica, sans-serif" fill="#000">4.20.14601</text>"##));
        assert!(svg.ends_with("<!--2023-11-14T22:13:20+00:00--></svg>"));
    }

    #[test]
    fn test_badge_overrides_cannot_break_attributes() {
        let params = BadgeParams {
            fw: Some("100".to_string()),
            fh: Some(String::new()),
            ff: Some(r#"Mono" onload="alert(1)"#.to_string()),
            fc: Some("<red>".to_string()),
        };

        let svg = params.render(Version::default(), now());

        assert!(svg.contains(r#"width="100" height="12""#));
        assert!(svg.contains(r#"font-family="Mono' onload='alert(1)""#));
        assert!(svg.contains(r#"fill="&lt;red>""#));
        assert!(!svg.contains(r#"" onload"#));
    }
}
