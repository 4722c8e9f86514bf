use std::collections::BTreeMap;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::Json;
use scraper::{Html, Selector};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::error::{AppError, AppResult};
use crate::models::UrlPreviewDto;
use crate::state::AppState;

/// Browser-like identifier; some sites refuse default HTTP client UAs.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

// ── Pipeline failures ──────────────────────────────────────────────────────

/// Typed failure for the preview pipeline. The kinds are mutually exclusive
/// and the first failing stage short-circuits the rest; nothing is retried.
#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("Request timed out")]
    Timeout,
    #[error("HTTP error! status: {0}")]
    UpstreamStatus(u16),
    #[error("Failed to fetch URL: {0}")]
    Network(String),
}

impl From<PreviewError> for AppError {
    fn from(e: PreviewError) -> Self {
        match e {
            PreviewError::InvalidUrl => AppError::Validation("Invalid URL".into()),
            PreviewError::Timeout => AppError::Timeout("Request timed out".into()),
            PreviewError::UpstreamStatus(_) | PreviewError::Network(_) => {
                AppError::Upstream(e.to_string())
            }
        }
    }
}

// ── Validator ──────────────────────────────────────────────────────────────

/// Syntactic check only: an absolute http/https URL with an authority.
/// No DNS lookup and no I/O happen here.
pub fn validate_url(raw: &str) -> Result<Url, PreviewError> {
    let parsed = Url::parse(raw).map_err(|_| PreviewError::InvalidUrl)?;

    match parsed.scheme() {
        "http" | "https" => {}
        _ => return Err(PreviewError::InvalidUrl),
    }

    if parsed.host_str().is_none() {
        return Err(PreviewError::InvalidUrl);
    }

    Ok(parsed)
}

// ── Bounded fetcher ────────────────────────────────────────────────────────

/// Single outbound GET bounded by `timeout`.
///
/// The fetch future (send plus full body read) races the deadline. When the
/// deadline wins, the future is dropped, which aborts the in-flight
/// connection; partially received bytes are discarded, not returned. Failure
/// kinds, first match wins: timeout, non-success status, transport error.
pub async fn fetch_page(
    client: &reqwest::Client,
    url: &Url,
    timeout: Duration,
) -> Result<String, PreviewError> {
    let fetch = async {
        let response = client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| PreviewError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PreviewError::UpstreamStatus(status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| PreviewError::Network(e.to_string()))
    };

    match tokio::time::timeout(timeout, fetch).await {
        Ok(result) => result,
        Err(_) => Err(PreviewError::Timeout),
    }
}

// ── Metadata extractor ─────────────────────────────────────────────────────

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ExtractedMetadata {
    /// Open Graph properties keyed with the `og:` prefix stripped.
    pub open_graph: BTreeMap<String, String>,
    /// Holds at most `description`, and only when no `og:description` exists.
    pub meta: BTreeMap<String, String>,
    /// Trimmed text of the first `<title>` element, if non-empty.
    pub raw_title: Option<String>,
}

/// Pull preview metadata out of untrusted HTML.
///
/// This never fails: the parser is tolerant, and malformed or empty markup
/// simply yields empty fields.
pub fn extract_metadata(html: &str) -> ExtractedMetadata {
    let document = Html::parse_document(html);

    let mut open_graph = BTreeMap::new();
    if let Ok(selector) = Selector::parse(r#"meta[property^="og:"]"#) {
        for element in document.select(&selector) {
            let Some(key) = element
                .value()
                .attr("property")
                .and_then(|p| p.strip_prefix("og:"))
            else {
                continue;
            };
            match element.value().attr("content") {
                // Later occurrences in document order overwrite earlier ones.
                Some(content) if !content.is_empty() => {
                    open_graph.insert(key.to_string(), content.to_string());
                }
                _ => {}
            }
        }
    }

    let mut meta = BTreeMap::new();
    if !open_graph.contains_key("description") {
        if let Ok(selector) = Selector::parse(r#"meta[name="description"]"#) {
            if let Some(content) = document
                .select(&selector)
                .filter_map(|el| el.value().attr("content"))
                .filter(|c| !c.is_empty())
                .last()
            {
                meta.insert("description".to_string(), content.to_string());
            }
        }
    }

    let raw_title = Selector::parse("title").ok().and_then(|selector| {
        document
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
    });

    ExtractedMetadata {
        open_graph,
        meta,
        raw_title,
    }
}

// ── Title resolver ─────────────────────────────────────────────────────────

/// Fixed precedence: `og:title`, then the trimmed `<title>` text, then the
/// caller's URL string verbatim. The result is never empty.
pub fn resolve_title(extracted: &ExtractedMetadata, requested_url: &str) -> String {
    extracted
        .open_graph
        .get("title")
        .cloned()
        .or_else(|| extracted.raw_title.clone())
        .unwrap_or_else(|| requested_url.to_string())
}

// ── Query params ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct FetchUrlTitleQuery {
    /// Optional so a missing parameter produces the JSON error envelope
    /// rather than axum's plain-text query rejection.
    pub url: Option<String>,
}

// ── Handler ────────────────────────────────────────────────────────────────

/// GET /api/fetch-url-title?url=<encoded-url>
///
/// Fetches the page under a hard timeout and resolves a best-effort title
/// plus Open Graph metadata. Stateless: no cache and no de-duplication of
/// in-flight URLs, so concurrent requests are fully independent.
pub async fn fetch_url_title(
    State(state): State<AppState>,
    Query(params): Query<FetchUrlTitleQuery>,
) -> AppResult<Json<UrlPreviewDto>> {
    let raw_url = params
        .url
        .ok_or_else(|| AppError::Validation("Missing url query parameter".into()))?;

    let target = validate_url(&raw_url)?;

    let html = fetch_page(&state.http_client, &target, state.preview_timeout)
        .await
        .map_err(|e| {
            tracing::warn!(url = %raw_url, error = %e, "Failed to fetch URL for preview");
            AppError::from(e)
        })?;

    let extracted = extract_metadata(&html);
    let title = resolve_title(&extracted, &raw_url);

    Ok(Json(UrlPreviewDto {
        success: true,
        title,
        url: raw_url,
        open_graph: (!extracted.open_graph.is_empty()).then_some(extracted.open_graph),
        meta: (!extracted.meta.is_empty()).then_some(extracted.meta),
    }))
}

// ── Unit tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // Validator

    #[test]
    fn accepts_http_and_https() {
        assert!(validate_url("http://example.com").is_ok());
        assert!(validate_url("https://example.com/a?b=c").is_ok());
    }

    #[test]
    fn rejects_empty_string() {
        assert!(validate_url("").is_err());
    }

    #[test]
    fn rejects_missing_scheme() {
        assert!(validate_url("example.com/page").is_err());
        assert!(validate_url("not-a-url").is_err());
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("javascript:alert(1)").is_err());
        assert!(validate_url("mailto:a@example.com").is_err());
    }

    // Extractor

    #[test]
    fn strips_og_prefix() {
        let html = r#"<html><head>
            <meta property="og:title" content="T"/>
            <meta property="og:image" content="https://example.com/i.png"/>
        </head></html>"#;
        let extracted = extract_metadata(html);
        assert_eq!(extracted.open_graph.get("title").map(String::as_str), Some("T"));
        assert_eq!(
            extracted.open_graph.get("image").map(String::as_str),
            Some("https://example.com/i.png")
        );
    }

    #[test]
    fn strips_og_prefix_exactly_once() {
        let html = r#"<meta property="og:og:title" content="X"/>"#;
        let extracted = extract_metadata(html);
        assert_eq!(
            extracted.open_graph.get("og:title").map(String::as_str),
            Some("X")
        );
    }

    #[test]
    fn later_og_occurrence_wins() {
        let html = r#"<html><head>
            <meta property="og:title" content="First"/>
            <meta property="og:title" content="Second"/>
        </head></html>"#;
        let extracted = extract_metadata(html);
        assert_eq!(
            extracted.open_graph.get("title").map(String::as_str),
            Some("Second")
        );
        assert_eq!(extracted.open_graph.len(), 1);
    }

    #[test]
    fn skips_og_tags_without_content() {
        let html = r#"<html><head>
            <meta property="og:title"/>
            <meta property="og:description" content=""/>
        </head></html>"#;
        let extracted = extract_metadata(html);
        assert!(extracted.open_graph.is_empty());
    }

    #[test]
    fn og_description_suppresses_meta_description() {
        let html = r#"<html><head>
            <meta property="og:description" content="X"/>
            <meta name="description" content="Y"/>
        </head></html>"#;
        let extracted = extract_metadata(html);
        assert_eq!(
            extracted.open_graph.get("description").map(String::as_str),
            Some("X")
        );
        assert!(extracted.meta.is_empty());
    }

    #[test]
    fn meta_description_used_when_no_og_description() {
        let html = r#"<html><head><meta name="description" content="Y"/></head></html>"#;
        let extracted = extract_metadata(html);
        assert_eq!(
            extracted.meta.get("description").map(String::as_str),
            Some("Y")
        );
    }

    #[test]
    fn last_meta_description_wins() {
        let html = r#"<html><head>
            <meta name="description" content="A"/>
            <meta name="description" content="B"/>
        </head></html>"#;
        let extracted = extract_metadata(html);
        assert_eq!(
            extracted.meta.get("description").map(String::as_str),
            Some("B")
        );
    }

    #[test]
    fn title_text_is_trimmed() {
        let html = "<html><head><title>  Page Title  </title></head></html>";
        let extracted = extract_metadata(html);
        assert_eq!(extracted.raw_title.as_deref(), Some("Page Title"));
    }

    #[test]
    fn whitespace_only_title_is_absent() {
        let html = "<html><head><title>   </title></head></html>";
        let extracted = extract_metadata(html);
        assert!(extracted.raw_title.is_none());
    }

    #[test]
    fn first_title_element_wins() {
        let html = "<html><head><title>First</title><title>Second</title></head></html>";
        let extracted = extract_metadata(html);
        assert_eq!(extracted.raw_title.as_deref(), Some("First"));
    }

    #[test]
    fn malformed_html_degrades_to_empty_metadata() {
        let extracted = extract_metadata("<html><<<><meta property=og:broken</body>");
        assert!(extracted.meta.is_empty());
        assert!(extracted.raw_title.is_none());
    }

    #[test]
    fn empty_input_yields_empty_metadata() {
        let extracted = extract_metadata("");
        assert_eq!(extracted, ExtractedMetadata::default());
    }

    // Title resolver

    #[test]
    fn og_title_takes_precedence_over_title_tag() {
        let html = r#"<html><head>
            <title>B</title>
            <meta property="og:title" content="A"/>
        </head></html>"#;
        let extracted = extract_metadata(html);
        assert_eq!(resolve_title(&extracted, "https://example.com"), "A");
    }

    #[test]
    fn falls_back_to_title_tag() {
        let html = "<html><head><title>  B  </title></head></html>";
        let extracted = extract_metadata(html);
        assert_eq!(resolve_title(&extracted, "https://example.com"), "B");
    }

    #[test]
    fn falls_back_to_requested_url_verbatim() {
        let extracted = extract_metadata("<html><head></head></html>");
        assert_eq!(
            resolve_title(&extracted, "https://example.com/page?q=1"),
            "https://example.com/page?q=1"
        );
    }

    // Error mapping

    #[test]
    fn preview_errors_map_to_app_errors() {
        assert!(matches!(
            AppError::from(PreviewError::InvalidUrl),
            AppError::Validation(_)
        ));
        assert!(matches!(
            AppError::from(PreviewError::Timeout),
            AppError::Timeout(_)
        ));
        assert!(matches!(
            AppError::from(PreviewError::UpstreamStatus(503)),
            AppError::Upstream(_)
        ));
        assert!(matches!(
            AppError::from(PreviewError::Network("refused".into())),
            AppError::Upstream(_)
        ));
    }

    #[test]
    fn upstream_status_message_carries_code() {
        let AppError::Upstream(msg) = AppError::from(PreviewError::UpstreamStatus(404)) else {
            panic!("expected Upstream");
        };
        assert_eq!(msg, "HTTP error! status: 404");
    }
}
