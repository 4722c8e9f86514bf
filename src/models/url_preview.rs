use std::collections::BTreeMap;

use serde::Serialize;

/// Successful response of `GET /api/fetch-url-title`.
///
/// `title` is never empty (the pipeline falls back to the requested URL) and
/// `url` echoes the caller's input verbatim. The two metadata maps are
/// omitted from the JSON entirely when empty, never serialized as `{}`.
/// `BTreeMap` keeps serialization deterministic, so identical requests
/// against an unchanged page produce byte-identical bodies.
#[derive(Debug, Clone, Serialize)]
pub struct UrlPreviewDto {
    pub success: bool,
    pub title: String,
    pub url: String,
    #[serde(rename = "openGraph", skip_serializing_if = "Option::is_none")]
    pub open_graph: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<BTreeMap<String, String>>,
}
