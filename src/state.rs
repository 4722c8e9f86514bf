use std::time::Duration;

use sqlx::PgPool;

/// Shared application state passed to all handlers.
///
/// The reqwest client is built once at startup with the fixed preview
/// User-Agent and reused across requests for connection pooling. It holds no
/// response data, so concurrent preview requests stay fully isolated.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub http_client: reqwest::Client,
    pub preview_timeout: Duration,
}
