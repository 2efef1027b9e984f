//! Response headers for the JSON API.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};

/// Adds headers that keep challenges and session tokens out of caches and
/// referrers.
///
/// - **Cache-Control: no-store**: responses carry one-time challenges and
///   bearer tokens.
/// - **X-Content-Type-Options: nosniff**
/// - **Referrer-Policy: no-referrer**
///
/// # Usage
///
/// ```rust,no_run
/// use axum::Router;
/// use axum::middleware;
/// use keygate::middleware::api_headers;
///
/// let app: Router = Router::new()
///     .layer(middleware::from_fn(api_headers));
/// ```
pub async fn api_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("cache-control", HeaderValue::from_static("no-store"));
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("referrer-policy", HeaderValue::from_static("no-referrer"));

    response
}
