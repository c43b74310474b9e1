//! HTTP read surface: the accounts page and a liveness check.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::accounts::{list_all_accounts, ConnectionAccounts};
use crate::state::AppState;

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(accounts_page))
        .route("/healthz", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler() -> StatusCode {
    StatusCode::OK
}

async fn accounts_page(State(state): State<AppState>) -> Html<String> {
    info!(
        "[HTTP] Rendering accounts for {} connection(s)",
        state.registry.len()
    );
    let listings = list_all_accounts(&state.registry, &state.http).await;
    Html(render_accounts_page(&listings))
}

/// Renders one section per connection with one list item per line.
pub fn render_accounts_page(listings: &[ConnectionAccounts]) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Salesforce Accounts</title></head>\n<body>\n<h1>Salesforce Accounts</h1>\n",
    );

    if listings.is_empty() {
        html.push_str("<p>No connections configured.</p>\n");
    }

    for listing in listings {
        html.push_str("<section>\n<h2>");
        html.push_str(&escape_html(&listing.connection));
        html.push_str("</h2>\n<ul>\n");
        for line in listing.display_lines() {
            html.push_str("<li>");
            html.push_str(&escape_html(&line));
            html.push_str("</li>\n");
        }
        html.push_str("</ul>\n</section>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ConnectionRegistry;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn empty_state() -> AppState {
        AppState::new(
            Arc::new(ConnectionRegistry::default()),
            reqwest::Client::new(),
        )
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        let response = router(empty_state())
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn index_renders_without_connections() {
        let response = router(empty_state())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("<h1>Salesforce Accounts</h1>"));
        assert!(html.contains("No connections configured."));
    }

    #[test]
    fn render_escapes_account_names() {
        let listings = vec![ConnectionAccounts {
            connection: "orgA".to_string(),
            result: Ok(vec!["<script>x</script> & Co (ID: 001A)".to_string()]),
        }];

        let html = render_accounts_page(&listings);

        assert!(html.contains("<h2>orgA</h2>"));
        assert!(html.contains("<li>&lt;script&gt;x&lt;/script&gt; &amp; Co (ID: 001A)</li>"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn render_shows_error_line() {
        let listings = vec![ConnectionAccounts {
            connection: "orgB".to_string(),
            result: Err("Query failed: HTTP 500 - Internal Server Error".to_string()),
        }];

        let html = render_accounts_page(&listings);

        assert!(html.contains(
            "<li>Error retrieving accounts: Query failed: HTTP 500 - Internal Server Error</li>"
        ));
    }
}
