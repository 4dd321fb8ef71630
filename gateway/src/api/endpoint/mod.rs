use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tokio::net::TcpListener;

use crate::api::controllers;
use crate::api::state::ApiState;

pub const ALLOW_ORIGIN: &str = "*";
pub const ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type";
pub const ALLOW_METHODS: &str = "POST, OPTIONS";

pub struct ApiEndpointBuilder {
    healthcheck_route: Option<String>,
}

impl Default for ApiEndpointBuilder {
    #[inline]
    fn default() -> Self {
        Self {
            healthcheck_route: Some("/".to_owned()),
        }
    }
}

impl ApiEndpointBuilder {
    pub async fn bind(self, state: ApiState) -> Result<ApiEndpoint> {
        let listener = state.bind_socket().await?;
        Ok(ApiEndpoint::from_parts(listener, self.build(), state))
    }

    fn build(self) -> axum::Router<ApiState> {
        let mut router = axum::Router::new();

        if let Some(route) = self.healthcheck_route {
            router = router.route(&route, get(health_check));
        }

        router.route(
            "/sync-to-sheets",
            post(controllers::sync::sync_to_sheets).options(controllers::sync::preflight),
        )
    }
}

pub struct ApiEndpoint {
    listener: TcpListener,
    router: axum::Router<()>,
}

impl ApiEndpoint {
    pub fn builder() -> ApiEndpointBuilder {
        ApiEndpointBuilder::default()
    }

    pub fn from_parts(
        listener: TcpListener,
        router: axum::Router<ApiState>,
        state: ApiState,
    ) -> Self {
        let router = with_middleware(router, state);
        Self { listener, router }
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn serve(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router).await
    }
}

/// Attaches body limit, CORS headers and the optional timeout.
///
/// Oversized bodies and timeouts are answered like any other failure.
fn with_middleware(router: axum::Router<ApiState>, state: ApiState) -> axum::Router<()> {
    use tower::ServiceBuilder;
    use tower_http::set_header::SetResponseHeaderLayer;
    use tower_http::timeout::TimeoutLayer;

    let timeout = state.config().request_timeout;

    // CORS headers go on every response, errors included.
    let service = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static(ALLOW_ORIGIN),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        ))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_SIZE));

    let router = match timeout {
        Some(timeout) => router.layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        )),
        None => router,
    };

    router
        .layer(axum::middleware::map_response(uniform_failure))
        .layer(service)
        .with_state(state)
}

async fn uniform_failure(response: Response) -> Response {
    let message = match response.status() {
        StatusCode::PAYLOAD_TOO_LARGE => "request body too large",
        StatusCode::REQUEST_TIMEOUT => "request timed out",
        _ => return response,
    };

    tracing::error!(status = %response.status(), "{message}");
    controllers::sync::error_response(message.to_owned())
}

fn health_check() -> futures_util::future::Ready<impl IntoResponse> {
    futures_util::future::ready(chrono::Utc::now().timestamp_millis().to_string())
}

const MAX_REQUEST_SIZE: usize = 2 << 17; // 256kb
