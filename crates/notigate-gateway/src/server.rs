// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::middleware as axum_middleware;
use axum::routing::{get, post};
use axum::Router;
use notigate_config::ServerConfig;
use notigate_core::{NotigateError, PushProvider};
use notigate_whatsapp::SessionManager;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{API_KEY_HEADER, AuthConfig, auth_middleware};
use crate::error::ApiError;
use crate::handlers::{self, dual, push, whatsapp};
use crate::rate_limit::{FixedWindowLimiter, RateLimits, rate_limit_middleware};

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// `None` when push is disabled in the configuration.
    pub push: Option<Arc<dyn PushProvider>>,
    /// `None` when WhatsApp is disabled in the configuration.
    pub whatsapp: Option<Arc<SessionManager>>,
    /// Process start time for uptime calculation.
    pub start_time: Instant,
}

impl GatewayState {
    pub fn new(
        push: Option<Arc<dyn PushProvider>>,
        whatsapp: Option<Arc<SessionManager>>,
    ) -> Self {
        Self {
            push,
            whatsapp,
            start_time: Instant::now(),
        }
    }

    pub fn push(&self) -> Result<&Arc<dyn PushProvider>, ApiError> {
        self.push
            .as_ref()
            .ok_or(ApiError::Disabled("push notifications"))
    }

    pub fn whatsapp(&self) -> Result<&Arc<SessionManager>, ApiError> {
        self.whatsapp.as_ref().ok_or(ApiError::Disabled("WhatsApp"))
    }
}

fn limited(
    router: Router<GatewayState>,
    limiter: &Option<Arc<FixedWindowLimiter>>,
) -> Router<GatewayState> {
    match limiter {
        Some(limiter) => router.route_layer(axum_middleware::from_fn_with_state(
            limiter.clone(),
            rate_limit_middleware,
        )),
        None => router,
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim_end_matches('/')) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(API_KEY_HEADER),
        ])
        .allow_credentials(true)
}

/// Builds the full application router.
///
/// Public: `GET /` and `GET /api/notifications/health`. Everything else
/// under `/api/notifications` requires an API key. The general rate limit
/// covers all of `/api/notifications`; the notification, multicast, and topic
/// limits apply on top to their routes.
pub fn build_router(state: GatewayState, config: &ServerConfig, limits: &RateLimits) -> Router {
    let auth = AuthConfig::new(config.api_keys.clone(), config.allowed_origins.clone());

    let notification_routes = limited(
        Router::new()
            .route("/send-to-device", post(push::send_to_device))
            .route("/send-to-topic", post(push::send_to_topic)),
        &limits.notification,
    );
    let multicast_routes = limited(
        Router::new().route(
            "/send-to-multiple-devices",
            post(push::send_to_multiple_devices),
        ),
        &limits.multicast,
    );
    let topic_routes = limited(
        Router::new()
            .route("/subscribe-to-topic", post(push::subscribe_to_topic))
            .route("/unsubscribe-from-topic", post(push::unsubscribe_from_topic)),
        &limits.topic,
    );

    let whatsapp_routes = Router::new()
        .route("/initialize", post(whatsapp::initialize))
        .route("/status", get(whatsapp::status))
        .route("/reconnect", post(whatsapp::reconnect))
        .route("/force-reconnect", post(whatsapp::force_reconnect))
        .route("/qr", get(whatsapp::qr))
        .route("/qr/image", get(whatsapp::qr_image))
        .route("/send", post(whatsapp::send))
        .route("/send-image", post(whatsapp::send_image))
        .route("/send-image-url", post(whatsapp::send_image_url))
        .route("/send-universal", post(whatsapp::send_universal))
        .route("/broadcast", post(whatsapp::broadcast))
        .route("/broadcast-image", post(whatsapp::broadcast_image))
        .route("/broadcast-list", post(whatsapp::create_broadcast_list))
        .route("/broadcast-lists", get(whatsapp::list_broadcast_lists))
        .route(
            "/broadcast-list/{id}",
            get(whatsapp::broadcast_list_info).delete(whatsapp::delete_broadcast_list),
        )
        .route("/broadcast-list/send", post(whatsapp::send_to_broadcast_list))
        .route(
            "/broadcast-list/send-image",
            post(whatsapp::send_image_to_broadcast_list),
        )
        .route(
            "/broadcast-list/participants",
            post(whatsapp::update_participants),
        )
        .route("/chats", get(whatsapp::chats));

    let protected = Router::new()
        .merge(notification_routes)
        .merge(multicast_routes)
        .merge(topic_routes)
        .route("/send-dual", post(dual::send_dual))
        .nest("/whatsapp", whatsapp_routes)
        .route_layer(axum_middleware::from_fn_with_state(auth, auth_middleware));

    let notifications = limited(
        Router::new()
            .route("/health", get(handlers::health))
            .merge(protected),
        &limits.general,
    );

    Router::new()
        .route("/", get(handlers::index))
        .nest("/api/notifications", notifications)
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(config.body_limit_bytes))
        .layer(RequestBodyLimitLayer::new(config.body_limit_bytes))
        .layer(cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds `host:port` and serves until `shutdown` is cancelled.
pub async fn start_server(
    config: &ServerConfig,
    router: Router,
    shutdown: CancellationToken,
) -> Result<(), NotigateError> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| NotigateError::Channel {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("Gateway server listening on {addr}");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await
    .map_err(|e| NotigateError::Channel {
        message: format!("gateway server error: {e}"),
        source: Some(Box::new(e)),
    })?;

    tracing::info!("gateway server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_services_report_as_disabled() {
        let state = GatewayState::new(None, None);
        assert!(matches!(state.push(), Err(ApiError::Disabled(_))));
        assert!(matches!(state.whatsapp(), Err(ApiError::Disabled(_))));
        let _cloned = state.clone();
    }

    #[test]
    fn cors_skips_unparseable_origins() {
        // Builds without panicking.
        let _layer = cors_layer(&["http://localhost:3000".into(), "bad\norigin".into()]);
    }
}
