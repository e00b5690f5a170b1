//! HTTP server setup: routing, middlewares, listening socket and shutdown

use std::error::Error;
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::Request,
    http::{header::{AUTHORIZATION, CONTENT_TYPE}, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tower_http::cors::CorsLayer;

use crate::auth::require_session;
use crate::config::Config;
use crate::routes::*;
use crate::state::AppState;
use crate::store::open_store;

/// Build the application router around `state`.
///
/// Every item route requires a session cookie. `cors_origin` is the (single) browser origin allowed to call
/// this API with credentials, if any
pub fn build_router(state: Arc<AppState>, cors_origin: Option<HeaderValue>) -> Router {
    let protected = Router::new()
        .route("/add/item", post(add_item_handler))
        .route("/add/items", post(add_items_handler))
        .route("/get/items", get(list_items_handler))
        .route("/get/searchitem", get(search_items_handler))
        .route("/delete/item/:id", delete(delete_item_handler))
        .route("/complete/item/:id", put(complete_item_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    let router = Router::new()
        .route("/", get(root_handler))
        .route("/authenticate", get(authenticate_handler))
        .route("/users", post(upsert_user_handler))
        .route("/logout", get(logout_handler))
        .merge(protected)
        .layer(middleware::from_fn(log_requests));

    let router = match cors_origin {
        None => router,
        Some(origin) => router.layer(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_credentials(true)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
                .allow_headers([CONTENT_TYPE, AUTHORIZATION])
                .max_age(Duration::from_secs(60 * 60)),
        ),
    };

    router.with_state(state)
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let response = next.run(request).await;
    log::info!("{} {} -> {}", method, path, response.status().as_u16());
    response
}

/// Bind to `port`, or to the next ports if it is already in use
pub async fn bind_with_fallback(bind: &str, port: u16, attempts: u16) -> std::io::Result<TcpListener> {
    let mut port = port;
    let mut remaining = attempts.max(1);
    loop {
        remaining -= 1;
        match TcpListener::bind((bind, port)).await {
            Ok(listener) => return Ok(listener),
            Err(err) if err.kind() == ErrorKind::AddrInUse && remaining > 0 && port < u16::MAX => {
                log::warn!("Port {} is busy, trying {}", port, port + 1);
                port += 1;
            },
            Err(err) => return Err(err),
        }
    }
}

/// Open the configured store and serve the API until Ctrl+C or SIGTERM
pub async fn run(config: Config) -> Result<(), Box<dyn Error>> {
    let store = open_store(&config.backend).await;

    let secret = config.secret();
    let state = match &config.initial_user {
        Some(user) => AppState::with_user(store, &secret, user),
        None => AppState::new(store, &secret),
    }.map_err(|err| format!("Invalid secret: {}", err))?;

    let cors_origin = HeaderValue::from_str(&config.cors_origin)
        .map_err(|err| format!("Invalid CORS origin {:?}: {}", config.cors_origin, err))?;
    let app = build_router(state, Some(cors_origin));

    let listener = bind_with_fallback(&config.bind, config.port, config.port_attempts).await?;
    log::info!("Server running on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
        log::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                log::info!("Received terminate signal, shutting down");
            },
            Err(err) => {
                log::error!("Failed to install signal handler: {}", err);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn busy_port_falls_back_to_the_next_one() {
        let first = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let busy_port = first.local_addr().unwrap().port();
        if busy_port == u16::MAX {
            return;
        }

        match bind_with_fallback("127.0.0.1", busy_port, 5).await {
            Ok(second) => assert!(second.local_addr().unwrap().port() > busy_port),
            // The next ports may be taken by someone else on this machine, but we must not have got the busy one
            Err(err) => assert_eq!(err.kind(), ErrorKind::AddrInUse),
        }

        let err = bind_with_fallback("127.0.0.1", busy_port, 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AddrInUse);
    }
}
