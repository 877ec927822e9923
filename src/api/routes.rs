//! API route definitions

use super::connection_handlers;
use super::handlers::{self, FlowState};
use super::module_handlers;
use super::node_handlers;
use super::user_handlers;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the API router
pub fn create_router(state: FlowState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        .route("/ping", get(handlers::ping))
        // ====================================================================
        // Modules
        // ====================================================================
        .route("/modules", post(module_handlers::list_modules))
        .route("/modules/create", post(module_handlers::create_module))
        .route("/modules/search", post(module_handlers::search_module))
        .route(
            "/modules/{id}",
            put(module_handlers::clear_module).delete(module_handlers::delete_module),
        )
        .route(
            "/modules/{id}/nodes",
            get(module_handlers::list_module_nodes),
        )
        // ====================================================================
        // Nodes
        // ====================================================================
        .route("/nodes/create", post(node_handlers::create_node))
        .route("/nodes/data", post(node_handlers::update_node_data))
        .route(
            "/nodes/{id}",
            put(node_handlers::update_node_position).delete(node_handlers::delete_node),
        )
        // Connections
        .route(
            "/nodes/connections/create",
            post(connection_handlers::create_connection),
        )
        .route(
            "/nodes/connections/delete",
            post(connection_handlers::delete_connection),
        )
        // ====================================================================
        // Users
        // ====================================================================
        .route("/user/login", post(user_handlers::login))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neo4j::mock::MockGraphStore;
    use crate::test_helpers::{json_request, mock_server_state, read_json};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_and_ping() {
        let app = create_router(mock_server_state(MockGraphStore::new()));

        let resp = app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = read_json(resp).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["neo4j"], true);

        let resp = app
            .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let app = create_router(mock_server_state(MockGraphStore::new()));
        let req = Request::builder()
            .method("POST")
            .uri("/modules/create")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let app = create_router(mock_server_state(MockGraphStore::new()));
        let resp = app
            .oneshot(json_request("GET", "/graphs", serde_json::json!(null)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
