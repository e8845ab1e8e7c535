use crate::api::server::AppState;
use crate::error::GatewayError;
use actix_web::{
    web::{self, get, Data},
    HttpResponse, Scope,
};
use log::warn;
use serde_json::json;

/// Read-only diagnostics; deliberately outside the policy gate.
async fn status(data: Data<AppState>) -> Result<HttpResponse, GatewayError> {
    let text_model = match &data.text_backend {
        Some(backend) => json!({
            "name": backend.model_name(),
            "enabled": true,
            "ready": backend.is_ready().await,
        }),
        None => json!({ "enabled": false }),
    };

    let image_model = match &data.image_backend {
        Some(backend) => json!({
            "name": backend.model_name(),
            "enabled": true,
            "ready": backend.is_ready().await,
        }),
        None => json!({ "enabled": false }),
    };

    let ipfs = match &data.ipfs {
        Some(client) => match client.node_id().await {
            Ok(peer_id) => json!({ "enabled": true, "connected": true, "peer_id": peer_id }),
            Err(err) => {
                warn!("content store diagnostics failed: {err}");
                json!({ "enabled": true, "connected": false })
            }
        },
        None => json!({ "enabled": false }),
    };

    let wallets = match data.registry.counts().await {
        Ok(counts) => json!({
            "registered_instances": counts.total,
            "active_instances": counts.active,
        }),
        Err(err) => {
            warn!("registry diagnostics failed: {err}");
            json!({ "available": false })
        }
    };

    Ok(HttpResponse::Ok().json(json!({
        "text_model": text_model,
        "image_model": image_model,
        "ipfs": ipfs,
        "wallets": wallets,
    })))
}

async fn peers(data: Data<AppState>) -> Result<HttpResponse, GatewayError> {
    let backend = data.text_backend.as_ref().ok_or_else(|| {
        GatewayError::BackendUnavailable("text backend is disabled".to_string())
    })?;

    let peers = backend.peers().await.map_err(GatewayError::from)?;
    Ok(HttpResponse::Ok().json(json!({
        "model_name": backend.model_name(),
        "peers_count": peers.len(),
        "peers": peers,
    })))
}

pub(crate) fn status_routes() -> Scope {
    web::scope("")
        .route("/status", get().to(status))
        .route("/peers", get().to(peers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::helper::{create_test_context, register_test_instance};
    use actix_web::http::StatusCode;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn test_status_reports_registry_counts() {
        let ctx = create_test_context(true, None);
        let app = test::init_service(
            App::new()
                .app_data(ctx.state.clone())
                .service(status_routes()),
        )
        .await;

        let instance_id = register_test_instance(&ctx.state).await;
        let _ = register_test_instance(&ctx.state).await;
        ctx.state.registry.deactivate(&instance_id).await.unwrap();

        let req = test::TestRequest::get().uri("/status").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["wallets"]["registered_instances"], 2);
        assert_eq!(body["wallets"]["active_instances"], 1);
        assert_eq!(body["text_model"]["name"], "mock/text-model");
        assert_eq!(body["text_model"]["ready"], true);
        assert_eq!(body["ipfs"]["enabled"], false);
    }

    #[actix_web::test]
    async fn test_peers_lists_backend_swarm() {
        let ctx = create_test_context(true, None);
        let app = test::init_service(
            App::new()
                .app_data(ctx.state.clone())
                .service(status_routes()),
        )
        .await;

        let req = test::TestRequest::get().uri("/peers").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["peers_count"], 1);
        assert_eq!(body["peers"][0]["peer_id"], "12D3KooWMockPeer");
    }
}
