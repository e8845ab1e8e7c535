use crate::api::server::AppState;
use crate::auth::{AccessClaim, Capability};
use crate::error::GatewayError;
use actix_web::{
    web::{self, get, post, Data},
    HttpRequest, HttpResponse, Scope,
};
use serde_json::json;
use shared::models::instance::RegisterRequest;

async fn register_instance(
    body: web::Json<RegisterRequest>,
    data: Data<AppState>,
) -> Result<HttpResponse, GatewayError> {
    let instance_id = data
        .registry
        .register(&body.address, &body.message, &body.signature)
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "instance_id": instance_id })))
}

async fn verify_instance(
    path: web::Path<String>,
    data: Data<AppState>,
) -> Result<HttpResponse, GatewayError> {
    let instance_id = path.into_inner();
    let status = data.registry.verify(&instance_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "instance_id": instance_id,
        "status": status,
    })))
}

async fn deactivate_instance(
    req: HttpRequest,
    path: web::Path<String>,
    data: Data<AppState>,
) -> Result<HttpResponse, GatewayError> {
    let target = path.into_inner();
    let claim = AccessClaim::from_request(&req, &data.registry).await;
    data.gate
        .authorize(Capability::DeactivateInstance, &claim, Some(&target))?;

    data.registry.deactivate(&target).await?;
    Ok(HttpResponse::Ok().json(json!({
        "instance_id": target,
        "deactivated": true,
    })))
}

pub(crate) fn wallet_routes() -> Scope {
    web::scope("/wallet")
        .route("/register", post().to(register_instance))
        .route("/verify/{instance_id}", get().to(verify_instance))
        .route("/deactivate/{instance_id}", post().to(deactivate_instance))
}
