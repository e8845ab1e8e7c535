use crate::api::server::AppState;
use crate::auth::{AccessClaim, Capability};
use crate::error::GatewayError;
use actix_web::{
    web::{self, get, post, Data},
    HttpRequest, HttpResponse, Scope,
};
use serde_json::json;
use shared::models::storage::AddPayloadRequest;
use std::sync::Arc;

use crate::ipfs::IpfsClient;

fn store(data: &Data<AppState>) -> Result<&Arc<IpfsClient>, GatewayError> {
    data.ipfs
        .as_ref()
        .ok_or_else(|| GatewayError::StoreUnavailable("content store not configured".to_string()))
}

async fn add_payload(
    req: HttpRequest,
    body: web::Json<AddPayloadRequest>,
    data: Data<AppState>,
) -> Result<HttpResponse, GatewayError> {
    let claim = AccessClaim::from_request(&req, &data.registry).await;
    data.gate.authorize(Capability::IpfsAdd, &claim, None)?;

    let ipfs = store(&data)?;
    let payload = body
        .into_inner()
        .into_payload()
        .map_err(|err| GatewayError::InvalidFormat(err.to_string()))?;

    let object = ipfs.put(&payload).await?;
    Ok(HttpResponse::Ok().json(json!({
        "content_id": object.content_id,
        "size_bytes": object.size_bytes,
        "ipfs_gateway_url": ipfs.gateway_url_for(&object.content_id),
    })))
}

async fn get_payload(
    req: HttpRequest,
    path: web::Path<String>,
    data: Data<AppState>,
) -> Result<HttpResponse, GatewayError> {
    let claim = AccessClaim::from_request(&req, &data.registry).await;
    data.gate.authorize(Capability::IpfsGet, &claim, None)?;

    let ipfs = store(&data)?;
    let content_id = path.into_inner();
    let bytes = ipfs.get(&content_id).await?;

    Ok(HttpResponse::Ok()
        .content_type("application/octet-stream")
        .body(bytes))
}

pub(crate) fn ipfs_routes() -> Scope {
    web::scope("/ipfs")
        .route("/add", post().to(add_payload))
        .route("/get/{content_id}", get().to(get_payload))
}
