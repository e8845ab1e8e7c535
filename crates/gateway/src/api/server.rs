use crate::api::routes::generate::generate_routes;
use crate::api::routes::ipfs::ipfs_routes;
use crate::api::routes::status::status_routes;
use crate::api::routes::wallet::wallet_routes;
use crate::auth::PolicyGate;
use crate::generation::backends::{ImageBackend, TextBackend};
use crate::generation::GenerationService;
use crate::ipfs::IpfsClient;
use crate::registry::InstanceRegistry;
use actix_web::middleware::{Compress, NormalizePath, TrailingSlash};
use actix_web::{middleware, web, web::Data, App, HttpResponse, HttpServer};
use anyhow::Error;
use log::info;
use serde_json::json;
use std::sync::Arc;

pub struct AppState {
    pub registry: Arc<InstanceRegistry>,
    pub gate: Arc<PolicyGate>,
    pub generation: Arc<GenerationService>,
    pub ipfs: Option<Arc<IpfsClient>>,
    pub text_backend: Option<Arc<dyn TextBackend>>,
    pub image_backend: Option<Arc<dyn ImageBackend>>,
}

pub async fn start_server(host: &str, port: u16, state: AppState) -> Result<(), Error> {
    info!("Starting server at http://{host}:{port}");
    let app_state = Data::new(state);

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(middleware::Logger::default())
            .wrap(Compress::default())
            .wrap(NormalizePath::new(TrailingSlash::Trim))
            .app_data(web::PayloadConfig::default().limit(10_485_760))
            .service(web::resource("/health").route(web::get().to(|| async {
                HttpResponse::Ok().json(json!({"status": "ok"}))
            })))
            .service(wallet_routes())
            .service(generate_routes())
            .service(ipfs_routes())
            .service(status_routes())
            .default_service(web::route().to(|| async {
                HttpResponse::NotFound().json(json!({
                    "success": false,
                    "error": "Resource not found"
                }))
            }))
    })
    .bind((host, port))?
    .run()
    .await?;
    Ok(())
}
