use crate::api::server::AppState;
use crate::auth::AccessClaim;
use crate::error::GatewayError;
use actix_web::{
    web::{self, post, Data},
    HttpRequest, HttpResponse, Scope,
};
use shared::models::generation::{ImageGenerationRequest, TextGenerationRequest};

async fn generate_text(
    req: HttpRequest,
    body: web::Json<TextGenerationRequest>,
    data: Data<AppState>,
) -> Result<HttpResponse, GatewayError> {
    let claim = AccessClaim::from_request(&req, &data.registry).await;
    let response = data
        .generation
        .generate_text(&claim, body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(response))
}

async fn generate_image(
    req: HttpRequest,
    body: web::Json<ImageGenerationRequest>,
    data: Data<AppState>,
) -> Result<HttpResponse, GatewayError> {
    let claim = AccessClaim::from_request(&req, &data.registry).await;
    let response = data
        .generation
        .generate_image(&claim, body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(response))
}

pub(crate) fn generate_routes() -> Scope {
    web::scope("/generate")
        .route("/text", post().to(generate_text))
        .route("/image", post().to(generate_image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::helper::{create_test_context, register_test_instance};
    use crate::auth::INSTANCE_ID_HEADER;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::json;

    #[actix_web::test]
    async fn test_unregistered_caller_is_denied_before_backend() {
        let ctx = create_test_context(true, None);
        let app = test::init_service(
            App::new()
                .app_data(ctx.state.clone())
                .service(generate_routes()),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/generate/text")
            .set_json(json!({"prompt": "Hello"}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ctx.text_backend.call_count(), 0);
    }

    #[actix_web::test]
    async fn test_registered_caller_generates_text() {
        let ctx = create_test_context(true, None);
        let app = test::init_service(
            App::new()
                .app_data(ctx.state.clone())
                .service(generate_routes()),
        )
        .await;

        let instance_id = register_test_instance(&ctx.state).await;

        let req = test::TestRequest::post()
            .uri("/generate/text")
            .insert_header((INSTANCE_ID_HEADER, instance_id))
            .set_json(json!({"prompt": "Hello"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["text"], "Hello world");
        assert_eq!(body["model"], "mock/text-model");
        assert!(body.get("content_id").is_none());
        assert_eq!(ctx.text_backend.call_count(), 1);
    }

    #[actix_web::test]
    async fn test_deactivated_instance_is_denied() {
        let ctx = create_test_context(true, None);
        let app = test::init_service(
            App::new()
                .app_data(ctx.state.clone())
                .service(generate_routes()),
        )
        .await;

        let instance_id = register_test_instance(&ctx.state).await;
        ctx.state.registry.deactivate(&instance_id).await.unwrap();

        let req = test::TestRequest::post()
            .uri("/generate/text")
            .insert_header((INSTANCE_ID_HEADER, instance_id))
            .set_json(json!({"prompt": "Hello"}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ctx.text_backend.call_count(), 0);
    }

    #[actix_web::test]
    async fn test_store_on_ipfs_attaches_content_id() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/add")
            .with_status(200)
            .with_body(r#"{"Hash":"QmText","Size":"11"}"#)
            .create_async()
            .await;

        let ctx = create_test_context(true, Some(&server.url()));
        let app = test::init_service(
            App::new()
                .app_data(ctx.state.clone())
                .service(generate_routes()),
        )
        .await;

        let instance_id = register_test_instance(&ctx.state).await;

        let req = test::TestRequest::post()
            .uri("/generate/text")
            .insert_header((INSTANCE_ID_HEADER, instance_id))
            .set_json(json!({"prompt": "Hello", "store_on_ipfs": true}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["text"], "Hello world");
        assert_eq!(body["content_id"], "QmText");
        assert_eq!(body["ipfs_gateway_url"], "https://ipfs.io/ipfs/QmText");
        assert!(body.get("storage_error").is_none());
    }

    #[actix_web::test]
    async fn test_storage_failure_still_returns_payload() {
        // Nothing listens on port 1, so the store put fails.
        let ctx = create_test_context(true, Some("http://127.0.0.1:1"));
        let app = test::init_service(
            App::new()
                .app_data(ctx.state.clone())
                .service(generate_routes()),
        )
        .await;

        let instance_id = register_test_instance(&ctx.state).await;

        let req = test::TestRequest::post()
            .uri("/generate/text")
            .insert_header((INSTANCE_ID_HEADER, instance_id))
            .set_json(json!({"prompt": "Hello", "store_on_ipfs": true}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["text"], "Hello world");
        assert!(body.get("content_id").is_none());
        assert!(body["storage_error"].as_str().is_some());
    }

    #[actix_web::test]
    async fn test_generate_image() {
        let ctx = create_test_context(false, None);
        let app = test::init_service(
            App::new()
                .app_data(ctx.state.clone())
                .service(generate_routes()),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/generate/image")
            .set_json(json!({"prompt": "a red cube"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["image_base64"], "aGVsbG8=");
        assert_eq!(body["model"], "mock/image-model");
        assert_eq!(ctx.image_backend.call_count(), 1);
    }
}
