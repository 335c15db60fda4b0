// comanda_server/src/web/routes.rs

use actix_web::web;

use crate::web::handlers::{auth_handlers, checkout_handlers, orders_handlers, webhook_handlers};

async fn health_check_handler() -> actix_web::HttpResponse {
  actix_web::HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api")
      .route("/health", web::get().to(health_check_handler))
      .route("/auth", web::post().to(auth_handlers::auth_handler))
      .route("/checkout", web::post().to(checkout_handlers::start_checkout_handler))
      // Raw body: the signature covers the exact bytes.
      .route("/webhooks/stripe", web::post().to(webhook_handlers::stripe_webhook_handler))
      .service(
        web::resource("/orders")
          .route(web::get().to(orders_handlers::list_orders_handler))
          .route(web::post().to(orders_handlers::post_orders_handler))
          .route(web::put().to(orders_handlers::update_order_handler)),
      ),
  );
}
