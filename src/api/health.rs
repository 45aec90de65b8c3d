use actix_web::{HttpResponse, Responder, get, web};
use serde_json::json;

use super::models::AppState;

#[get("/health/")]
pub async fn health_check(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "network": state.selector.rules().params().network,
    }))
}
