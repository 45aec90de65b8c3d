mod chain;
mod health;
pub mod models;

use actix_web::web::{self, ServiceConfig};

pub use models::AppState;

pub fn init_routes(cfg: &mut ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(health::health_check)
            .service(chain::get_head)
            .service(chain::get_header)
            .service(chain::post_header)
            .service(chain::get_consensus)
            .service(chain::get_tally),
    );
}
