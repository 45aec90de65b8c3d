use actix_web::{HttpResponse, Responder, get, post, web};
use header_chain::{BlockHeader, ChainError, Hash256, HeaderStore};
use log::{error, info, warn};

use super::models::{
    AppState, ConsensusResponse, ErrorResponse, HeaderResponse, SubmitResponse, TallyResponse,
};

fn error_body(error: impl ToString) -> ErrorResponse {
    ErrorResponse {
        error: error.to_string(),
    }
}

/// Current best-chain tip.
#[get("/chain/head/")]
pub async fn get_head(state: web::Data<AppState>) -> impl Responder {
    match state.selector.chain_head() {
        Ok(head) => HttpResponse::Ok().json(HeaderResponse::from(&head)),
        Err(e) => {
            error!("GET /chain/head/ - store fault: {e}");
            HttpResponse::InternalServerError().json(error_body(e))
        }
    }
}

/// Any stored header by hash, best chain or not.
#[get("/headers/{hash}/")]
pub async fn get_header(state: web::Data<AppState>, path: web::Path<(String,)>) -> impl Responder {
    let raw = path.into_inner().0;
    let hash: Hash256 = match raw.parse() {
        Ok(hash) => hash,
        Err(e) => return HttpResponse::BadRequest().json(error_body(format!("invalid hash: {e}"))),
    };

    match state.selector.store().get(&hash) {
        Ok(Some(stored)) => HttpResponse::Ok().json(HeaderResponse::from(&stored)),
        Ok(None) => HttpResponse::NotFound().json(error_body(format!("unknown header {hash}"))),
        Err(e) => {
            error!("GET /headers/{hash}/ - store fault: {e}");
            HttpResponse::InternalServerError().json(error_body(e))
        }
    }
}

/// Submit a header for validation and chain selection.
/// Store I/O may block, so the work runs on the blocking pool.
#[post("/headers/")]
pub async fn post_header(state: web::Data<AppState>, body: web::Json<BlockHeader>) -> impl Responder {
    let header = body.into_inner();
    let hash = header.hash();
    let worker = state.clone();
    let result = match web::block(move || worker.selector.accept_header(header)).await {
        Ok(result) => result,
        Err(e) => {
            error!("POST /headers/ - worker failed: {e}");
            return HttpResponse::InternalServerError().json(error_body(e));
        }
    };

    match result {
        Ok(outcome) => {
            info!("POST /headers/ - {hash}: {outcome:?}");
            HttpResponse::Ok().json(SubmitResponse {
                hash: hash.to_string(),
                outcome,
            })
        }
        Err(ChainError::Rejected(reason)) => {
            warn!("POST /headers/ - rejected {hash}: {reason}");
            HttpResponse::UnprocessableEntity().json(error_body(reason))
        }
        Err(ChainError::Store(e)) => {
            error!("POST /headers/ - store fault on {hash}: {e}");
            HttpResponse::InternalServerError().json(error_body(e))
        }
        Err(e @ ChainError::Config(_)) => {
            error!("POST /headers/ - {e}");
            HttpResponse::InternalServerError().json(error_body(e))
        }
    }
}

/// Retarget/halving flags and subsidy at a height.
#[get("/consensus/{height}/")]
pub async fn get_consensus(state: web::Data<AppState>, path: web::Path<(i64,)>) -> impl Responder {
    let raw = path.into_inner().0;
    let Ok(height) = u32::try_from(raw) else {
        return HttpResponse::BadRequest().json(error_body(format!("height {raw} out of range")));
    };

    let rules = state.selector.rules();
    HttpResponse::Ok().json(ConsensusResponse {
        height,
        difficulty_transition_point: rules.is_difficulty_transition_point(height),
        reward_halving_point: rules.is_reward_halving_point(height),
        subsidy: rules.block_inflation(height),
    })
}

/// How much of the recent window signals `version` or above.
#[get("/tally/{version}/")]
pub async fn get_tally(state: web::Data<AppState>, path: web::Path<(u32,)>) -> impl Responder {
    let version = path.into_inner().0;
    let rules = state.selector.rules();
    let tally = state.selector.version_tally();

    HttpResponse::Ok().json(TallyResponse {
        version,
        window: tally.size(),
        count: tally.count_at_or_above(version),
        enforce_threshold: rules.majority_enforce_threshold(),
        reject_threshold: rules.majority_reject_threshold(),
        enforced: rules.is_version_enforced(&tally, version),
        outdated: rules.is_version_outdated(&tally, version),
    })
}
