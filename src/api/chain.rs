use actix_web::{HttpResponse, Responder, get, post, web};
use log::{info, warn};

use super::models::{AppState, MineRequest, MineResponse};
use crate::blockchain::MiningError;
use crate::node::MineError;

/// Get the full blockchain.
#[get("/chain/")]
pub async fn get_chain(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.node.get_chain())
}

/// Validate the whole chain.
#[get("/validate/")]
pub async fn validate_chain(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.node.chain_status())
}

/// Mine the pending pool into a new block, rewarding `miner_address`.
/// The proof-of-work search runs on the blocking pool.
#[post("/mine/")]
pub async fn mine_block(state: web::Data<AppState>, req: web::Json<MineRequest>) -> impl Responder {
    let miner_address = req.miner_address.trim().to_string();
    if miner_address.is_empty() {
        return HttpResponse::BadRequest().body("miner_address required");
    }

    let worker_state = state.clone();
    let result =
        web::block(move || worker_state.node.mine_pending_transactions(&miner_address)).await;

    match result {
        Ok(Ok(mined)) => {
            info!(
                "MINER - block #{} mined via API ({} unapplied)",
                mined.block.index,
                mined.unapplied.len()
            );
            HttpResponse::Ok().json(MineResponse {
                unapplied: mined.unapplied.len(),
                block: mined.block,
            })
        }
        Ok(Err(MineError::Mining(MiningError::Cancelled))) => {
            warn!("MINER - cancelled, chain tip moved");
            HttpResponse::Conflict().body("mining cancelled: chain tip moved")
        }
        Ok(Err(e)) => HttpResponse::Conflict().body(e.to_string()),
        Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
    }
}
