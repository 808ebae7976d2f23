use actix_web::{HttpResponse, Responder, get, post, web};
use log::{debug, info};
use std::time::Instant;

use super::models::{AppState, MempoolResponse, NewTxRequest, NewTxResponse};
use crate::transaction::Transaction;

/// Submit a signed transaction into the pending pool.
#[post("/transactions/")]
pub async fn post_transaction(
    state: web::Data<AppState>,
    body: web::Json<NewTxRequest>,
) -> impl Responder {
    let t0 = Instant::now();
    let tx: Transaction = body.into_inner().into();
    debug!(
        "POST /transactions/ - received {:?} -> {} ({})",
        tx.sender, tx.receiver, tx.amount
    );

    match state.node.create_transaction(tx) {
        Ok(block_index) => {
            info!(
                "POST /transactions/ - queued for block #{} ({} ms)",
                block_index,
                t0.elapsed().as_millis()
            );
            HttpResponse::Ok().json(NewTxResponse { block_index })
        }
        Err(reason) => HttpResponse::BadRequest().body(reason.to_string()),
    }
}

/// List the pending pool.
#[get("/mempool/")]
pub async fn get_mempool(state: web::Data<AppState>) -> impl Responder {
    let transactions = state.node.pending_transactions();
    HttpResponse::Ok().json(MempoolResponse {
        size: transactions.len(),
        transactions,
    })
}
