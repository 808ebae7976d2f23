use actix_web::{HttpResponse, Responder, get, web};

use super::models::{AppState, StatsResponse};

#[get("/stats/")]
pub async fn get_stats(state: web::Data<AppState>) -> impl Responder {
    let node = &state.node;
    HttpResponse::Ok().json(StatsResponse {
        height: node.height(),
        difficulty: node.difficulty(),
        last_interval_secs: node.last_interval_secs(),
        mempool_size: node.pending_transactions().len(),
        peers: node.peers().len(),
    })
}
