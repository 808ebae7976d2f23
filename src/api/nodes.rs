use actix_web::{HttpResponse, Responder, get, post, web};
use log::info;

use super::models::{AppState, NodesResponse, RegisterNodesRequest, ResolveResponse};

/// Register peer nodes (URLs or host:port).
#[post("/nodes/")]
pub async fn register_nodes(
    state: web::Data<AppState>,
    body: web::Json<RegisterNodesRequest>,
) -> impl Responder {
    if body.nodes.is_empty() {
        return HttpResponse::BadRequest().body("please supply a list of nodes");
    }
    for raw in &body.nodes {
        state.node.register_peer(raw);
    }
    HttpResponse::Created().json(NodesResponse {
        total_nodes: state.node.peers(),
    })
}

/// Run longest-valid-chain consensus against every registered peer.
#[get("/nodes/resolve/")]
pub async fn resolve(state: web::Data<AppState>) -> impl Responder {
    let replaced = state.node.resolve_conflicts().await;
    let length = state.node.height();
    if replaced {
        info!("RESOLVE - local chain replaced (len={length})");
    }
    HttpResponse::Ok().json(ResolveResponse { replaced, length })
}
