use std::io;
use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use dotenvy::dotenv;
use log::info;

use pow_ledger::api::{self, AppState};
use pow_ledger::config::NodeConfig;
use pow_ledger::network::HttpChainFetcher;
use pow_ledger::node::Node;

#[actix_web::main]
async fn main() -> io::Result<()> {
    let _ = dotenv();
    env_logger::init();

    let config = NodeConfig::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let fetcher = HttpChainFetcher::new(config.peer_timeout).map_err(io::Error::other)?;

    let node = Node::new(&config, Arc::new(fetcher));
    info!(
        "⛓️ Starting ledger node at http://{}:{} (difficulty={}, reward={}, peers={})",
        config.host,
        config.port,
        config.difficulty,
        config.mining_reward,
        node.peers().len()
    );

    let state = web::Data::new(AppState { node });

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(api::init_routes)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
