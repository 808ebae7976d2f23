pub mod fetcher;
pub mod peers;

pub use fetcher::{ChainFetcher, ChainRepresentation, FetchError, HttpChainFetcher};
pub use peers::PeerRegistry;
