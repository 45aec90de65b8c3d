mod api;

use std::io;
use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use dotenvy::dotenv;
use header_chain::config::AppConfig;
use header_chain::{
    ChainListener, ChainSelector, FileHeaderStore, HeaderStore, MemoryHeaderStore, StoredHeader,
};
use log::info;

use api::AppState;

/// Reports best-chain movement to the log.
struct LogListener;

impl ChainListener for LogListener {
    fn on_block_connected(&self, header: &StoredHeader) {
        info!("connected {} at height {}", header.hash(), header.height);
    }

    fn on_block_disconnected(&self, header: &StoredHeader) {
        info!("disconnected {} at height {}", header.hash(), header.height);
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    let _ = dotenv();
    env_logger::init();

    let config = AppConfig::from_env().map_err(io::Error::other)?;
    let params = config.network_params().map_err(io::Error::other)?;

    let store: Arc<dyn HeaderStore> = match &config.data_dir {
        Some(dir) => Arc::new(FileHeaderStore::open(dir, &params).map_err(io::Error::other)?),
        None => Arc::new(MemoryHeaderStore::new(&params).map_err(io::Error::other)?),
    };
    let selector = ChainSelector::new(params, store).map_err(io::Error::other)?;
    selector.add_listener(Arc::new(LogListener));

    let head = selector.chain_head().map_err(io::Error::other)?;
    info!(
        "⛓️ {} header chain at height {} ({}), serving http://{}:{}",
        config.network,
        head.height,
        head.hash(),
        config.host,
        config.port
    );

    let state = web::Data::new(AppState { selector });

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(api::init_routes)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
