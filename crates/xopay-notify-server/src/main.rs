use xopay_notify_server::config::loader;
use xopay_notify_server::{init_tracing, Server};

#[tokio::main]
async fn main() {
    let config_path = std::env::args().nth(1);

    let config = match loader::load_config(config_path.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("config error: {err}");
            std::process::exit(1);
        }
    };

    let _log_guard = init_tracing(&config.logging);
    tracing::info!("starting XOPay Notify Service");

    if let Err(err) = Server::new(config).run().await {
        tracing::error!(%err, "server error");
        std::process::exit(1);
    }

    tracing::info!("XOPay Notify Service stopped");
}
