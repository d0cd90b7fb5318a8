use log::{error, info, warn};
use tokio::io::BufReader;

use yahtzee_net::client::network;
use yahtzee_net::client::TextUi;
use yahtzee_net::config::ClientConfig;

#[tokio::main]
async fn main() {
    let dotenv_result = dotenvy::dotenv();
    env_logger::init();

    if let Err(e) = dotenv_result {
        warn!("Failed to load .env file: {}", e);
    }

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!("Connecting to {}", config.address());

    let input = BufReader::new(tokio::io::stdin());
    if let Err(e) = network::run(&config, TextUi::stdout(), input).await {
        error!("Client stopped: {}", e);
        std::process::exit(1);
    }
}
