mod bot;
mod components;
mod config;
mod logger;

#[cfg(test)]
mod tests;

const DEFAULT_CONFIG: &str = "./config.json";

#[tokio::main]
async fn main() {
    let path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config = match config::Config::load(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Could not load the configuration file: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = logger::init(config.log_level.as_deref()) {
        eprintln!("Could not install the logger: {}", e);
    }
    let mut bot = match bot::Bot::new(&config).await {
        Ok(bot) => bot,
        Err(e) => {
            log_error!("{}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = bot.start().await {
        log_error!("Client won't start: {}", e);
        std::process::exit(1);
    }
}
