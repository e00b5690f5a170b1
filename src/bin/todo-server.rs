use todo_server::config::Config;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            log::error!("Environment misconfigured: {}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = todo_server::server::run(config).await {
        log::error!("Server error: {}", err);
        std::process::exit(1);
    }
}
