use spotiplayer::commands;
use spotiplayer::config::AppConfig;
use spotiplayer::AppState;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("spotiplayer=info"),
    )
    .init();

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config: {}. Using defaults.", e);
        let default_config = AppConfig::default();
        if let Err(save_err) = default_config.save() {
            log::error!("Failed to save default config: {}", save_err);
        }
        default_config
    });
    config.apply_env();

    if config.client_id.is_empty() {
        log::warn!("No client id configured; set SPOTIFY_CLIENT_ID or edit the config file");
    }

    let state = match AppState::bootstrap(config) {
        Ok(state) => state,
        Err(e) => {
            log::error!("Failed to start: {}", e);
            std::process::exit(1);
        }
    };

    if state.session.is_authenticated() {
        match state.refresh_account_tier().await {
            Ok(tier) => log::info!("Signed in, account tier {:?}", tier),
            Err(e) => log::warn!("Could not refresh account tier: {}", e),
        }
    }

    let mut events = state.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let Ok(line) = serde_json::to_string(&event) {
                log::debug!("event {}", line);
            }
        }
    });

    println!("{}", commands::HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                log::error!("stdin: {}", e);
                break;
            }
        };
        if matches!(line.trim(), "quit" | "exit") {
            break;
        }

        match commands::dispatch(&state, &line).await {
            Ok(serde_json::Value::Null) => {}
            Ok(value) => println!("{}", value),
            Err(e) => match serde_json::to_string(&e) {
                Ok(json) => println!("{}", json),
                Err(_) => println!("{}", e),
            },
        }
    }

    state.shutdown();
}
