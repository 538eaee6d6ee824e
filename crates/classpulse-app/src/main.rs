mod app;
mod cli;

use std::path::Path;

use classpulse_relay::RelayConfig;
use classpulse_room::{verify_teacher_passphrase, Identity, RoomClient, RoomTuning};
use tracing_subscriber::EnvFilter;

/// Load environment variables from a .env file (KEY=VALUE lines).
fn load_dotenv() {
    let candidates = [
        std::path::PathBuf::from(".env"),
        std::path::PathBuf::from("../.env"),
    ];

    for path in &candidates {
        if let Ok(contents) = std::fs::read_to_string(path) {
            for line in contents.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    let key = key.trim();
                    let value = value.trim().trim_matches('"').trim_matches('\'');
                    if std::env::var(key).is_err() {
                        std::env::set_var(key, value);
                    }
                }
            }
            return;
        }
    }
}

fn main() {
    load_dotenv();

    let args = cli::parse();

    let log_directive = args.log_level.as_deref().unwrap_or("info");
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                log_directive
                    .parse()
                    .unwrap_or_else(|_| "info".parse().unwrap()),
            ),
        )
        .init();

    let config = match classpulse_config::load_config(args.config.as_deref().map(Path::new)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load config: {e}");
            std::process::exit(1);
        }
    };

    let identity = if args.teacher {
        let supplied = args.passphrase.as_deref().unwrap_or_default();
        if !verify_teacher_passphrase(supplied, &config.room.teacher_passphrase) {
            eprintln!("wrong teacher passphrase");
            std::process::exit(1);
        }
        Identity::teacher(&args.name)
    } else {
        Identity::student(&args.name, args.group.clone())
    };

    let relay_config = RelayConfig {
        project_ref: config.relay.project_ref.clone(),
        api_key: config.relay.api_key.clone(),
        heartbeat_interval_secs: config.relay.heartbeat_interval_secs,
        reconnect_delay_secs: config.relay.reconnect_delay_secs,
        max_reconnect_delay_secs: config.relay.max_reconnect_delay_secs,
    };
    let tuning = RoomTuning {
        dedup_window: config.room.dedup_window,
        max_image_bytes: config.room.max_image_bytes,
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("failed to start runtime: {e}");
            std::process::exit(1);
        }
    };

    runtime.block_on(async move {
        let (client, updates) = RoomClient::connect(identity, relay_config, tuning);
        client.join_room(&args.room).await;

        if let Err(e) = app::run(client, updates, &config, &args).await {
            eprintln!("fatal: {e}");
            std::process::exit(1);
        }
    });
}
