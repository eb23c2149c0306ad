use dreamserver::DREAM_LOGGER;
use dreamserver::dream::{DreamContext, config};
use log::error;
use std::env;
use std::process;
use std::thread;

const CONFIG_FILE: &str = "./Dreamfile";

fn main() {
    let _ = log::set_logger(&DREAM_LOGGER);
    log::set_max_level(log::LevelFilter::Info);

    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| CONFIG_FILE.to_string());

    let config = match config::load_dream_file(&config_path) {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            process::exit(1);
        }
    };

    // Validate TLS material up front; bad PEM is a startup failure, not a
    // per-request surprise.
    for server in &config.servers {
        if !server.listen.ssl {
            continue;
        }
        match &server.ssl {
            Some(ssl) => {
                if let Err(err) = ssl.load() {
                    error!("{}: {err}", server.name);
                    process::exit(1);
                }
            }
            None => {
                error!(
                    "{}: listen has ssl set but no ssl block was given",
                    server.name
                );
                process::exit(1);
            }
        }
    }

    let groups = config.group_by_port();
    if groups.is_empty() {
        error!("no servers configured in {config_path}");
        process::exit(1);
    }

    let mut contexts: Vec<DreamContext> = groups
        .into_iter()
        .map(|(port, servers)| DreamContext::new(port, servers))
        .collect();

    // The last context runs on the main thread; the rest get their own.
    let last = contexts.pop();
    let mut handles = Vec::new();
    for context in contexts {
        handles.push(thread::spawn(move || {
            if let Err(err) = context.run() {
                error!("{err}");
                process::exit(1);
            }
        }));
    }

    if let Some(context) = last {
        if let Err(err) = context.run() {
            error!("{err}");
            process::exit(1);
        }
    }

    for handle in handles {
        let _ = handle.join();
    }
}
