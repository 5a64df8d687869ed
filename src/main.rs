use std::{process, sync::OnceLock};

use system_health::{
    config::Config,
    core::{
        providers::{registry::ProviderRegistry, PLATFORM_KEY},
        HealthResponse, SystemHealth,
    },
    logger::LoggerManager,
    print_error,
};
use tracing::{debug, error, info};

static CONFIG: OnceLock<Config> = OnceLock::new();

pub fn config() -> &'static Config {
    CONFIG.get_or_init(|| {
        Config::new().unwrap_or_else(|e| {
            print_error!("{}", e);
            process::exit(1);
        })
    })
}

fn log_providers_table(names: &[String]) {
    let name_width = names
        .iter()
        .map(|s| s.len())
        .chain(std::iter::once(PLATFORM_KEY.len()))
        .max()
        .unwrap_or(0)
        .max("Component".len());

    info!("{:<width$} | Budget", "Component", width = name_width);
    info!("{}-+-{}", "-".repeat(name_width), "-".repeat(12));
    info!("{:<width$} | none", PLATFORM_KEY, width = name_width);

    let budgets = system_health::core::Budgets::from(&config().health);
    for name in names {
        info!(
            "{:<width$} | {:?}",
            name,
            budgets.for_component(name),
            width = name_width
        );
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            error!("Failed to serialize output: {}", e);
            process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cfg = config();
    let logger_manager = LoggerManager::new(cfg.logger.clone()).unwrap_or_else(|e| {
        print_error!("Failed to set up logging: {}", e);
        process::exit(1);
    });
    logger_manager.init().unwrap_or_else(|e| {
        print_error!("Failed to init logging: {}", e);
        process::exit(1);
    });
    info!("Starting system-health version {}", env!("CARGO_PKG_VERSION"));
    debug!("{:#?}", cfg.health);

    let registry = ProviderRegistry::new();
    if let Err(e) = registry.register_discovered() {
        error!("Failed to register built-in providers: {}", e);
        process::exit(1);
    }

    let names = registry.names().unwrap_or_else(|e| {
        error!("Failed to list providers: {}", e);
        process::exit(1);
    });
    log_providers_table(&names);

    let health = SystemHealth::new(registry, &cfg.health);

    match std::env::args().nth(1) {
        Some(component) => match health.get_info(&component).await {
            Ok(entry) => print_json(&entry),
            Err(e) => {
                print_json(&HealthResponse::failure(&e));
                process::exit(1);
            }
        },
        None => {
            let response = health.respond().await;
            print_json(&response);
            if !response.success {
                process::exit(1);
            }
        }
    }
}
