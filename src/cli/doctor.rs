use std::path::Path;
use std::time::Duration;
use tally::server::config::{AppConfig, StoreBackend};
use tally::server::{environment, load_config, validate_config};
use tally_core::{GatewayError, HttpStatsProvider, RedisCacheStore, StatsProvider};

pub async fn run() -> anyhow::Result<()> {
    println!("🏥 Tally Doctor\n");

    let mut all_ok = true;

    check_env_file();

    let config = match check_config() {
        Some(config) => config,
        None => {
            println!("\n⚠️  Configuration could not be loaded. Please fix the issues above.");
            std::process::exit(1);
        }
    };

    all_ok &= check_store(&config);
    all_ok &= check_redis(&config).await;
    all_ok &= check_stats_provider(&config).await;

    println!();
    if all_ok {
        println!("✅ All checks passed! Ready to run Tally.");
    } else {
        println!("⚠️  Some checks failed. Please fix the issues above.");
        std::process::exit(1);
    }

    Ok(())
}

fn check_env_file() {
    print!("Checking .env file... ");

    if Path::new(".env").exists() {
        println!("✅ Found");
    } else {
        println!("⚠️  Not found (optional, TALLY_* variables can be set directly)");
    }
}

fn check_config() -> Option<AppConfig> {
    print!("Loading configuration ({})... ", environment());

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            println!("❌ {:#}", e);
            return None;
        }
    };

    if let Err(e) = validate_config(&config) {
        println!("❌ {:#}", e);
        return None;
    }

    println!("✅ OK");
    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Spend cache TTL: {}s", config.cache.ttl_secs);
    println!(
        "  Charts: {}",
        if config.charts.enabled { "enabled" } else { "disabled" }
    );
    Some(config)
}

fn check_store(config: &AppConfig) -> bool {
    print!("Checking budget store... ");

    match config.store.backend {
        StoreBackend::Memory => {
            println!("⚠️  In-memory (budgets are lost on restart)");
            true
        }
        StoreBackend::Sqlite => {
            let dir = Path::new(&config.store.path)
                .parent()
                .filter(|p| !p.as_os_str().is_empty());
            match dir {
                Some(dir) if !dir.exists() => {
                    println!("⚠️  SQLite at {} (directory will be created)", config.store.path);
                }
                _ => println!("✅ SQLite at {}", config.store.path),
            }
            true
        }
    }
}

async fn check_redis(config: &AppConfig) -> bool {
    print!("Checking Redis... ");

    if !config.redis.enabled {
        println!("⚠️  Disabled (using in-process spend cache)");
        return true;
    }

    let store = match RedisCacheStore::new(&config.redis.url) {
        Ok(store) => store.with_connect_timeout(Duration::from_secs(2)),
        Err(e) => {
            println!("❌ Invalid URL: {}", e);
            return false;
        }
    };

    match store.ping().await {
        Ok(()) => {
            println!("✅ Connected");
            true
        }
        Err(e) => {
            // The service still runs without Redis; lookups bypass the cache
            println!("⚠️  {} (spend lookups will bypass the cache)", e);
            true
        }
    }
}

async fn check_stats_provider(config: &AppConfig) -> bool {
    print!("Checking stats provider... ");

    if config.stats.uses_mock() {
        println!("⚠️  Not configured (serving mock statistics)");
        return true;
    }

    let provider = HttpStatsProvider::new(config.stats.base_url.clone());
    let timeout = Duration::from_millis(config.stats.timeout_ms);

    match tokio::time::timeout(timeout, provider.fetch("doctor-probe")).await {
        Ok(Ok(_)) | Ok(Err(GatewayError::NonSuccessStatus(_))) | Ok(Err(GatewayError::Decode(_))) => {
            println!("✅ Reachable at {}", provider.base_url());
            true
        }
        Ok(Err(e)) => {
            println!("❌ {}", e);
            false
        }
        Err(_) => {
            println!("❌ No response within {} ms", config.stats.timeout_ms);
            false
        }
    }
}
