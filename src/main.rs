mod cache;
mod config;
mod daemon;
mod http;
mod ip;
mod services;

use std::env;
use std::fs::File;
use std::io::Read;
use std::sync::OnceLock;
use std::time::Duration;

use cache::LastIpCache;
use config::{Config, General};
use ip::InterfaceLocator;
use services::cloudflare::Reconciler;

const CONFIG_PATHS: [&'static str; 2] = [
    "./config.toml",
    #[cfg(target_family = "unix")]
    "/etc/cloudflare-ddns6/config.toml",
];

/// This stores config values specified inside the [general] section of
/// config.toml.
static GENERAL_CONFIG: OnceLock<General> = OnceLock::new();

/// The config file can be given as the sole CLI argument; otherwise the
/// usual locations are searched.
fn read_config() -> String {
    let mut config_str = String::new();

    if let Some(path) = env::args().nth(1) {
        let mut file = match File::open(&path) {
            Ok(f) => f,
            Err(e) => {
                println!("Unable to open config file {}, reason: {}", path, e.to_string());
                return config_str;
            }
        };

        if let Err(e) = file.read_to_string(&mut config_str) {
            println!("Unable to read config file, reason: {}", e.to_string());
        }

        return config_str;
    }

    for path in CONFIG_PATHS {
        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(_) => continue,
        };

        match file.read_to_string(&mut config_str) {
            Ok(_) => break,
            Err(e) => println!("Unable to read config file, reason: {}", e.to_string()),
        }
    }

    config_str
}

fn main() {
    let config_str = read_config();

    if config_str.is_empty() {
        println!("No configuration found. Quitting.");
        return;
    }

    let config = match toml::from_str::<Config>(config_str.as_str()) {
        Ok(conf) => conf,
        Err(e) => return println!("{}", e.to_string()),
    };

    let locator = InterfaceLocator::new(config.interface.prefix.clone());

    let mut reconciler = match Reconciler::from_config(&config.cloudflare) {
        Ok(r) => r,
        Err(e) => return println!("[FATAL] Bad [cloudflare] config: {}", e),
    };

    let cache = config.general.last_ip_file.clone().map(LastIpCache::new);
    let check_interval = config.general.check_interval;
    let record_name = config.cloudflare.record_name.clone();

    // It's safe to unwrap here - the program is single-threaded and
    // GENERAL_CONFIG is never initialized before reaching this point.
    GENERAL_CONFIG.set(config.general).unwrap();

    // Credentials that fail now would fail in every later cycle too, so
    // this one is fatal, unlike anything inside the loop.
    if let Err(e) = reconciler.verify_credentials() {
        return println!("[FATAL] Cloudflare credential check failed: {}", e);
    }

    println!(
        "cloudflare-ddns6 v{} started, managing {} every {} second(s)",
        env!("CARGO_PKG_VERSION"),
        record_name,
        check_interval
    );

    // Main loop here
    loop {
        daemon::run_cycle(&locator, &mut reconciler, cache.as_ref());

        if check_interval == 0 {
            break; // 0 interval makes this a fire-once program.
        }

        std::thread::sleep(Duration::from_secs(check_interval));
    }
}
