//! Companion CLI - runs the companion core outside the mobile shell.
//!
//! Useful for exercising the startup sequence, the session and the saved
//! locations against a real server from a desktop.

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use companion_core::geo::fixed::{FixedPositionProvider, NoPrompt};
use companion_core::geo::google::GooglePlaces;
use companion_core::geo::{Geocoder, PlaceSuggestion};
use companion_core::models::{Coordinate, Registration};
use companion_core::{
    ApiClient, CacheManager, Config, DataRefresher, FileStore, LocationCache, Session,
    StartupOrchestrator, DEFAULT_LOCATION,
};

/// Log file written next to the cached data
const LOG_FILE: &str = "companion.log";

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr and to a file in the cache directory. The returned
/// guard flushes the file writer and must live until exit.
fn init_tracing(log_dir: &Path) -> WorkerGuard {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, LOG_FILE));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .with(filter)
        .init();

    guard
}

/// Geocoder used when no Google API key is configured.
struct OfflineGeocoder;

#[async_trait]
impl Geocoder for OfflineGeocoder {
    async fn suggestions(&self, _input: &str) -> Vec<PlaceSuggestion> {
        Vec::new()
    }

    async fn address_for(&self, _coords: Coordinate) -> Option<String> {
        None
    }
}

/// Everything a command needs, wired from config and environment
struct Services {
    config: Config,
    api: ApiClient,
    cache: CacheManager,
    geocoder: Arc<dyn Geocoder>,
}

impl Services {
    fn build(mut config: Config, cache_dir: &Path) -> Result<Self> {
        if let Ok(base_url) = std::env::var("COMPANION_BASE_URL") {
            config.base_url = base_url;
        }

        let store = FileStore::new(cache_dir.to_path_buf())?;
        let cache = CacheManager::new(Arc::new(store));
        let session = Session::new(cache.clone());

        let api = ApiClient::new(&config.base_url, session, config.timeouts.request())?
            .with_token_refresh()
            .with_logout_hook(Arc::new(|| {
                eprintln!("Session expired. Run `companion login <email>` to sign in again.");
            }));

        let geocoder: Arc<dyn Geocoder> = match std::env::var("GOOGLE_API_KEY") {
            Ok(key) if !key.is_empty() => Arc::new(GooglePlaces::new(key)?),
            _ => Arc::new(OfflineGeocoder),
        };

        Ok(Self {
            config,
            api,
            cache,
            geocoder,
        })
    }

    fn refresher(&self) -> DataRefresher {
        DataRefresher::new(self.api.clone(), self.cache.clone(), self.config.timeouts.data_refresh())
    }

    fn location_cache(&self) -> LocationCache {
        LocationCache::new(
            self.cache.clone(),
            Arc::new(FixedPositionProvider::new(self.config.simulated_position)),
            Arc::new(NoPrompt),
            self.config.timeouts,
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = Config::load().context("Failed to load config")?;
    let cache_dir = config.cache_dir()?;
    std::fs::create_dir_all(&cache_dir)
        .with_context(|| format!("Failed to create cache directory {}", cache_dir.display()))?;

    let _guard = init_tracing(&cache_dir);
    info!("Companion CLI starting");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("startup");

    if command == "config" {
        // Written before environment overrides so they do not end up in the file
        let path = config.save()?;
        eprintln!("Config written to {}", path.display());
        return Ok(());
    }

    let services = Services::build(config, &cache_dir)?;

    match command {
        "startup" => run_startup(&services).await,
        "login" => {
            let Some(email) = args.get(1) else {
                bail!("Usage: companion login <email>");
            };
            run_login(&services, email).await
        }
        "register" => {
            let (Some(email), Some(_)) = (args.get(1), args.get(2)) else {
                bail!("Usage: companion register <email> <name>");
            };
            run_register(&services, email, &args[2..].join(" ")).await
        }
        "delete-account" => run_delete_account(&services).await,
        "logout" => {
            services.api.logout().await;
            eprintln!("Logged out.");
            Ok(())
        }
        "locations" => run_locations(&services).await,
        "search" => {
            let query = args[1..].join(" ");
            run_search(&services, &query).await
        }
        other => bail!(
            "Unknown command: {} (expected startup, register, login, logout, delete-account, locations, search or config)",
            other
        ),
    }
}

/// Run the startup sequence and wait for the background phase to report.
async fn run_startup(services: &Services) -> Result<()> {
    let (mut orchestrator, mut reports) = StartupOrchestrator::new(
        services.location_cache(),
        services.refresher(),
        services.config.timeouts.debounce(),
    );

    let outcome = orchestrator.run().await;
    println!("{}", serde_json::to_string_pretty(&outcome.location.region)?);
    eprintln!(
        "Location status: {:?} (from {:?})",
        outcome.location.status, outcome.location.source
    );
    if let Some(listing) = &outcome.cached_listing {
        eprintln!("Cached locations: {}", listing.locations.len());
    }

    match reports.recv().await {
        Some(report) => {
            eprintln!(
                "Background work finished: location {:?}, data refresh {:?} ({}/2 successful)",
                report.location_status,
                report.refresh,
                report.success_count()
            );
        }
        None => warn!("Background phase ended without a report"),
    }
    orchestrator.wait_for_background().await;

    Ok(())
}

async fn run_login(services: &Services, email: &str) -> Result<()> {
    let password = rpassword::prompt_password("Password: ").context("Failed to read password")?;
    let info = services.api.login(email, &password).await?;
    eprintln!(
        "Logged in as {} ({} children linked).",
        email,
        info.number_of_children.unwrap_or(0)
    );
    Ok(())
}

async fn run_register(services: &Services, email: &str, name: &str) -> Result<()> {
    let password = rpassword::prompt_password("Password: ").context("Failed to read password")?;
    let confirm = rpassword::prompt_password("Confirm password: ").context("Failed to read password")?;
    if password != confirm {
        bail!("Passwords do not match");
    }

    let location = services
        .config
        .simulated_position
        .unwrap_or_else(|| DEFAULT_LOCATION.coordinate());
    let registration = Registration {
        name: name.to_string(),
        email: email.to_string(),
        password,
        location,
        children: None,
    };

    if services.api.register(&registration).await? {
        eprintln!("Account created. Run `companion login {}` to sign in.", email);
        Ok(())
    } else {
        bail!("Registration was rejected (see log for the server's reason)")
    }
}

async fn run_delete_account(services: &Services) -> Result<()> {
    eprint!("This permanently deletes your account. Type DELETE to confirm: ");
    io::stderr().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    if answer.trim() != "DELETE" {
        eprintln!("Cancelled.");
        return Ok(());
    }

    services.api.delete_account().await?;
    eprintln!("Account deleted.");
    Ok(())
}

async fn run_locations(services: &Services) -> Result<()> {
    if !services.api.session().is_logged_in().await {
        bail!("Not logged in. Run `companion login <email>` first.");
    }
    match services.refresher().fetch_saved_locations(services.geocoder.as_ref()).await {
        Some(locations) => {
            println!("{}", serde_json::to_string_pretty(&locations)?);
            Ok(())
        }
        None => bail!("Could not fetch saved locations"),
    }
}

async fn run_search(services: &Services, query: &str) -> Result<()> {
    if query.trim().is_empty() {
        bail!("Usage: companion search <text>");
    }
    let suggestions = services.geocoder.suggestions(query).await;
    if suggestions.is_empty() {
        eprintln!("No suggestions (is GOOGLE_API_KEY set?)");
    }
    for suggestion in suggestions {
        println!("{}\t{}", suggestion.place_id, suggestion.description);
    }
    Ok(())
}
