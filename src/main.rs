use calagg::adapter::{AdapterRegistry, JsonFileAdapter};
use calagg::cache::{CacheLayer, CacheStorage, MemoryStorage, SqliteStorage};
use calagg::config::{CacheBackend, Config};
use calagg::controller::{AdapterEventProvider, EventListController, ExportController};
use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "calagg")]
#[command(about = "Aggregate calendars into day-grouped event lists and iCalendar exports")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/calagg/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Print the event list for a resource id: <MMddyyyy>-<days>[-<refresh>]
  Events {
    resource_id: String,

    /// Viewer time zone (default: the configured timezone)
    #[arg(short, long)]
    timezone: Option<String>,

    /// Validator from a previous response
    #[arg(short, long)]
    etag: Option<String>,
  },

  /// Export a configured calendar as an .ics file
  Export {
    id: u64,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  let _guard = init_tracing();

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;
  let registry = build_registry(&config)?;
  debug!(adapters = ?registry.names().collect::<Vec<_>>(), "Registered calendar adapters");

  match args.command {
    Command::Events {
      resource_id,
      timezone,
      etag,
    } => {
      let provider = AdapterEventProvider::new(registry, config.calendars.clone());
      let controller = EventListController::new(provider, config.timezone);
      let response = controller
        .handle(&resource_id, timezone.as_deref(), etag.as_deref())
        .await?;

      let cache_control = response.cache_control();
      println!("Status: {}", response.status_code());
      println!("ETag: {}", cache_control.etag);
      println!("Cache-Control: max-age={}", cache_control.expiration_seconds);
      if let Some(model) = response.model() {
        println!();
        println!("{}", serde_json::to_string_pretty(model)?);
      }
    }
    Command::Export { id, output } => {
      let controller =
        ExportController::new(registry, config.calendars.clone()).with_zone(config.timezone);
      match output {
        Some(path) => {
          let mut file = std::fs::File::create(&path)?;
          controller.send_calendar(id, &mut file).await?;
        }
        None => {
          let mut stdout = std::io::stdout().lock();
          controller.send_calendar(id, &mut stdout).await?;
          stdout.flush()?;
        }
      }
    }
  }

  Ok(())
}

/// Log to stderr so stdout stays clean for JSON and .ics output.
fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
  let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("calagg=info")),
    )
    .with_writer(writer)
    .init();
  guard
}

fn build_registry(config: &Config) -> Result<AdapterRegistry> {
  let policy = config.cache.policy();
  let registry = match config.cache.backend {
    CacheBackend::Memory => json_registry(MemoryStorage::new().with_policy(policy)),
    CacheBackend::Sqlite => {
      json_registry(SqliteStorage::open(config.cache.path.as_deref())?.with_policy(policy))
    }
  };
  Ok(registry)
}

fn json_registry<S: CacheStorage + 'static>(storage: S) -> AdapterRegistry {
  AdapterRegistry::new().with(
    "json",
    Arc::new(JsonFileAdapter::new(CacheLayer::new(storage))),
  )
}
