mod cache;
mod config;
mod event;
mod net;
mod worker;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::Method;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::cache::{CacheStorage, MemoryStorage, SqliteStorage};
use crate::event::EventHandler;
use crate::net::{Fetcher, HttpFetcher, Request, RequestMode};
use crate::worker::{ServedFrom, Worker};

#[derive(Parser, Debug)]
#[command(name = "sawmill-offline")]
#[command(about = "Offline-caching request agent with versioned cache partitions")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./sawmill.yaml or $XDG_CONFIG_HOME/sawmill-offline/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Keep the cache in memory instead of the SQLite database
  #[arg(long, global = true)]
  ephemeral: bool,

  /// Increase log verbosity (-v info, -vv debug)
  #[arg(short, long, action = clap::ArgAction::Count, global = true)]
  verbose: u8,

  /// Write logs to this file instead of stderr
  #[arg(long, global = true)]
  log_file: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Cache the application shell
  Install,
  /// Install, then prune partitions of other versions
  Start,
  /// Handle one request the way the page would issue it
  Fetch {
    url: String,
    /// Issue the request as a page navigation
    #[arg(long)]
    navigate: bool,
    /// Accept header to send
    #[arg(long)]
    accept: Option<String>,
    /// HTTP method
    #[arg(long, default_value = "GET")]
    method: String,
    /// Write the body here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
  /// List cache partitions
  Partitions {
    /// Also list the entries of each partition
    #[arg(long)]
    entries: bool,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = init_logging(args.verbose, args.log_file.as_deref())?;

  let config = config::Config::load(args.config.as_deref())?;
  let fetcher = HttpFetcher::new()?;

  if args.ephemeral {
    run(args.command, Worker::new(&config, MemoryStorage::new(), fetcher)?).await
  } else {
    let storage = SqliteStorage::open(config.cache_path.as_deref())?;
    run(args.command, Worker::new(&config, storage, fetcher)?).await
  }
}

fn init_logging(verbose: u8, log_file: Option<&std::path::Path>) -> Result<Option<WorkerGuard>> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
    0 => EnvFilter::new("sawmill_offline=warn"),
    1 => EnvFilter::new("sawmill_offline=info"),
    _ => EnvFilter::new("sawmill_offline=debug"),
  });

  match log_file {
    Some(path) => {
      let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| eyre!("Failed to open log file {}: {}", path.display(), e))?;
      let (writer, guard) = tracing_appender::non_blocking(file);
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
      Ok(Some(guard))
    }
    None => {
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
      Ok(None)
    }
  }
}

async fn run<S: CacheStorage, F: Fetcher>(command: Command, worker: Worker<S, F>) -> Result<()> {
  let worker = Arc::new(worker);
  let (events, _event_loop) = EventHandler::spawn(Arc::clone(&worker));

  match command {
    Command::Install => {
      events.install().await?;
      println!("Installed {}", worker.names().static_name);
    }
    Command::Start => {
      events.install().await?;
      let report = events.activate().await?;
      for name in &report.deleted {
        println!("Deleted {}", name);
      }
      for name in &report.failed {
        eprintln!("Could not delete {}", name);
      }
      let control = *worker.subscribe().borrow();
      if !control.controlling {
        return Err(eyre!("Worker did not claim clients (state {:?})", control.state));
      }
      println!(
        "Controlling clients: {}, {}",
        worker.names().static_name,
        worker.names().runtime_name
      );
    }
    Command::Fetch {
      url,
      navigate,
      accept,
      method,
      output,
    } => {
      let method = Method::from_bytes(method.to_uppercase().as_bytes())
        .map_err(|e| eyre!("Invalid method {}: {}", method, e))?;
      let mut request = Request::new(method, url);
      if navigate {
        request = request.with_mode(RequestMode::Navigate);
      }
      if let Some(accept) = accept {
        let value =
          HeaderValue::from_str(&accept).map_err(|e| eyre!("Invalid accept value: {}", e))?;
        request = request.with_header(ACCEPT, value);
      }

      let served = events.fetch(request).await?;
      eprintln!(
        "{} ({})",
        served.response.status,
        match served.source {
          ServedFrom::Network => "network",
          ServedFrom::Cache => "cache",
          ServedFrom::ShellFallback => "cached shell",
          ServedFrom::NetworkError => "network error",
        }
      );

      match output {
        Some(path) => std::fs::write(&path, &served.response.body)
          .map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))?,
        None => std::io::stdout().write_all(&served.response.body)?,
      }

      // Let the background write land before the process exits
      worker.flush().await;
    }
    Command::Partitions { entries } => {
      for name in worker.store().keys().await? {
        let marker = if worker.names().is_current(&name) {
          "*"
        } else {
          " "
        };
        println!("{} {}", marker, name);

        if entries {
          for entry in worker.store().open(&name).await?.entries().await? {
            println!(
              "    {} {} {} {}B {}",
              entry.method,
              entry.status,
              entry.url,
              entry.size,
              entry.cached_at.format("%Y-%m-%d %H:%M:%S")
            );
          }
        }
      }
    }
  }

  Ok(())
}
