use clap::{Parser, Subcommand};
use flashbacks::config::{self, BackendConfig};
use flashbacks::exclusion::ExclusionStore;
use flashbacks::server::{self, Backend};
use flashbacks::{output, scan};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{EnvFilter, fmt};

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "flashbacks")]
#[command(about = "Photo slideshow, departure board and weather backend for a smart mirror")]
#[command(long_about = "\
Photo slideshow, departure board and weather backend for a smart mirror

Picks a random album from a year/event photo tree, serves the current
window of slides and two tiled collages, computes the next departures
from a GTFS feed and keeps a rolling temperature history.

Photo tree:

  media/
  ├── 2019/                        # Year
  │   ├── 2019_07_14 Seaside/      # Event (album), walked recursively
  │   │   ├── IMG_0001.jpg
  │   │   └── raw/IMG_0002.png
  │   └── @eaDir/                  # Skipped
  └── #Recycle/                    # Skipped

Routes: /image/{id}, /collage/sequence, /collage/overview, /state, /next,
/exclude, /vvt/next, /vvt/stops, /vvt/debug, /weather/trends, /help.

Run 'flashbacks gen-config' to generate a documented flashbacks.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (stock defaults when missing)
    #[arg(long, default_value = "flashbacks.toml", global = true)]
    config: PathBuf,

    /// Photo tree root
    #[arg(long, env = "MEDIA_ROOT", global = true)]
    media_root: Option<PathBuf>,

    /// Directory for listing caches and persisted state
    #[arg(long, env = "CACHE_DIR", global = true)]
    cache_dir: Option<PathBuf>,

    /// HTTP port
    #[arg(long, env = "PORT", global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP backend (default)
    Serve,
    /// Validate config and media root, then print the album tree
    Check,
    /// Print a stock flashbacks.toml with all options documented
    GenConfig,
}

impl Cli {
    /// File config with command-line and environment overrides applied.
    fn resolve(&self) -> Result<BackendConfig, config::ConfigError> {
        let mut config = config::load_config(&self.config)?;
        if let Some(root) = &self.media_root {
            config.media.root = root.clone();
        }
        if let Some(dir) = &self.cache_dir {
            config.media.cache_dir = dir.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command.as_ref().unwrap_or(&Command::Serve) {
        Command::Serve => {
            fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
                )
                .init();

            let config = cli.resolve()?;
            let backend = match Backend::new(config) {
                Ok(backend) => backend,
                Err(e) => {
                    error!(error = %e, "startup failed");
                    std::process::exit(1);
                }
            };
            server::start_server(backend).await?;
        }
        Command::Check => {
            let config = cli.resolve()?;
            let root = &config.media.root;
            if !root.is_dir() {
                return Err(format!("media root missing: {}", root.display()).into());
            }
            println!("==> Checking {}", root.display());
            let exclusions = ExclusionStore::load(&config.media.cache_dir);
            let years = scan::survey(root, |year, event| exclusions.contains(year, event));
            output::print_check_output(&years, &config);
            println!("==> Config is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
