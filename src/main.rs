use clap::{Parser, Subcommand};
use docsite::{config, output, serve, site::Site};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "docsite")]
#[command(about = "Documentation server for JSON API specifications")]
#[command(long_about = "\
Documentation server for JSON API specifications

Themes, templates, static files and markdown guides are compiled into memory
once at start-up. An optional override tree shadows the default one file by
file.

Asset tree layout (default_assets_dir and assets_dir alike):

  assets/
  ├── templates/                   # Page templates
  │   ├── layout.tmpl              # Wraps every page, receives [: content :]
  │   ├── index.tmpl               # Site home
  │   ├── specindex.tmpl           # Generic API home
  │   ├── petstore/index.tmpl      # API-specific home (wins over specindex)
  │   ├── error.tmpl               # Not-found page
  │   └── guides/intro.md          # Markdown guide → guides/intro.tmpl
  ├── static/                      # Served under /static/
  └── themes/
      └── default/                 # Theme files, mirroring the asset root
          ├── templates/
          └── static/

  specs/
  └── petstore/swagger.json        # Served at /petstore/swagger.json

Run 'docsite gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Configuration file (stock defaults apply when it does not exist)
    #[arg(long, default_value = "config.toml", global = true)]
    config: PathBuf,

    /// Listen address, overrides bind_addr from the config file
    #[arg(long, global = true)]
    bind: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile the site and serve it over HTTP
    Serve,
    /// Compile the site and print its inventory without serving
    Check,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => {
            let site = build_site(&cli.config, cli.bind)?;
            serve::serve(site)?;
        }
        Command::Check => {
            let site = build_site(&cli.config, cli.bind)?;
            output::print_check_output(&site);
            println!("==> Site is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load config, start logging, and run the whole construction phase.
fn build_site(path: &Path, bind: Option<String>) -> Result<Site, Box<dyn std::error::Error>> {
    let mut site_config = config::load_config(path)?;
    if let Some(bind) = bind {
        site_config.bind_addr = bind;
    }
    init_tracing(&site_config.log_level);
    Ok(Site::build(site_config)?)
}

/// RUST_LOG wins over the configured level.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
