//! # page-dump CLI
//!
//! ## Usage
//!
//! ```bash
//! page-dump --config ./config/page-dump.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `page-dump dump <title>` | Extract a page into a zip or JSON container |
//! | `page-dump validate <path>` | Check the structural invariants of a written dump |
//! | `page-dump query` | Print the Datalog query and rules for the configured directives |
//!
//! Logging goes to stderr and honours `RUST_LOG`; `--verbose` raises the
//! default level from `info` to `debug`.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use page_dump::archive::{archive_name, create_writer, read_dump};
use page_dump::config;
use page_dump::dump::{dump_page, fetcher_from_config, provider_from_config, DumpOptions};
use page_dump_core::query::{build_query, build_rules};
use page_dump_core::validate::validate;
use page_dump_core::FollowLinksDirective;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// page-dump: extract a page and everything it links to into a
/// self-contained archive.
#[derive(Parser)]
#[command(name = "page-dump", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/page-dump.toml")]
    config: PathBuf,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a page into an archive.
    ///
    /// Fetches the page shell and its content, normalizes every record,
    /// downloads embedded files and writes `<out>/<title>.zip` (or `.json`).
    Dump {
        /// Title of the root page.
        title: String,

        /// Output format: `zip` or `json`. Overrides `output.format`.
        #[arg(long)]
        format: Option<String>,

        /// Output directory. Overrides `output.dir`.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Validate a written dump.
    ///
    /// Exits non-zero when any structural rule fails. The dump must have
    /// been written with `vertex-type` in `dump.add_properties`.
    Validate {
        /// Path to a `.zip` or `.json` dump.
        path: PathBuf,
    },

    /// Print the query and rules sent to the host.
    Query {
        /// `none`, `shallow` or `deep`. Defaults to `dump.follow_children`.
        #[arg(long)]
        follow_children: Option<FollowLinksDirective>,

        /// `none`, `shallow` or `deep`. Defaults to `dump.follow_refs`.
        #[arg(long)]
        follow_refs: Option<FollowLinksDirective>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn validate_dump(path: &Path) -> anyhow::Result<()> {
    let vertices = read_dump(path)?;
    let failures = validate(&vertices);
    if failures.is_empty() {
        println!("{}: {} vertices, all rules pass.", path.display(), vertices.len());
        return Ok(());
    }
    for failure in &failures {
        println!("{}", failure);
    }
    bail!("{} validation failure(s) in {}", failures.len(), path.display());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Validate { path } => validate_dump(&path)?,
        Commands::Dump { title, format, out } => {
            let cfg = config::load_config(&cli.config)?;
            let format = format.unwrap_or_else(|| cfg.output.format.clone());
            let out_dir = out.unwrap_or_else(|| cfg.output.dir.clone());
            let options = DumpOptions::from_config(&cfg)?;
            let provider = provider_from_config(&cfg)?;
            let fetcher = fetcher_from_config(&cfg)?;
            let writer = create_writer(&format, &out_dir, &archive_name(&title))?;

            let report = dump_page(&title, &options, provider.as_ref(), fetcher, writer)
                .await
                .with_context(|| format!("Dump of '{}' failed", title))?;

            println!("Wrote {}", report.output.display());
            for (vertex_type, count) in &report.vertex_counts {
                println!("  {:<20} {}", vertex_type, count);
            }
            println!("  {:<20} {}", "files", report.files);
            if !report.failures.is_empty() {
                println!("  {} validation warning(s)", report.failures.len());
            }
        }
        Commands::Query {
            follow_children,
            follow_refs,
        } => {
            let cfg = config::load_config(&cli.config)?;
            let fc = follow_children.unwrap_or(cfg.dump.follow_children);
            let fr = follow_refs.unwrap_or(cfg.dump.follow_refs);
            println!("{}", build_query(fc, fr));
            println!("{}", build_rules(fc, fr));
        }
    }

    Ok(())
}
