// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tollgate - classification-aware, cost-tiered dispatch for LLM queries.
//!
//! This is the binary entry point.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tollgate::report;
use tollgate::shell::run_shell;
use tollgate::telemetry::{init_tracing, register_secrets};
use tollgate::App;
use tollgate_agent::{install_signal_handler, DispatchOptions};
use tollgate_core::{ClassificationLevel, TollgateError};

/// Tollgate - classification-aware, cost-tiered dispatch for LLM queries.
#[derive(Parser, Debug)]
#[command(name = "tollgate", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Classification of the queries, e.g. U, CUI, SECRET.
    #[arg(long, short = 'c', global = true)]
    classification: Option<ClassificationLevel>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Launch an interactive session (the default).
    Shell,
    /// Answer a single query and exit.
    Ask {
        /// The query. A leading /local, /fast, /balanced or /best requests a tier.
        query: String,
        /// Skip the cache and overwrite any cached answer.
        #[arg(long)]
        fresh: bool,
        /// Cache lifetime for this answer, in seconds. 0 never expires.
        #[arg(long)]
        ttl: Option<u64>,
    },
    /// Show cost and savings over recent days.
    Cost {
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
    /// Audit trail operations.
    Audit {
        #[command(subcommand)]
        action: AuditCommands,
    },
    /// Result cache operations.
    Cache {
        #[command(subcommand)]
        action: CacheCommands,
    },
}

#[derive(Subcommand, Debug)]
enum AuditCommands {
    /// Verify the hash chain of every stored event.
    Verify,
}

#[derive(Subcommand, Debug)]
enum CacheCommands {
    /// Show entry and hit counters.
    Stats,
    /// Remove expired entries.
    Purge,
    /// Remove every entry.
    Clear,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => tollgate_config::load_and_validate_path(path),
        None => tollgate_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            tollgate_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let literals = init_tracing(&config.agent.log_level);
    register_secrets(&literals, config.cloud.api_key.as_deref());

    let level = cli
        .classification
        .unwrap_or(config.classification.default_level);

    if let Err(e) = run(cli.command, config, level).await {
        eprintln!("{}: {e}", "error".red());
        std::process::exit(1);
    }
}

async fn run(
    command: Option<Commands>,
    config: tollgate_config::TollgateConfig,
    level: ClassificationLevel,
) -> Result<(), TollgateError> {
    let app = App::open(config).await?;

    match command.unwrap_or(Commands::Shell) {
        Commands::Shell => {
            let cancel = install_signal_handler();
            return run_shell(app, level, cancel).await.map(|_| ());
        }
        Commands::Ask { query, fresh, ttl } => {
            let options = DispatchOptions {
                bypass_cache: fresh,
                ttl: ttl.map(Duration::from_secs),
            };
            let result = app.ask(&query, level, options).await;
            match &result {
                Ok(outcome) => {
                    println!("{}", outcome.text);
                    eprintln!("{}", report::outcome_footer(outcome).dimmed());
                }
                Err(e) => eprintln!("{}: {e}", "error".red()),
            }
            app.shutdown().await;
            return result.map(|_| ());
        }
        Commands::Cost { days } => {
            let trends = app.ledger().trends(days).await?;
            print!("{}", report::trends_report(&trends));
        }
        Commands::Audit {
            action: AuditCommands::Verify,
        } => {
            let audit = app.verify_audit().await?;
            match audit.verdict {
                Ok(()) => println!("audit chain intact ({} events)", audit.events),
                Err(e) => {
                    eprintln!("{}: {e}", "audit chain broken".red());
                    app.shutdown().await;
                    std::process::exit(2);
                }
            }
        }
        Commands::Cache { action } => match action {
            CacheCommands::Stats => {
                let stats = app.cache().stats();
                println!(
                    "{} entries, {} exact hits, {} semantic hits, {} misses, {} evictions",
                    stats.entries, stats.hits_exact, stats.hits_semantic, stats.misses, stats.evictions
                );
            }
            CacheCommands::Purge => {
                let removed = app.cache().purge_expired().await;
                println!("removed {removed} expired entries");
            }
            CacheCommands::Clear => {
                app.cache().clear().await;
                println!("cache cleared");
            }
        },
    }

    app.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_global_classification() {
        let cli = Cli::try_parse_from(["tollgate", "ask", "-c", "CUI", "--fresh", "hello"]).unwrap();
        assert_eq!(cli.classification, Some(ClassificationLevel::Cui));
        assert!(matches!(
            cli.command,
            Some(Commands::Ask { fresh: true, ttl: None, .. })
        ));
    }

    #[test]
    fn no_subcommand_means_shell() {
        let cli = Cli::try_parse_from(["tollgate"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn bad_marking_is_rejected() {
        assert!(Cli::try_parse_from(["tollgate", "-c", "purple"]).is_err());
    }

    #[test]
    fn cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
