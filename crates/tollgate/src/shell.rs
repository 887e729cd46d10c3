// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tollgate shell` command implementation.
//!
//! A readline loop over the dispatcher. Slash commands inspect or adjust the
//! session; everything else, including `/local`, `/fast`, `/balanced` and
//! `/best` overrides, is dispatched as a query at the current classification.

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tollgate_agent::{format_duration, DispatchOptions, ExpiryPolicy, LifetimeEvent};
use tollgate_core::{ClassificationLevel, SessionCostRecord, TollgateError};
use tollgate_router::parse_tier_override;
use tracing::{debug, info};

use crate::app::App;
use crate::report;

const HELP: &str = "\
commands:
  /level [MARKING]   show or set the classification (U, CUI, C, S, TS)
  /status            session, policy and cache state
  /cost [DAYS]       this session's cost, or a report over DAYS days
  /audit             verify the audit hash chain
  /fresh QUERY       ask without the cache and overwrite its entry
  /forget QUERY      drop QUERY's cache entry
  /quit              end the session
prefix a query with /local, /fast, /balanced or /best to request a tier";

/// One parsed line of shell input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Empty,
    Quit,
    Help,
    Level(Option<String>),
    Status,
    Cost(Option<u32>),
    Audit,
    Fresh(String),
    Forget(String),
    Query(String),
    Unknown(String),
}

pub fn parse_command(line: &str) -> ShellCommand {
    let line = line.trim();
    if line.is_empty() {
        return ShellCommand::Empty;
    }
    if !line.starts_with('/') || parse_tier_override(line).0.is_some() {
        return ShellCommand::Query(line.to_string());
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let arg = (!rest.is_empty()).then(|| rest.to_string());
    match word {
        "/quit" | "/exit" => ShellCommand::Quit,
        "/help" => ShellCommand::Help,
        "/level" => ShellCommand::Level(arg),
        "/status" => ShellCommand::Status,
        "/cost" => match arg {
            None => ShellCommand::Cost(None),
            Some(days) => match days.parse() {
                Ok(days) => ShellCommand::Cost(Some(days)),
                Err(_) => ShellCommand::Unknown(line.to_string()),
            },
        },
        "/audit" => ShellCommand::Audit,
        "/fresh" => match arg {
            Some(query) => ShellCommand::Fresh(query),
            None => ShellCommand::Unknown(line.to_string()),
        },
        "/forget" => match arg {
            Some(query) => ShellCommand::Forget(query),
            None => ShellCommand::Unknown(line.to_string()),
        },
        _ => ShellCommand::Unknown(line.to_string()),
    }
}

/// What the loop does after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Print(String),
    /// A failed query, printed in red.
    Failure(String),
    Quit,
}

/// Shell state bound to one [`App`].
pub struct Shell {
    app: App,
    level: ClassificationLevel,
}

impl Shell {
    pub fn new(app: App, level: ClassificationLevel) -> Self {
        Self { app, level }
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    pub fn level(&self) -> ClassificationLevel {
        self.level
    }

    /// Consumes the shell and shuts the app down.
    pub async fn close(self) -> SessionCostRecord {
        self.app.shutdown().await
    }

    /// Runs one command and says what to show.
    pub async fn handle(&mut self, command: ShellCommand) -> Reply {
        // Any command the operator types counts, not just answered queries.
        if !matches!(command, ShellCommand::Empty | ShellCommand::Quit) {
            self.app.lifetime().record_activity();
        }
        match command {
            ShellCommand::Empty => Reply::Print(String::new()),
            ShellCommand::Quit => Reply::Quit,
            ShellCommand::Help => Reply::Print(HELP.to_string()),
            ShellCommand::Level(None) => Reply::Print(format!("classification: {}", self.level)),
            ShellCommand::Level(Some(marking)) => match marking.parse::<ClassificationLevel>() {
                Ok(level) => {
                    self.level = level;
                    info!(classification = %level, "classification changed");
                    Reply::Print(format!("classification: {level}"))
                }
                Err(e) => Reply::Failure(e.to_string()),
            },
            ShellCommand::Status => Reply::Print(report::status_report(
                    &self.app.lifetime().status(),
                    &self.app.dispatcher().permitted(self.level),
                    &self.app.cache().stats(),
                )),
            ShellCommand::Cost(None) => {
                Reply::Print(report::session_summary(&self.app.ledger().current_session()))
            }
            ShellCommand::Cost(Some(days)) => match self.app.ledger().trends(days).await {
                Ok(trends) => Reply::Print(report::trends_report(&trends)),
                Err(e) => Reply::Failure(format!("cost report unavailable: {e}")),
            },
            ShellCommand::Audit => match self.app.verify_audit().await {
                Ok(audit) => match audit.verdict {
                    Ok(()) => Reply::Print(format!("audit chain intact ({} events)", audit.events)),
                    Err(e) => Reply::Failure(format!("audit chain broken: {e}")),
                },
                Err(e) => Reply::Failure(format!("audit trail unreadable: {e}")),
            },
            ShellCommand::Forget(query) => {
                if self.app.cache().invalidate(&query, self.level).await {
                    Reply::Print("forgotten".to_string())
                } else {
                    Reply::Print("not cached".to_string())
                }
            }
            ShellCommand::Fresh(query) => {
                let options = DispatchOptions {
                    bypass_cache: true,
                    ..DispatchOptions::default()
                };
                self.ask(&query, options).await
            }
            ShellCommand::Query(query) => self.ask(&query, DispatchOptions::default()).await,
            ShellCommand::Unknown(line) => {
                Reply::Failure(format!("unknown command: {line} (try /help)"))
            }
        }
    }

    async fn ask(&self, query: &str, options: DispatchOptions) -> Reply {
        match self.app.ask(query, self.level, options).await {
            Ok(outcome) => Reply::Print(format!(
                "{}\n{}",
                outcome.text,
                report::outcome_footer(&outcome).dimmed()
            )),
            Err(e) => Reply::Failure(e.to_string()),
        }
    }

    /// The session is over and will not come back.
    fn terminated(&self) -> bool {
        self.app.lifetime().settings().expiry_policy == ExpiryPolicy::Terminate
            && self.app.lifetime().is_expired()
    }
}

/// Prints pending lifetime notices. Returns true once the session has ended.
fn drain_events(events: &mut mpsc::Receiver<LifetimeEvent>, policy: ExpiryPolicy) -> bool {
    let mut ended = false;
    while let Ok(event) = events.try_recv() {
        match event {
            LifetimeEvent::Warning { remaining, .. } => {
                println!(
                    "{}",
                    format!("session expires in {} without activity", format_duration(remaining))
                        .yellow()
                );
            }
            LifetimeEvent::Timeout { idle, .. } => {
                println!(
                    "{}",
                    format!("session expired after {} idle", format_duration(idle)).yellow()
                );
                ended |= policy == ExpiryPolicy::Terminate;
            }
            LifetimeEvent::AutosaveDue { session_id } => {
                debug!(session_id = %session_id, "autosave notice");
            }
        }
    }
    ended
}

/// Runs the `tollgate shell` interactive REPL until `/quit`, end of input,
/// cancellation or session expiry. Returns the closed session's record.
pub async fn run_shell(
    mut app: App,
    level: ClassificationLevel,
    cancel: CancellationToken,
) -> Result<SessionCostRecord, TollgateError> {
    let mut events = app.take_events();
    let background = app.spawn_background(&cancel);
    let policy = app.lifetime().settings().expiry_policy;

    let mut rl = DefaultEditor::new()
        .map_err(|e| TollgateError::Internal(format!("failed to initialize readline: {e}")))?;

    println!("{}", "tollgate shell".bold().green());
    println!(
        "classification {}. Type {} for commands, {} to exit.\n",
        level.to_string().bold(),
        "/help".yellow(),
        "/quit".yellow()
    );

    let mut shell = Shell::new(app, level);
    loop {
        if let Some(rx) = events.as_mut()
            && drain_events(rx, policy)
        {
            break;
        }
        if cancel.is_cancelled() || shell.terminated() {
            break;
        }

        let prompt = format!("{}> ", shell.level().to_string().green());
        match rl.readline(&prompt) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());
                if shell.terminated() {
                    println!("{}", "session expired".yellow());
                    break;
                }
                match shell.handle(parse_command(&line)).await {
                    Reply::Print(text) => println!("{text}"),
                    Reply::Failure(text) => eprintln!("{}: {text}", "error".red()),
                    Reply::Quit => break,
                }
            }
            // Ctrl+C
            Err(ReadlineError::Interrupted) => break,
            // Ctrl+D
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {e}", "error".red());
                break;
            }
        }
    }

    cancel.cancel();
    for handle in background {
        let _ = handle.await;
    }

    let ended = shell.close().await;
    print!("{}", report::session_summary(&ended).dimmed());
    println!("goodbye");
    Ok(ended)
}
