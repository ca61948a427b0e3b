mod config;
mod executor;
mod gate;
mod history;
mod record;
mod risk;
mod translator;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use std::io::{self, Write};
use std::path::PathBuf;

use config::Config;
use gate::{DecisionGate, Verdict};
use history::HistoryLog;
use record::CommandRequest;
use translator::ShellKind;

#[derive(Parser)]
#[command(name = "osh")]
#[command(about = "Interactive shell with portable-command translation and risk screening")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single command through the pipeline and exit
    Run {
        /// Command to execute (wrap commands with pipes in quotes)
        #[arg(required = true)]
        command: String,
        /// Working directory override
        #[arg(long)]
        cwd: Option<PathBuf>,
        /// Timeout override in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Show risk assessment and translation without executing
    Check {
        #[arg(required = true)]
        command: String,
    },
    /// Show recent entries from the persisted history log
    History {
        /// Maximum number of entries to display
        #[arg(long)]
        count: Option<usize>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("OSH_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::new()?;
    let gate = DecisionGate::new(&config, ShellKind::host());
    let log = HistoryLog::new(config.history_log_path())?;

    match cli.command {
        None => repl(&config, &gate, &log),
        Some(Commands::Run {
            command,
            cwd,
            timeout,
        }) => {
            let request = CommandRequest::new(command)
                .with_working_dir(cwd)
                .with_timeout_secs(timeout);
            process_request(&gate, &log, &request);
            Ok(())
        }
        Some(Commands::Check { command }) => {
            print_check(&gate, &command);
            Ok(())
        }
        Some(Commands::History { count }) => {
            print_persisted_history(&log, count.unwrap_or(config.history.max_shown))
        }
    }
}

fn repl(config: &Config, gate: &DecisionGate, log: &HistoryLog) -> Result<()> {
    // Ctrl+C at the prompt should not kill the shell
    let _ = ctrlc::set_handler(|| {
        println!("\n{}", "(type 'exit' to quit)".yellow());
    });

    println!(
        "{} {}",
        "osh".cyan().bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("{}", "Type 'help' for assistance, 'exit' to quit.".dimmed());

    let stdin = io::stdin();
    loop {
        print!("{} ", config.shell.prompt.green().bold());
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            // EOF (Ctrl+D)
            println!();
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match parse_builtin(input) {
            Some(Builtin::Exit) => break,
            Some(Builtin::Help) => print_help(),
            Some(Builtin::History(count)) => {
                print_session_history(gate, count.unwrap_or(config.history.max_shown))
            }
            Some(Builtin::Check(Some(command))) => print_check(gate, command),
            Some(Builtin::Check(None)) => {
                println!("{}", "usage: check <command>".yellow())
            }
            None => process_request(gate, log, &CommandRequest::new(input)),
        }
    }

    println!("{}", "Goodbye!".cyan());
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum Builtin<'a> {
    Exit,
    Help,
    History(Option<usize>),
    Check(Option<&'a str>),
}

/// Recognizes REPL builtins. A bare `check` is still the builtin (with a
/// usage hint), never a command handed to the host shell.
fn parse_builtin(input: &str) -> Option<Builtin<'_>> {
    match input {
        "exit" | "quit" => return Some(Builtin::Exit),
        "help" => return Some(Builtin::Help),
        "history" => return Some(Builtin::History(None)),
        "check" => return Some(Builtin::Check(None)),
        _ => {}
    }

    if let Some(rest) = input.strip_prefix("history ") {
        return Some(Builtin::History(rest.trim().parse().ok()));
    }
    if let Some(rest) = input.strip_prefix("check ") {
        let rest = rest.trim();
        return Some(Builtin::Check((!rest.is_empty()).then_some(rest)));
    }

    None
}

/// Screen, confirm if needed, submit, display, and log one request.
fn process_request(gate: &DecisionGate, log: &HistoryLog, request: &CommandRequest) {
    let screening = gate.screen(&request.raw);

    if !screening.allowed {
        print_blocked(&screening.reasons);
        return;
    }

    if screening.level >= risk::RiskLevel::Medium {
        for reason in &screening.reasons {
            println!("{} {}", "warning:".yellow().bold(), reason.yellow());
        }
    }

    if screening.requires_confirmation() && !confirm_execution() {
        println!("{}", "Cancelled.".yellow());
        return;
    }

    match gate.submit(request) {
        Verdict::Blocked(assessment) => print_blocked(&assessment.reasons),
        Verdict::Executed { result, .. } => {
            if !result.stdout.is_empty() {
                print!("{}", result.stdout);
                if !result.stdout.ends_with('\n') {
                    println!();
                }
            }
            if !result.stderr.is_empty() {
                eprint!("{}", result.stderr.red());
                if !result.stderr.ends_with('\n') {
                    eprintln!();
                }
            }
            if !result.success {
                println!(
                    "{}",
                    format!("command failed (exit code: {})", result.exit_code)
                        .red()
                        .bold()
                );
            }

            if let Err(err) = log.record(&result) {
                println!(
                    "{} {}",
                    "warning:".yellow().bold(),
                    format!("could not write history log: {err:#}").yellow()
                );
            }
        }
    }
}

fn print_blocked(reasons: &[String]) {
    println!(
        "{} {}",
        "BLOCKED:".red().bold(),
        reasons.join("; ").red()
    );
}

fn confirm_execution() -> bool {
    print!("{}", "High-risk command. Run it anyway? [y/N] ".yellow().bold());
    io::stdout().flush().ok();
    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return false;
    }
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}

fn print_check(gate: &DecisionGate, command: &str) {
    let assessment = gate.screen(command);
    let level = assessment.level.to_string();
    let level_colored = match assessment.level {
        risk::RiskLevel::Low => level.green(),
        risk::RiskLevel::Medium => level.yellow(),
        risk::RiskLevel::High => level.red(),
        risk::RiskLevel::Critical => level.red().bold(),
    };

    println!("{}: {}", "risk level".cyan(), level_colored);
    println!("{}: {}", "risk score".cyan(), assessment.score);
    for reason in &assessment.reasons {
        println!("  - {reason}");
    }
    if assessment.allowed {
        println!("{}: {}", "translates to".cyan(), gate.preview(command));
        if assessment.requires_confirmation() {
            println!("{}", "would require confirmation before running".yellow());
        }
    } else {
        println!("{}", "would be blocked".red().bold());
    }
}

fn print_session_history(gate: &DecisionGate, count: usize) {
    let recent = gate.history().recent(count);
    if recent.is_empty() {
        println!("{}", "no commands executed this session".dimmed());
        return;
    }
    for result in recent {
        let status = if result.success {
            "ok".green()
        } else {
            "fail".red()
        };
        println!(
            "{}  {}  {:>6}ms  {}",
            result.timestamp.format("%H:%M:%S"),
            status,
            result.duration_ms,
            result.command
        );
    }
}

fn print_persisted_history(log: &HistoryLog, count: usize) -> Result<()> {
    let entries = log.tail(count)?;
    if entries.is_empty() {
        println!("{}", "history log is empty".dimmed());
        return Ok(());
    }
    for entry in entries {
        let status = if entry.success {
            "ok".green()
        } else {
            "fail".red()
        };
        println!(
            "{}  {}  {}  {:>6}ms  {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.id.dimmed(),
            status,
            entry.duration_ms,
            entry.command
        );
    }
    Ok(())
}

fn print_help() {
    println!("{}", "osh - command intake pipeline".cyan().bold());
    println!();
    println!("{}", "Built-in commands:".bold());
    println!("  {}          Show this help", "help".green());
    println!("  {}     Leave the shell", "exit/quit".green());
    println!("  {}   Show commands executed this session", "history [N]".green());
    println!("  {}   Assess a command without running it", "check <CMD>".green());
    println!();
    println!("{}", "Everything else is screened for risk, translated for the".dimmed());
    println!("{}", "host shell, and executed with a timeout. CRITICAL commands".dimmed());
    println!("{}", "are blocked; HIGH-risk commands ask for confirmation.".dimmed());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_builtin_keywords() {
        assert_eq!(parse_builtin("exit"), Some(Builtin::Exit));
        assert_eq!(parse_builtin("quit"), Some(Builtin::Exit));
        assert_eq!(parse_builtin("help"), Some(Builtin::Help));
    }

    #[test]
    fn test_parse_builtin_history_counts() {
        assert_eq!(parse_builtin("history"), Some(Builtin::History(None)));
        assert_eq!(parse_builtin("history 5"), Some(Builtin::History(Some(5))));
        assert_eq!(parse_builtin("history five"), Some(Builtin::History(None)));
    }

    #[test]
    fn test_bare_check_is_a_builtin_not_a_command() {
        assert_eq!(parse_builtin("check"), Some(Builtin::Check(None)));
        assert_eq!(parse_builtin("check   "), Some(Builtin::Check(None)));
        assert_eq!(
            parse_builtin("check rm -rf /"),
            Some(Builtin::Check(Some("rm -rf /")))
        );
    }

    #[test]
    fn test_other_input_is_not_a_builtin() {
        assert!(parse_builtin("ls -la").is_none());
        assert!(parse_builtin("checkout main").is_none());
        assert!(parse_builtin("historical notes").is_none());
    }
}
