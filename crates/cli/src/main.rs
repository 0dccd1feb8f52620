//! CacheTool CLI - manage APC and OPcache of a PHP runtime from the command line

mod commands;
mod logging;
mod render;
mod settings;
mod wiring;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing::debug;

use cachetool_core::application::CacheTool;
use cachetool_core::CacheToolError;

use crate::commands::Command;
use crate::settings::{Overrides, Settings};

#[derive(Parser, Debug)]
#[command(name = "cachetool")]
#[command(about = "Manage APC and OPcache of a PHP runtime", long_about = None)]
#[command(version = cachetool_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Connect to a FastCGI server; without a value the local socket or 127.0.0.1:9000 is used
    ///
    /// The value may follow a space or `=`. A bare `--fcgi` in front of the
    /// command takes the command name as its value, so put it after the command.
    #[arg(
        long,
        global = true,
        num_args = 0..=1,
        default_missing_value = "",
        value_name = "CONNECTION"
    )]
    fcgi: Option<String>,

    /// Run snippets through the local php binary
    #[arg(long, global = true, conflicts_with = "fcgi")]
    cli: bool,

    /// Directory for staged snippets
    #[arg(long, global = true)]
    tmp_dir: Option<String>,

    /// php binary used by the cli adapter
    #[arg(long, global = true)]
    php_binary: Option<String>,

    /// Timeout in seconds for a single request
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        let adapter = if self.cli {
            Some(wiring::ADAPTER_CLI.to_string())
        } else if self.fcgi.is_some() {
            Some(wiring::ADAPTER_FASTCGI.to_string())
        } else {
            None
        };

        Overrides {
            adapter,
            fastcgi: self.fcgi.clone(),
            temp_dir: self.tmp_dir.clone(),
            php_binary: self.php_binary.clone(),
            timeout_secs: self.timeout,
        }
    }
}

async fn run(cli: Cli) -> Result<String> {
    let cwd = std::env::current_dir().context("Failed to read the working directory")?;
    let settings = Settings::load(&cli.overrides(), &cwd)?;
    debug!(?settings, "Settings loaded");

    let adapter = wiring::build_adapter(&settings)?;
    let mut tool = CacheTool::new(adapter);

    let plan = cli.command.plan();
    debug!(command = cli.command.name(), adapter = tool.adapter_name(), "Dispatching");
    let value = tool.call(plan.capability, plan.code).await?;

    Ok(render::render(&cli.command, value))
}

/// `<Kind> error: <message>` on a single line
fn report_line(err: &anyhow::Error) -> String {
    let (label, message) = match err.downcast_ref::<CacheToolError>() {
        Some(e) => (format!("{} error:", e.kind()), e.to_string()),
        None => ("Error:".to_string(), format!("{:#}", err)),
    };
    format!("{} {}", label.red().bold(), single_line(&message))
}

fn single_line(message: &str) -> String {
    message
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Process exit status for the outcome of `run`
fn exit_status(result: &Result<String>) -> u8 {
    match result {
        Ok(_) => 0,
        Err(_) => 1,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result = run(cli).await;
    match &result {
        Ok(output) => println!("{}", output),
        Err(err) => eprintln!("{}", report_line(err)),
    }
    ExitCode::from(exit_status(&result))
}

#[cfg(test)]
mod tests {
    use super::*;

    use cachetool_core::TransportFault;

    #[test]
    fn test_bare_fcgi_flag() {
        let cli = Cli::try_parse_from(["cachetool", "opcache:status", "--fcgi"]).unwrap();

        assert_eq!(cli.command, Command::OpcacheStatus);
        let overrides = cli.overrides();
        assert_eq!(overrides.adapter.as_deref(), Some("fastcgi"));
        assert_eq!(overrides.fastcgi.as_deref(), Some(""));
    }

    #[test]
    fn test_fcgi_with_connection_string() {
        let cli =
            Cli::try_parse_from(["cachetool", "apc:sma:info", "--fcgi=127.0.0.1:9001"]).unwrap();

        assert_eq!(cli.command, Command::ApcSmaInfo);
        assert_eq!(cli.overrides().fastcgi.as_deref(), Some("127.0.0.1:9001"));
    }

    #[test]
    fn test_fcgi_connection_after_space() {
        let cli =
            Cli::try_parse_from(["cachetool", "--fcgi", "127.0.0.1:9000", "opcache:status"])
                .unwrap();

        assert_eq!(cli.command, Command::OpcacheStatus);
        assert_eq!(cli.overrides().fastcgi.as_deref(), Some("127.0.0.1:9000"));
        assert_eq!(cli.overrides().adapter.as_deref(), Some("fastcgi"));
    }

    #[test]
    fn test_cli_flag_and_options() {
        let cli = Cli::try_parse_from([
            "cachetool",
            "--cli",
            "--php-binary",
            "/usr/bin/php8",
            "--timeout",
            "5",
            "-vv",
            "apc:key:store",
            "greeting",
            "hello",
        ])
        .unwrap();

        let overrides = cli.overrides();
        assert_eq!(overrides.adapter.as_deref(), Some("cli"));
        assert_eq!(overrides.php_binary.as_deref(), Some("/usr/bin/php8"));
        assert_eq!(overrides.timeout_secs, Some(5));
        assert_eq!(cli.verbose, 2);
        assert_eq!(
            cli.command,
            Command::ApcKeyStore {
                key: "greeting".to_string(),
                value: "hello".to_string(),
                ttl: 0
            }
        );
    }

    #[test]
    fn test_no_adapter_flag_defers_to_settings() {
        let cli = Cli::try_parse_from(["cachetool", "opcache:reset"]).unwrap();
        assert_eq!(cli.overrides(), Overrides::default());
    }

    #[test]
    fn test_cli_and_fcgi_conflict() {
        assert!(Cli::try_parse_from(["cachetool", "--cli", "--fcgi=127.0.0.1:9000", "opcache:reset"]).is_err());
    }

    fn failed(err: CacheToolError) -> Result<String> {
        Err(anyhow::Error::from(err))
    }

    #[test]
    fn test_report_line_per_error_kind() {
        let cases = [
            (
                CacheToolError::Configuration("Extension `apc` is not loaded".to_string()),
                "Configuration error:",
                "Extension `apc` is not loaded",
            ),
            (
                CacheToolError::transport(TransportFault::Refused, "Could not connect"),
                "Transport error:",
                "Could not connect",
            ),
            (
                CacheToolError::Protocol("malformed record: bad version".to_string()),
                "Protocol error:",
                "malformed record: bad version",
            ),
            (
                CacheToolError::Execution {
                    status: 500,
                    stderr: "PHP Fatal error: boom\nStack trace:\n#0 {main}".to_string(),
                    stdout: String::new(),
                },
                "Execution error:",
                "PHP Fatal error: boom Stack trace: #0 {main}",
            ),
        ];

        for (err, label, message) in cases {
            let result = failed(err);
            let line = report_line(result.as_ref().unwrap_err());

            assert!(!line.contains('\n'), "{:?}", line);
            assert!(line.contains(label), "{:?}", line);
            assert!(line.contains(message), "{:?}", line);
            assert_ne!(exit_status(&result), 0);
        }
    }

    #[test]
    fn test_report_line_for_other_errors() {
        let err = anyhow::anyhow!("No such file").context("Failed to read the working directory");
        let line = report_line(&err);

        assert!(line.contains("Error:"));
        assert!(line.contains("Failed to read the working directory: No such file"));
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_exit_status_success() {
        assert_eq!(exit_status(&Ok("done".to_string())), 0);
    }
}
