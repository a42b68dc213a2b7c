use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use dd_core::services::state::DEFAULT_STATE_DIR;

/// Start, stop and inspect the DwemerDistro AI service stack.
#[derive(Parser, Debug)]
#[command(name = "ddistro", version, about, long_about = None)]
pub struct Cli {
    /// Launcher configuration file (defaults to /etc/ddistro/ddistro.yaml,
    /// then the built-in service table)
    #[arg(global = true, long, short = 'c', env = "DDISTRO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the last run report
    #[arg(global = true, long, env = "DDISTRO_STATE_DIR", default_value = DEFAULT_STATE_DIR)]
    pub state_dir: PathBuf,

    /// Write debug logs to .ddistro-debug.log in the current directory
    #[arg(global = true, long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Launch every service, print the report and keep running until signalled
    Start(StartArgs),

    /// Stop system services and terminate the service user's processes
    Stop,

    /// Print the report of the last run
    Status,

    /// Validate the configuration and list the configured services
    Check,

    /// Print the end of a service's log file
    Logs {
        /// Service name as configured
        service: String,

        /// Number of lines to print
        #[arg(long, short = 'n', default_value_t = 50)]
        lines: usize,
    },
}

#[derive(Args, Debug, Default, Clone)]
pub struct StartArgs {
    /// Exit with status 1 right after the report if a required service is down
    #[arg(long)]
    pub strict: bool,

    /// Exit after the report instead of following logs until signalled
    #[arg(long)]
    pub no_wait: bool,

    /// Also write the report as JSON to this path
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,
}

impl Cli {
    /// The subcommand to run; a bare `ddistro` means `ddistro start`.
    pub fn subcommand(&self) -> Command {
        match &self.command {
            Some(Command::Start(args)) => Command::Start(args.clone()),
            Some(Command::Stop) => Command::Stop,
            Some(Command::Status) => Command::Status,
            Some(Command::Check) => Command::Check,
            Some(Command::Logs { service, lines }) => Command::Logs {
                service: service.clone(),
                lines: *lines,
            },
            None => Command::Start(StartArgs::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bare_invocation_starts() {
        let cli = Cli::try_parse_from(["ddistro"]).unwrap();
        assert!(matches!(cli.subcommand(), Command::Start(ref a) if !a.strict && !a.no_wait));
        assert!(!cli.debug);
    }

    #[test]
    fn start_flags_parse() {
        let cli = Cli::try_parse_from([
            "ddistro", "start", "--strict", "--no-wait", "--json", "/tmp/report.json",
        ])
        .unwrap();
        match cli.subcommand() {
            Command::Start(args) => {
                assert!(args.strict);
                assert!(args.no_wait);
                assert_eq!(args.json, Some(PathBuf::from("/tmp/report.json")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn logs_takes_service_and_line_count() {
        let cli = Cli::try_parse_from(["ddistro", "logs", "xtts", "-n", "10"]).unwrap();
        assert!(matches!(
            cli.subcommand(),
            Command::Logs { ref service, lines: 10 } if service == "xtts"
        ));
    }

    #[test]
    fn global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["ddistro", "check", "--config", "/etc/alt.yaml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/alt.yaml")));
        assert!(matches!(cli.subcommand(), Command::Check));
    }
}
