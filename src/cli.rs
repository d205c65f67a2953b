use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "deploy-processor", version, about = "Generate and deploy serverless APIs from prompts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP server and background stale sweep (default)
    Serve,
    /// Apply database migrations and exit
    Migrate,
    /// Claim and process one pending job, then exit
    ProcessNext,
    /// Fail jobs stuck in processing, then exit
    ReapStale {
        /// Override STALE_JOB_MINUTES
        #[arg(long)]
        older_than_minutes: Option<u64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_no_subcommand() {
        let cli = Cli::try_parse_from(["deploy-processor"]).unwrap();
        assert_eq!(cli.command, None);
    }

    #[test]
    fn parses_reap_stale_override() {
        let cli =
            Cli::try_parse_from(["deploy-processor", "reap-stale", "--older-than-minutes", "45"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Command::ReapStale {
                older_than_minutes: Some(45)
            })
        );
    }

    #[test]
    fn parses_process_next() {
        let cli = Cli::try_parse_from(["deploy-processor", "process-next"]).unwrap();
        assert_eq!(cli.command, Some(Command::ProcessNext));
    }
}
