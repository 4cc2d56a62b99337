use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rhsm-register")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declaratively manage Red Hat Subscription Management registration", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Settings file (default: ~/.config/rhsm-register/config.toml)
    #[arg(long, global = true, env = "RHSM_REGISTER_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Converge the host to the registration state declared in a manifest
    Apply(ApplyArgs),

    /// Show what apply would change, without running any change
    Plan(PlanArgs),

    /// Show the current registration status of this host
    Status(StatusArgs),

    /// Validate a manifest without contacting the registration tool
    Validate {
        /// Manifest file
        manifest: PathBuf,
    },

    /// Describe the attributes of rhsm_register
    Schema {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Manifest file
    pub manifest: PathBuf,

    /// Show what would be done without running it
    #[arg(long, short = 'n')]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(long, short)]
    pub yes: bool,

    /// Only apply resources matching this target (name or "rhsm_register.name")
    #[arg(long, short)]
    pub target: Option<String>,
}

#[derive(Debug, Args)]
pub struct PlanArgs {
    /// Manifest file
    pub manifest: PathBuf,

    /// Only plan resources matching this target
    #[arg(long, short)]
    pub target: Option<String>,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_apply() {
        let cli = Cli::parse_from([
            "rhsm-register",
            "-vv",
            "apply",
            "site.toml",
            "--dry-run",
            "--target",
            "subscription.example.com",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Apply(args) => {
                assert!(args.dry_run);
                assert!(!args.yes);
                assert_eq!(args.manifest, PathBuf::from("site.toml"));
                assert_eq!(args.target.as_deref(), Some("subscription.example.com"));
            }
            _ => panic!("expected apply"),
        }
    }

    #[test]
    fn test_config_flag_is_global() {
        let cli = Cli::parse_from(["rhsm-register", "status", "--config", "/tmp/c.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
    }
}
