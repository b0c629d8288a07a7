//! ksadmin CLI
//!
//! Command-line interface for running Keystone admin commands with the
//! admin token from `keystone.conf`.
//!
//! # Usage
//!
//! ```bash
//! # Show the admin endpoint derived from keystone.conf
//! ksadmin endpoint
//!
//! # Verify that the admin token and endpoint can be resolved
//! ksadmin check --format json
//!
//! # Run an admin command, retrying while keystone starts up
//! ksadmin run -- user-list
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ksadmin_core::{AdminContext, AdminEndpoint, AdminInvoker, IniFile};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

mod config;

#[derive(Parser)]
#[command(name = "ksadmin")]
#[command(about = "Run Keystone admin commands using the local admin token")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to keystone.conf (overrides the settings file)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the ksadmin settings file
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the admin endpoint
    Endpoint,

    /// Check that the admin token and endpoint resolve
    Check {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Run an admin command with retries
    Run {
        /// Maximum attempts (0 for no limit)
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Seconds between attempts
        #[arg(long)]
        backoff_secs: Option<u64>,

        /// Arguments passed to the admin CLI after `--endpoint <url>`
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        args: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Serialize)]
struct CheckReport {
    config_path: PathBuf,
    endpoint: Option<AdminEndpoint>,
    token_present: bool,
    errors: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = config::load_settings(cli.settings.as_deref())?;
    init_logging(cli.verbose, &settings.log_level);

    if let Some(path) = &settings.settings_path {
        debug!("Loaded settings from {:?}", path);
    }
    if let Some(path) = cli.config {
        settings.keystone_config = path;
    }

    let context = Arc::new(AdminContext::new(IniFile::new(&settings.keystone_config)));

    match cli.command {
        Commands::Endpoint => print_endpoint(&context),
        Commands::Check { format } => check(&context, format),
        Commands::Run {
            max_attempts,
            backoff_secs,
            args,
        } => {
            if let Some(max_attempts) = max_attempts {
                settings.retry.max_attempts = max_attempts;
            }
            if let Some(backoff_secs) = backoff_secs {
                settings.retry.backoff_secs = backoff_secs;
            }
            run(context, &settings, &args)
        }
    }
}

fn init_logging(verbose: bool, log_level: &str) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_endpoint(context: &AdminContext) -> Result<()> {
    let endpoint = context.admin_endpoint()?;
    println!("{}", endpoint);
    Ok(())
}

fn check(context: &AdminContext, format: Format) -> Result<()> {
    let mut errors = Vec::new();

    let endpoint = match context.admin_endpoint() {
        Ok(endpoint) => Some(endpoint),
        Err(e) => {
            errors.push(e.to_string());
            None
        }
    };
    let token_present = match context.admin_token() {
        Ok(_) => true,
        Err(e) => {
            errors.push(e.to_string());
            false
        }
    };

    let report = CheckReport {
        config_path: context.config_path().to_path_buf(),
        endpoint,
        token_present,
        errors,
    };

    match format {
        Format::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Format::Text => {
            println!("Config: {}", report.config_path.display());
            println!(
                "Endpoint: {}",
                report
                    .endpoint
                    .as_ref()
                    .map(AdminEndpoint::as_str)
                    .unwrap_or("<unresolved>")
            );
            println!(
                "Admin token: {}",
                if report.token_present { "present" } else { "missing" }
            );
            for error in &report.errors {
                eprintln!("error: {}", error);
            }
        }
    }

    if report.errors.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("admin credentials are not usable")
    }
}

fn run(context: Arc<AdminContext>, settings: &config::Settings, args: &[String]) -> Result<()> {
    let policy = settings.retry.to_policy();
    info!(
        "Running admin command (backoff {:?}, max attempts {:?})",
        policy.backoff, policy.max_attempts
    );

    let invoker = AdminInvoker::new(context)
        .with_program(&settings.program)
        .with_token_env(&settings.token_env)
        .with_policy(policy);

    let output = invoker
        .run_admin_command(args)
        .with_context(|| format!("Failed to run `{} {}`", settings.program, args.join(" ")))?;
    print!("{}", output);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_accepts_hyphenated_args() {
        let cli = Cli::try_parse_from([
            "ksadmin", "--config", "/tmp/k.conf", "run", "--max-attempts", "3", "--",
            "user-create", "--name", "bob",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/tmp/k.conf")));
        match cli.command {
            Commands::Run {
                max_attempts, args, ..
            } => {
                assert_eq!(max_attempts, Some(3));
                assert_eq!(args, vec!["user-create", "--name", "bob"]);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_run_requires_args() {
        assert!(Cli::try_parse_from(["ksadmin", "run"]).is_err());
    }

    #[test]
    fn test_check_json_shape() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("keystone.conf");
        std::fs::write(&path, "[DEFAULT]\nadmin_token = s3cret\nbind_host = 0.0.0.0\n").unwrap();
        let context = AdminContext::new(IniFile::new(&path));

        let report = CheckReport {
            config_path: path.clone(),
            endpoint: Some(context.admin_endpoint().unwrap()),
            token_present: context.admin_token().is_ok(),
            errors: vec![],
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["endpoint"], "http://127.0.0.1:35357/v2.0/");
        assert_eq!(value["token_present"], true);
        assert!(value.get("token").is_none());
        assert!(!value.to_string().contains("s3cret"));
    }

    #[test]
    fn test_check_json_unresolved_endpoint_is_null() {
        let report = CheckReport {
            config_path: PathBuf::from("/etc/keystone/keystone.conf"),
            endpoint: None,
            token_present: false,
            errors: vec!["missing".to_string()],
        };
        let value = serde_json::to_value(&report).unwrap();
        assert!(value["endpoint"].is_null());
        assert_eq!(value["errors"][0], "missing");
    }
}
