use std::{env, env::VarError};

use clap::Parser;

const ENV_HELP: &str = include_str!("./cli-help.txt");

/// Command-line flags. Every flag has an environment variable counterpart, and the environment variable wins when both
/// are set.
#[derive(Parser, Debug, Clone, Default)]
#[command(version, about = "Loyalty points backend", after_long_help = ENV_HELP)]
pub struct Arguments {
    /// Address and port to listen on, e.g. localhost:8080 [RUN_ADDRESS]
    #[arg(short = 'a', long = "address")]
    pub run_address: Option<String>,
    /// Database URL, e.g. sqlite://data/loyalty.db [DATABASE_URI]
    #[arg(short = 'd', long = "database")]
    pub database_uri: Option<String>,
    /// Base URL of the accrual service, e.g. http://localhost:8081 [ACCRUAL_SYSTEM_ADDRESS]
    #[arg(short = 'r', long = "accrual")]
    pub accrual_address: Option<String>,
    /// Print the current (non-secret) configuration environment and exit
    #[arg(long = "show-env")]
    pub show_env: bool,
}

pub fn handle_command_line_args() -> Arguments {
    let args = Arguments::parse();
    if args.show_env {
        display_envs();
        std::process::exit(0);
    }
    args
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 10] = [
        "RUST_LOG",
        "RUN_ADDRESS",
        "DATABASE_URI",
        "ACCRUAL_SYSTEM_ADDRESS",
        "LPS_TOKEN_EXPIRY_HOURS",
        "LPS_ACCRUAL_DEADLINE",
        "LPS_ACCRUAL_MAX_ATTEMPTS",
        "LPS_ACCRUAL_TIMEOUT",
        "LPS_BCRYPT_COST",
        "LPS_RUN_MIGRATIONS",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
