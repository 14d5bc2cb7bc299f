// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! `secmgr` - administer the security manager's users and settings.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use security_manager::{
    FileConfigurationProvider, Outcome, Role, SecurityManager, StaticApplicationContext, UserUpdate,
};

mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BRIGHT_CYAN: &str = "\x1b[96m";
}

use colors::*;

/// Exit codes following sysexits.h conventions
mod exit_codes {
    /// Success - operation completed successfully
    pub const SUCCESS: i32 = 0;
    /// General error - unspecified error
    pub const ERROR: i32 = 1;
    /// Data error - rejected user or settings input
    pub const DATA_ERR: i32 = 65;
    /// Configuration error - configuration could not be loaded or seeded
    pub const CONFIG: i32 = 78;
}

use exit_codes::*;

/// secmgr - manage users, sessions and session policy.
#[derive(Parser)]
#[command(name = "secmgr")]
#[command(version)]
#[command(about = "Manage security manager users and session settings.")]
#[command(long_about = "secmgr - security manager administration\n\n\
    List users:       secmgr users list\n\
    Add a user:       secmgr users add operator --display-name Operator --email op@plant.local --role readwriter\n\
    Check a login:    secmgr login operator\n\
    Show settings:    secmgr settings show\n\
    Describe config:  secmgr describe")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration document (defaults to ~/.secmgr/configuration.json)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Verbose mode: debug logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, update, remove and list users
    Users {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Start a session for a user and print its token
    ///
    /// Examples:
    ///   secmgr login admin
    ///   secmgr login operator --password secret
    Login {
        name: String,
        /// Password (prompted when omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// Show or change session settings
    Settings {
        #[command(subcommand)]
        command: Option<SettingsCommands>,
    },

    /// Print the configuration form, schema and defaults
    Describe,
}

#[derive(Subcommand)]
enum UserCommands {
    /// List users
    List,

    /// Add a user
    ///
    /// Examples:
    ///   secmgr users add operator --display-name Operator --email op@plant.local
    Add {
        name: String,
        #[arg(long)]
        display_name: String,
        #[arg(long)]
        email: String,
        /// Password (prompted when omitted)
        #[arg(long)]
        password: Option<String>,
        /// reader, readwriter or administrator
        #[arg(long, default_value = "reader")]
        role: Role,
    },

    /// Update fields of a user
    Update {
        name: String,
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        role: Option<Role>,
    },

    /// Remove a user
    Remove { name: String },
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Show the current settings
    Show,

    /// Change settings
    Set {
        /// Session length in seconds
        #[arg(long)]
        session_length: Option<u64>,
        /// Purge interval in milliseconds
        #[arg(long)]
        purge_interval: Option<u64>,
        /// Allow sessions to be extended
        #[arg(long)]
        sliding: Option<bool>,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .try_init();
}

fn prompt_password(message: &str, confirm: bool) -> Result<String> {
    let prompt = inquire::Password::new(message)
        .with_display_mode(inquire::PasswordDisplayMode::Masked);
    let prompt = if confirm { prompt } else { prompt.without_confirmation() };
    prompt.prompt().context("Password entry cancelled")
}

/// Print the outcome's messages and turn a failure into `code`.
fn report<T>(outcome: &Outcome<T>, success: &str, code: i32) -> i32 {
    match outcome {
        Outcome::Success(_) => {
            println!("{GREEN}[✓]{RESET} {}", success);
            SUCCESS
        }
        Outcome::Warning(_, messages) => {
            for message in messages {
                println!("{YELLOW}[!]{RESET} {}", message);
            }
            SUCCESS
        }
        Outcome::Failure(messages) => {
            for message in messages {
                eprintln!("{RED}[✗]{RESET} {}", message);
            }
            code
        }
    }
}

fn run_users(manager: &SecurityManager, command: UserCommands) -> Result<i32> {
    match command {
        UserCommands::List => {
            let users = manager.users().unwrap_or_default();
            println!();
            println!("{BRIGHT_CYAN}{BOLD}=== Users ({}) ==={RESET}", users.len());
            println!();
            for user in users {
                println!(
                    "  {BOLD}{:<20}{RESET} {:<14} {:<24} {DIM}{}{RESET}",
                    user.name, user.role, user.display_name, user.email
                );
            }
            println!();
            Ok(SUCCESS)
        }
        UserCommands::Add {
            name,
            display_name,
            email,
            password,
            role,
        } => {
            let password = match password {
                Some(password) => password,
                None => prompt_password("Password:", true)?,
            };
            let outcome = manager.create_user(&name, &display_name, &email, &password, role);
            Ok(report(&outcome, &format!("Created user '{}'", name), DATA_ERR))
        }
        UserCommands::Update {
            name,
            display_name,
            email,
            password,
            role,
        } => {
            let update = UserUpdate {
                display_name,
                email,
                password,
                role,
            };
            let outcome = manager.update_user(&name, update);
            Ok(report(&outcome, &format!("Updated user '{}'", name), DATA_ERR))
        }
        UserCommands::Remove { name } => {
            let outcome = manager.delete_user(&name);
            Ok(report(&outcome, &format!("Removed user '{}'", name), DATA_ERR))
        }
    }
}

fn run_login(manager: &SecurityManager, name: &str, password: Option<String>) -> Result<i32> {
    let password = match password {
        Some(password) => password,
        None => prompt_password(&format!("Password for {}:", name), false)?,
    };

    let outcome = manager.start_session(name, &password);
    let code = report(&outcome, &format!("Logged in as '{}'", name), ERROR);
    if let Some(session) = outcome.value() {
        println!("  Token:   {}", session.token);
        println!("  Role:    {}", session.identity.role);
        println!("  Expires: {}", session.expires.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    Ok(code)
}

fn run_settings(manager: &SecurityManager, command: Option<SettingsCommands>) -> Result<i32> {
    let Some(mut config) = manager.configuration() else {
        eprintln!("{RED}[✗]{RESET} Configuration has not been loaded");
        return Ok(CONFIG);
    };

    match command {
        None | Some(SettingsCommands::Show) => {
            println!();
            println!("{BRIGHT_CYAN}{BOLD}=== Session Settings ==={RESET}");
            println!();
            println!("  Session length:  {} s", config.session_length);
            println!("  Purge interval:  {} ms", config.session_purge_interval);
            println!("  Sliding:         {}", config.sliding_sessions);
            println!("  Users:           {}", config.users.len());
            println!();
            Ok(SUCCESS)
        }
        Some(SettingsCommands::Set {
            session_length,
            purge_interval,
            sliding,
        }) => {
            if let Some(session_length) = session_length {
                config.session_length = session_length;
            }
            if let Some(purge_interval) = purge_interval {
                config.session_purge_interval = purge_interval;
            }
            if let Some(sliding) = sliding {
                config.sliding_sessions = sliding;
            }
            let outcome = manager.configure(config);
            Ok(report(&outcome, "Settings saved", DATA_ERR))
        }
    }
}

fn run_describe() -> Result<i32> {
    let definition = SecurityManager::configuration_definition();
    let defaults = serde_json::to_string_pretty(&definition.default_configuration)
        .context("Failed to serialize default configuration")?;

    println!("{BRIGHT_CYAN}{BOLD}=== {} ==={RESET}", definition.model);
    println!();
    println!("{BOLD}Form{RESET}");
    println!("{}", definition.form);
    println!();
    println!("{BOLD}Schema{RESET}");
    println!("{}", definition.schema);
    println!();
    println!("{BOLD}Defaults{RESET}");
    println!("{}", defaults);
    Ok(SUCCESS)
}

fn run(cli: Cli) -> Result<i32> {
    if let Commands::Describe = cli.command {
        return run_describe();
    }

    let provider = match cli.config {
        Some(path) => FileConfigurationProvider::new(path),
        None => FileConfigurationProvider::at_default_location(),
    };
    tracing::debug!(path = %provider.path().display(), "Using configuration document");

    let manager = SecurityManager::new(Arc::new(StaticApplicationContext::default()), Arc::new(provider));
    match manager.start() {
        Ok(Outcome::Failure(messages)) => {
            for message in messages {
                eprintln!("{RED}[✗]{RESET} {}", message);
            }
            return Ok(ERROR);
        }
        Ok(_) => {}
        Err(e) => {
            eprintln!("{}", e);
            return Ok(CONFIG);
        }
    }

    let code = match cli.command {
        Commands::Users { command } => run_users(&manager, command)?,
        Commands::Login { name, password } => run_login(&manager, &name, password)?,
        Commands::Settings { command } => run_settings(&manager, command)?,
        Commands::Describe => run_describe()?,
    };

    manager.stop();
    Ok(code)
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{RED}[✗]{RESET} {:#}", e);
            ERROR
        }
    };
    std::process::exit(code);
}
