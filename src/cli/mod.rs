//! Command-line interface for the admin backend.
//!
//! Besides serving HTTP, the binary is the provisioning tool for admin
//! accounts: there is no sign-up or user management page.

mod commands;

use clap::{Parser, Subcommand};

use crate::domain::Role;

/// Primaria - municipal site administration backend
#[derive(Parser)]
#[command(name = "primaria")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the admin HTTP server (default)
    Serve,

    /// Create an admin account
    CreateUser {
        username: String,
        /// Display name
        #[arg(long)]
        full_name: String,
        /// admin, editor or viewer
        #[arg(long, default_value = "editor", value_parser = parse_role)]
        role: Role,
        /// Initial password; read from PRIMARIA_PASSWORD when omitted
        #[arg(long, env = "PRIMARIA_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Enable or disable an account
    SetActive {
        username: String,
        #[arg(action = clap::ArgAction::Set)]
        active: bool,
    },

    /// Clear the failed-attempt counter and any lockout
    Unlock { username: String },

    /// Delete expired sessions from the session store
    PruneSessions,
}

fn parse_role(value: &str) -> Result<Role, String> {
    value.parse().map_err(|e| format!("{e}"))
}

pub use commands::*;
