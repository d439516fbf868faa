//! Bubbling Bath Delights CLI - migrations and store management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run PostgreSQL migrations
//! bb-cli migrate
//!
//! # Create a staff user in the admin pool
//! bb-cli user create --pool admin -e owner@bubblingbath.test -n "Owner" -r admin -p '...'
//!
//! # Seed users and products from YAML
//! bb-cli seed data/seed.example.yaml
//!
//! # Print a password hash
//! bb-cli hash-password '...'
//! ```
//!
//! The store is picked the same way the server picks it: `BBD_DATABASE_URL`
//! (or `DATABASE_URL`) selects `PostgreSQL`, otherwise `BBD_DATA_FILE`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "bb-cli")]
#[command(author, version, about = "Bubbling Bath Delights CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage staff users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Seed users and products from a YAML file
    Seed {
        /// Path to the seed file
        file: String,
    },
    /// Hash a password for a credential record
    HashPassword {
        /// Password to hash
        password: String,

        /// Produce a salted SHA-256 record instead of Argon2
        #[arg(long)]
        sha256: bool,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create or replace a staff user
    Create {
        /// Credential pool (`admin` or `employee`)
        #[arg(long)]
        pool: String,

        /// Email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Comma-separated roles (`admin`, `employee`)
        #[arg(short, long, default_value = "employee")]
        roles: String,

        /// Password (falls back to `BBD_NEW_USER_PASSWORD`)
        #[arg(short, long)]
        password: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::User { action } => match action {
            UserAction::Create {
                pool,
                email,
                name,
                roles,
                password,
            } => {
                commands::user::create(&pool, &email, &name, &roles, password).await?;
            }
        },
        Commands::Seed { file } => commands::seed::run(&file).await?,
        Commands::HashPassword { password, sha256 } => {
            let hash = commands::password::hash(&password, sha256)?;
            #[allow(clippy::print_stdout)]
            {
                println!("{hash}");
            }
        }
    }
    Ok(())
}
