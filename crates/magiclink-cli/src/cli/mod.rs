//! CLI entry and dispatch.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use magiclink_core::providers::{OAuthProvider, SignUpRequest};
use magiclink_core::{config, logging};

mod callback;
mod commands;
mod ui;

#[derive(Parser)]
#[command(name = "magiclink")]
#[command(version)]
#[command(about = "Sign in and manage your subscription from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Show who is signed in
    Status,

    /// Sign in
    Login {
        #[command(subcommand)]
        method: LoginMethod,
    },

    /// Create an account
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long, env = "MAGICLINK_PASSWORD", hide_env_values = true)]
        password: String,
        /// Full name stored with the account
        #[arg(long)]
        name: String,
        /// Date of birth
        #[arg(long, value_name = "YYYY-MM-DD")]
        dob: Option<NaiveDate>,
    },

    /// Sign out and remove the stored session
    Logout,

    /// List subscription plans
    Plans,

    /// Start a checkout session for a plan
    Subscribe {
        /// Plan ID (see `magiclink plans`)
        #[arg(long)]
        plan: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum LoginMethod {
    /// Email and password
    Email {
        #[arg(long)]
        email: String,
        #[arg(long, env = "MAGICLINK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// One-time code sent by SMS
    Phone {
        /// Phone number in E.164 format
        #[arg(long)]
        phone: String,
    },
    /// Browser sign-in through an OAuth provider
    Oauth {
        /// google, github or figma
        #[arg(long)]
        provider: OAuthProvider,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // Command output stays usable without a log file.
    let _log_guard = match logging::init(&config::paths::logs_dir()) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("warning: {err:#}");
            None
        }
    };

    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
    rt.block_on(async move { dispatch(cli).await })
}

fn load_config() -> Result<config::Config> {
    config::Config::load().context("load config")
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Status => commands::auth::status(&load_config()?).await,

        Commands::Login { method } => {
            let config = load_config()?;
            match method {
                LoginMethod::Email { email, password } => {
                    commands::auth::login_email(&config, &email, &password).await
                }
                LoginMethod::Phone { phone } => commands::auth::login_phone(&config, &phone).await,
                LoginMethod::Oauth { provider } => {
                    commands::auth::login_oauth(&config, provider).await
                }
            }
        }

        Commands::Signup {
            email,
            password,
            name,
            dob,
        } => {
            let request = SignUpRequest {
                email,
                password,
                name,
                dob,
            };
            commands::auth::signup(&load_config()?, &request).await
        }

        Commands::Logout => commands::auth::logout(&load_config()?).await,

        Commands::Plans => {
            commands::subscribe::plans();
            Ok(())
        }

        Commands::Subscribe { plan } => {
            commands::subscribe::subscribe(&load_config()?, &plan).await
        }

        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
        },
    }
}
