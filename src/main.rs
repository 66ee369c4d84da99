use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vplan::cli::{self, DbCommands, ProfileCommands, SchoolCommands};

#[derive(Parser)]
#[command(name = "vplan")]
#[command(about = "Substitution plan sync for stundenplan24 schools", long_about = None)]
struct Cli {
    /// Data directory for config and database (defaults to the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory, config and database
    Init {
        /// Provider root URL
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Manage schools
    School {
        #[command(subcommand)]
        command: SchoolCommands,
    },

    /// Manage profiles
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },

    /// Fetch and store the plan of every school
    Sync {
        /// Day to sync, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show stored lessons for a profile
    Show {
        /// Day to show, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Profile id (defaults to the active profile)
        #[arg(long)]
        profile: Option<i64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Sync periodically and print lesson changes
    Watch {
        /// Profile id (defaults to the active profile)
        #[arg(long)]
        profile: Option<i64>,
    },

    /// Show configuration, sync state and settings
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Dismiss the invalid online session warning
        #[arg(long)]
        ignore_invalid_session: bool,
    },

    /// Delete all stored lessons
    Reset {
        /// Skip confirmation
        #[arg(long, short)]
        yes: bool,

        /// Skip interactive prompts (requires --yes)
        #[arg(long)]
        non_interactive: bool,
    },

    /// Show recent log records
    Logs {
        /// Number of records
        #[arg(long, short = 'n', default_value = "20")]
        limit: i64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("vplan=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let data_dir = cli::data_dir_or_default(cli.data_dir);

    match cli.command {
        Commands::Init { base_url } => cli::run_init(&data_dir, base_url)?,
        Commands::School { command } => match command {
            SchoolCommands::Add {
                id,
                username,
                password,
                non_interactive,
            } => cli::run_school_add(&data_dir, id, username, password, non_interactive).await?,
            SchoolCommands::List { json } => cli::run_school_list(&data_dir, json)?,
            SchoolCommands::Remove {
                id,
                yes,
                non_interactive,
            } => cli::run_school_remove(&data_dir, id, yes, non_interactive)?,
        },
        Commands::Profile { command } => match command {
            ProfileCommands::Add {
                school,
                kind,
                name,
                non_interactive,
            } => cli::run_profile_add(&data_dir, school, kind, name, non_interactive)?,
            ProfileCommands::List { json } => cli::run_profile_list(&data_dir, json)?,
            ProfileCommands::Use { id } => cli::run_profile_use(&data_dir, id)?,
            ProfileCommands::Remove {
                id,
                yes,
                non_interactive,
            } => cli::run_profile_remove(&data_dir, id, yes, non_interactive)?,
        },
        Commands::Sync { date, json } => cli::run_sync(&data_dir, date, json).await?,
        Commands::Show {
            date,
            profile,
            json,
        } => cli::run_show(&data_dir, date, profile, json)?,
        Commands::Watch { profile } => cli::run_watch(&data_dir, profile).await?,
        Commands::Status {
            json,
            ignore_invalid_session,
        } => cli::run_status(&data_dir, json, ignore_invalid_session)?,
        Commands::Reset {
            yes,
            non_interactive,
        } => cli::run_reset(&data_dir, yes, non_interactive)?,
        Commands::Logs { limit, json } => cli::run_logs(&data_dir, limit, json)?,
        Commands::Db { command } => match command {
            DbCommands::Rebuild { yes } => cli::run_db_rebuild(&data_dir, yes)?,
        },
    }

    Ok(())
}
