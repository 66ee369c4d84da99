use clap::Subcommand;

use crate::types::ProfileType;

#[derive(Subcommand)]
pub enum SchoolCommands {
    /// Log in to a school and store its roster
    Add {
        /// 8-digit school id issued by the provider
        #[arg(long)]
        id: Option<String>,

        /// Username for the school's plan access
        #[arg(long)]
        username: Option<String>,

        /// Password for the school's plan access
        #[arg(long)]
        password: Option<String>,

        /// Skip interactive prompts (requires --id, --username and --password)
        #[arg(long)]
        non_interactive: bool,
    },

    /// List stored schools
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove a school with all its data and profiles
    Remove {
        /// School id to remove
        #[arg(long)]
        id: Option<i64>,

        /// Skip confirmation
        #[arg(long, short)]
        yes: bool,

        /// Skip interactive prompts (requires --id and --yes)
        #[arg(long)]
        non_interactive: bool,
    },
}

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// Create a profile for a class, teacher or room and make it active
    Add {
        /// School the profile belongs to (defaults to the only stored school)
        #[arg(long)]
        school: Option<i64>,

        /// student, teacher or room
        #[arg(long, value_parser = parse_profile_type)]
        kind: Option<ProfileType>,

        /// Class name, teacher acronym or room name
        #[arg(long)]
        name: Option<String>,

        /// Skip interactive prompts (requires --kind and --name)
        #[arg(long)]
        non_interactive: bool,
    },

    /// List profiles; the active one is marked with '*'
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Make a profile the active one
    Use {
        /// Profile id
        id: Option<i64>,
    },

    /// Remove a profile
    Remove {
        /// Profile id
        id: Option<i64>,

        /// Skip confirmation
        #[arg(long, short)]
        yes: bool,

        /// Skip interactive prompts (requires an id and --yes)
        #[arg(long)]
        non_interactive: bool,
    },
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Drop every table and recreate the schema. All data is lost.
    Rebuild {
        /// Confirm the rebuild
        #[arg(long)]
        yes: bool,
    },
}

fn parse_profile_type(s: &str) -> Result<ProfileType, String> {
    ProfileType::parse(s).ok_or_else(|| format!("unknown profile kind '{s}' (student, teacher, room)"))
}
