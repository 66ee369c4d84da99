use std::path::Path;

use inquire::validator::Validation;
use inquire::{Password, PasswordDisplayMode, Select, Text};

use super::pickers::{SchoolDisplay, confirm_action, reference_names};
use super::{init_store, plan_source};
use crate::store::Store;
use crate::types::{ProfileType, Response, SchoolIdCheckResult};
use crate::usecases::{check_school_id, create_profile, create_school, delete_school, login};

const DEFAULT_USERNAME: &str = "schueler";

pub async fn run_school_add(
    data_dir: &Path,
    id: Option<String>,
    username: Option<String>,
    password: Option<String>,
    non_interactive: bool,
) -> anyhow::Result<()> {
    let (config, store) = init_store(data_dir)?;

    let id = match id {
        Some(id) => id,
        None if non_interactive => anyhow::bail!("--id is required in non-interactive mode"),
        None => Text::new("School id:")
            .with_help_message("8 digits, printed on your plan's login page")
            .with_validator(|input: &str| {
                Ok(match check_school_id(input.trim()) {
                    SchoolIdCheckResult::Invalid => {
                        Validation::Invalid("School id must be exactly 8 digits".into())
                    }
                    _ => Validation::Valid,
                })
            })
            .prompt()?,
    };
    let id = id.trim();
    if check_school_id(id) == SchoolIdCheckResult::Invalid {
        anyhow::bail!("Invalid school id '{id}': expected 8 digits");
    }
    let school_id: i64 = id.parse()?;

    let username = match username {
        Some(u) => u,
        None if non_interactive => anyhow::bail!("--username is required in non-interactive mode"),
        None => Text::new("Username:").with_default(DEFAULT_USERNAME).prompt()?,
    };

    let password = match password {
        Some(p) => p,
        None if non_interactive => anyhow::bail!("--password is required in non-interactive mode"),
        None => Password::new("Password:")
            .with_display_mode(PasswordDisplayMode::Masked)
            .without_confirmation()
            .prompt()?,
    };

    let source = plan_source(&config)?;
    let result = login(&source, school_id, &username, &password).await;
    let Some(base) = result.data else {
        match result.response {
            Response::WrongCredentials => anyhow::bail!("Wrong username or password for school {school_id}"),
            Response::NotFound => anyhow::bail!("School {school_id} is not known to {}", config.base_url),
            Response::NoInternet => anyhow::bail!("Could not reach {}", config.base_url),
            other => anyhow::bail!("Login failed: {other}"),
        }
    };

    let school = create_school(&store, school_id, &username, &password, &base)?;

    println!();
    println!("Added school '{}' ({})", school.name, school.id);
    println!(
        "  {} classes, {} teachers, {} rooms",
        base.class_names.len(),
        base.teacher_shorts.len(),
        base.room_names.len()
    );
    println!();

    if !non_interactive {
        create_first_profile(&store, school.id)?;
    }

    Ok(())
}

fn create_first_profile(store: &dyn Store, school_id: i64) -> anyhow::Result<()> {
    let create = inquire::Confirm::new("Create a profile for this school now?")
        .with_default(true)
        .prompt()?;
    if !create {
        return Ok(());
    }

    let kind = Select::new(
        "Profile type:",
        vec![ProfileType::Student, ProfileType::Teacher, ProfileType::Room],
    )
    .prompt()?;
    let names = reference_names(store, school_id, kind)?;
    if names.is_empty() {
        println!("No {kind} entries in this school's roster.");
        return Ok(());
    }
    let name = Select::new("Name:", names).prompt()?;

    let profile = create_profile(store, school_id, kind, &name)?;
    println!("Created {} profile '{}' (id {}), now active.", profile.kind, profile.name, profile.id);
    Ok(())
}

pub fn run_school_list(data_dir: &Path, json: bool) -> anyhow::Result<()> {
    let (_config, store) = init_store(data_dir)?;
    let schools = store.list_schools()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&schools)?);
        return Ok(());
    }

    if schools.is_empty() {
        println!("No schools stored.");
        return Ok(());
    }

    println!();
    for school in &schools {
        println!(
            "  {}  {}  user '{}'  {} days/week",
            school.id, school.name, school.username, school.days_per_week
        );
    }
    println!();
    Ok(())
}

pub fn run_school_remove(
    data_dir: &Path,
    id: Option<i64>,
    yes: bool,
    non_interactive: bool,
) -> anyhow::Result<()> {
    let (_config, store) = init_store(data_dir)?;

    let school = match id {
        Some(id) => store
            .get_school(id)?
            .ok_or_else(|| anyhow::anyhow!("School {id} not found"))?,
        None if non_interactive => anyhow::bail!("--id is required in non-interactive mode"),
        None => {
            let schools = store.list_schools()?;
            if schools.is_empty() {
                println!("No schools stored.");
                return Ok(());
            }
            let options: Vec<SchoolDisplay> = schools.into_iter().map(SchoolDisplay).collect();
            Select::new("School to remove:", options).prompt()?.0
        }
    };

    let message = format!(
        "Remove school '{}' with all its lessons and profiles?",
        school.name
    );
    if !confirm_action(&message, yes, non_interactive)? {
        println!("Cancelled.");
        return Ok(());
    }

    delete_school(&store, school.id)?;
    println!("Removed school '{}' ({})", school.name, school.id);
    Ok(())
}
