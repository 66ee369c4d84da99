use std::path::Path;

use inquire::Select;
use serde::Serialize;

use super::init_store;
use super::pickers::{ProfileDisplay, confirm_action, reference_names, select_profile, select_school};
use crate::error::Error;
use crate::store::{Settings, Store};
use crate::types::{Profile, ProfileType};
use crate::usecases::{create_profile, delete_profile, set_active_profile};

pub fn run_profile_add(
    data_dir: &Path,
    school: Option<i64>,
    kind: Option<ProfileType>,
    name: Option<String>,
    non_interactive: bool,
) -> anyhow::Result<()> {
    let (_config, store) = init_store(data_dir)?;
    let school = select_school(&store, school, non_interactive)?;

    let kind = match kind {
        Some(kind) => kind,
        None if non_interactive => anyhow::bail!("--kind is required in non-interactive mode"),
        None => Select::new(
            "Profile type:",
            vec![ProfileType::Student, ProfileType::Teacher, ProfileType::Room],
        )
        .prompt()?,
    };

    let name = match name {
        Some(name) => name,
        None if non_interactive => anyhow::bail!("--name is required in non-interactive mode"),
        None => {
            let names = reference_names(&store, school.id, kind)?;
            if names.is_empty() {
                anyhow::bail!("No {kind} entries stored for '{}'", school.name);
            }
            Select::new("Name:", names).prompt()?
        }
    };

    let profile = create_profile(&store, school.id, kind, &name).map_err(|e| match e {
        Error::NotFound => {
            anyhow::anyhow!("No {kind} named '{name}' in '{}'", school.name)
        }
        other => other.into(),
    })?;

    println!(
        "Profile '{}' ({}, id {}) is now active.",
        profile.name, profile.kind, profile.id
    );
    Ok(())
}

#[derive(Serialize)]
struct ProfileOutput {
    #[serde(flatten)]
    profile: Profile,
    school_id: Option<i64>,
    active: bool,
}

pub fn run_profile_list(data_dir: &Path, json: bool) -> anyhow::Result<()> {
    let (_config, store) = init_store(data_dir)?;
    let active = Settings::load(&store)?.active_profile;
    let profiles = store.list_profiles()?;

    if json {
        let output = profiles
            .into_iter()
            .map(|profile| {
                let school_id = store.profile_school(&profile)?.map(|s| s.id);
                Ok(ProfileOutput {
                    active: Some(profile.id) == active,
                    school_id,
                    profile,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if profiles.is_empty() {
        println!("No profiles stored.");
        return Ok(());
    }

    println!();
    for profile in profiles {
        let display = ProfileDisplay {
            active: Some(profile.id) == active,
            profile,
        };
        println!("{display}");
    }
    println!();
    Ok(())
}

pub fn run_profile_use(data_dir: &Path, id: Option<i64>) -> anyhow::Result<()> {
    let (_config, store) = init_store(data_dir)?;

    let profile_id = match id {
        Some(id) => id,
        None => {
            let active = Settings::load(&store)?.active_profile;
            select_profile(&store, active, "Activate profile:")?.id
        }
    };

    let profile = set_active_profile(&store, profile_id).map_err(|e| match e {
        Error::NotFound => anyhow::anyhow!("Profile {profile_id} not found"),
        other => other.into(),
    })?;
    println!("Profile '{}' is now active.", profile.name);
    Ok(())
}

pub fn run_profile_remove(
    data_dir: &Path,
    id: Option<i64>,
    yes: bool,
    non_interactive: bool,
) -> anyhow::Result<()> {
    let (_config, store) = init_store(data_dir)?;

    let profile = match id {
        Some(id) => store
            .get_profile(id)?
            .ok_or_else(|| anyhow::anyhow!("Profile {id} not found"))?,
        None if non_interactive => anyhow::bail!("A profile id is required in non-interactive mode"),
        None => {
            let active = Settings::load(&store)?.active_profile;
            select_profile(&store, active, "Profile to remove:")?
        }
    };

    if !confirm_action(&format!("Remove profile '{}'?", profile.name), yes, non_interactive)? {
        println!("Cancelled.");
        return Ok(());
    }

    delete_profile(&store, profile.id)?;
    println!("Removed profile '{}'", profile.name);
    Ok(())
}
