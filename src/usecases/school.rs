use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::fetch::PlanSource;
use crate::plan::{BaseData, parse_base_data};
use crate::store::{Settings, Store};
use crate::types::{DataResponse, Response, School, SchoolIdCheckResult};

const SCHOOL_ID_LEN: usize = 8;

/// Syntax check only; whether the provider knows the id is decided by [`login`].
#[must_use]
pub fn check_school_id(input: &str) -> SchoolIdCheckResult {
    if input.len() == SCHOOL_ID_LEN && input.bytes().all(|b| b.is_ascii_digit()) {
        SchoolIdCheckResult::SyntacticallyCorrect
    } else {
        SchoolIdCheckResult::Invalid
    }
}

/// Verifies credentials by downloading the school's base data.
pub async fn login(
    source: &dyn PlanSource,
    school_id: i64,
    username: &str,
    password: &str,
) -> DataResponse<BaseData> {
    let fetched = source.fetch_base_data(school_id, username, password).await;
    let Some(raw) = fetched.data else {
        return DataResponse::failure(fetched.response);
    };

    match parse_base_data(&raw) {
        Ok(base) => DataResponse::success(base),
        Err(e) => {
            warn!(school_id, "unreadable base data: {e}");
            DataResponse::failure(Response::Other)
        }
    }
}

/// Stores a school after a successful [`login`] and materializes its roster.
/// Logging in again with an already stored school updates its credentials.
pub fn create_school(
    store: &dyn Store,
    school_id: i64,
    username: &str,
    password: &str,
    base: &BaseData,
) -> Result<School> {
    let school = School {
        id: school_id,
        name: base.school_name.clone(),
        username: username.to_string(),
        password: password.to_string(),
        days_per_week: base.days_per_week,
    };

    match store.create_school(&school) {
        Ok(()) => info!(school_id, name = %school.name, "created school"),
        Err(Error::AlreadyExists) => {
            store.update_school_credentials(school_id, username, password)?;
            info!(school_id, "updated credentials of existing school");
        }
        Err(e) => return Err(e),
    }

    process_base_data(store, school_id, base)?;
    store.get_school(school_id)?.ok_or(Error::NotFound)
}

/// Creates every class, teacher and room named in the base data.
pub fn process_base_data(store: &dyn Store, school_id: i64, base: &BaseData) -> Result<()> {
    for name in &base.class_names {
        store.find_or_create_class(school_id, name)?;
    }
    for acronym in &base.teacher_shorts {
        store.find_or_create_teacher(school_id, acronym)?;
    }
    for name in &base.room_names {
        store.find_or_create_room(school_id, name)?;
    }
    store.log(
        "Onboarding",
        &format!(
            "school {school_id}: {} classes, {} teachers, {} rooms",
            base.class_names.len(),
            base.teacher_shorts.len(),
            base.room_names.len()
        ),
    )
}

/// Deletes a school with its profiles, clearing the active profile if it
/// belonged to the school.
pub fn delete_school(store: &dyn Store, school_id: i64) -> Result<bool> {
    if !store.delete_school(school_id)? {
        return Ok(false);
    }

    if let Some(id) = Settings::load(store)?.active_profile {
        if store.get_profile(id)?.is_none() {
            Settings::set_active_profile(store, None)?;
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    use super::*;
    use crate::store::SqliteStore;
    use crate::types::ProfileType;
    use crate::usecases::create_profile;

    struct BaseDataSource(DataResponse<String>);

    #[async_trait]
    impl PlanSource for BaseDataSource {
        async fn fetch_plan(&self, _: &School, _: NaiveDate) -> DataResponse<String> {
            DataResponse::failure(Response::NoDataAvailable)
        }

        async fn fetch_base_data(&self, _: i64, _: &str, _: &str) -> DataResponse<String> {
            self.0.clone()
        }
    }

    const BASE: &str = r#"<splan>
  <Kopf><schulname>Testschule</schulname></Kopf>
  <Basisdaten><BaTageProWoche>5</BaTageProWoche></Basisdaten>
  <Klassen>
    <Kl><Kurz>5a</Kurz><Unterricht><Ue><UeNr UeLe="MUE">1</UeNr></Ue></Unterricht></Kl>
    <Kl><Kurz>5b</Kurz><Unterricht><Ue><UeNr UeLe="SCH">2</UeNr></Ue></Unterricht></Kl>
  </Klassen>
  <Raeume><Ra>101</Ra><Ra>102</Ra></Raeume>
</splan>"#;

    fn setup() -> (TempDir, SqliteStore) {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        (temp, store)
    }

    #[test]
    fn test_check_school_id() {
        assert_eq!(check_school_id("10000000"), SchoolIdCheckResult::SyntacticallyCorrect);
        assert_eq!(check_school_id("1000000"), SchoolIdCheckResult::Invalid);
        assert_eq!(check_school_id("100000000"), SchoolIdCheckResult::Invalid);
        assert_eq!(check_school_id("1000000a"), SchoolIdCheckResult::Invalid);
        assert_eq!(check_school_id(""), SchoolIdCheckResult::Invalid);
    }

    #[tokio::test]
    async fn test_login_parses_base_data() {
        let source = BaseDataSource(DataResponse::success(BASE.to_string()));
        let result = login(&source, 10000000, "schueler", "secret").await;
        assert_eq!(result.response, Response::Success);
        let base = result.data.unwrap();
        assert_eq!(base.school_name, "Testschule");
        assert_eq!(base.class_names, vec!["5a".to_string(), "5b".to_string()]);
    }

    #[tokio::test]
    async fn test_login_passes_failures_through() {
        let source = BaseDataSource(DataResponse::failure(Response::WrongCredentials));
        let result = login(&source, 10000000, "schueler", "wrong").await;
        assert_eq!(result.response, Response::WrongCredentials);
        assert!(result.data.is_none());

        let source = BaseDataSource(DataResponse::success("<splan><Klassen>".to_string()));
        let result = login(&source, 10000000, "schueler", "secret").await;
        assert_eq!(result.response, Response::Other);
    }

    #[test]
    fn test_create_school_materializes_roster() {
        let (_temp, store) = setup();
        let base = parse_base_data(BASE).unwrap();

        let school = create_school(&store, 10000000, "schueler", "secret", &base).unwrap();
        assert_eq!(school.name, "Testschule");
        assert_eq!(store.list_classes(school.id).unwrap().len(), 2);
        assert_eq!(store.list_teachers(school.id).unwrap().len(), 2);
        assert_eq!(store.list_rooms(school.id).unwrap().len(), 2);

        let again = create_school(&store, 10000000, "schueler", "changed", &base).unwrap();
        assert_eq!(again.password, "changed");
        assert_eq!(store.list_classes(school.id).unwrap().len(), 2);
    }

    #[test]
    fn test_delete_school_clears_active_profile() {
        let (_temp, store) = setup();
        let base = parse_base_data(BASE).unwrap();
        create_school(&store, 10000000, "schueler", "secret", &base).unwrap();
        create_profile(&store, 10000000, ProfileType::Student, "5a").unwrap();
        assert!(Settings::load(&store).unwrap().active_profile.is_some());

        assert!(delete_school(&store, 10000000).unwrap());
        assert!(store.list_profiles().unwrap().is_empty());
        assert_eq!(Settings::load(&store).unwrap().active_profile, None);
        assert!(!delete_school(&store, 10000000).unwrap());
    }
}
