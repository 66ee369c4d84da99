use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};

use super::live::{self, ChangeSet, LessonQuery, LessonSubscription, Subscriber};
use super::schema::{DROP_ALL, MIGRATIONS, latest_version};
use super::{Store, SyncOutcome};
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
            subscribers: Mutex::new(Vec::new()),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn subscribers(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a guard to the underlying database connection.
    /// This allows consuming applications to execute custom SQL.
    pub fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn()
    }

    /// Drops every table and recreates the schema from scratch. All stored
    /// data is lost; callers must opt in explicitly.
    pub fn rebuild_destructive(&self) -> Result<()> {
        tracing::warn!("destructive rebuild requested, dropping all tables");
        {
            let mut conn = self.conn();
            let tx = conn.transaction()?;
            tx.execute_batch(DROP_ALL)?;
            tx.pragma_update(None, "user_version", 0)?;
            tx.commit()?;
        }
        self.initialize()?;

        let conn = self.conn();
        self.publish(&conn, &ChangeSet::all());
        tracing::warn!(version = latest_version(), "database rebuilt");
        Ok(())
    }

    /// Pushes fresh snapshots to the live queries matched by `changes`.
    /// Must be called with the connection lock held so the snapshot cannot
    /// interleave with another write.
    fn publish(&self, conn: &Connection, changes: &ChangeSet) {
        if changes.is_empty() {
            return;
        }
        let mut subscribers = self.subscribers();
        subscribers.retain(|s| !s.sender.is_closed());

        for subscriber in subscribers.iter() {
            if !changes.matches(&subscriber.query) {
                continue;
            }
            match query_lessons(conn, subscriber.query) {
                Ok(snapshot) => {
                    subscriber.sender.send_replace(snapshot);
                }
                Err(e) => {
                    tracing::error!(query = ?subscriber.query, "failed to refresh live query: {e}");
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum RefTable {
    Class,
    Teacher,
    Room,
}

impl RefTable {
    const fn table(self) -> &'static str {
        match self {
            RefTable::Class => "class",
            RefTable::Teacher => "teacher",
            RefTable::Room => "room",
        }
    }

    const fn name_column(self) -> &'static str {
        match self {
            RefTable::Class => "name",
            RefTable::Teacher => "acronym",
            RefTable::Room => "name",
        }
    }

    fn for_profile(kind: ProfileType) -> Self {
        match kind {
            ProfileType::Student => RefTable::Class,
            ProfileType::Teacher => RefTable::Teacher,
            ProfileType::Room => RefTable::Room,
        }
    }
}

fn format_date(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

fn parse_date(idx: usize, s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

fn parse_time(idx: usize, s: Option<String>) -> rusqlite::Result<Option<NaiveTime>> {
    s.map(|s| {
        NaiveTime::parse_from_str(&s, "%H:%M")
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn is_constraint(e: &rusqlite::Error) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation)
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Converts constraint failures into `Error::Constraint`, logging the
/// reference that failed.
fn constraint_error(e: rusqlite::Error, context: impl FnOnce() -> String) -> Error {
    if is_constraint(&e) {
        let context = context();
        tracing::error!("constraint violation ({context}): {e}");
        Error::Constraint(format!("{context}: {e}"))
    } else {
        Error::Database(e)
    }
}

fn school_from_row(row: &Row) -> rusqlite::Result<School> {
    Ok(School {
        id: row.get(0)?,
        name: row.get(1)?,
        username: row.get(2)?,
        password: row.get(3)?,
        days_per_week: row.get(4)?,
    })
}

fn class_from_row(row: &Row) -> rusqlite::Result<Class> {
    Ok(Class {
        id: row.get(0)?,
        school_id: row.get(1)?,
        name: row.get(2)?,
    })
}

fn teacher_from_row(row: &Row) -> rusqlite::Result<Teacher> {
    Ok(Teacher {
        id: row.get(0)?,
        school_id: row.get(1)?,
        acronym: row.get(2)?,
    })
}

fn room_from_row(row: &Row) -> rusqlite::Result<Room> {
    Ok(Room {
        id: row.get(0)?,
        school_id: row.get(1)?,
        name: row.get(2)?,
    })
}

fn profile_from_row(row: &Row) -> rusqlite::Result<Profile> {
    let tag: i64 = row.get(1)?;
    let kind = ProfileType::from_tag(tag).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            Type::Integer,
            format!("unknown profile kind {tag}").into(),
        )
    })?;
    Ok(Profile {
        id: row.get(0)?,
        kind,
        name: row.get(2)?,
        reference_id: row.get(3)?,
    })
}

const SCHOOL_COLUMNS: &str = "id, name, username, password, days_per_week";

const LESSON_COLUMNS: &str = "l.id, l.lesson_number, l.class_id, l.subject, l.changed_subject, l.info, \
     l.room_changed, l.teacher_changed, l.begin_time, l.end_time, l.course_number, l.day, l.version";

fn lesson_from_row(row: &Row) -> rusqlite::Result<Lesson> {
    Ok(Lesson {
        id: row.get(0)?,
        lesson_number: row.get(1)?,
        class_id: row.get(2)?,
        subject: row.get(3)?,
        changed_subject: row.get(4)?,
        info: row.get(5)?,
        room_changed: row.get(6)?,
        teacher_changed: row.get(7)?,
        begin: parse_time(8, row.get(8)?)?,
        end: parse_time(9, row.get(9)?)?,
        course_number: row.get(10)?,
        day: parse_date(11, &row.get::<_, String>(11)?)?,
        version: row.get(12)?,
        teachers: Vec::new(),
        rooms: Vec::new(),
    })
}

fn query_lessons(conn: &Connection, query: LessonQuery) -> Result<Vec<Lesson>> {
    let (sql, key) = match query {
        LessonQuery::Class { class_id, .. } => (
            format!(
                "SELECT {LESSON_COLUMNS} FROM lesson l
                 WHERE l.class_id = ?1 AND l.day = ?2
                 ORDER BY l.lesson_number, l.id"
            ),
            class_id,
        ),
        LessonQuery::Teacher { teacher_id, .. } => (
            format!(
                "SELECT {LESSON_COLUMNS} FROM lesson l
                 JOIN lesson_teacher lt ON lt.lesson_id = l.id
                 WHERE lt.teacher_id = ?1 AND l.day = ?2
                 ORDER BY l.lesson_number, l.class_id, l.id"
            ),
            teacher_id,
        ),
        LessonQuery::Room { room_id, .. } => (
            format!(
                "SELECT {LESSON_COLUMNS} FROM lesson l
                 JOIN lesson_room lr ON lr.lesson_id = l.id
                 WHERE lr.room_id = ?1 AND l.day = ?2
                 ORDER BY l.lesson_number, l.class_id, l.id"
            ),
            room_id,
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let mut lessons = stmt
        .query_map(params![key, format_date(query.day())], lesson_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut teachers_stmt = conn.prepare_cached(
        "SELECT t.id, t.school_id, t.acronym FROM teacher t
         JOIN lesson_teacher lt ON lt.teacher_id = t.id
         WHERE lt.lesson_id = ?1 ORDER BY lt.rowid",
    )?;
    let mut rooms_stmt = conn.prepare_cached(
        "SELECT r.id, r.school_id, r.name FROM room r
         JOIN lesson_room lr ON lr.room_id = r.id
         WHERE lr.lesson_id = ?1 ORDER BY lr.rowid",
    )?;

    for lesson in &mut lessons {
        lesson.teachers = teachers_stmt
            .query_map(params![lesson.id], teacher_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        lesson.rooms = rooms_stmt
            .query_map(params![lesson.id], room_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
    }

    Ok(lessons)
}

fn find_or_create_ref(conn: &Connection, table: RefTable, school_id: i64, name: &str) -> Result<i64> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::BadRequest(format!("{} name cannot be empty", table.table())));
    }

    conn.execute(
        &format!(
            "INSERT OR IGNORE INTO {} (school_id, {}) VALUES (?1, ?2)",
            table.table(),
            table.name_column()
        ),
        params![school_id, name],
    )
    .map_err(|e| constraint_error(e, || format!("{} '{name}' of school {school_id}", table.table())))?;

    conn.query_row(
        &format!(
            "SELECT id FROM {} WHERE school_id = ?1 AND {} = ?2",
            table.table(),
            table.name_column()
        ),
        params![school_id, name],
        |row| row.get(0),
    )
    .map_err(Error::from)
}

fn get_ref<T>(
    conn: &Connection,
    table: RefTable,
    id: i64,
    map: fn(&Row) -> rusqlite::Result<T>,
) -> Result<Option<T>> {
    conn.query_row(
        &format!(
            "SELECT id, school_id, {} FROM {} WHERE id = ?1",
            table.name_column(),
            table.table()
        ),
        params![id],
        map,
    )
    .optional()
    .map_err(Error::from)
}

fn get_ref_by_name<T>(
    conn: &Connection,
    table: RefTable,
    school_id: i64,
    name: &str,
    map: fn(&Row) -> rusqlite::Result<T>,
) -> Result<Option<T>> {
    conn.query_row(
        &format!(
            "SELECT id, school_id, {col} FROM {} WHERE school_id = ?1 AND {col} = ?2",
            table.table(),
            col = table.name_column()
        ),
        params![school_id, name.trim()],
        map,
    )
    .optional()
    .map_err(Error::from)
}

fn list_refs<T>(
    conn: &Connection,
    table: RefTable,
    school_id: i64,
    map: fn(&Row) -> rusqlite::Result<T>,
) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, school_id, {col} FROM {} WHERE school_id = ?1 ORDER BY {col}",
        table.table(),
        col = table.name_column()
    ))?;
    let rows = stmt.query_map(params![school_id], map)?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::from)
}

/// Teacher and room ids linked to the lessons of (class_id, day).
fn linked_ids(conn: &Connection, link_table: &str, column: &str, class_id: i64, day: &str) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT DISTINCT x.{column} FROM {link_table} x
         JOIN lesson l ON l.id = x.lesson_id
         WHERE l.class_id = ?1 AND l.day = ?2"
    ))?;
    let rows = stmt.query_map(params![class_id, day], |row| row.get(0))?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::from)
}

fn distinct_versions(conn: &Connection, class_id: i64, day: NaiveDate) -> Result<Vec<i64>> {
    let mut stmt =
        conn.prepare("SELECT DISTINCT version FROM lesson WHERE class_id = ?1 AND day = ?2")?;
    let rows = stmt.query_map(params![class_id, format_date(day)], |row| row.get(0))?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::from)
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        let mut conn = self.conn();
        let current: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        let latest = latest_version();

        if current > latest {
            return Err(Error::Config(format!(
                "database schema version {current} is newer than supported version {latest}"
            )));
        }

        for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
            let tx = conn.transaction()?;
            tx.execute_batch(migration.sql)?;
            tx.pragma_update(None, "user_version", migration.version)?;
            tx.commit()?;
            tracing::info!(
                version = migration.version,
                "applied migration: {}",
                migration.description
            );
        }
        Ok(())
    }

    fn schema_version(&self) -> Result<i32> {
        let conn = self.conn();
        conn.query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(Error::from)
    }

    // School operations

    fn create_school(&self, school: &School) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO school (id, name, username, password, days_per_week)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    school.id,
                    school.name,
                    school.username,
                    school.password,
                    school.days_per_week,
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Error::AlreadyExists
                } else {
                    Error::from(e)
                }
            })?;
        Ok(())
    }

    fn get_school(&self, id: i64) -> Result<Option<School>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {SCHOOL_COLUMNS} FROM school WHERE id = ?1"),
            params![id],
            school_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_schools(&self) -> Result<Vec<School>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("SELECT {SCHOOL_COLUMNS} FROM school ORDER BY id"))?;
        let rows = stmt.query_map([], school_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_school_credentials(&self, id: i64, username: &str, password: &str) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE school SET username = ?1, password = ?2 WHERE id = ?3",
            params![username, password, id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn update_school_days_per_week(&self, id: i64, days_per_week: i32) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE school SET days_per_week = ?1 WHERE id = ?2",
            params![days_per_week, id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_school(&self, id: i64) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM profile WHERE
                (kind = 0 AND reference_id IN (SELECT id FROM class WHERE school_id = ?1)) OR
                (kind = 1 AND reference_id IN (SELECT id FROM teacher WHERE school_id = ?1)) OR
                (kind = 2 AND reference_id IN (SELECT id FROM room WHERE school_id = ?1))",
            params![id],
        )?;
        let rows = tx.execute("DELETE FROM school WHERE id = ?1", params![id])?;
        tx.commit()?;

        if rows > 0 {
            self.publish(&conn, &ChangeSet::all());
        }
        Ok(rows > 0)
    }

    // Reference entities

    fn find_or_create_class(&self, school_id: i64, name: &str) -> Result<Class> {
        let conn = self.conn();
        let id = find_or_create_ref(&conn, RefTable::Class, school_id, name)?;
        get_ref(&conn, RefTable::Class, id, class_from_row)?.ok_or(Error::NotFound)
    }

    fn get_class(&self, id: i64) -> Result<Option<Class>> {
        get_ref(&self.conn(), RefTable::Class, id, class_from_row)
    }

    fn get_class_by_name(&self, school_id: i64, name: &str) -> Result<Option<Class>> {
        get_ref_by_name(&self.conn(), RefTable::Class, school_id, name, class_from_row)
    }

    fn list_classes(&self, school_id: i64) -> Result<Vec<Class>> {
        list_refs(&self.conn(), RefTable::Class, school_id, class_from_row)
    }

    fn find_or_create_teacher(&self, school_id: i64, acronym: &str) -> Result<Teacher> {
        let conn = self.conn();
        let id = find_or_create_ref(&conn, RefTable::Teacher, school_id, acronym)?;
        get_ref(&conn, RefTable::Teacher, id, teacher_from_row)?.ok_or(Error::NotFound)
    }

    fn get_teacher(&self, id: i64) -> Result<Option<Teacher>> {
        get_ref(&self.conn(), RefTable::Teacher, id, teacher_from_row)
    }

    fn get_teacher_by_acronym(&self, school_id: i64, acronym: &str) -> Result<Option<Teacher>> {
        get_ref_by_name(&self.conn(), RefTable::Teacher, school_id, acronym, teacher_from_row)
    }

    fn list_teachers(&self, school_id: i64) -> Result<Vec<Teacher>> {
        list_refs(&self.conn(), RefTable::Teacher, school_id, teacher_from_row)
    }

    fn find_or_create_room(&self, school_id: i64, name: &str) -> Result<Room> {
        let conn = self.conn();
        let id = find_or_create_ref(&conn, RefTable::Room, school_id, name)?;
        get_ref(&conn, RefTable::Room, id, room_from_row)?.ok_or(Error::NotFound)
    }

    fn get_room(&self, id: i64) -> Result<Option<Room>> {
        get_ref(&self.conn(), RefTable::Room, id, room_from_row)
    }

    fn get_room_by_name(&self, school_id: i64, name: &str) -> Result<Option<Room>> {
        get_ref_by_name(&self.conn(), RefTable::Room, school_id, name, room_from_row)
    }

    fn list_rooms(&self, school_id: i64) -> Result<Vec<Room>> {
        list_refs(&self.conn(), RefTable::Room, school_id, room_from_row)
    }

    // Profile operations

    fn create_profile(&self, kind: ProfileType, name: &str, reference_id: i64) -> Result<Profile> {
        let conn = self.conn();
        let table = RefTable::for_profile(kind);
        let exists: bool = conn.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)", table.table()),
            params![reference_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(Error::NotFound);
        }

        conn.execute(
            "INSERT INTO profile (kind, name, reference_id) VALUES (?1, ?2, ?3)",
            params![kind.tag(), name, reference_id],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::AlreadyExists
            } else {
                Error::from(e)
            }
        })?;

        Ok(Profile {
            id: conn.last_insert_rowid(),
            kind,
            name: name.to_string(),
            reference_id,
        })
    }

    fn get_profile(&self, id: i64) -> Result<Option<Profile>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, kind, name, reference_id FROM profile WHERE id = ?1",
            params![id],
            profile_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn find_profile(&self, kind: ProfileType, reference_id: i64) -> Result<Option<Profile>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, kind, name, reference_id FROM profile WHERE kind = ?1 AND reference_id = ?2",
            params![kind.tag(), reference_id],
            profile_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_profiles(&self) -> Result<Vec<Profile>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id, kind, name, reference_id FROM profile ORDER BY id")?;
        let rows = stmt.query_map([], profile_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_profile(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM profile WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn profile_school(&self, profile: &Profile) -> Result<Option<School>> {
        let conn = self.conn();
        let table = RefTable::for_profile(profile.kind).table();
        conn.query_row(
            &format!(
                "SELECT s.id, s.name, s.username, s.password, s.days_per_week
                 FROM school s JOIN {table} r ON r.school_id = s.id WHERE r.id = ?1"
            ),
            params![profile.reference_id],
            school_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    // Lesson operations

    fn sync_day(
        &self,
        class_id: i64,
        day: NaiveDate,
        lessons: &[NewLesson],
        version: i64,
    ) -> Result<SyncOutcome> {
        let mut conn = self.conn();

        if distinct_versions(&conn, class_id, day)? == [version] {
            tracing::debug!(class_id, %day, version, "lessons already current");
            return Ok(SyncOutcome::Unchanged);
        }

        let day_text = format_date(day);
        let mut changes = ChangeSet::default();
        changes.add_class(class_id, day);

        let tx = conn.transaction()?;
        changes.add_teachers(linked_ids(&tx, "lesson_teacher", "teacher_id", class_id, &day_text)?, day);
        changes.add_rooms(linked_ids(&tx, "lesson_room", "room_id", class_id, &day_text)?, day);

        let removed = tx.execute(
            "DELETE FROM lesson WHERE class_id = ?1 AND day = ?2",
            params![class_id, day_text],
        )?;

        {
            let mut insert_lesson = tx.prepare(
                "INSERT INTO lesson (lesson_number, class_id, subject, changed_subject, info,
                    room_changed, teacher_changed, begin_time, end_time, course_number, day, version)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            )?;
            let mut link_teacher = tx.prepare(
                "INSERT OR IGNORE INTO lesson_teacher (lesson_id, teacher_id) VALUES (?1, ?2)",
            )?;
            let mut link_room =
                tx.prepare("INSERT OR IGNORE INTO lesson_room (lesson_id, room_id) VALUES (?1, ?2)")?;

            for lesson in lessons {
                let lesson_id = insert_lesson
                    .insert(params![
                        lesson.lesson_number,
                        class_id,
                        lesson.subject,
                        lesson.changed_subject,
                        lesson.info,
                        lesson.room_changed,
                        lesson.teacher_changed,
                        lesson.begin.map(format_time),
                        lesson.end.map(format_time),
                        lesson.course_number,
                        day_text,
                        version,
                    ])
                    .map_err(|e| constraint_error(e, || format!("class {class_id} on {day}")))?;

                for teacher_id in &lesson.teacher_ids {
                    link_teacher
                        .execute(params![lesson_id, teacher_id])
                        .map_err(|e| constraint_error(e, || format!("teacher {teacher_id} on {day}")))?;
                }
                for room_id in &lesson.room_ids {
                    link_room
                        .execute(params![lesson_id, room_id])
                        .map_err(|e| constraint_error(e, || format!("room {room_id} on {day}")))?;
                }

                changes.add_teachers(lesson.teacher_ids.iter().copied(), day);
                changes.add_rooms(lesson.room_ids.iter().copied(), day);
            }
        }

        tx.commit()?;

        tracing::debug!(class_id, %day, version, removed, inserted = lessons.len(), "replaced lessons");
        if removed > 0 || !lessons.is_empty() {
            self.publish(&conn, &changes);
        }

        Ok(SyncOutcome::Replaced {
            removed,
            inserted: lessons.len(),
        })
    }

    fn stored_version(&self, class_id: i64, day: NaiveDate) -> Result<Option<i64>> {
        let conn = self.conn();
        let versions = distinct_versions(&conn, class_id, day)?;
        match versions.as_slice() {
            [version] => Ok(Some(*version)),
            [] => Ok(None),
            _ => {
                tracing::warn!(class_id, %day, ?versions, "mixed lesson versions stored");
                Ok(None)
            }
        }
    }

    fn lessons_for(&self, query: LessonQuery) -> Result<Vec<Lesson>> {
        query_lessons(&self.conn(), query)
    }

    fn subscribe(&self, query: LessonQuery) -> Result<LessonSubscription> {
        let conn = self.conn();
        let initial = query_lessons(&conn, query)?;
        let (subscriber, subscription) = live::channel(query, initial);
        self.subscribers().push(subscriber);
        Ok(subscription)
    }

    fn delete_lessons_for_class(&self, class_id: i64, day: NaiveDate) -> Result<usize> {
        let mut conn = self.conn();
        let day_text = format_date(day);
        let mut changes = ChangeSet::default();
        changes.add_class(class_id, day);

        let tx = conn.transaction()?;
        changes.add_teachers(linked_ids(&tx, "lesson_teacher", "teacher_id", class_id, &day_text)?, day);
        changes.add_rooms(linked_ids(&tx, "lesson_room", "room_id", class_id, &day_text)?, day);
        let rows = tx.execute(
            "DELETE FROM lesson WHERE class_id = ?1 AND day = ?2",
            params![class_id, day_text],
        )?;
        tx.commit()?;

        if rows > 0 {
            self.publish(&conn, &changes);
        }
        Ok(rows)
    }

    fn delete_all_lessons(&self) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let rows = tx.execute("DELETE FROM lesson", [])?;
        tx.execute("DELETE FROM day_info", [])?;
        tx.execute("DELETE FROM free_day", [])?;
        tx.commit()?;

        self.publish(&conn, &ChangeSet::all());
        Ok(rows)
    }

    // Day info

    fn upsert_day_info(&self, info: &DayInfo) -> Result<()> {
        let lines = serde_json::to_string(&info.info_lines)?;
        self.conn()
            .execute(
                "INSERT INTO day_info (school_id, day, version, info_lines) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(school_id, day) DO UPDATE SET
                    version = excluded.version, info_lines = excluded.info_lines",
                params![info.school_id, format_date(info.day), info.version, lines],
            )
            .map_err(|e| constraint_error(e, || format!("day info of school {}", info.school_id)))?;
        Ok(())
    }

    fn get_day_info(&self, school_id: i64, day: NaiveDate) -> Result<Option<DayInfo>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT version, info_lines FROM day_info WHERE school_id = ?1 AND day = ?2",
                params![school_id, format_date(day)],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        row.map(|(version, lines)| -> Result<DayInfo> {
            Ok(DayInfo {
                school_id,
                day,
                version,
                info_lines: serde_json::from_str(&lines)?,
            })
        })
        .transpose()
    }

    // Free days

    fn replace_free_days(&self, school_id: i64, days: &[NaiveDate]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM free_day WHERE school_id = ?1", params![school_id])?;
        {
            let mut stmt = tx.prepare("INSERT OR IGNORE INTO free_day (school_id, day) VALUES (?1, ?2)")?;
            for day in days {
                stmt.execute(params![school_id, format_date(*day)])
                    .map_err(|e| constraint_error(e, || format!("free days of school {school_id}")))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn is_free_day(&self, school_id: i64, day: NaiveDate) -> Result<bool> {
        let conn = self.conn();
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM free_day WHERE school_id = ?1 AND day = ?2)",
            params![school_id, format_date(day)],
            |row| row.get(0),
        )
        .map_err(Error::from)
    }

    // Key/value operations

    fn get_value(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT value FROM key_value WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(Error::from)
    }

    fn set_value(&self, key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO key_value (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn delete_value(&self, key: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM key_value WHERE key = ?1", params![key])?;
        Ok(rows > 0)
    }

    // Log records

    fn log(&self, tag: &str, message: &str) -> Result<()> {
        tracing::info!(tag, "{message}");
        self.conn().execute(
            "INSERT INTO log_record (timestamp, tag, message) VALUES (?1, ?2, ?3)",
            params![Utc::now().to_rfc3339(), tag, message],
        )?;
        Ok(())
    }

    fn list_logs(&self, limit: i64) -> Result<Vec<LogRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, tag, message FROM log_record ORDER BY id DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit], |row| {
            Ok(LogRecord {
                id: row.get(0)?,
                timestamp: parse_datetime(&row.get::<_, String>(1)?),
                tag: row.get(2)?,
                message: row.get(3)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }
}
