/// A forward schema step, applied once when `PRAGMA user_version` is below `version`.
pub struct Migration {
    pub version: i32,
    pub description: &'static str,
    pub sql: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "initial schema",
        sql: V1_INITIAL,
    },
    Migration {
        version: 2,
        description: "per-day plan info",
        sql: V2_DAY_INFO,
    },
    Migration {
        version: 3,
        description: "school free days",
        sql: V3_FREE_DAYS,
    },
];

pub fn latest_version() -> i32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

const V1_INITIAL: &str = r#"
-- Schools as known to the timetable provider; id is the provider's school number
CREATE TABLE IF NOT EXISTS school (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    username TEXT NOT NULL,
    password TEXT NOT NULL,
    days_per_week INTEGER NOT NULL DEFAULT 5
);

-- Reference entities, unique by display name within a school
CREATE TABLE IF NOT EXISTS class (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    school_id INTEGER NOT NULL REFERENCES school(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    UNIQUE(school_id, name)
);

CREATE TABLE IF NOT EXISTS teacher (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    school_id INTEGER NOT NULL REFERENCES school(id) ON DELETE CASCADE,
    acronym TEXT NOT NULL,
    UNIQUE(school_id, acronym)
);

CREATE TABLE IF NOT EXISTS room (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    school_id INTEGER NOT NULL REFERENCES school(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    UNIQUE(school_id, name)
);

-- kind: 0 student, 1 teacher, 2 room; reference_id points into class, teacher or room
CREATE TABLE IF NOT EXISTS profile (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind INTEGER NOT NULL,
    name TEXT NOT NULL,
    reference_id INTEGER NOT NULL,
    UNIQUE(kind, reference_id)
);

-- All rows of one (class_id, day) share a version and are replaced together
CREATE TABLE IF NOT EXISTS lesson (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    lesson_number INTEGER NOT NULL,
    class_id INTEGER NOT NULL REFERENCES class(id) ON DELETE CASCADE,
    subject TEXT,
    changed_subject TEXT,
    info TEXT,
    room_changed INTEGER NOT NULL DEFAULT 0,
    teacher_changed INTEGER NOT NULL DEFAULT 0,
    begin_time TEXT,
    end_time TEXT,
    course_number INTEGER,
    day TEXT NOT NULL,
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS lesson_teacher (
    lesson_id INTEGER NOT NULL REFERENCES lesson(id) ON DELETE CASCADE,
    teacher_id INTEGER NOT NULL REFERENCES teacher(id) ON DELETE CASCADE,
    PRIMARY KEY (lesson_id, teacher_id)
);

CREATE TABLE IF NOT EXISTS lesson_room (
    lesson_id INTEGER NOT NULL REFERENCES lesson(id) ON DELETE CASCADE,
    room_id INTEGER NOT NULL REFERENCES room(id) ON DELETE CASCADE,
    PRIMARY KEY (lesson_id, room_id)
);

CREATE TABLE IF NOT EXISTS key_value (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS log_record (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    tag TEXT NOT NULL,
    message TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_class_school ON class(school_id);
CREATE INDEX IF NOT EXISTS idx_teacher_school ON teacher(school_id);
CREATE INDEX IF NOT EXISTS idx_room_school ON room(school_id);
CREATE INDEX IF NOT EXISTS idx_lesson_class_day ON lesson(class_id, day);
CREATE INDEX IF NOT EXISTS idx_lesson_day ON lesson(day);
CREATE INDEX IF NOT EXISTS idx_lesson_teacher_teacher ON lesson_teacher(teacher_id);
CREATE INDEX IF NOT EXISTS idx_lesson_room_room ON lesson_room(room_id);
"#;

const V2_DAY_INFO: &str = r#"
-- Additional info lines (JSON array) of the last stored plan per school and day
CREATE TABLE IF NOT EXISTS day_info (
    school_id INTEGER NOT NULL REFERENCES school(id) ON DELETE CASCADE,
    day TEXT NOT NULL,
    version INTEGER NOT NULL,
    info_lines TEXT NOT NULL DEFAULT '[]',
    PRIMARY KEY (school_id, day)
);
"#;

const V3_FREE_DAYS: &str = r#"
-- Holidays announced by the most recent plan that listed any
CREATE TABLE IF NOT EXISTS free_day (
    school_id INTEGER NOT NULL REFERENCES school(id) ON DELETE CASCADE,
    day TEXT NOT NULL,
    PRIMARY KEY (school_id, day)
);
"#;

/// Drops every table; only used by the explicit destructive rebuild.
pub const DROP_ALL: &str = r#"
DROP TABLE IF EXISTS free_day;
DROP TABLE IF EXISTS day_info;
DROP TABLE IF EXISTS lesson_room;
DROP TABLE IF EXISTS lesson_teacher;
DROP TABLE IF EXISTS lesson;
DROP TABLE IF EXISTS profile;
DROP TABLE IF EXISTS room;
DROP TABLE IF EXISTS teacher;
DROP TABLE IF EXISTS class;
DROP TABLE IF EXISTS school;
DROP TABLE IF EXISTS key_value;
DROP TABLE IF EXISTS log_record;
"#;
