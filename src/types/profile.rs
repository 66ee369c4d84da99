use std::fmt;

use serde::{Deserialize, Serialize};

/// The viewpoint a profile filters lessons by. Stored as an integer tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileType {
    Student,
    Teacher,
    Room,
}

impl ProfileType {
    pub const fn tag(self) -> i64 {
        match self {
            ProfileType::Student => 0,
            ProfileType::Teacher => 1,
            ProfileType::Room => 2,
        }
    }

    pub fn from_tag(tag: i64) -> Option<ProfileType> {
        match tag {
            0 => Some(ProfileType::Student),
            1 => Some(ProfileType::Teacher),
            2 => Some(ProfileType::Room),
            _ => None,
        }
    }

    pub fn parse(s: &str) -> Option<ProfileType> {
        match s.to_ascii_lowercase().as_str() {
            "student" | "class" => Some(ProfileType::Student),
            "teacher" => Some(ProfileType::Teacher),
            "room" => Some(ProfileType::Room),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ProfileType::Student => "student",
            ProfileType::Teacher => "teacher",
            ProfileType::Room => "room",
        }
    }
}

impl fmt::Display for ProfileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_roundtrip() {
        for kind in [ProfileType::Student, ProfileType::Teacher, ProfileType::Room] {
            assert_eq!(ProfileType::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(ProfileType::from_tag(7), None);
    }

    #[test]
    fn test_parse_profile_type() {
        assert_eq!(ProfileType::parse("Teacher"), Some(ProfileType::Teacher));
        assert_eq!(ProfileType::parse("class"), Some(ProfileType::Student));
        assert_eq!(ProfileType::parse("parent"), None);
    }
}
