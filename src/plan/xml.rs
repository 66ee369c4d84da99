//! Serde mirror of the provider's XML. Every field is optional or defaulted so
//! schema drift degrades to "no change" instead of a parse error.

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub(super) struct XmlPlan {
    #[serde(rename = "Kopf", default)]
    pub head: XmlHead,
    #[serde(rename = "FreieTage", default)]
    pub free_days: XmlFreeDays,
    #[serde(rename = "Klassen", default)]
    pub classes: XmlClasses,
    #[serde(rename = "ZusatzInfo", default)]
    pub extra_info: XmlExtraInfo,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct XmlHead {
    #[serde(rename = "zeitstempel", default)]
    pub timestamp: Option<String>,
    #[serde(rename = "datei", default)]
    pub file: Option<String>,
    #[serde(rename = "tageprowoche", default)]
    pub days_per_week: Option<String>,
    #[serde(rename = "schulname", default)]
    pub school_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct XmlFreeDays {
    #[serde(rename = "ft", default)]
    pub days: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct XmlClasses {
    #[serde(rename = "Kl", default)]
    pub classes: Vec<XmlClass>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct XmlClass {
    #[serde(rename = "Kurz", default)]
    pub name: String,
    #[serde(rename = "Pl", default)]
    pub plan: XmlClassPlan,
    #[serde(rename = "Unterricht", default)]
    pub courses: XmlCourses,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct XmlClassPlan {
    #[serde(rename = "Std", default)]
    pub lessons: Vec<XmlLesson>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct XmlLesson {
    #[serde(rename = "St", default)]
    pub number: Option<String>,
    #[serde(rename = "Beginn", default)]
    pub begin: Option<String>,
    #[serde(rename = "Ende", default)]
    pub end: Option<String>,
    #[serde(rename = "Fa", default)]
    pub subject: Option<XmlMarked>,
    #[serde(rename = "Le", default)]
    pub teacher: Option<XmlMarked>,
    #[serde(rename = "Ra", default)]
    pub room: Option<XmlMarked>,
    #[serde(rename = "Nr", default)]
    pub course_number: Option<String>,
    #[serde(rename = "If", default)]
    pub info: Option<String>,
}

/// An element whose text may carry a `<Name>Ae` change marker attribute.
#[derive(Debug, Default, Deserialize)]
pub(super) struct XmlMarked {
    #[serde(rename = "@FaAe", alias = "@LeAe", alias = "@RaAe", default)]
    pub changed: Option<String>,
    #[serde(rename = "$text", default)]
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct XmlExtraInfo {
    #[serde(rename = "ZiZeile", default)]
    pub lines: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct XmlCourses {
    #[serde(rename = "Ue", default)]
    pub courses: Vec<XmlCourse>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct XmlCourse {
    #[serde(rename = "UeNr", default)]
    pub number: Option<XmlCourseNumber>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct XmlCourseNumber {
    #[serde(rename = "@UeLe", default)]
    pub teacher: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct XmlBaseData {
    #[serde(rename = "Kopf", default)]
    pub head: XmlHead,
    #[serde(rename = "Basisdaten", default)]
    pub basics: XmlBasics,
    #[serde(rename = "Klassen", default)]
    pub classes: XmlClasses,
    #[serde(rename = "Raeume", default)]
    pub rooms: XmlRooms,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct XmlBasics {
    #[serde(rename = "BaTageProWoche", default)]
    pub days_per_week: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct XmlRooms {
    #[serde(rename = "Ra", default)]
    pub rooms: Vec<String>,
}
