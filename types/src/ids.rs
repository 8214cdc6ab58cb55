use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

/// Identifier of a four-year institution (university).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstitutionId(String);

impl InstitutionId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstitutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a community college. Distinct namespace from
/// [`InstitutionId`]; the two are never interchangeable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollegeId(String);

impl CollegeId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollegeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a course.
///
/// The provider is inconsistent about this one: course ids appear as JSON
/// numbers inside agreement trees and course rows, but as strings when used
/// as lookup-table keys. Deserialization accepts both and canonicalizes to
/// the string form, so `"12"` and `12` compare equal after decode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CourseId(String);

impl CourseId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CourseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for CourseId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct IdVisitor;

        impl Visitor<'_> for IdVisitor {
            type Value = CourseId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a course id as a string or integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<CourseId, E> {
                Ok(CourseId::new(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<CourseId, E> {
                Ok(CourseId::new(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<CourseId, E> {
                Ok(CourseId::new(v.to_string()))
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn course_id_from_string() {
        let id: CourseId = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(id, CourseId::new("42"));
    }

    #[test]
    fn course_id_from_number() {
        let id: CourseId = serde_json::from_str("42").unwrap();
        assert_eq!(id, CourseId::new("42"));
    }

    #[test]
    fn course_id_number_and_string_forms_agree() {
        let from_num: CourseId = serde_json::from_str("7").unwrap();
        let from_str: CourseId = serde_json::from_str("\"7\"").unwrap();
        assert_eq!(from_num, from_str);
    }

    #[test]
    fn course_id_serializes_as_string() {
        let json = serde_json::to_string(&CourseId::new("42")).unwrap();
        assert_eq!(json, "\"42\"");
    }
}
