//! Articulation wire shapes and the resolved satisfaction matrix.
//!
//! The provider returns a two-element JSON array `[agreements, lookup]`.
//! `agreements` maps each community-college id to a *JSON-encoded string*
//! holding an OR-of-ANDs tree of course ids; `lookup` maps course ids to
//! display fields. Ids referenced by a tree may be missing from `lookup` -
//! that is normal partial data, not corruption.

use std::collections::HashMap;
use std::fmt;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};

use crate::ids::{CollegeId, CourseId};

/// Sentinel rendered for any course id the lookup table cannot resolve.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// An agreement tree: satisfied by completing all courses in any one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementTree {
    pub items: Vec<AndBlock>,
}

/// One conjunctive path through an agreement: every course is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AndBlock {
    pub items: Vec<CourseId>,
}

/// Display fields for a course as they appear in the lookup table.
///
/// Fields are optional on the wire; a present row may still be missing
/// either one, and each absent field falls back to [`UNKNOWN_LABEL`]
/// independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRef {
    #[serde(default)]
    pub course_code: Option<String>,
    #[serde(default)]
    pub course_name: Option<String>,
}

/// Raw per-course articulation payload, exactly as received.
///
/// `agreements` keeps the provider's key order; each value is kept as an
/// uninterpreted [`serde_json::Value`] because a malformed entry (non-string,
/// or a string that fails to parse) must only poison its own key.
#[derive(Debug, Clone, Default)]
pub struct RawArticulationResponse {
    pub agreements: Vec<(CollegeId, serde_json::Value)>,
    pub lookup: HashMap<CourseId, CourseRef>,
}

impl<'de> Deserialize<'de> for RawArticulationResponse {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (agreements, lookup): (AgreementEntries, HashMap<CourseId, CourseRef>) =
            Deserialize::deserialize(deserializer)?;
        Ok(Self {
            agreements: agreements.0,
            lookup,
        })
    }
}

/// Ordered `college id -> payload` entries.
///
/// Deserialized through a map visitor into a `Vec` so the document's key
/// order survives; a plain `HashMap` would scramble it.
struct AgreementEntries(Vec<(CollegeId, serde_json::Value)>);

impl<'de> Deserialize<'de> for AgreementEntries {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = AgreementEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of college ids to agreement payloads")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((college, payload)) =
                    map.next_entry::<CollegeId, serde_json::Value>()?
                {
                    entries.push((college, payload));
                }
                Ok(AgreementEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// A course rendered for display: identity replaced by code and name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseDisplay {
    pub code: String,
    pub name: String,
}

impl CourseDisplay {
    /// The sentinel entry substituted for unresolved course ids.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            code: UNKNOWN_LABEL.to_string(),
            name: UNKNOWN_LABEL.to_string(),
        }
    }

    /// Build display fields from a lookup row, falling back per field.
    #[must_use]
    pub fn from_ref(course: &CourseRef) -> Self {
        Self {
            code: course
                .course_code
                .clone()
                .unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
            name: course
                .course_name
                .clone()
                .unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
        }
    }
}

/// One conjunctive group of display-ready courses.
pub type AndGroup = Vec<CourseDisplay>;

/// Every satisfying path one community college offers for the course.
///
/// An empty `groups` means either "no articulation" or "payload was
/// malformed" - the college still appears so the UI can say so.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollegeAgreements {
    pub college: CollegeId,
    pub groups: Vec<AndGroup>,
}

/// The normalized satisfaction matrix, in the provider's college order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedMatrix {
    pub colleges: Vec<CollegeAgreements>,
}

impl ResolvedMatrix {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.colleges.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.colleges.len()
    }

    /// Groups for one college, if the matrix contains it.
    #[must_use]
    pub fn groups_for(&self, college: &CollegeId) -> Option<&[AndGroup]> {
        self.colleges
            .iter()
            .find(|c| &c.college == college)
            .map(|c| c.groups.as_slice())
    }
}
