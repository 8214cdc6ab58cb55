//! Reference catalog data: institutions, community colleges, courses.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ids::{CollegeId, CourseId, InstitutionId};

/// Institution directory as the provider ships it: id -> display name.
pub type InstitutionDirectory = HashMap<InstitutionId, String>;

/// Community-college directory: id -> display name.
pub type CollegeDirectory = HashMap<CollegeId, String>;

/// A course as returned by the course listing endpoint.
///
/// Owned by whichever institution returned it; the same code may recur
/// under different ids at other institutions, so rows are never
/// deduplicated across institutions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    #[serde(rename = "course_id")]
    pub id: CourseId,
    #[serde(rename = "course_code")]
    pub code: String,
    #[serde(rename = "course_name")]
    pub name: String,
}
