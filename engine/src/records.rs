//! Raw reference data loaded once at startup.

use articheck_types::{CollegeDirectory, CollegeId, InstitutionDirectory};

/// Holds the institution and community-college directories.
///
/// Both maps are immutable once loaded. A missing college directory (load
/// failed or not yet arrived) degrades to id-based display names rather
/// than blocking anything.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    institutions: InstitutionDirectory,
    colleges: CollegeDirectory,
}

impl RecordStore {
    pub fn set_institutions(&mut self, directory: InstitutionDirectory) {
        self.institutions = directory;
    }

    pub fn set_colleges(&mut self, directory: CollegeDirectory) {
        self.colleges = directory;
    }

    #[must_use]
    pub fn institutions(&self) -> &InstitutionDirectory {
        &self.institutions
    }

    /// Display name for a community college, falling back to `"ID: <id>"`
    /// when the directory is unavailable or lacks the id.
    #[must_use]
    pub fn college_name(&self, id: &CollegeId) -> String {
        self.colleges
            .get(id)
            .cloned()
            .unwrap_or_else(|| format!("ID: {id}"))
    }
}
