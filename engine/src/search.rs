//! Alias-aware institution search and course substring search.
//!
//! Institution matching compares the lowercased search term against three
//! derived strings per entry: the lowercase name, an alias-expanded form
//! ("uc davis", "csu long beach"), and an initials acronym ("csulb"). The
//! derivations are precomputed when the index is built; result order is
//! always the stable alphabetical order of the underlying list, never
//! relevance-ranked.

use articheck_types::{Course, InstitutionDirectory, InstitutionId};

/// Ordered alias substitutions applied to the lowercased name, most
/// specific first. Every occurrence is replaced.
pub const ALIAS_RULES: &[(&str, &str)] = &[
    ("university of california,", "uc"),
    ("california state university,", "csu"),
    ("california polytechnic university", "cal poly calpoly"),
    ("san luis obispo", "slo"),
];

/// One searchable institution with its precomputed match forms.
#[derive(Debug, Clone)]
pub struct InstitutionEntry {
    pub name: String,
    pub id: InstitutionId,
    lower: String,
    aliased: String,
    acronym: String,
}

impl InstitutionEntry {
    fn new(name: String, id: InstitutionId) -> Self {
        let lower = name.to_lowercase();
        let aliased = expand_aliases(&lower);
        let acronym = derive_acronym(&name);
        Self {
            name,
            id,
            lower,
            aliased,
            acronym,
        }
    }

    fn matches(&self, term: &str) -> bool {
        self.lower.contains(term) || self.aliased.contains(term) || self.acronym.contains(term)
    }
}

/// Searchable institution list, alphabetical by name (case-insensitive).
#[derive(Debug, Clone, Default)]
pub struct InstitutionIndex {
    entries: Vec<InstitutionEntry>,
}

impl InstitutionIndex {
    /// Build the index from the raw directory.
    #[must_use]
    pub fn from_directory(directory: &InstitutionDirectory) -> Self {
        let mut entries: Vec<InstitutionEntry> = directory
            .iter()
            .map(|(id, name)| InstitutionEntry::new(name.clone(), id.clone()))
            .collect();
        entries.sort_by(|a, b| a.lower.cmp(&b.lower).then_with(|| a.name.cmp(&b.name)));
        Self { entries }
    }

    /// All entries, in index order.
    #[must_use]
    pub fn entries(&self) -> &[InstitutionEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries matching `term` on any derived form, in index order. The
    /// empty term matches everything.
    #[must_use]
    pub fn search(&self, term: &str) -> Vec<&InstitutionEntry> {
        let term = term.to_lowercase();
        self.entries
            .iter()
            .filter(|entry| entry.matches(&term))
            .collect()
    }
}

/// Apply [`ALIAS_RULES`] to an already-lowercased name.
fn expand_aliases(lower: &str) -> String {
    let mut expanded = lower.to_string();
    for (pattern, replacement) in ALIAS_RULES {
        expanded = expanded.replace(pattern, replacement);
    }
    expanded
}

/// Initials acronym: replace the first "Polytechnic University" with
/// "Poly", keep only the uppercase ASCII letters of the original-case
/// name, lowercase the remainder.
fn derive_acronym(name: &str) -> String {
    name.replacen("Polytechnic University", "Poly", 1)
        .chars()
        .filter(char::is_ascii_uppercase)
        .collect::<String>()
        .to_lowercase()
}

/// Courses matching `term` on name or code, case-insensitive, input order
/// preserved. The empty term matches everything.
#[must_use]
pub fn search_courses<'a>(term: &str, courses: &'a [Course]) -> Vec<&'a Course> {
    let term = term.to_lowercase();
    courses
        .iter()
        .filter(|course| {
            course.name.to_lowercase().contains(&term) || course.code.to_lowercase().contains(&term)
        })
        .collect()
}
