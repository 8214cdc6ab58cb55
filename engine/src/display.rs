//! Display-name shortening for university names.

/// Compact form of a university name for tight UI spots
/// ("University of California, Davis" -> "UC Davis"). First occurrence
/// of each pattern only; unrecognized names pass through unchanged.
#[must_use]
pub fn shorten_university_name(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    name.replacen("University of California,", "UC", 1)
        .replacen("California State University,", "Cal State", 1)
        .replacen("California Polytechnic University,", "Cal Poly", 1)
        .replacen("State University", "State", 1)
        .replacen("San Luis Obispo", "SLO", 1)
}
