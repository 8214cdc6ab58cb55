//! Agreement resolution: raw articulation payload -> renderable matrix.
//!
//! The provider double-encodes each college's agreement tree as a JSON
//! string. A payload that fails to parse poisons only its own college: the
//! key still appears in the output with an empty group list, the failure is
//! logged, and every other college resolves normally.

use articheck_types::{
    AgreementTree, AndGroup, CollegeAgreements, CollegeId, CourseDisplay, CourseId, CourseRef,
    RawArticulationResponse, ResolvedMatrix,
};
use std::collections::HashMap;

/// Resolve a raw articulation payload into a display matrix.
///
/// Ordering is preserved at every level: college keys keep the payload's
/// key order, blocks keep their order, and courses keep their order within
/// each block. Never fails; malformed per-college payloads and unknown
/// course ids degrade in place.
#[must_use]
pub fn resolve(raw: &RawArticulationResponse) -> ResolvedMatrix {
    let colleges = raw
        .agreements
        .iter()
        .map(|(college, payload)| CollegeAgreements {
            college: college.clone(),
            groups: resolve_college(college, payload, &raw.lookup),
        })
        .collect();

    ResolvedMatrix { colleges }
}

fn resolve_college(
    college: &CollegeId,
    payload: &serde_json::Value,
    lookup: &HashMap<CourseId, CourseRef>,
) -> Vec<AndGroup> {
    let Some(text) = payload.as_str() else {
        tracing::warn!(%college, "agreement payload is not a string");
        return Vec::new();
    };

    let tree: AgreementTree = match serde_json::from_str(text) {
        Ok(tree) => tree,
        Err(error) => {
            tracing::warn!(%college, %error, "malformed agreement payload");
            return Vec::new();
        }
    };

    tree.items
        .iter()
        .map(|block| {
            block
                .items
                .iter()
                .map(|id| {
                    lookup
                        .get(id)
                        .map(CourseDisplay::from_ref)
                        .unwrap_or_else(CourseDisplay::unknown)
                })
                .collect()
        })
        .collect()
}
