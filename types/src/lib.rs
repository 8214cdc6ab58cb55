//! Core domain types for articheck.
//!
//! Everything here is plain data: typed identifiers, catalog entries, the
//! raw articulation wire shapes the external provider dictates, and the
//! resolved matrix handed to the presentation layer. No IO, no async.

mod articulation;
mod catalog;
mod ids;

pub use articulation::{
    AgreementTree, AndBlock, AndGroup, CollegeAgreements, CourseDisplay, CourseRef,
    RawArticulationResponse, ResolvedMatrix, UNKNOWN_LABEL,
};
pub use catalog::{CollegeDirectory, Course, InstitutionDirectory};
pub use ids::{CollegeId, CourseId, InstitutionId};
