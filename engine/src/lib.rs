//! Core articulation-resolution pipeline and selection state machine.
//!
//! # Architecture
//!
//! - [`resolver`] - raw articulation payload -> renderable [`ResolvedMatrix`]
//! - [`cache`] - write-once memoization with single-flight async producers
//! - [`search`] - alias-aware institution search, course substring search
//! - [`records`] - immutable reference directories with degraded fallbacks
//! - [`controller`] - the selection state machine tying it all together
//!
//! The controller owns every piece of mutable state; fetch tasks report
//! back through its event channel and are reconciled in one place.
//!
//! [`ResolvedMatrix`]: articheck_types::ResolvedMatrix

pub mod cache;
pub mod controller;
pub mod display;
pub mod records;
pub mod resolver;
pub mod search;

pub use cache::ResultCache;
pub use controller::{
    BLUR_CLOSE_DELAY, ControllerEvent, LoadingFlags, NavKey, SearchField, SelectionController,
    SelectionState,
};
pub use display::shorten_university_name;
pub use records::RecordStore;
pub use resolver::resolve;
pub use search::{ALIAS_RULES, InstitutionEntry, InstitutionIndex, search_courses};
