//! Selection state machine: university -> course -> agreement.
//!
//! The controller is the single owner of all mutable selection state. Every
//! operation that leaves the process (directory, course, and articulation
//! loads) runs as a spawned task that reports back through the controller's
//! event channel; [`SelectionController::apply`] is the only place state
//! changes in response to a completion, and it drops any completion whose
//! originating id no longer matches the current selection. A slower, stale
//! response can therefore never overwrite a newer selection's result.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use articheck_providers::{ArticulationSource, SourceError};
use articheck_types::{
    CollegeDirectory, CollegeId, Course, CourseId, InstitutionDirectory, InstitutionId,
    ResolvedMatrix,
};

use crate::cache::ResultCache;
use crate::records::RecordStore;
use crate::resolver;
use crate::search::{self, InstitutionEntry, InstitutionIndex};

/// Delay between a field blur and its list closing, long enough for a
/// pending click-selection to land first.
pub const BLUR_CLOSE_DELAY: Duration = Duration::from_millis(200);

/// Which search field an input event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    University,
    Course,
}

/// Keyboard keys the controller understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKey {
    ArrowDown,
    ArrowUp,
    Enter,
    Escape,
}

/// Per-section loading indicators. Sections load independently; none of
/// these is a global busy flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadingFlags {
    pub institutions: bool,
    pub courses: bool,
    pub articulations: bool,
}

impl LoadingFlags {
    #[must_use]
    pub fn any(self) -> bool {
        self.institutions || self.courses || self.articulations
    }
}

/// Completions delivered back to the controller.
#[derive(Debug)]
pub enum ControllerEvent {
    InstitutionsLoaded(Result<InstitutionDirectory, SourceError>),
    CollegesLoaded(Result<CollegeDirectory, SourceError>),
    CoursesLoaded {
        institution: InstitutionId,
        result: Result<Vec<Course>, SourceError>,
    },
    ArticulationLoaded {
        course: CourseId,
        result: Result<ResolvedMatrix, SourceError>,
    },
    BlurElapsed {
        field: SearchField,
        token: u64,
    },
}

/// A snapshot of the user-visible selection state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionState {
    pub university: Option<(String, InstitutionId)>,
    pub course: Option<(String, CourseId)>,
    pub active_index: isize,
    pub university_search: String,
    pub course_search: String,
}

struct PendingClose {
    token: u64,
    handle: JoinHandle<()>,
}

/// The selection controller. Lives for the session; there is no terminal
/// state.
pub struct SelectionController<S> {
    source: Arc<S>,
    events_tx: mpsc::UnboundedSender<ControllerEvent>,
    events_rx: mpsc::UnboundedReceiver<ControllerEvent>,

    records: RecordStore,
    index: InstitutionIndex,

    university: Option<(String, InstitutionId)>,
    course: Option<(String, CourseId)>,
    courses: Vec<Course>,
    matrix: Option<ResolvedMatrix>,

    university_search: String,
    course_search: String,
    university_list_open: bool,
    course_list_open: bool,
    results_open: bool,
    active_index: isize,

    loading: LoadingFlags,
    last_error: Option<SourceError>,

    course_cache: Arc<ResultCache<InstitutionId, Vec<Course>>>,
    matrix_cache: Arc<ResultCache<CourseId, ResolvedMatrix>>,

    pending_close: Option<PendingClose>,
    blur_token: u64,
    blur_delay: Duration,
}

impl<S: ArticulationSource> SelectionController<S> {
    #[must_use]
    pub fn new(source: S) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            source: Arc::new(source),
            events_tx,
            events_rx,
            records: RecordStore::default(),
            index: InstitutionIndex::default(),
            university: None,
            course: None,
            courses: Vec::new(),
            matrix: None,
            university_search: String::new(),
            course_search: String::new(),
            university_list_open: false,
            course_list_open: false,
            results_open: false,
            active_index: -1,
            loading: LoadingFlags::default(),
            last_error: None,
            course_cache: Arc::new(ResultCache::new()),
            matrix_cache: Arc::new(ResultCache::new()),
            pending_close: None,
            blur_token: 0,
            blur_delay: BLUR_CLOSE_DELAY,
        }
    }

    /// Override the blur close delay (tests shrink it).
    #[must_use]
    pub fn with_blur_delay(mut self, delay: Duration) -> Self {
        self.blur_delay = delay;
        self
    }

    /// Kick off the startup directory loads. Must run inside a tokio
    /// runtime, like every other operation that spawns a fetch.
    pub fn start(&mut self) {
        self.loading.institutions = true;

        let source = Arc::clone(&self.source);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = source.load_institution_directory().await;
            let _ = tx.send(ControllerEvent::InstitutionsLoaded(result));
        });

        let source = Arc::clone(&self.source);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = source.load_college_directory().await;
            let _ = tx.send(ControllerEvent::CollegesLoaded(result));
        });
    }

    // --- Search ---

    /// Institutions matching the current university search text.
    #[must_use]
    pub fn search_institutions(&self) -> Vec<&InstitutionEntry> {
        self.index.search(&self.university_search)
    }

    /// Courses of the selected university matching the current course
    /// search text.
    #[must_use]
    pub fn search_courses(&self) -> Vec<&Course> {
        search::search_courses(&self.course_search, &self.courses)
    }

    pub fn set_university_search(&mut self, text: impl Into<String>) {
        self.university_search = text.into();
        self.university_list_open = true;
    }

    pub fn set_course_search(&mut self, text: impl Into<String>) {
        self.course_search = text.into();
        self.course_list_open = true;
    }

    /// Focusing a field opens its list.
    pub fn focus(&mut self, field: SearchField) {
        match field {
            SearchField::University => self.university_list_open = true,
            SearchField::Course => self.course_list_open = true,
        }
    }

    // --- Selection ---

    /// Select a university. A no-op (beyond closing lists) when `id` is
    /// literally the current selection; otherwise clears the course
    /// selection and displayed matrix and starts loading the course list.
    pub fn select_university(&mut self, name: &str, id: InstitutionId) {
        self.university_list_open = false;
        self.results_open = false;

        let changed = self.university.as_ref().map(|(_, cur)| cur) != Some(&id);
        if changed {
            self.university_search.clear();
            self.course_search.clear();
            self.course = None;
            self.courses.clear();
            self.matrix = None;
            self.university = Some((name.to_string(), id.clone()));
            self.spawn_course_load(id);
        }

        self.cancel_pending_close();
    }

    /// Select a course. Starts the articulation load when `id` differs
    /// from the current selection; opens the results panel either way.
    pub fn select_course(&mut self, code: &str, id: CourseId) {
        self.course_list_open = false;

        let changed = self.course.as_ref().map(|(_, cur)| cur) != Some(&id);
        if changed {
            self.course_search.clear();
            self.matrix = None;
            self.course = Some((code.to_string(), id.clone()));
            self.spawn_articulation_load(id);
        }

        self.results_open = true;
        self.cancel_pending_close();
    }

    /// Full navigation reset: selection, search text, panels, and both
    /// caches. Reference data stays; it is immutable for the process.
    pub fn reset(&mut self) {
        self.cancel_pending_close();
        self.university = None;
        self.course = None;
        self.courses.clear();
        self.matrix = None;
        self.university_search.clear();
        self.course_search.clear();
        self.university_list_open = false;
        self.course_list_open = false;
        self.results_open = false;
        self.active_index = -1;
        self.loading.courses = false;
        self.loading.articulations = false;
        self.last_error = None;
        self.course_cache.clear();
        self.matrix_cache.clear();
    }

    // --- Keyboard ---

    /// Keyboard navigation over whichever list `field` names, operating on
    /// the currently *filtered* entries.
    pub fn navigate(&mut self, key: NavKey, field: SearchField) {
        match key {
            NavKey::ArrowDown | NavKey::ArrowUp => {
                let len = match field {
                    SearchField::University => self.search_institutions().len(),
                    SearchField::Course => self.search_courses().len(),
                } as isize;
                // Wrapping on an empty list would divide by zero.
                if len == 0 {
                    return;
                }
                self.active_index = if key == NavKey::ArrowDown {
                    (self.active_index + 1) % len
                } else {
                    (self.active_index - 1 + len) % len
                };
            }
            NavKey::Enter => {
                if self.active_index > -1 {
                    let idx = self.active_index as usize;
                    match field {
                        SearchField::University => {
                            let picked = self
                                .search_institutions()
                                .get(idx)
                                .map(|entry| (entry.name.clone(), entry.id.clone()));
                            if let Some((name, id)) = picked {
                                self.select_university(&name, id);
                            }
                        }
                        SearchField::Course => {
                            let picked = self
                                .search_courses()
                                .get(idx)
                                .map(|course| (course.code.clone(), course.id.clone()));
                            if let Some((code, id)) = picked {
                                self.select_course(&code, id);
                            }
                        }
                    }
                }
            }
            NavKey::Escape => {
                match field {
                    SearchField::University => self.university_list_open = false,
                    SearchField::Course => self.course_list_open = false,
                }
                self.active_index = -1;
            }
        }
    }

    /// Schedule closing `field`'s list after the blur delay. Starting a new
    /// pending close supersedes any previous one; an explicit selection
    /// cancels it outright.
    pub fn blur(&mut self, field: SearchField) {
        self.cancel_pending_close();
        self.blur_token = self.blur_token.wrapping_add(1);
        let token = self.blur_token;
        let tx = self.events_tx.clone();
        let delay = self.blur_delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(ControllerEvent::BlurElapsed { field, token });
        });
        self.pending_close = Some(PendingClose { token, handle });
    }

    fn cancel_pending_close(&mut self) {
        if let Some(pending) = self.pending_close.take() {
            pending.handle.abort();
        }
    }

    // --- Event processing ---

    /// Next completion event, if the channel is still open.
    pub async fn next_event(&mut self) -> Option<ControllerEvent> {
        self.events_rx.recv().await
    }

    /// Apply events until no section is loading.
    pub async fn process_until_idle(&mut self) {
        while self.loading.any() {
            match self.events_rx.recv().await {
                Some(event) => self.apply(event),
                None => break,
            }
        }
    }

    /// Fold one completion into the state. Stale completions - ones whose
    /// originating id no longer matches the current selection - are
    /// dropped without touching anything.
    pub fn apply(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::InstitutionsLoaded(result) => {
                self.loading.institutions = false;
                match result {
                    Ok(directory) => {
                        self.index = InstitutionIndex::from_directory(&directory);
                        self.records.set_institutions(directory);
                    }
                    Err(error) => {
                        tracing::error!(%error, "failed to load institution directory");
                        self.last_error = Some(error);
                    }
                }
            }
            ControllerEvent::CollegesLoaded(result) => match result {
                Ok(directory) => self.records.set_colleges(directory),
                Err(error) => {
                    tracing::warn!(%error, "college directory unavailable, using id display");
                }
            },
            ControllerEvent::CoursesLoaded {
                institution,
                result,
            } => {
                if self.university.as_ref().map(|(_, id)| id) != Some(&institution) {
                    tracing::debug!(%institution, "dropping stale course list");
                    return;
                }
                self.loading.courses = false;
                match result {
                    Ok(courses) => self.courses = courses,
                    Err(error) => {
                        tracing::error!(%institution, %error, "failed to load courses");
                        self.courses.clear();
                        self.last_error = Some(error);
                    }
                }
            }
            ControllerEvent::ArticulationLoaded { course, result } => {
                if self.course.as_ref().map(|(_, id)| id) != Some(&course) {
                    tracing::debug!(%course, "dropping stale articulation");
                    return;
                }
                self.loading.articulations = false;
                match result {
                    Ok(matrix) => self.matrix = Some(matrix),
                    Err(error) => {
                        tracing::error!(%course, %error, "failed to load articulation");
                        self.matrix = None;
                        self.last_error = Some(error);
                    }
                }
            }
            ControllerEvent::BlurElapsed { field, token } => {
                if self
                    .pending_close
                    .as_ref()
                    .is_some_and(|pending| pending.token == token)
                {
                    self.pending_close = None;
                    match field {
                        SearchField::University => self.university_list_open = false,
                        SearchField::Course => {
                            if self.university.is_some() {
                                self.course_list_open = false;
                            }
                        }
                    }
                    self.active_index = -1;
                }
            }
        }
    }

    fn spawn_course_load(&mut self, institution: InstitutionId) {
        self.loading.courses = true;
        let source = Arc::clone(&self.source);
        let cache = Arc::clone(&self.course_cache);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = cache
                .get_or_fetch(&institution, || {
                    let source = Arc::clone(&source);
                    let institution = institution.clone();
                    async move {
                        let mut courses = source.load_courses(&institution).await?;
                        // Stable sort: ties keep the provider's order.
                        courses.sort_by(|a, b| a.code.cmp(&b.code));
                        Ok(courses)
                    }
                })
                .await;
            let _ = tx.send(ControllerEvent::CoursesLoaded {
                institution,
                result,
            });
        });
    }

    fn spawn_articulation_load(&mut self, course: CourseId) {
        self.loading.articulations = true;
        let source = Arc::clone(&self.source);
        let cache = Arc::clone(&self.matrix_cache);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = cache
                .get_or_fetch(&course, || {
                    let source = Arc::clone(&source);
                    let course = course.clone();
                    async move {
                        let raw = source.load_articulation(&course).await?;
                        Ok(resolver::resolve(&raw))
                    }
                })
                .await;
            let _ = tx.send(ControllerEvent::ArticulationLoaded { course, result });
        });
    }

    // --- State exposed to the presentation layer ---

    #[must_use]
    pub fn selection(&self) -> SelectionState {
        SelectionState {
            university: self.university.clone(),
            course: self.course.clone(),
            active_index: self.active_index,
            university_search: self.university_search.clone(),
            course_search: self.course_search.clone(),
        }
    }

    #[must_use]
    pub fn university(&self) -> Option<&(String, InstitutionId)> {
        self.university.as_ref()
    }

    #[must_use]
    pub fn course(&self) -> Option<&(String, CourseId)> {
        self.course.as_ref()
    }

    /// The selected university's course list (sorted by code).
    #[must_use]
    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    /// The resolved matrix for the selected course, once loaded.
    #[must_use]
    pub fn matrix(&self) -> Option<&ResolvedMatrix> {
        self.matrix.as_ref()
    }

    #[must_use]
    pub fn loading(&self) -> LoadingFlags {
        self.loading
    }

    /// The most recent fetch failure, if any. Cleared by [`Self::reset`].
    #[must_use]
    pub fn last_error(&self) -> Option<&SourceError> {
        self.last_error.as_ref()
    }

    #[must_use]
    pub fn active_index(&self) -> isize {
        self.active_index
    }

    #[must_use]
    pub fn is_list_open(&self, field: SearchField) -> bool {
        match field {
            SearchField::University => self.university_list_open,
            SearchField::Course => self.course_list_open,
        }
    }

    #[must_use]
    pub fn results_open(&self) -> bool {
        self.results_open
    }

    /// Display name for a community college ("ID: <id>" fallback).
    #[must_use]
    pub fn college_name(&self, id: &CollegeId) -> String {
        self.records.college_name(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use articheck_providers::StatusCode;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeSource {
        institutions: InstitutionDirectory,
        colleges: CollegeDirectory,
        courses: HashMap<InstitutionId, Vec<Course>>,
        course_delays: HashMap<InstitutionId, Duration>,
        articulations: HashMap<CourseId, String>,
        course_calls: Arc<AtomicUsize>,
        fail_courses: bool,
    }

    impl ArticulationSource for FakeSource {
        async fn load_institution_directory(&self) -> Result<InstitutionDirectory, SourceError> {
            Ok(self.institutions.clone())
        }

        async fn load_college_directory(&self) -> Result<CollegeDirectory, SourceError> {
            Ok(self.colleges.clone())
        }

        async fn load_courses(
            &self,
            institution: &InstitutionId,
        ) -> Result<Vec<Course>, SourceError> {
            self.course_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.course_delays.get(institution) {
                tokio::time::sleep(*delay).await;
            }
            if self.fail_courses {
                return Err(SourceError::Http {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                });
            }
            Ok(self.courses.get(institution).cloned().unwrap_or_default())
        }

        async fn load_articulation(
            &self,
            course: &CourseId,
        ) -> Result<articheck_types::RawArticulationResponse, SourceError> {
            let raw = self
                .articulations
                .get(course)
                .map(|json| serde_json::from_str(json).unwrap())
                .unwrap_or_default();
            Ok(raw)
        }
    }

    fn directory(pairs: &[(&str, &str)]) -> InstitutionDirectory {
        pairs
            .iter()
            .map(|(id, name)| (InstitutionId::new(*id), (*name).to_string()))
            .collect()
    }

    fn course(id: &str, code: &str, name: &str) -> Course {
        Course {
            id: CourseId::new(id),
            code: code.to_string(),
            name: name.to_string(),
        }
    }

    fn sample_unis() -> InstitutionDirectory {
        directory(&[
            ("1", "University of California, Davis"),
            ("2", "California State University, Long Beach"),
            ("3", "San Jose State University"),
        ])
    }

    /// Controller with directories already applied, no runtime needed.
    fn seeded(source: FakeSource) -> SelectionController<FakeSource> {
        let mut controller = SelectionController::new(source);
        controller.apply(ControllerEvent::InstitutionsLoaded(Ok(sample_unis())));
        controller
    }

    fn drain(controller: &mut SelectionController<FakeSource>) {
        while let Ok(event) = controller.events_rx.try_recv() {
            controller.apply(event);
        }
    }

    #[test]
    fn initial_state_is_idle() {
        let controller = SelectionController::new(FakeSource::default());
        assert!(controller.university().is_none());
        assert!(controller.course().is_none());
        assert_eq!(controller.active_index(), -1);
        assert!(!controller.is_list_open(SearchField::University));
        assert!(!controller.is_list_open(SearchField::Course));
        assert!(!controller.results_open());
        assert!(!controller.loading().any());
    }

    #[test]
    fn arrow_navigation_wraps_both_directions() {
        let mut controller = seeded(FakeSource::default());
        assert_eq!(controller.search_institutions().len(), 3);

        // From the -1 sentinel, ArrowDown lands on the first entry.
        controller.navigate(NavKey::ArrowDown, SearchField::University);
        assert_eq!(controller.active_index(), 0);

        controller.navigate(NavKey::ArrowDown, SearchField::University);
        controller.navigate(NavKey::ArrowDown, SearchField::University);
        assert_eq!(controller.active_index(), 2);

        // Wrap past the end...
        controller.navigate(NavKey::ArrowDown, SearchField::University);
        assert_eq!(controller.active_index(), 0);

        // ...and back around the start.
        controller.navigate(NavKey::ArrowUp, SearchField::University);
        assert_eq!(controller.active_index(), 2);
    }

    #[test]
    fn arrows_on_empty_list_are_noops() {
        let mut controller = seeded(FakeSource::default());
        // No university selected, so the course list is empty.
        controller.navigate(NavKey::ArrowDown, SearchField::Course);
        controller.navigate(NavKey::ArrowUp, SearchField::Course);
        assert_eq!(controller.active_index(), -1);
    }

    #[test]
    fn escape_closes_list_and_resets_index() {
        let mut controller = seeded(FakeSource::default());
        controller.focus(SearchField::University);
        controller.navigate(NavKey::ArrowDown, SearchField::University);
        assert_eq!(controller.active_index(), 0);

        controller.navigate(NavKey::Escape, SearchField::University);
        assert!(!controller.is_list_open(SearchField::University));
        assert_eq!(controller.active_index(), -1);
    }

    #[tokio::test]
    async fn enter_selects_from_the_filtered_list() {
        let mut controller = seeded(FakeSource::default());
        controller.set_university_search("uc davis");
        assert_eq!(controller.search_institutions().len(), 1);

        controller.navigate(NavKey::ArrowDown, SearchField::University);
        controller.navigate(NavKey::Enter, SearchField::University);

        let (name, id) = controller.university().unwrap();
        assert_eq!(name, "University of California, Davis");
        assert_eq!(id, &InstitutionId::new("1"));
        assert!(!controller.is_list_open(SearchField::University));
        // Selecting a new university clears its search text.
        assert_eq!(controller.selection().university_search, "");

        controller.process_until_idle().await;
    }

    #[test]
    fn enter_without_highlight_is_a_noop() {
        let mut controller = seeded(FakeSource::default());
        controller.set_university_search("");
        controller.navigate(NavKey::Enter, SearchField::University);
        assert!(controller.university().is_none());
    }

    #[tokio::test]
    async fn course_list_is_sorted_by_code_with_stable_ties() {
        let uni = InstitutionId::new("1");
        let source = FakeSource {
            institutions: sample_unis(),
            courses: [(
                uni.clone(),
                vec![
                    course("c3", "MATH 2", "Later"),
                    course("c1", "MATH 1", "Second of tie"),
                    course("c2", "MATH 1", "First of tie"),
                ],
            )]
            .into_iter()
            .collect(),
            ..FakeSource::default()
        };
        // Provider order is c3, c1, c2; the stable sort must keep c1
        // ahead of c2 inside the "MATH 1" tie.
        let mut controller = seeded(source);
        controller.select_university("University of California, Davis", uni);
        controller.process_until_idle().await;

        let codes: Vec<(&str, &str)> = controller
            .courses()
            .iter()
            .map(|c| (c.code.as_str(), c.id.as_str()))
            .collect();
        assert_eq!(
            codes,
            [("MATH 1", "c1"), ("MATH 1", "c2"), ("MATH 2", "c3")]
        );
    }

    #[tokio::test]
    async fn selecting_new_university_clears_course_state() {
        let a = InstitutionId::new("1");
        let b = InstitutionId::new("2");
        let source = FakeSource {
            institutions: sample_unis(),
            courses: [
                (a.clone(), vec![course("c1", "MATH 1", "Calc")]),
                (b.clone(), vec![course("c9", "BIO 1", "Bio")]),
            ]
            .into_iter()
            .collect(),
            ..FakeSource::default()
        };
        let mut controller = seeded(source);

        controller.select_university("University of California, Davis", a);
        controller.process_until_idle().await;
        controller.select_course("MATH 1", CourseId::new("c1"));
        controller.process_until_idle().await;
        assert!(controller.results_open());
        assert!(controller.course().is_some());

        controller.select_university("California State University, Long Beach", b);
        assert!(controller.course().is_none());
        assert!(controller.matrix().is_none());
        assert!(!controller.results_open());
        assert_eq!(controller.selection().course_search, "");

        controller.process_until_idle().await;
        assert_eq!(controller.courses()[0].code, "BIO 1");
    }

    #[tokio::test]
    async fn reselecting_same_university_keeps_course_selection() {
        let a = InstitutionId::new("1");
        let source = FakeSource {
            institutions: sample_unis(),
            courses: [(a.clone(), vec![course("c1", "MATH 1", "Calc")])]
                .into_iter()
                .collect(),
            ..FakeSource::default()
        };
        let calls = Arc::clone(&source.course_calls);
        let mut controller = seeded(source);

        controller.select_university("University of California, Davis", a.clone());
        controller.process_until_idle().await;
        controller.select_course("MATH 1", CourseId::new("c1"));
        controller.process_until_idle().await;

        // Same id again: closes panels, but the guard is literal id
        // equality, so nothing reloads and the course stays selected.
        controller.select_university("University of California, Davis", a);
        assert!(controller.course().is_some());
        assert!(!controller.results_open());
        drain(&mut controller);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_course_response_cannot_overwrite_newer_selection() {
        let a = InstitutionId::new("1");
        let b = InstitutionId::new("2");
        let source = FakeSource {
            institutions: sample_unis(),
            courses: [
                (a.clone(), vec![course("c1", "OLD 1", "Stale")]),
                (b.clone(), vec![course("c9", "NEW 1", "Fresh")]),
            ]
            .into_iter()
            .collect(),
            course_delays: [
                (a.clone(), Duration::from_millis(300)),
                (b.clone(), Duration::from_millis(10)),
            ]
            .into_iter()
            .collect(),
            ..FakeSource::default()
        };
        let mut controller = seeded(source);

        controller.select_university("University of California, Davis", a);
        controller.select_university("California State University, Long Beach", b.clone());

        // The fast response for B arrives first and applies.
        let event = controller.next_event().await.unwrap();
        controller.apply(event);
        assert_eq!(controller.courses()[0].code, "NEW 1");
        assert!(!controller.loading().courses);

        // The slow response for A arrives second and must be dropped.
        let event = controller.next_event().await.unwrap();
        controller.apply(event);
        assert_eq!(controller.university().unwrap().1, b);
        assert_eq!(controller.courses()[0].code, "NEW 1");
    }

    #[tokio::test]
    async fn reselecting_a_cached_university_does_not_refetch() {
        let a = InstitutionId::new("1");
        let b = InstitutionId::new("2");
        let source = FakeSource {
            institutions: sample_unis(),
            courses: [
                (a.clone(), vec![course("c1", "MATH 1", "Calc")]),
                (b.clone(), vec![course("c9", "BIO 1", "Bio")]),
            ]
            .into_iter()
            .collect(),
            ..FakeSource::default()
        };
        let calls = Arc::clone(&source.course_calls);
        let mut controller = seeded(source);

        controller.select_university("University of California, Davis", a.clone());
        controller.process_until_idle().await;
        controller.select_university("California State University, Long Beach", b);
        controller.process_until_idle().await;
        controller.select_university("University of California, Davis", a);
        controller.process_until_idle().await;

        assert_eq!(controller.courses()[0].code, "MATH 1");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn course_fetch_failure_surfaces_empty_list_and_error() {
        let source = FakeSource {
            institutions: sample_unis(),
            fail_courses: true,
            ..FakeSource::default()
        };
        let mut controller = seeded(source);

        controller.select_university("University of California, Davis", InstitutionId::new("1"));
        controller.process_until_idle().await;

        assert!(controller.courses().is_empty());
        assert!(matches!(
            controller.last_error(),
            Some(SourceError::Http { .. })
        ));
        assert!(!controller.loading().courses);
    }

    #[tokio::test]
    async fn articulation_resolves_through_the_cache() {
        let uni = InstitutionId::new("1");
        let course_id = CourseId::new("c1");
        let source = FakeSource {
            institutions: sample_unis(),
            courses: [(uni.clone(), vec![course("c1", "MATH 21A", "Calc")])]
                .into_iter()
                .collect(),
            articulations: [(
                course_id.clone(),
                r#"[
                    {"61": "{\"items\":[{\"items\":[\"x1\"]}]}"},
                    {"x1": {"course_code": "MATH 1A", "course_name": "Calculus I"}}
                ]"#
                .to_string(),
            )]
            .into_iter()
            .collect(),
            ..FakeSource::default()
        };
        let mut controller = seeded(source);

        controller.select_university("University of California, Davis", uni);
        controller.process_until_idle().await;
        controller.select_course("MATH 21A", course_id);
        assert!(controller.loading().articulations);
        controller.process_until_idle().await;

        let matrix = controller.matrix().unwrap();
        let groups = matrix.groups_for(&CollegeId::new("61")).unwrap();
        assert_eq!(groups[0][0].code, "MATH 1A");
        assert!(controller.results_open());
    }

    #[tokio::test(start_paused = true)]
    async fn blur_closes_list_after_the_delay() {
        let mut controller = seeded(FakeSource::default());
        controller.focus(SearchField::University);
        controller.navigate(NavKey::ArrowDown, SearchField::University);

        controller.blur(SearchField::University);
        let event = controller.next_event().await.unwrap();
        controller.apply(event);

        assert!(!controller.is_list_open(SearchField::University));
        assert_eq!(controller.active_index(), -1);
    }

    #[tokio::test(start_paused = true)]
    async fn newer_blur_supersedes_the_pending_close() {
        let mut controller = seeded(FakeSource::default());
        controller.focus(SearchField::University);

        controller.blur(SearchField::University);
        controller.blur(SearchField::University);

        // Only the second timer survives; its expiry closes the list.
        let event = controller.next_event().await.unwrap();
        controller.apply(event);
        assert!(!controller.is_list_open(SearchField::University));

        // Nothing further is pending.
        assert!(controller.events_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn selection_cancels_a_pending_blur_close() {
        let mut controller = seeded(FakeSource::default());
        controller.focus(SearchField::University);
        controller.navigate(NavKey::ArrowDown, SearchField::University);
        assert_eq!(controller.active_index(), 0);

        controller.blur(SearchField::University);
        controller.select_university("University of California, Davis", InstitutionId::new("1"));

        // Let the (canceled) blur deadline pass, then drain completions.
        tokio::time::sleep(BLUR_CLOSE_DELAY * 2).await;
        controller.process_until_idle().await;
        drain(&mut controller);

        // The blur never fired: the highlight index survived.
        assert_eq!(controller.active_index(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn course_blur_without_university_keeps_list_open() {
        let mut controller = seeded(FakeSource::default());
        controller.focus(SearchField::Course);

        controller.blur(SearchField::Course);
        let event = controller.next_event().await.unwrap();
        controller.apply(event);

        // No university selected: the course list stays open, but the
        // highlight still resets.
        assert!(controller.is_list_open(SearchField::Course));
        assert_eq!(controller.active_index(), -1);
    }

    #[tokio::test]
    async fn reset_clears_selection_and_both_caches() {
        let a = InstitutionId::new("1");
        let source = FakeSource {
            institutions: sample_unis(),
            courses: [(a.clone(), vec![course("c1", "MATH 1", "Calc")])]
                .into_iter()
                .collect(),
            ..FakeSource::default()
        };
        let calls = Arc::clone(&source.course_calls);
        let mut controller = seeded(source);

        controller.select_university("University of California, Davis", a.clone());
        controller.process_until_idle().await;
        controller.reset();
        assert!(controller.university().is_none());
        assert!(controller.courses().is_empty());

        // The cache reset makes the next selection fetch again.
        controller.select_university("University of California, Davis", a);
        controller.process_until_idle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn startup_loads_directories_and_builds_the_index() {
        let source = FakeSource {
            institutions: sample_unis(),
            colleges: [(CollegeId::new("61"), "De Anza College".to_string())]
                .into_iter()
                .collect(),
            ..FakeSource::default()
        };
        let mut controller = SelectionController::new(source);
        controller.start();
        assert!(controller.loading().institutions);
        controller.process_until_idle().await;
        drain(&mut controller);

        assert_eq!(controller.search_institutions().len(), 3);
        assert_eq!(
            controller.college_name(&CollegeId::new("61")),
            "De Anza College"
        );
        assert_eq!(controller.college_name(&CollegeId::new("99")), "ID: 99");
    }

    #[test]
    fn directory_failure_degrades_without_blocking() {
        let mut controller = SelectionController::new(FakeSource::default());
        controller.apply(ControllerEvent::InstitutionsLoaded(Err(
            SourceError::Http {
                status: StatusCode::SERVICE_UNAVAILABLE,
            },
        )));
        controller.apply(ControllerEvent::CollegesLoaded(Err(SourceError::Http {
            status: StatusCode::SERVICE_UNAVAILABLE,
        })));

        assert!(!controller.loading().institutions);
        assert!(controller.search_institutions().is_empty());
        assert!(controller.last_error().is_some());
        // College names still render, just degraded.
        assert_eq!(controller.college_name(&CollegeId::new("61")), "ID: 61");
    }
}
