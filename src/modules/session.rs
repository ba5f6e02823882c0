use std::collections::HashSet;
use std::error::Error;
use std::rc::Rc;
use std::time::{Duration, Instant};
use derive_more::with_trait::Display;
use log::{debug, error, info, warn};
use crate::modules::backend::{ApiError, Backend};
use crate::modules::preferences::{PreferenceStore, Preferences};
use crate::modules::tracking::ScrollTracker;
use crate::modules::types::{
    AlertLevel, DimensionsResponse, FlipDirection, Page, PreferredMode, ReadingMode, SessionEvent,
    Viewport,
};

/// Minimum page distance from the last synced page before a sync fires.
pub const SYNC_DISTANCE: usize = 5;

/// Mean height/width ratio above which an entry counts as long-form.
pub const LONG_FORM_RATIO: f64 = 2.0;

/// How long the flip indicator stays raised.
pub const FLIP_INDICATOR: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Display, PartialEq, Eq)]
pub enum SessionState {
    #[display("loading")]
    Loading,
    #[display("ready")]
    Ready,
    #[display("load-failed: {_0}")]
    LoadFailed(String),
    #[display("closed")]
    Closed,
}

#[derive(Debug, Clone, Copy, Display, PartialEq, Eq)]
pub enum FlipOutcome {
    #[display("moved to {_0}")]
    Moved(usize),
    #[display("boundary")]
    Boundary,
    #[display("ignored")]
    Ignored,
}

/// Everything a session borrows from the view that opens it.
#[derive(Clone)]
pub struct SessionContext {
    pub backend: Rc<dyn Backend>,
    pub store: Rc<dyn PreferenceStore>,
    pub viewport: Viewport,
    pub scroll_window: Duration,
}

/// Reading position and progress sync for one (title, entry).
pub struct ReaderSession {
    id: u64,
    title_id: String,
    entry_id: String,
    state: SessionState,
    pages: Vec<Page>,
    current: usize,
    target: usize,
    mode: ReadingMode,
    long_form: bool,
    last_synced: usize,
    margin: u32,
    viewport: Viewport,
    preferences: Preferences,
    context: SessionContext,
    tracker: Option<ScrollTracker>,
    prefetched: HashSet<usize>,
    flip: Option<(FlipDirection, Instant)>,
    events: Vec<SessionEvent>,
}

impl ReaderSession {
    /// `target_page` is where reading resumes, usually the server-side progress.
    pub fn new(
        id: u64,
        title_id: impl Into<String>,
        entry_id: impl Into<String>,
        target_page: usize,
        context: SessionContext,
    ) -> Self {
        let preferences = match context.store.load() {
            Ok(p) => p,
            Err(e) => {
                warn!("Cannot read preferences, using defaults: {e}");
                Preferences::default()
            }
        };
        let target = target_page.max(1);
        Self {
            id,
            title_id: title_id.into(),
            entry_id: entry_id.into(),
            state: SessionState::Loading,
            pages: Vec::new(),
            current: target,
            target,
            mode: ReadingMode::resolve(preferences.mode, context.viewport),
            long_form: false,
            last_synced: target,
            margin: preferences.margin,
            viewport: context.viewport,
            preferences,
            context,
            tracker: None,
            prefetched: HashSet::new(),
            flip: None,
            events: Vec::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn title_id(&self) -> &str {
        &self.title_id
    }

    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn mode(&self) -> ReadingMode {
        self.mode
    }

    pub fn is_long_form(&self) -> bool {
        self.long_form
    }

    pub fn last_synced_index(&self) -> usize {
        self.last_synced
    }

    pub fn margin(&self) -> u32 {
        self.margin
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    /// Drains the side effects produced since the last call.
    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    /// Fetches the page dimensions and applies them.
    pub fn load(&mut self) {
        let result = self.context.backend.dimensions(&self.title_id, &self.entry_id);
        self.apply_dimensions(result);
    }

    /// Applies a metadata result. Only the first result of a loading session counts.
    pub fn apply_dimensions(&mut self, result: Result<DimensionsResponse, Box<dyn Error>>) {
        if self.state != SessionState::Loading {
            warn!("Ignoring page dimensions for {}/{}: session is {}", self.title_id, self.entry_id, self.state);
            return;
        }

        let (resp, pages) = match result.and_then(|resp| self.build_pages(&resp).map(|pages| (resp, pages))) {
            Ok(loaded) => loaded,
            Err(e) => {
                let message = format!("Failed to get the page dimensions. {e}");
                error!("{message}");
                self.alert(AlertLevel::Danger, message.clone());
                self.state = SessionState::LoadFailed(message);
                return;
            }
        };

        self.long_form = is_long_form(&pages);
        self.pages = pages;
        self.mode = ReadingMode::resolve(self.preferences.mode, self.viewport);
        self.margin = resp.margin.unwrap_or(self.preferences.margin);
        self.current = self.target.clamp(1, self.pages.len());
        self.state = SessionState::Ready;
        info!(
            "Loaded {}/{}: {} pages, mode={}, long_form={}",
            self.title_id,
            self.entry_id,
            self.pages.len(),
            self.mode,
            self.long_form
        );

        self.to_page(self.target);
        self.arm_tracking();
    }

    fn build_pages(&self, resp: &DimensionsResponse) -> Result<Vec<Page>, Box<dyn Error>> {
        if !resp.success {
            return Err(ApiError::application(resp.error.clone()).into());
        }
        if resp.dimensions.is_empty() {
            return Err("the entry has no pages".into());
        }
        let mut pages = Vec::with_capacity(resp.dimensions.len());
        for (i, dimension) in resp.dimensions.iter().enumerate() {
            let index = i + 1;
            let url = self.context.backend.page_url(&self.title_id, &self.entry_id, index)?;
            pages.push(Page::new(index, url, *dimension));
        }
        Ok(pages)
    }

    fn arm_tracking(&mut self) {
        self.tracker = match self.mode {
            ReadingMode::Continuous => Some(ScrollTracker::new(self.context.scroll_window, self.pages.len())),
            _ => None,
        };
    }

    /// Jumps to a page. Paged modes clamp, continuous mode ignores pages that don't exist.
    pub fn to_page(&mut self, idx: usize) {
        if !self.is_ready() {
            return;
        }
        let idx = if self.mode.is_paged() {
            idx.clamp(1, self.pages.len())
        } else if (1..=self.pages.len()).contains(&idx) {
            idx
        } else {
            debug!("No page {idx} to scroll to");
            return;
        };
        // An explicit jump supersedes any scroll observation still waiting.
        if let Some(tracker) = self.tracker.as_mut() {
            tracker.cancel();
        }
        self.navigate(idx);
    }

    fn navigate(&mut self, idx: usize) {
        self.current = idx;
        self.sync_progress(idx);
        self.events.push(SessionEvent::HistoryReplaced(self.history_path()));
    }

    /// Turns one page. With right-to-left reading `forward` means the previous page.
    pub fn flip_page(&mut self, forward: bool) -> FlipOutcome {
        if !self.is_ready() || !self.mode.is_paged() {
            return FlipOutcome::Ignored;
        }

        let is_next = forward != self.preferences.enable_right_to_left;
        let new_index = if is_next { self.current + 1 } else { self.current - 1 };
        if new_index < 1 {
            return FlipOutcome::Ignored;
        }
        if new_index > self.pages.len() {
            info!("Reached the end of {}/{}", self.title_id, self.entry_id);
            self.events.push(SessionEvent::BoundaryReached { page: self.current });
            return FlipOutcome::Boundary;
        }

        self.to_page(new_index);
        if self.preferences.enable_flip_animation {
            let direction = if forward { FlipDirection::Right } else { FlipDirection::Left };
            self.flip = Some((direction, Instant::now()));
        }
        self.prefetch_after(new_index);
        FlipOutcome::Moved(new_index)
    }

    fn prefetch_after(&mut self, idx: usize) {
        let last = (idx + self.preferences.preload_lookahead).min(self.pages.len());
        for page in idx + 1..=last {
            if !self.prefetched.insert(page) {
                continue;
            }
            let url = self.pages[page - 1].url.clone();
            self.events.push(SessionEvent::Prefetch { page, url });
        }
    }

    /// The direction of the last flip, while its indicator is still up at `now`.
    pub fn flip_indicator_at(&self, now: Instant) -> Option<FlipDirection> {
        match self.flip {
            Some((direction, raised)) if now.saturating_duration_since(raised) < FLIP_INDICATOR => Some(direction),
            _ => None,
        }
    }

    /// Writes progress if the throttle allows it. Returns whether a write was issued.
    pub fn sync_progress(&mut self, idx: usize) -> bool {
        if !self.is_ready() || !(1..=self.pages.len()).contains(&idx) || !self.should_sync(idx) {
            return false;
        }
        self.push_progress(idx);
        true
    }

    fn should_sync(&self, idx: usize) -> bool {
        idx.abs_diff(self.last_synced) >= SYNC_DISTANCE
            || self.long_form
            || idx == 1
            || idx == self.pages.len()
    }

    fn push_progress(&mut self, idx: usize) {
        // Optimistic: a failed write is not rolled back.
        self.last_synced = idx;
        match self.context.backend.save_progress(&self.title_id, &self.entry_id, idx) {
            Ok(()) => debug!("Saved progress {}/{} at page {idx}", self.title_id, self.entry_id),
            Err(e) => {
                error!("Cannot save progress at page {idx}: {e}");
                self.alert(AlertLevel::Danger, e.to_string());
            }
        }
    }

    /// A page entered the viewport (continuous mode only).
    pub fn page_in_view(&mut self, idx: usize, now: Instant) {
        if !self.is_ready() || self.mode.is_paged() {
            return;
        }
        if let Some(page) = self.tracker.as_mut().and_then(|t| t.observe(idx, now)) {
            self.navigate(page);
        }
    }

    /// Applies a coalesced scroll observation whose window has elapsed.
    pub fn flush_scroll(&mut self, now: Instant) {
        if !self.is_ready() {
            return;
        }
        if let Some(page) = self.tracker.as_mut().and_then(|t| t.flush(now)) {
            self.navigate(page);
        }
    }

    /// Records the last page, then navigates away once the write has completed.
    pub fn exit_or_advance(&mut self, target_url: &str) -> bool {
        if !self.is_ready() {
            return false;
        }
        // Pending scroll observations must not be applied after the forced sync.
        self.tracker = None;
        let last = self.pages.len();
        self.current = last;
        self.push_progress(last);
        info!("Leaving {}/{} for {target_url}", self.title_id, self.entry_id);
        self.events.push(SessionEvent::Navigate(target_url.to_string()));
        self.state = SessionState::Closed;
        true
    }

    pub fn set_mode(&mut self, mode: PreferredMode) {
        self.preferences.mode = mode;
        self.persist_preferences();
        self.mode = ReadingMode::resolve(mode, self.viewport);
        if !self.is_ready() {
            return;
        }
        self.arm_tracking();
        self.to_page(self.current);
    }

    /// Viewport changes only matter to the paged modes.
    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        if self.mode.is_paged() {
            self.mode = ReadingMode::resolve(self.preferences.mode, viewport);
        }
    }

    pub fn set_margin(&mut self, margin: u32) {
        self.preferences.margin = margin;
        self.margin = margin;
        self.persist_preferences();
    }

    pub fn set_preload_lookahead(&mut self, lookahead: usize) {
        self.preferences.preload_lookahead = lookahead;
        self.persist_preferences();
    }

    pub fn set_flip_animation(&mut self, enabled: bool) {
        self.preferences.enable_flip_animation = enabled;
        if !enabled {
            self.flip = None;
        }
        self.persist_preferences();
    }

    pub fn set_right_to_left(&mut self, enabled: bool) {
        self.preferences.enable_right_to_left = enabled;
        self.persist_preferences();
    }

    fn persist_preferences(&mut self) {
        if let Err(e) = self.context.store.save(&self.preferences) {
            error!("Cannot save preferences: {e}");
            self.alert(AlertLevel::Danger, format!("Failed to save the preferences. {e}"));
        }
    }

    pub fn progress_label(&self) -> String {
        let count = self.pages.len().max(1);
        let percent = self.current as f64 / count as f64 * 100.0;
        format!("Progress: {}/{} ({percent:.1}%)", self.current, self.pages.len())
    }

    /// The reader address for the current page.
    pub fn history_path(&self) -> String {
        format!("/reader/{}/{}/{}", self.title_id, self.entry_id, self.current)
    }

    fn alert(&mut self, level: AlertLevel, message: String) {
        self.events.push(SessionEvent::Alert { level, message });
    }
}

fn is_long_form(pages: &[Page]) -> bool {
    let ratios: Vec<f64> = pages.iter().filter_map(|p| p.dimension().ratio()).collect();
    if ratios.is_empty() {
        return false;
    }
    ratios.iter().sum::<f64>() / ratios.len() as f64 > LONG_FORM_RATIO
}
