use std::time::{Duration, Instant};

/// Turns raw "page entered the viewport" observations into the pages that
/// should actually be navigated to.
///
/// With a zero window every observation passes straight through. Otherwise
/// only the latest observation survives until the window elapses. The first
/// and last page always pass through immediately.
#[derive(Debug)]
pub struct ScrollTracker {
    window: Duration,
    page_count: usize,
    pending: Option<(usize, Instant)>,
}

impl ScrollTracker {
    pub fn new(window: Duration, page_count: usize) -> Self {
        Self {
            window,
            page_count,
            pending: None,
        }
    }

    /// Records an observation. Returns the page to apply now, if any.
    pub fn observe(&mut self, page: usize, now: Instant) -> Option<usize> {
        if page < 1 || page > self.page_count {
            return None;
        }
        if self.window.is_zero() || page == 1 || page == self.page_count {
            self.pending = None;
            return Some(page);
        }
        // The window starts at the first observation of a burst.
        let since = self.pending.map_or(now, |(_, since)| since);
        self.pending = Some((page, since));
        None
    }

    /// Releases the pending observation once its window has elapsed.
    pub fn flush(&mut self, now: Instant) -> Option<usize> {
        match self.pending {
            Some((page, since)) if now.duration_since(since) >= self.window => {
                self.pending = None;
                Some(page)
            }
            _ => None,
        }
    }

    /// Forgets the pending observation.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_none()
    }
}
