use std::error::Error;
use derive_more::with_trait::Display;
use log::{info, warn};
use crate::modules::session::{ReaderSession, SessionContext};
use crate::modules::types::DimensionsResponse;

/// Identifies the metadata request of one `open` call.
#[derive(Debug, Clone, Display, PartialEq, Eq)]
#[display("session {session_id} ({title_id}/{entry_id})")]
pub struct LoadTicket {
    session_id: u64,
    title_id: String,
    entry_id: String,
}

impl LoadTicket {
    pub fn session_id(&self) -> u64 {
        self.session_id
    }
}

/// The reader view: holds the one live session, if any.
pub struct ReaderView {
    context: SessionContext,
    next_id: u64,
    session: Option<ReaderSession>,
}

impl ReaderView {
    pub fn new(context: SessionContext) -> Self {
        Self {
            context,
            next_id: 1,
            session: None,
        }
    }

    /// Discards the current session and starts a fresh one in the loading state.
    pub fn open(&mut self, title_id: &str, entry_id: &str, page: usize) -> LoadTicket {
        let session_id = self.next_id;
        self.next_id += 1;
        info!("Opening {title_id}/{entry_id} at page {page} as session {session_id}");
        self.session = Some(ReaderSession::new(
            session_id,
            title_id,
            entry_id,
            page,
            self.context.clone(),
        ));
        LoadTicket {
            session_id,
            title_id: title_id.to_string(),
            entry_id: entry_id.to_string(),
        }
    }

    /// Issues the metadata request for a ticket.
    pub fn fetch(&self, ticket: &LoadTicket) -> Result<DimensionsResponse, Box<dyn Error>> {
        self.context.backend.dimensions(&ticket.title_id, &ticket.entry_id)
    }

    /// Hands a metadata result to the session it was requested for.
    /// Results for a session that is no longer live are dropped.
    pub fn deliver(&mut self, ticket: &LoadTicket, result: Result<DimensionsResponse, Box<dyn Error>>) -> bool {
        match self.session.as_mut() {
            Some(session) if session.id() == ticket.session_id => {
                session.apply_dimensions(result);
                true
            }
            _ => {
                warn!("Dropping stale page dimensions for {ticket}");
                false
            }
        }
    }

    pub fn open_and_load(&mut self, title_id: &str, entry_id: &str, page: usize) -> Option<&mut ReaderSession> {
        let ticket = self.open(title_id, entry_id, page);
        let result = self.fetch(&ticket);
        self.deliver(&ticket, result);
        self.session.as_mut()
    }

    pub fn session(&self) -> Option<&ReaderSession> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut ReaderSession> {
        self.session.as_mut()
    }

    /// Drops the live session, e.g. once it has navigated away.
    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            info!("Closing session {} ({})", session.id(), session.state());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::session::SessionState;
    use crate::modules::session::tests::{FakeBackend, MemoryStore};
    use crate::modules::types::{Dimension, Viewport};
    use std::rc::Rc;
    use std::time::Duration;

    fn view(backend: Rc<FakeBackend>) -> ReaderView {
        ReaderView::new(SessionContext {
            backend,
            store: Rc::new(MemoryStore::default()),
            viewport: Viewport::new(1280, 800),
            scroll_window: Duration::ZERO,
        })
    }

    fn dims(count: usize) -> DimensionsResponse {
        DimensionsResponse {
            success: true,
            dimensions: vec![Dimension { width: 800, height: 1200 }; count],
            ..DimensionsResponse::default()
        }
    }

    #[test]
    fn open_and_load_reaches_ready() {
        let backend = Rc::new(FakeBackend::with_response(dims(7)));
        let mut view = view(backend);
        let session = view.open_and_load("t1", "e1", 3).unwrap();
        assert!(session.is_ready());
        assert_eq!(session.current_index(), 3);
        assert_eq!(session.pages().len(), 7);
    }

    #[test]
    fn late_result_for_previous_entry_is_dropped() {
        let backend = Rc::new(FakeBackend::with_response(dims(7)));
        let mut view = view(backend);

        let first = view.open("t1", "e1", 1);
        let second = view.open("t1", "e2", 1);
        assert_ne!(first.session_id(), second.session_id());

        assert!(!view.deliver(&first, Ok(dims(40))));
        assert_eq!(*view.session().unwrap().state(), SessionState::Loading);

        assert!(view.deliver(&second, Ok(dims(12))));
        let session = view.session().unwrap();
        assert_eq!(session.entry_id(), "e2");
        assert_eq!(session.pages().len(), 12);
    }

    #[test]
    fn delivered_failure_body_fails_the_load() {
        let backend = Rc::new(FakeBackend::with_response(dims(3)));
        let mut view = view(backend);
        let ticket = view.open("t1", "e1", 1);
        let body = DimensionsResponse {
            success: false,
            error: Some("not found".to_string()),
            ..dims(3)
        };
        assert!(view.deliver(&ticket, Ok(body)));
        assert_eq!(
            *view.session().unwrap().state(),
            SessionState::LoadFailed("Failed to get the page dimensions. not found".to_string())
        );
    }

    #[test]
    fn close_drops_the_session() {
        let backend = Rc::new(FakeBackend::with_response(dims(2)));
        let mut view = view(backend);
        let ticket = view.open("t1", "e1", 1);
        view.close();
        assert!(view.session().is_none());
        assert!(!view.deliver(&ticket, Ok(dims(2))));
    }
}
