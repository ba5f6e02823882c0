use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use reader_client::modules::backend::{Backend, HttpBackend, ProgressMethod};
use reader_client::modules::library::{router, Entry, LibraryFile, LibraryState, PageSource, Title};
use reader_client::modules::preferences::TomlPreferenceStore;
use reader_client::modules::session::{SessionContext, SessionState};
use reader_client::modules::types::{SessionEvent, Viewport};
use reader_client::modules::view::ReaderView;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("reader-client-it-{}-{name}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn library(pages: usize) -> LibraryFile {
    LibraryFile {
        titles: vec![Title {
            id: "t1".to_string(),
            entries: vec![Entry {
                id: "e1".to_string(),
                margin: Some(10),
                pages: (1..=pages)
                    .map(|i| PageSource {
                        width: 800,
                        height: 1200,
                        file: (i == 2).then(|| PathBuf::from("002.png")),
                    })
                    .collect(),
            }],
        }],
    }
}

/// Runs the library server on its own runtime thread and returns its base url.
fn spawn_server(state: LibraryState) -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(state);
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });
    format!("http://{addr}/")
}

fn paged_view(base: &str, dir: &PathBuf, method: ProgressMethod) -> ReaderView {
    let prefs = dir.join("preferences.toml");
    fs::write(&prefs, "mode = \"paged\"\n").unwrap();
    ReaderView::new(SessionContext {
        backend: Rc::new(HttpBackend::new(base).with_progress_method(method)),
        store: Rc::new(TomlPreferenceStore::new(prefs)),
        viewport: Viewport::new(1280, 800),
        scroll_window: Duration::ZERO,
    })
}

#[test]
fn session_reads_and_saves_through_http() {
    let dir = scratch_dir("session");
    let state = LibraryState::new(library(20), &dir);
    let base = spawn_server(state.clone());
    let mut view = paged_view(&base, &dir, ProgressMethod::Put);

    let session = view.open_and_load("t1", "e1", 10).unwrap();
    assert_eq!(*session.state(), SessionState::Ready);
    assert_eq!(session.pages().len(), 20);
    assert_eq!(session.margin(), 10);
    assert_eq!(session.pages()[0].url(), format!("{base}api/page/t1/e1/1"));
    assert_eq!(state.progress("t1", "e1"), None);

    assert!(!session.sync_progress(14));
    assert_eq!(state.progress("t1", "e1"), None);
    assert!(session.sync_progress(15));
    assert_eq!(state.progress("t1", "e1"), Some(15));

    assert!(session.exit_or_advance("/reader/t1/e2/1"));
    assert_eq!(state.progress("t1", "e1"), Some(20));
    let events = session.take_events();
    assert_eq!(events.last(), Some(&SessionEvent::Navigate("/reader/t1/e2/1".to_string())));
    assert!(!events.iter().any(|e| matches!(e, SessionEvent::Alert { .. })));
}

#[test]
fn unknown_entry_fails_to_load() {
    let dir = scratch_dir("unknown");
    let base = spawn_server(LibraryState::new(library(3), &dir));
    let mut view = paged_view(&base, &dir, ProgressMethod::Put);

    let session = view.open_and_load("t1", "missing", 1).unwrap();
    assert_eq!(
        *session.state(),
        SessionState::LoadFailed("Failed to get the page dimensions. not found".to_string())
    );
}

#[test]
fn progress_can_be_posted() {
    let dir = scratch_dir("post");
    let state = LibraryState::new(library(8), &dir);
    let base = spawn_server(state.clone());
    let backend = HttpBackend::new(&base).with_progress_method(ProgressMethod::Post);

    backend.save_progress("t1", "e1", 8).unwrap();
    assert_eq!(state.progress("t1", "e1"), Some(8));
}

#[test]
fn progress_errors_come_back_as_messages() {
    let dir = scratch_dir("range");
    let base = spawn_server(LibraryState::new(library(8), &dir));
    let backend = HttpBackend::new(&base);

    let err = backend.save_progress("t1", "e1", 9).unwrap_err();
    assert_eq!(err.to_string(), "page out of range");
    let err = backend.save_progress("t1", "nope", 1).unwrap_err();
    assert_eq!(err.to_string(), "not found");
}

#[test]
fn prefetch_reads_page_images() {
    let dir = scratch_dir("images");
    fs::write(dir.join("002.png"), b"not really a png").unwrap();
    let base = spawn_server(LibraryState::new(library(3), &dir));
    let backend = HttpBackend::new(&base);

    let url = backend.page_url("t1", "e1", 2).unwrap();
    backend.prefetch(&url).unwrap();

    let missing = backend.page_url("t1", "e1", 3).unwrap();
    assert!(backend.prefetch(&missing).is_err());
}
