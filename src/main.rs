use reader_client::modules::backend::Backend;
use reader_client::modules::preferences::TomlPreferenceStore;
use reader_client::modules::serialize::load_backends;
use reader_client::modules::session::{ReaderSession, SessionContext, SessionState};
use reader_client::modules::types::{PreferredMode, SessionEvent, Viewport};
use reader_client::modules::view::ReaderView;
use std::error::Error;
use std::fs::OpenOptions;
use std::io::{self, BufRead};
use std::rc::Rc;
use std::time::{Duration, Instant};
use simplelog::*;
use log::{error, info, warn};
use clap::Parser;

#[derive(Parser)]
#[command(
    name = "reader",
    version,
    about = "Reader client for a manga server",
    long_about = include_str!("../help.txt")
)]
struct Cli {
    #[arg(short = 'l', long = "log-file", default_value = "reader.log")]
    log_file: String,

    #[arg(short = 'b', long = "backend", default_value = "./backend.toml")]
    backend: String,

    #[arg(short = 'p', long = "preferences", default_value = "./preferences.toml")]
    preferences: String,

    #[arg(long = "width", default_value_t = 1280)]
    width: u32,

    #[arg(long = "height", default_value_t = 800)]
    height: u32,

    #[arg(long = "coalesce-ms", default_value_t = 0)]
    coalesce_ms: u64,

    #[arg(long = "page", default_value_t = 1)]
    page: usize,

    title: String,

    entry: String,
}

#[derive(Debug, PartialEq)]
enum Command {
    Next,
    Prev,
    Goto(usize),
    View(usize),
    Mode(PreferredMode),
    Resize(Viewport),
    Margin(u32),
    Lookahead(usize),
    RightToLeft(bool),
    Flip(bool),
    Exit(String),
    Status,
    Quit,
}

fn init_logger(log_path: &str) -> Result<(), Box<dyn Error>> {
    WriteLogger::init(
        LevelFilter::Info,
        ConfigBuilder::new()
            .set_time_format_rfc3339()
            .build(),
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?,
    )?;
    Ok(())
}

fn parse_switch(word: Option<&str>) -> Result<bool, String> {
    match word {
        Some("on") => Ok(true),
        Some("off") => Ok(false),
        _ => Err("expected on or off".to_string()),
    }
}

fn parse_number<T: std::str::FromStr>(word: Option<&str>) -> Result<T, String> {
    word.and_then(|w| w.parse().ok())
        .ok_or_else(|| "expected a number".to_string())
}

fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let command = match words.next() {
        Some("next") | Some("n") => Command::Next,
        Some("prev") | Some("p") => Command::Prev,
        Some("goto") | Some("g") => Command::Goto(parse_number(words.next())?),
        Some("view") | Some("v") => Command::View(parse_number(words.next())?),
        Some("mode") => match words.next() {
            Some("continuous") => Command::Mode(PreferredMode::Continuous),
            Some("paged") => Command::Mode(PreferredMode::Paged),
            _ => return Err("expected continuous or paged".to_string()),
        },
        Some("resize") => {
            let size = words.next().ok_or("expected WIDTHxHEIGHT")?;
            let (w, h) = size.split_once('x').ok_or("expected WIDTHxHEIGHT")?;
            Command::Resize(Viewport::new(parse_number(Some(w))?, parse_number(Some(h))?))
        }
        Some("margin") => Command::Margin(parse_number(words.next())?),
        Some("lookahead") => Command::Lookahead(parse_number(words.next())?),
        Some("rtl") => Command::RightToLeft(parse_switch(words.next())?),
        Some("flip") => Command::Flip(parse_switch(words.next())?),
        Some("exit") => Command::Exit(words.next().ok_or("expected a target url")?.to_string()),
        Some("status") | Some("s") => Command::Status,
        Some("quit") | Some("q") => Command::Quit,
        Some(other) => return Err(format!("unknown command: {other}")),
        None => Command::Status,
    };
    Ok(command)
}

fn report(session: &mut ReaderSession, backend: &dyn Backend) {
    for event in session.take_events() {
        println!("{event}");
        if let SessionEvent::Prefetch { page, url } = &event {
            if let Err(e) = backend.prefetch(url) {
                warn!("Cannot prefetch page {page}: {e}");
            }
        }
    }
}

fn status(session: &ReaderSession) {
    println!(
        "[{}] {}/{} mode={} {}",
        session.state(),
        session.title_id(),
        session.entry_id(),
        session.mode(),
        session.progress_label()
    );
}

/// Reason the session never became readable, checked before prompting.
fn load_failure(session: Option<&ReaderSession>) -> Option<&str> {
    match session.map(|s| s.state()) {
        Some(SessionState::LoadFailed(e)) => Some(e),
        _ => None,
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logger(&cli.log_file)?;

    let backend: Rc<dyn Backend> = load_backends(&cli.backend)?
        .into_iter()
        .next()
        .map(Rc::from)
        .ok_or("no backend configured")?;
    let context = SessionContext {
        backend: backend.clone(),
        store: Rc::new(TomlPreferenceStore::new(&cli.preferences)),
        viewport: Viewport::new(cli.width, cli.height),
        scroll_window: Duration::from_millis(cli.coalesce_ms),
    };

    let mut view = ReaderView::new(context);
    if let Some(session) = view.open_and_load(&cli.title, &cli.entry, cli.page) {
        report(session, backend.as_ref());
        status(session);
    }
    if let Some(e) = load_failure(view.session()) {
        error!("Session ended without loading: {e}");
        return Ok(());
    }

    for line in io::stdin().lock().lines() {
        let line = line?;
        let Some(session) = view.session_mut() else {
            break;
        };
        session.flush_scroll(Instant::now());

        let command = match parse_command(&line) {
            Ok(c) => c,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };
        match command {
            Command::Next => println!("{}", session.flip_page(true)),
            Command::Prev => println!("{}", session.flip_page(false)),
            Command::Goto(page) => session.to_page(page),
            Command::View(page) => session.page_in_view(page, Instant::now()),
            Command::Mode(mode) => session.set_mode(mode),
            Command::Resize(viewport) => session.resize(viewport),
            Command::Margin(margin) => session.set_margin(margin),
            Command::Lookahead(pages) => session.set_preload_lookahead(pages),
            Command::RightToLeft(on) => session.set_right_to_left(on),
            Command::Flip(on) => session.set_flip_animation(on),
            Command::Exit(url) => {
                session.exit_or_advance(&url);
            }
            Command::Status => {}
            Command::Quit => break,
        }
        report(session, backend.as_ref());
        status(session);
        if *session.state() == SessionState::Closed {
            view.close();
            break;
        }
    }

    if let Some(session) = view.session() {
        info!("Session ended ({}) at page {}", session.state(), session.current_index());
    }
    Ok(())
}
