use clap::Parser;
use log::info;
use reader_client::modules::library::{router, LibraryState};
use reader_client::modules::serialize::load_library_file;
use simplelog::*;
use std::env;
use std::error::Error;
use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::path::Path;

#[derive(Parser)]
#[command(
    name = "reader_server",
    version,
    about = "Serves a library file over the reader API",
    long_about = None
)]
struct Cli {
    #[arg(short = 'l', long = "log-file", default_value = "reader_server.log")]
    log_file: String,

    #[arg(short = 'L', long = "library", default_value = "./library.toml")]
    library: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    WriteLogger::init(
        LevelFilter::Info,
        ConfigBuilder::new()
            .set_time_format_rfc3339()
            .build(),
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&cli.log_file)?,
    )?;

    let library = load_library_file(&cli.library)?;
    let root = Path::new(&cli.library)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    info!("Loaded {} titles from {}", library.titles.len(), cli.library);
    let app = router(LibraryState::new(library, root));

    let port = env::var("READER_SERVER_PORT")
        .ok()
        .and_then(|val| val.parse::<u16>().ok())
        .unwrap_or(9000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    println!("Reader server running on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
