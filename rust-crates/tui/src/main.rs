use std::path::PathBuf;

use color_eyre::eyre::{
    Result,
    eyre,
};
use tracing_subscriber::EnvFilter;

use touchline_tui::client;

fn print_usage_and_exit() -> ! {
    println!(
        "Usage: touchline (--create | --join <code>) [--server <url>]\n\
         [--board <id>] [--board-version <version>] [--log-dir <path>]\n\
         \n\
         Flags:\n\
           --create                Create a new room and host it\n\
           --join <code>           Join an existing room by its share code\n\
           --server <url>          Game server base URL (default {})\n\
           --board <id>            Board to load on match start (default {})\n\
           --board-version <v>     Board version (default {})\n\
           --log-dir <path>        Write a daily log file under this directory",
        client::DEFAULT_SERVER_URL,
        client::DEFAULT_BOARD_ID,
        client::DEFAULT_BOARD_VERSION,
    );
    std::process::exit(0);
}

fn parse_cli_args() -> Result<(client::AppConfig, Option<PathBuf>)> {
    let mut args = std::env::args().skip(1);
    let mut entry: Option<client::RoomEntry> = None;
    let mut server_url: Option<String> = None;
    let mut board_id: Option<String> = None;
    let mut board_version: Option<String> = None;
    let mut log_dir: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--create" => {
                if entry.is_some() {
                    return Err(eyre!("Choose one of --create/--join"));
                }
                entry = Some(client::RoomEntry::Create);
            }
            "--join" => {
                let code = args
                    .next()
                    .ok_or_else(|| eyre!("--join requires a room code"))?;
                if entry.is_some() {
                    return Err(eyre!("Choose one of --create/--join"));
                }
                entry = Some(client::RoomEntry::Join { code });
            }
            "--server" => {
                let url = args
                    .next()
                    .ok_or_else(|| eyre!("--server requires a URL argument"))?;
                if server_url.is_some() {
                    return Err(eyre!("--server may only be specified once"));
                }
                server_url = Some(url);
            }
            "--board" => {
                let id = args
                    .next()
                    .ok_or_else(|| eyre!("--board requires a board id"))?;
                if board_id.is_some() {
                    return Err(eyre!("--board may only be specified once"));
                }
                board_id = Some(id);
            }
            "--board-version" => {
                let version = args
                    .next()
                    .ok_or_else(|| eyre!("--board-version requires a version"))?;
                if board_version.is_some() {
                    return Err(eyre!("--board-version may only be specified once"));
                }
                board_version = Some(version);
            }
            "--log-dir" => {
                let dir = args
                    .next()
                    .ok_or_else(|| eyre!("--log-dir requires a path argument"))?;
                if log_dir.is_some() {
                    return Err(eyre!("--log-dir may only be specified once"));
                }
                log_dir = Some(PathBuf::from(dir));
            }
            "--help" | "-h" => print_usage_and_exit(),
            other => return Err(eyre!("Unknown argument: {other}")),
        }
    }

    let entry =
        entry.ok_or_else(|| eyre!("Select --create to host or --join <code> to join"))?;

    let config = client::AppConfig {
        server_url: server_url.unwrap_or_else(|| client::DEFAULT_SERVER_URL.to_string()),
        entry,
        board_id: board_id.unwrap_or_else(|| client::DEFAULT_BOARD_ID.to_string()),
        board_version: board_version
            .unwrap_or_else(|| client::DEFAULT_BOARD_VERSION.to_string()),
    };
    Ok((config, log_dir))
}

/// Logs go to a file; stdout belongs to the terminal UI. The guard must stay
/// alive for the process lifetime or buffered lines are lost.
fn init_tracing(log_dir: Option<&PathBuf>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let dir = log_dir?;
    let appender = tracing_appender::rolling::daily(dir, "touchline.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    Some(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let (config, log_dir) = parse_cli_args()?;
    let _log_guard = init_tracing(log_dir.as_ref());
    tracing::info!("starting touchline client");
    client::run_app(config).await
}
