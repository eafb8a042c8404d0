use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use client::{BoardView, BoardsApi, ClientConfig, ViewEvent};
use protocol::{Element, ElementId, Operation};
use serde::Serialize;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

const WELCOME_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Api(#[from] client::ApiError),
    #[error(transparent)]
    View(#[from] client::ViewError),
    #[error(transparent)]
    Session(#[from] client::SessionError),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("health check failed with HTTP {0}")]
    Unhealthy(u16),
    #[error("timed out waiting for the server to accept the session")]
    Timeout,
    #[error("session ended before the server accepted it")]
    SessionEnded,
    #[error("server returned {code}: {message}")]
    Server { code: String, message: String },
}

#[derive(Parser, Debug)]
#[command(name = "whiteboard", about = "Whiteboard REST and realtime CLI")]
struct Cli {
    #[arg(long, env = "WHITEBOARD_SERVER_URL", default_value = "http://127.0.0.1:3000")]
    server_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Ping,
    Board(BoardCommand),
    /// Print live operations and cursors for a board until interrupted.
    Watch { board_id: Uuid },
    /// Add one element to a board through a realtime session.
    Add(AddArgs),
    /// Clear every element from a board through a realtime session.
    Clear { board_id: Uuid },
}

#[derive(Args, Debug)]
struct BoardCommand {
    #[command(subcommand)]
    command: BoardSubcommand,
}

#[derive(Subcommand, Debug)]
enum BoardSubcommand {
    List,
    Read {
        board_id: Uuid,
    },
    Create {
        #[arg(long)]
        title: Option<String>,
    },
    Delete {
        board_id: Uuid,
    },
}

#[derive(Args, Debug)]
struct AddArgs {
    board_id: Uuid,

    #[command(subcommand)]
    shape: ShapeArgs,

    #[arg(long, global = true, default_value = "#000000")]
    stroke: String,

    #[arg(long, global = true, default_value_t = 2.0)]
    stroke_width: f64,

    #[arg(long, global = true)]
    fill: Option<String>,
}

#[derive(Subcommand, Debug)]
enum ShapeArgs {
    Rect {
        #[arg(long)]
        x: f64,
        #[arg(long)]
        y: f64,
        #[arg(long)]
        width: f64,
        #[arg(long)]
        height: f64,
    },
    Circle {
        #[arg(long)]
        x: f64,
        #[arg(long)]
        y: f64,
        #[arg(long)]
        radius: f64,
    },
    Line {
        #[arg(long)]
        x1: f64,
        #[arg(long)]
        y1: f64,
        #[arg(long)]
        x2: f64,
        #[arg(long)]
        y2: f64,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::from_env().with_server_url(cli.server_url);

    match cli.command {
        Command::Ping => run_ping(&config).await,
        Command::Board(board) => run_board(&config, board).await,
        Command::Watch { board_id } => run_watch(&config, board_id).await,
        Command::Add(args) => {
            let element = build_element(&args);
            run_operation(&config, args.board_id, Operation::add(args.board_id, element)).await
        }
        Command::Clear { board_id } => run_operation(&config, board_id, Operation::clear(board_id)).await,
    }
}

async fn run_ping(config: &ClientConfig) -> Result<(), CliError> {
    let base = config.http_base().map_err(client::ApiError::from)?;
    let response = reqwest::get(format!("{base}/healthz")).await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::Unhealthy(status.as_u16()));
    }
    println!("ok");
    Ok(())
}

async fn run_board(config: &ClientConfig, board: BoardCommand) -> Result<(), CliError> {
    let api = BoardsApi::new(config)?;
    match board.command {
        BoardSubcommand::List => print_json(&api.list_boards().await?),
        BoardSubcommand::Read { board_id } => print_json(&api.get_board(board_id).await?),
        BoardSubcommand::Create { title } => print_json(&api.create_board(title.as_deref()).await?),
        BoardSubcommand::Delete { board_id } => {
            api.delete_board(board_id).await?;
            eprintln!("deleted board: {board_id}");
            Ok(())
        }
    }
}

async fn run_watch(config: &ClientConfig, board_id: Uuid) -> Result<(), CliError> {
    let mut view = BoardView::open(config, board_id).await?;
    info!(%board_id, "watching board");
    loop {
        tokio::select! {
            event = view.next_event() => {
                let Some(event) = event else {
                    warn!(%board_id, "session ended");
                    return Ok(());
                };
                print_event(&view, &event);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    debug!(%board_id, "interrupted; closing view");
    view.close().await?;
    Ok(())
}

/// Open a session, wait for the server's welcome, send one operation, and leave.
async fn run_operation(config: &ClientConfig, board_id: Uuid, op: Operation) -> Result<(), CliError> {
    let mut view = BoardView::open(config, board_id).await?;
    wait_for_welcome(&mut view).await?;
    let kind = op.kind();
    if !view.apply_local(op) {
        debug!(%board_id, kind, "operation changed nothing locally");
    }
    info!(%board_id, kind, "operation sent");
    view.close().await?;
    eprintln!("sent to board: {board_id}");
    Ok(())
}

async fn wait_for_welcome(view: &mut BoardView) -> Result<(), CliError> {
    let wait = async {
        loop {
            match view.next_event().await {
                Some(ViewEvent::Welcome { .. }) => return Ok(()),
                Some(ViewEvent::ServerError(payload)) => {
                    return Err(CliError::Server { code: payload.code, message: payload.message });
                }
                Some(_) => {}
                None => return Err(CliError::SessionEnded),
            }
        }
    };
    timeout(WELCOME_TIMEOUT, wait).await.map_err(|_| CliError::Timeout)?
}

fn build_element(args: &AddArgs) -> Element {
    let id = ElementId::generate();
    let element = match args.shape {
        ShapeArgs::Rect { x, y, width, height } => Element::rectangle(id, x, y, width, height),
        ShapeArgs::Circle { x, y, radius } => Element::circle(id, x, y, radius),
        ShapeArgs::Line { x1, y1, x2, y2 } => Element::line(id, (x1, y1), (x2, y2)),
    };
    let element = element.with_stroke(args.stroke.clone(), args.stroke_width);
    match &args.fill {
        Some(fill) => element.with_fill(fill.clone()),
        None => element,
    }
}

fn print_event(view: &BoardView, event: &ViewEvent) {
    match event {
        ViewEvent::SnapshotLoaded { title, elements } => println!("snapshot {title:?}: {elements} elements"),
        ViewEvent::SnapshotFailed(error) => eprintln!("snapshot failed: {error}"),
        ViewEvent::Welcome { client_id } => println!("connected as {client_id}"),
        ViewEvent::RemoteOperation { kind, changed } => {
            println!("op {kind} (changed: {changed}, elements: {})", view.store().elements().len());
        }
        ViewEvent::CursorMoved { client_id } => {
            if let Some(cursor) = view.cursors().get(client_id) {
                println!("cursor {client_id} at ({}, {})", cursor.x, cursor.y);
            }
        }
        ViewEvent::CursorsExpired(ids) => {
            for id in ids {
                println!("cursor {id} left");
            }
        }
        ViewEvent::ServerError(payload) => eprintln!("server error {}: {}", payload.code, payload.message),
    }
}

fn print_json(value: &impl Serialize) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
