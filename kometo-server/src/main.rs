use std::{net::SocketAddr, path::PathBuf};

use anyhow::Context;
use axum::{
    http::StatusCode,
    routing::{get, get_service},
    Router,
};
use tower_http::{services::ServeDir, trace::TraceLayer};

mod db;
mod error;
mod extractors;
mod feeds;
mod fuzz;
mod handlers;
mod reactions;

pub use error::Error;
pub use feeds::SessionFeeds;

use extractors::{AppState, SharedBoard};

#[derive(structopt::StructOpt)]
struct Opt {
    /// Address to listen on
    #[structopt(long, env = "KOMETO_LISTEN", default_value = "127.0.0.1:3005")]
    listen: SocketAddr,

    /// Directory served for all paths not handled by the API, eg. a web client
    #[structopt(long, env = "KOMETO_STATIC_DIR", parse(from_os_str))]
    static_dir: Option<PathBuf>,

    /// Start with an empty board instead of the demo data
    #[structopt(long)]
    no_demo_data: bool,
}

pub fn app(state: AppState, static_dir: Option<PathBuf>) -> Router {
    let app = Router::new()
        .route(
            "/comments",
            get(handlers::fetch_comments)
                .post(handlers::create_comment)
                .put(handlers::update_comment)
                .delete(handlers::delete_comment),
        )
        .route(
            "/reactions",
            get(handlers::fetch_reactions)
                .post(handlers::add_reaction)
                .delete(handlers::remove_reaction),
        )
        .route("/users", get(handlers::find_users))
        .route("/users/:id", get(handlers::fetch_user))
        .route("/feed", get(handlers::session_feed));
    let app = match static_dir {
        None => app,
        Some(dir) => app.fallback_service(get_service(ServeDir::new(dir)).handle_error(
            |err: std::io::Error| async move {
                tracing::error!(?err, "failed serving static file");
                (StatusCode::INTERNAL_SERVER_ERROR, "failed serving static file")
            },
        )),
    };
    app.layer(TraceLayer::new_for_http()).with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let opt = <Opt as structopt::StructOpt>::from_args();

    let board = if opt.no_demo_data {
        db::Board::new(Vec::new())
    } else {
        db::Board::demo()
    };
    tracing::info!(
        comments = board.comments().len(),
        reactions = board.reactions().len(),
        "board ready"
    );
    let state = AppState {
        board: SharedBoard::new(board),
        feeds: SessionFeeds::new(),
    };
    let app = app(state, opt.static_dir);

    tracing::info!("listening on http://{}", opt.listen);
    axum::Server::try_bind(&opt.listen)
        .with_context(|| format!("binding to {}", opt.listen))?
        .serve(app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(?err, "failed listening for ctrl-c");
            }
            tracing::info!("shutting down");
        })
        .await
        .context("serving axum webserver")
}
