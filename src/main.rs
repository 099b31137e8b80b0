use std::process;

use moltchat::{
    application::error::AppError,
    config::{self, Command},
    infra::{
        api::MoltbookClient,
        assets::AssetDir,
        db::Store,
        error::InfraError,
        http::{HttpState, build_router},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging)?;

    let command = cli.command.unwrap_or(Command::Serve(Box::default()));
    match command {
        Command::Serve(_) => run_serve(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let store = Store::open(&settings.database.path).await?;
    let client = MoltbookClient::new(&settings.remote, store.clone())?;
    let assets =
        AssetDir::new(settings.assets.directory.clone()).map_err(InfraError::from)?;

    let state = HttpState::new(store, client, assets);
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    info!(
        target = "moltchat::server",
        addr = %settings.server.addr,
        remote = %settings.remote.base_url,
        "Moltchat listening"
    );
    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}
