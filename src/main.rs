use std::{error::Error as StdError, future::IntoFuture, process, sync::Arc, time::Duration};

use pressroom::{
    application::{
        error::AppError,
        remote::RemoteFetcher,
        render::{CommandRenderer, RenderService},
    },
    config,
    infra::{
        error::InfraError,
        http::{self, AppState},
        telemetry,
        workspace::WorkspaceRoot,
    },
};
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    let mut chain = Vec::new();
    let mut current = StdError::source(error);
    while let Some(inner) = current {
        chain.push(inner.to_string());
        current = inner.source();
    }

    if dispatcher::has_been_set() {
        error!(error = %error, chain = ?chain, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, chain = ?chain, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli().map_err(InfraError::from)?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let workspaces =
        WorkspaceRoot::new(&settings.workspace.root).map_err(|source| InfraError::WorkspaceRoot {
            root: settings.workspace.root.clone(),
            source,
        })?;
    let renderer = if settings.renderer.guarded {
        CommandRenderer::guarded(
            settings.renderer.python.clone(),
            settings.renderer.args.clone(),
        )
    } else {
        CommandRenderer::new(
            settings.renderer.command.clone(),
            settings.renderer.args.clone(),
        )
    };
    let remote = RemoteFetcher::new(&settings.remote)?;

    info!(
        target = "pressroom::serve",
        addr = %settings.server.addr,
        workspace_root = %workspaces.path().display(),
        renderer = %renderer.program(),
        renderer_guarded = renderer.is_guarded(),
        "starting pressroom"
    );

    let state = AppState {
        render: Arc::new(RenderService::new(Arc::new(renderer))),
        workspaces: Arc::new(workspaces),
        remote: Arc::new(remote),
    };
    let router = http::build_router(state, settings.uploads.body_limit());

    serve_http(&settings, router).await
}

async fn serve_http(settings: &config::Settings, router: axum::Router) -> Result<(), AppError> {
    let addr = settings.server.addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| InfraError::Bind { addr, source })?;

    let shutdown = Arc::new(Notify::new());
    let trigger = Arc::clone(&shutdown);
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(
        async move {
            shutdown_signal().await;
            info!(
                target = "pressroom::serve",
                "shutdown signal received; draining in-flight requests"
            );
            trigger.notify_one();
        },
    );

    let grace = settings.server.graceful_shutdown;
    tokio::select! {
        result = server.into_future() => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        () = drain_deadline(&shutdown, grace) => {
            warn!(
                target = "pressroom::serve",
                grace_seconds = grace.as_secs(),
                "graceful shutdown timed out; abandoning in-flight requests"
            );
        }
    }

    Ok(())
}

async fn drain_deadline(shutdown: &Notify, grace: Duration) {
    shutdown.notified().await;
    tokio::time::sleep(grace).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
