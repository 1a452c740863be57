use std::{future::IntoFuture, io, process, sync::Arc};

use tokio::io::BufReader;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use travelora::{
    application::{content::ContentQuery, error::AppError, feed::FeedService},
    config::{self, Command, ContentSettings, Settings},
    infra::{
        cache::RevalidatingContent,
        error::InfraError,
        http::{self, HttpState},
        sanity::SanityClient,
        telemetry,
    },
    presentation::terminal,
};

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

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli().map_err(InfraError::from)?;

    let command = cli_args
        .command
        .unwrap_or(Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        Command::Serve(_) => run_serve(settings).await,
        Command::Browse(args) => run_browse(settings, args.all).await,
    }
}

/// Production content source, wrapped in the revalidation cache when enabled.
fn build_content(
    settings: &ContentSettings,
    cached: bool,
) -> Result<Arc<dyn ContentQuery>, AppError> {
    let client: Arc<dyn ContentQuery> = Arc::new(SanityClient::new(settings)?);

    match settings.revalidate {
        Some(ttl) if cached => {
            info!(
                target = "travelora::content",
                revalidate_seconds = ttl.as_secs(),
                entries = settings.cache_entries.get(),
                "content cache enabled"
            );
            Ok(Arc::new(RevalidatingContent::new(
                client,
                ttl,
                settings.cache_entries,
            )))
        }
        _ => Ok(client),
    }
}

async fn run_serve(settings: Settings) -> Result<(), AppError> {
    let content = build_content(&settings.content, true)?;
    let state = HttpState {
        feed: Arc::new(FeedService::new(content, settings.pagination.page_size)),
        site: Arc::new(settings.site.clone()),
    };
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    info!(
        target = "travelora::serve",
        addr = %settings.server.addr,
        page_size = settings.pagination.page_size.get(),
        "listening"
    );

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async {
            let _ = stop_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => return result.map_err(|err| InfraError::from(err).into()),
        () = shutdown_signal() => {
            info!(target = "travelora::serve", "shutdown requested, draining connections");
            let _ = stop_tx.send(());
        }
    }

    match tokio::time::timeout(settings.server.graceful_shutdown, server).await {
        Ok(result) => result.map_err(InfraError::from)?,
        Err(_) => warn!(
            target = "travelora::serve",
            timeout_seconds = settings.server.graceful_shutdown.as_secs(),
            "graceful shutdown timed out"
        ),
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(target = "travelora::serve", error = %err, "ctrl-c handler unavailable");
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
                warn!(target = "travelora::serve", error = %err, "SIGTERM handler unavailable");
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

async fn run_browse(settings: Settings, all: bool) -> Result<(), AppError> {
    let content = build_content(&settings.content, false)?;
    let page_size = settings.pagination.page_size;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let controller = if all {
        terminal::browse_all(content.as_ref(), page_size, &mut out).await?
    } else {
        let input = BufReader::new(tokio::io::stdin());
        terminal::browse_interactive(content, page_size, input, &mut out).await?
    };

    info!(
        target = "travelora::browse",
        shown = controller.len(),
        exhausted = !controller.has_more(),
        "browse finished"
    );
    Ok(())
}
