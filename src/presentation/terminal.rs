//! Line-oriented blog browser for the terminal.
//!
//! Drives a [`ListController`] from stdin: an empty line (or `m`) loads
//! more, `q` quits. The page fetch runs alongside input handling, so
//! extra triggers while a page is loading are reported instead of queued.

use std::{io::Write, sync::Arc};

use futures::future::{BoxFuture, OptionFuture};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

use crate::{
    application::{
        content::{ContentError, ContentQuery},
        error::AppError,
        listing::{ListController, PendingFetch, Resolution, Trigger},
    },
    domain::{
        pagination::{PageRequest, PageSize},
        posts::{self, PostSummary},
    },
    infra::error::InfraError,
};

const HELP: &str = "[enter] load more · q quit";

type PageFuture = BoxFuture<'static, Result<Vec<PostSummary>, ContentError>>;

/// Fetch the first page and print it.
async fn open(
    content: &dyn ContentQuery,
    page_size: PageSize,
    out: &mut impl Write,
) -> Result<ListController, AppError> {
    let seed = content.fetch_page(PageRequest::first(page_size)).await?;
    let controller = ListController::seeded(seed, page_size);

    if controller.is_empty() {
        writeln!(out, "No posts yet. Check back soon!").map_err(InfraError::from)?;
    } else {
        print_posts(out, controller.items(), 0)?;
    }
    print_status(out, &controller)?;
    Ok(controller)
}

/// Load every page in turn and return the complete list.
pub async fn browse_all(
    content: &dyn ContentQuery,
    page_size: PageSize,
    out: &mut impl Write,
) -> Result<ListController, AppError> {
    let mut controller = open(content, page_size, out).await?;

    while controller.has_more() {
        let shown = controller.len();
        match controller.load_more(content).await {
            Resolution::Appended { .. } | Resolution::Exhausted { .. } => {
                print_posts(out, &controller.items()[shown..], shown)?;
            }
            Resolution::Failed(err) => return Err(err.into()),
            Resolution::Stale | Resolution::Ignored => break,
        }
    }

    print_status(out, &controller)?;
    Ok(controller)
}

/// Interactive browser reading commands from `input` until `q` or end of input.
pub async fn browse_interactive<R>(
    content: Arc<dyn ContentQuery>,
    page_size: PageSize,
    input: R,
    out: &mut impl Write,
) -> Result<ListController, AppError>
where
    R: AsyncBufRead + Unpin,
{
    let mut controller = open(content.as_ref(), page_size, out).await?;
    if controller.has_more() {
        writeln!(out, "{HELP}").map_err(InfraError::from)?;
    }

    let mut lines = input.lines();
    let mut pending: Option<PendingFetch> = None;
    let mut fetch: Option<PageFuture> = None;

    loop {
        tokio::select! {
            biased;

            Some(result) = OptionFuture::from(fetch.as_mut()), if fetch.is_some() => {
                fetch = None;
                if let Some(done) = pending.take() {
                    let shown = controller.len();
                    let resolution = controller.resolve(done, result);
                    report(out, &controller, shown, resolution)?;
                }
            }
            line = lines.next_line() => {
                let line = line.map_err(InfraError::from)?;
                match line.as_deref().map(str::trim) {
                    None | Some("q" | "quit") => {
                        if controller.is_loading() {
                            controller.abandon();
                            fetch = None;
                            pending = None;
                            writeln!(out, "Abandoned the page that was loading.")
                                .map_err(InfraError::from)?;
                        }
                        break;
                    }
                    Some("" | "m" | "more") => match controller.trigger() {
                        Trigger::Fetch(next) => {
                            writeln!(out, "Loading more stories...").map_err(InfraError::from)?;
                            fetch = Some(start_fetch(Arc::clone(&content), next.request()));
                            pending = Some(next);
                        }
                        Trigger::Busy => {
                            writeln!(out, "Still loading, please wait.").map_err(InfraError::from)?;
                        }
                        Trigger::Exhausted => {
                            writeln!(out, "No more stories.").map_err(InfraError::from)?;
                        }
                    },
                    Some(other) => {
                        debug!(target = "travelora::browse", command = other, "unknown command");
                        writeln!(out, "{HELP}").map_err(InfraError::from)?;
                    }
                }
            }
        }
    }

    Ok(controller)
}

fn start_fetch(content: Arc<dyn ContentQuery>, request: PageRequest) -> PageFuture {
    Box::pin(async move { content.fetch_page(request).await })
}

fn report(
    out: &mut impl Write,
    controller: &ListController,
    shown: usize,
    resolution: Resolution,
) -> Result<(), AppError> {
    match resolution {
        Resolution::Appended { .. } | Resolution::Exhausted { .. } => {
            print_posts(out, &controller.items()[shown..], shown)?;
            print_status(out, controller)
        }
        Resolution::Failed(err) => {
            writeln!(out, "Could not load more stories ({err}). Press enter to retry.")
                .map_err(InfraError::from)?;
            Ok(())
        }
        Resolution::Stale | Resolution::Ignored => Ok(()),
    }
}

fn print_posts(out: &mut impl Write, items: &[PostSummary], offset: usize) -> Result<(), AppError> {
    for (index, post) in items.iter().enumerate() {
        let categories = post
            .categories()
            .iter()
            .map(|category| category.title.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let mut line = format!(
            "{:>3}. {} ({})",
            offset + index + 1,
            post.title,
            posts::format_human_date(post.published_at)
        );
        if !categories.is_empty() {
            line.push_str(&format!(" [{categories}]"));
        }
        writeln!(out, "{line}").map_err(InfraError::from)?;
        if !post.excerpt.is_empty() {
            writeln!(out, "     {}", post.excerpt).map_err(InfraError::from)?;
        }
    }
    Ok(())
}

fn print_status(out: &mut impl Write, controller: &ListController) -> Result<(), AppError> {
    let status = if controller.has_more() {
        format!("{} stories shown, more available.", controller.len())
    } else {
        format!("{} stories shown, that's all of them.", controller.len())
    };
    writeln!(out, "{status}").map_err(InfraError::from)?;
    Ok(())
}
