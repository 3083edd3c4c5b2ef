//! Fetch command - route one request through the cache

use crate::cli::args::FetchArgs;
use crate::config::Config;
use crate::error::{OffcacheError, OffcacheResult};
use crate::host;
use crate::http::{Method, Request};
use crate::report::format_bytes;
use crate::router::Routed;
use crate::ui::{self, UiContext};
use std::io::Write;

/// Execute the fetch command
pub async fn execute(args: FetchArgs, config: &Config) -> OffcacheResult<()> {
    let method: Method = args.method.parse()?;
    let url = url::Url::parse(&args.url).map_err(|e| OffcacheError::invalid_url(&args.url, e))?;
    let request = Request::new(method, url);

    let routed = match args.manifest {
        Some(ref manifest) => {
            let (worker, _clients) = host::load_worker(config, manifest).await?;
            worker.handle_fetch(&request).await?
        }
        None => {
            let store = host::open_store(config).await?;
            let router = host::latest_router(config, store, host::create_fetcher(config)).await?;
            router.route(&request).await
        }
    };

    let Routed {
        response,
        outcome,
        refresh,
    } = routed;

    // The process exits after this command; let the refresh land first
    if let Some(task) = refresh {
        if let Err(e) = task.await {
            tracing::debug!("Refresh task failed: {}", e);
        }
    }

    let ctx = UiContext::detect();
    let summary = format!(
        "{} {} via {} ({})",
        response.status,
        response.status_text,
        outcome,
        format_bytes(response.body_len())
    );

    match args.output {
        Some(path) => {
            tokio::fs::write(&path, &response.body)
                .await
                .map_err(|e| OffcacheError::io(format!("writing {}", path.display()), e))?;
            if !response.is_success() {
                ui::step_warn(&ctx, &summary);
            } else {
                ui::step_ok_detail(&ctx, &summary, &path.display().to_string());
            }
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(&response.body)
                .and_then(|_| stdout.flush())
                .map_err(|e| OffcacheError::io("writing response body", e))?;
            eprintln!("{}", summary);
        }
    }

    Ok(())
}
