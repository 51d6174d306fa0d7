//! Sync orchestration: count, page in batches, filter, persist.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::entity::integration::Model as IntegrationModel;
use crate::entity::sync_status::SyncStatus;
use crate::platform::{
    MarketplaceClient, PlatformError, PlatformOffer, PlatformOrder, ReadFilter, Resource,
    short_error_message,
};

use super::context::SyncContext;
use super::persist_task::{ROW_CHANNEL_BUFFER_SIZE, await_persist_task, spawn_persist_task};
use super::progress::{SyncEvent, emit, integration_label};
use super::record::MarketplaceRecord;
use super::types::{KindReport, SyncError, SyncReport, page_count};
use super::window::IncrementalWindow;

/// Result of one integration inside [`sync_all`].
#[derive(Debug)]
pub struct IntegrationSyncResult {
    pub integration_id: Uuid,
    pub integration: String,
    pub result: Result<SyncReport, SyncError>,
}

/// Sync one integration: mark it `loading`, pull every requested resource
/// (orders first), then mark it `success` or `error`.
pub async fn sync_integration<C: MarketplaceClient + 'static>(
    ctx: &SyncContext,
    client: Arc<C>,
    integration: &IntegrationModel,
) -> Result<SyncReport, SyncError> {
    let reconciler = ctx.reconciler();
    let started = reconciler.begin(integration).await?;
    ctx.tracker().start(integration.id);
    // a failed run may have stored later pages without earlier ones
    let full = ctx.options().full || started.from == SyncStatus::Error;

    tracing::info!(
        integration = %integration.name,
        region = %integration.region,
        dry_run = ctx.is_dry_run(),
        full,
        "Sync started"
    );

    let mut report = SyncReport::new(integration.id, &integration.name, ctx.is_dry_run());
    let synced = match run_resources(ctx, &client, integration, full, &mut report).await {
        // bookkeeping after the last page can still fail the run
        Ok(resources) => reconciler
            .succeed(integration, &resources)
            .await
            .map_err(SyncError::from),
        Err(e) => Err(e),
    };

    match synced {
        Ok(_) => {
            tracing::info!(
                integration = %integration.name,
                inserted = report.total_inserted(),
                skipped = report.total_skipped(),
                "Sync finished"
            );
            Ok(report)
        }
        Err(e) => {
            let message = short_error_message(&e);
            tracing::warn!(integration = %integration.name, error = %message, "Sync failed");
            if let Err(status_err) = reconciler.fail(integration, message).await {
                tracing::warn!(
                    integration = %integration.name,
                    error = %status_err,
                    "Could not record sync failure"
                );
            }
            Err(e)
        }
    }
}

async fn run_resources<C: MarketplaceClient + 'static>(
    ctx: &SyncContext,
    client: &Arc<C>,
    integration: &IntegrationModel,
    full: bool,
    report: &mut SyncReport,
) -> Result<Vec<Resource>, SyncError> {
    let mut done = Vec::new();
    for resource in [Resource::Orders, Resource::ProductOffers] {
        if !ctx.options().includes(resource) {
            continue;
        }
        let kind = match resource {
            Resource::Orders => {
                sync_resource::<C, PlatformOrder>(ctx, client, integration, full).await?
            }
            Resource::ProductOffers => {
                sync_resource::<C, PlatformOffer>(ctx, client, integration, full).await?
            }
        };
        report.set(resource, kind);
        done.push(resource);
    }
    Ok(done)
}

async fn sync_resource<C, R>(
    ctx: &SyncContext,
    client: &Arc<C>,
    integration: &IntegrationModel,
    full: bool,
) -> Result<KindReport, SyncError>
where
    C: MarketplaceClient + 'static,
    R: MarketplaceRecord,
{
    let resource = R::RESOURCE;
    let label = integration_label(&integration.name, integration.id);
    let options = ctx.options();

    let window = IncrementalWindow::load(
        ctx.database().map(|db| db.as_ref()),
        integration.id,
        resource,
        full,
    )
    .await?;
    let filter = window.filter();

    emit(
        ctx.on_progress(),
        SyncEvent::Counting {
            integration: label.clone(),
            resource,
        },
    );
    let count = client.count(resource, &filter).await?;
    let page_size = options.effective_page_size();
    let pages = page_count(count.items, page_size, count.pages);
    ctx.tracker().set_total(integration.id, resource, count.items);

    tracing::debug!(
        integration = %label,
        resource = %resource,
        total = count.items,
        pages,
        window_start = ?window.start(),
        "Counted records"
    );
    emit(
        ctx.on_progress(),
        SyncEvent::Counted {
            integration: label.clone(),
            resource,
            total: count.items,
            pages,
            window_start: window.start(),
        },
    );

    let mut report = KindReport {
        reported: count.items,
        pages,
        window_start: window.start(),
        ..KindReport::default()
    };

    let (tx, persist) = match ctx.database() {
        Some(db) if !ctx.is_dry_run() => {
            let (tx, rx) = mpsc::channel::<R::Row>(ROW_CHANNEL_BUFFER_SIZE);
            let handle = spawn_persist_task(
                Arc::clone(db),
                resource,
                rx,
                ctx.persist_batch_size(),
                ctx.shutdown_flag(),
                ctx.progress_handle(),
            );
            (Some(tx), Some(handle))
        }
        _ => (None, None),
    };

    let fetched = fetch_pages::<C, R>(
        ctx,
        client,
        integration.id,
        &label,
        &window,
        &filter,
        pages,
        tx,
        &mut report,
    )
    .await;

    // tx was moved into fetch_pages and dropped there, closing the channel
    let persisted = match persist {
        Some(handle) => Some(await_persist_task(handle).await),
        None => None,
    };
    fetched?;

    if let Some(result) = persisted {
        if result.has_errors() {
            return Err(SyncError::Persist {
                resource,
                message: result.first_error().unwrap_or_default(),
            });
        }
        report.inserted = result.outcome.inserted;
        report.skipped += result.outcome.skipped;
        ctx.tracker().record_outcome(integration.id, result.outcome);
    }
    ctx.tracker().complete(integration.id, resource);

    tracing::info!(
        integration = %label,
        resource = %resource,
        fetched = report.fetched,
        filtered = report.filtered,
        inserted = report.inserted,
        skipped = report.skipped,
        "Resource synced"
    );
    emit(
        ctx.on_progress(),
        SyncEvent::ResourceComplete {
            integration: label,
            resource,
            fetched: report.fetched,
            inserted: report.inserted,
            skipped: report.skipped,
        },
    );
    Ok(report)
}

/// Fetch pages `1..=pages` in batches of `batch_size` concurrent requests.
///
/// A batch finishes before the next starts and its pages are handled in
/// page order. The first failed page fails the whole resource.
#[allow(clippy::too_many_arguments)]
async fn fetch_pages<C, R>(
    ctx: &SyncContext,
    client: &Arc<C>,
    integration_id: Uuid,
    label: &str,
    window: &IncrementalWindow,
    filter: &ReadFilter,
    pages: u32,
    tx: Option<mpsc::Sender<R::Row>>,
    report: &mut KindReport,
) -> Result<(), SyncError>
where
    C: MarketplaceClient + 'static,
    R: MarketplaceRecord,
{
    let resource = R::RESOURCE;
    let page_size = ctx.options().effective_page_size();
    let batch_size = ctx.options().effective_batch_size();
    let semaphore = Arc::new(Semaphore::new(batch_size));
    let page_numbers: Vec<u32> = (1..=pages).collect();
    let batches = u32::try_from(page_numbers.chunks(batch_size).len()).unwrap_or(u32::MAX);
    let mut seen: HashSet<i64> = HashSet::new();

    for (index, chunk) in page_numbers.chunks(batch_size).enumerate() {
        if ctx.is_shutdown_requested() {
            return Err(SyncError::Interrupted);
        }

        let handles: Vec<(u32, JoinHandle<Result<Vec<R>, PlatformError>>)> = chunk
            .iter()
            .map(|&page| {
                let client = Arc::clone(client);
                let filter = filter.clone();
                let semaphore = Arc::clone(&semaphore);
                let progress = ctx.progress_handle();
                let handle = tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| PlatformError::internal(e.to_string()))?;
                    R::fetch_page(
                        client.as_ref(),
                        page,
                        page_size,
                        &filter,
                        progress.as_deref(),
                    )
                    .await
                });
                (page, handle)
            })
            .collect();

        // join every handle before bailing so no request outlives the batch
        let mut results = Vec::with_capacity(handles.len());
        for (page, handle) in handles {
            let joined = handle
                .await
                .map_err(|e| SyncError::Task(e.to_string()))
                .and_then(|r| r.map_err(SyncError::from));
            results.push((page, joined));
        }

        for (page, joined) in results {
            let mut records = match joined {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!(
                        integration = %label,
                        resource = %resource,
                        page,
                        error = %short_error_message(&e),
                        "Page fetch failed"
                    );
                    return Err(e);
                }
            };

            let count = records.len();
            report.fetched += count as u64;
            let percent = ctx
                .tracker()
                .record_fetched(integration_id, resource, count as u64);
            emit(
                ctx.on_progress(),
                SyncEvent::FetchedPage {
                    integration: label.to_string(),
                    resource,
                    page,
                    count,
                    fetched_so_far: report.fetched,
                    percent,
                },
            );

            let dropped = window.retain(&mut records);
            if dropped > 0 {
                report.filtered += dropped as u64;
                emit(
                    ctx.on_progress(),
                    SyncEvent::WindowFiltered {
                        integration: label.to_string(),
                        resource,
                        dropped,
                    },
                );
            }

            for record in records {
                if !seen.insert(record.emag_id()) {
                    report.duplicates += 1;
                    report.skipped += 1;
                    ctx.tracker().record_skipped(integration_id, 1);
                    continue;
                }
                if let Some(tx) = &tx
                    && tx.send(record.to_row(integration_id)).await.is_err()
                {
                    if ctx.is_shutdown_requested() {
                        return Err(SyncError::Interrupted);
                    }
                    return Err(SyncError::Task("persist task stopped early".to_string()));
                }
            }
        }

        emit(
            ctx.on_progress(),
            SyncEvent::BatchComplete {
                integration: label.to_string(),
                resource,
                batch: u32::try_from(index + 1).unwrap_or(u32::MAX),
                batches,
            },
        );
    }

    Ok(())
}

/// Sync every integration in turn, carrying on past failures. Stops starting
/// new integrations once shutdown is requested.
pub async fn sync_all<C, F>(
    ctx: &SyncContext,
    integrations: Vec<IntegrationModel>,
    make_client: F,
) -> Vec<IntegrationSyncResult>
where
    C: MarketplaceClient + 'static,
    F: Fn(&IntegrationModel) -> Result<C, PlatformError>,
{
    let mut results = Vec::with_capacity(integrations.len());
    for integration in integrations {
        if ctx.is_shutdown_requested() {
            tracing::info!(integration = %integration.name, "Skipping, shutdown requested");
            break;
        }

        let result = match make_client(&integration) {
            Ok(client) => sync_integration(ctx, Arc::new(client), &integration).await,
            Err(e) => Err(SyncError::from(e)),
        };
        if let Err(e) = &result {
            emit(
                ctx.on_progress(),
                SyncEvent::Warning {
                    message: format!("{}: {}", integration.name, short_error_message(e)),
                },
            );
        }
        results.push(IntegrationSyncResult {
            integration_id: integration.id,
            integration: integration.name.clone(),
            result,
        });
    }
    results
}
