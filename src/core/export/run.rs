//! The page loop of one export run
//!
//! Pages are fetched in ascending id order and rendered strictly one after
//! the other. Each page gets a fresh batch context that is cleared before the
//! next page is fetched.

use super::context::ExportContext;
use super::renderer::RecordRenderer;
use super::result::ExportRunResult;
use crate::core::batch::ExportEntity;
use crate::core::paging::Pager;
use crate::core::state::{Checkpoint, StateManager};
use crate::domain::{CourierError, EntityId, Result};
use crate::{log_page_start, log_record_failure};
use std::sync::Arc;

/// Where per-page progress is persisted
pub struct PageProgress<'a> {
    pub state: &'a StateManager,
    pub checkpoint: &'a mut Checkpoint,
}

impl PageProgress<'_> {
    async fn record(&mut self, last_id: EntityId, records: usize) {
        self.checkpoint.record_page(last_id, records as u64);
        if let Err(e) = self.state.checkpoint_page(self.checkpoint).await {
            tracing::warn!(error = %e, "Failed to checkpoint page");
            // Don't fail the run, the next page retries the save
        }
    }
}

/// Walk every page of `P` through `renderer`
///
/// Per-record errors are counted and the loop continues. An out-of-memory
/// error stops the run with a hard abort; cancellation and the record limit
/// stop it with a soft abort. Any other structural error (a failed page fetch
/// or secondary load) is returned.
///
/// # Errors
///
/// Returns the first structural error, or an error from the renderer's
/// `begin`/`finish`.
pub async fn run_export<P, R>(
    mut ctx: ExportContext<P>,
    renderer: &mut R,
    mut progress: Option<PageProgress<'_>>,
) -> Result<ExportRunResult>
where
    P: ExportEntity,
    R: RecordRenderer<P>,
{
    let config = Arc::new(ctx.config().clone());
    let store = Arc::clone(ctx.store());
    let cancel = ctx.cancel_token().clone();

    let mut pager = Pager::new(config.page_size, config.offset, ctx.result().last_id)
        .with_limit(config.limit);

    tracing::info!(
        profile = %config.profile_name,
        entity = %P::KIND,
        page_size = config.page_size,
        resume_after = pager.last_id(),
        "Starting export run"
    );

    renderer.begin(&ctx).await?;

    loop {
        if cancel.is_cancelled() {
            ctx.result_mut().soft_abort();
        }
        if ctx.result().is_aborted() {
            break;
        }

        let Some(request) = pager.next_request() else {
            break;
        };
        log_page_start!(pager.pages(), pager.last_id(), request.limit());

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            page = P::fetch_page(store.as_ref(), &request, &config.filter) => Some(page),
        };
        let Some(page) = fetched else {
            ctx.result_mut().soft_abort();
            break;
        };
        let page = page?;

        let ids: Vec<EntityId> = page.iter().map(|entity| entity.id()).collect();
        if page.is_empty() {
            pager.advance(&request, &ids);
            break;
        }

        ctx.begin_page(&page);
        let before = ctx.result().total();

        for entity in &page {
            if cancel.is_cancelled() {
                ctx.result_mut().soft_abort();
            }
            if ctx.result().is_aborted() {
                break;
            }

            let id = entity.id();
            match renderer.render(&ctx, entity).await {
                Ok(()) => ctx.result_mut().record_success(id),
                Err(e) if e.is_out_of_memory() => {
                    tracing::error!(entity_id = id, error = %e, "Out of memory, aborting run");
                    ctx.result_mut().hard_abort(id, e.to_string());
                }
                Err(CourierError::Cancelled) => ctx.result_mut().soft_abort(),
                Err(e) if e.is_structural() => {
                    tracing::error!(
                        entity_id = id,
                        page = ctx.page_index(),
                        error = %e,
                        "Page cannot be rendered"
                    );
                    ctx.end_page();
                    return Err(e);
                }
                Err(e) => {
                    log_record_failure!(id, &e);
                    ctx.result_mut().record_failure(id, e.to_string());
                }
            }
        }

        pager.advance(&request, &ids);
        let processed = ctx.result().total() - before;
        ctx.end_page();
        ctx.result_mut().pages_processed += 1;

        tracing::info!(
            page = pager.pages(),
            records = processed,
            last_id = ctx.result().last_id,
            "Page exported"
        );

        if let Some(progress) = progress.as_mut() {
            progress.record(ctx.result().last_id, processed).await;
        }
    }

    if pager.limit_reached() {
        tracing::info!(limit = ?config.limit, "Record limit reached");
        ctx.result_mut().soft_abort();
    }

    let files = renderer.finish(&ctx).await?;
    let result = ctx.result_mut();
    result.files = files;
    result.finish();

    let result = ctx.into_result();
    tracing::info!(
        succeeded = result.succeeded,
        failed = result.failed,
        last_id = result.last_id,
        abort_mode = ?result.abort_mode,
        "Export run finished"
    );
    Ok(result)
}
