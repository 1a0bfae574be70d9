//! Pure transition planning for the sync pipeline.
//!
//! `plan_transition` applies an event to an in-memory job document and
//! answers two questions: what the store must do with the document
//! (versioned update or delete) and which side effect the caller must
//! run afterwards. Executing both is the orchestrator's job. Every
//! accepted event mutates the document, so the store's version advances
//! on each transition and a replayed callback loses its race.

use crate::error::{Result, SyncError};
use crate::models::SyncJob;
use crate::state_machine::SyncEvent;

/// What the segment store must do with the job document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMutation {
    /// Persist the mutated document with a compare-and-swap on its version.
    Update,
    /// Remove the document; the pipeline is terminal.
    Delete,
}

/// External call the orchestrator runs after persisting the mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    /// Dispatch the bulk-read job for `queries[page_index]`.
    DispatchRead { page_index: usize },
    /// Download, extract, and import `queries[page_index]`.
    TransferPage { page_index: usize },
    /// Nothing left to do.
    None,
}

/// One planned pipeline transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub mutation: StoreMutation,
    pub effect: SideEffect,
}

/// Apply `event` to `job` and plan the resulting transition.
///
/// Read completions run strictly in page order and all pages are read
/// before any import begins; import completions chain page by page until
/// exhaustion deletes the job.
pub fn plan_transition(job: &mut SyncJob, event: &SyncEvent) -> Result<Transition> {
    match event {
        SyncEvent::ReadPageCompleted {
            page,
            download_url,
        } => plan_read_completed(job, *page, download_url),
        SyncEvent::ImportPageCompleted { page } => plan_import_completed(job, *page),
    }
}

fn plan_read_completed(job: &mut SyncJob, page: u32, download_url: &str) -> Result<Transition> {
    let total = job.queries.len();
    let index = page
        .checked_sub(1)
        .map(|p| p as usize)
        .filter(|p| *p < total)
        .ok_or_else(|| {
            SyncError::validation(format!(
                "callback page {page} is outside the job's {total} page(s)"
            ))
        })?;

    let query = &mut job.queries[index];
    if query.has_download() {
        // A second completion for the same page means a duplicate or
        // out-of-order callback; the document no longer matches it.
        return Err(SyncError::Conflict {
            table: job.table_name.clone(),
        });
    }
    query.download_url = download_url.to_string();

    let effect = if (page as usize) < total {
        // `page` is also the 0-based index of the next page.
        SideEffect::DispatchRead {
            page_index: page as usize,
        }
    } else {
        // Last page read; the import phase starts at page 1.
        SideEffect::TransferPage { page_index: 0 }
    };

    Ok(Transition {
        mutation: StoreMutation::Update,
        effect,
    })
}

fn plan_import_completed(job: &mut SyncJob, page: u32) -> Result<Transition> {
    if page == 0 {
        return Err(SyncError::validation("import callback page must be 1-based"));
    }

    // Imports run strictly one page at a time, so the only callback the
    // document can accept names the page after the last accepted one. A
    // replayed or out-of-order callback no longer matches.
    if page != job.last_imported_page + 1 {
        return Err(SyncError::Conflict {
            table: job.table_name.clone(),
        });
    }
    job.last_imported_page = page;

    // The callback carries the page just imported, so its 1-based number
    // doubles as the 0-based index of the next untransferred page.
    let next_index = page as usize;
    match job.queries.get(next_index) {
        Some(query) if query.has_download() => Ok(Transition {
            mutation: StoreMutation::Update,
            effect: SideEffect::TransferPage {
                page_index: next_index,
            },
        }),
        Some(query) => Err(SyncError::internal(format!(
            "page {} has no download url but its import was scheduled",
            query.page
        ))),
        None => Ok(Transition {
            mutation: StoreMutation::Delete,
            effect: SideEffect::None,
        }),
    }
}
