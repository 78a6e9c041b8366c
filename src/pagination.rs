//! Enumeration of the full instance inventory, one page at a time.
//!
//! The listing is exposed as a lazy stream of flattened batches.  A page is
//! only requested once the consumer has finished with the previous one, and
//! the stream ends when the source stops returning a continuation token.
//! There is no page cap: a source that always returns a token never ends.

use std::time::{Duration, Instant};

use futures_util::stream::{self, Stream, TryStreamExt};
use futures_util::pin_mut;
use log::debug;

use crate::error::{InventoryError, RefreshError};
use crate::inventory::InventorySource;
use crate::types::Instance;

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Outcome of a complete enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationSummary {
    pub duration: Duration,
    pub pages: usize,
}

/// Lazy stream of instance batches, one per page.
pub fn pages<'a>(
    source: &'a dyn InventorySource,
    project_id: &'a str,
) -> impl Stream<Item = Result<Vec<Instance>, InventoryError>> + 'a {
    stream::try_unfold(Cursor::Start, move |cursor| {
        next_page(source, project_id, cursor)
    })
}

async fn next_page(
    source: &dyn InventorySource,
    project_id: &str,
    cursor: Cursor,
) -> Result<Option<(Vec<Instance>, Cursor)>, InventoryError> {
    let token = match cursor {
        Cursor::Done => return Ok(None),
        Cursor::Start => None,
        Cursor::Next(token) => Some(token),
    };
    let page = source
        .list_instances_page(project_id, token.as_deref())
        .await?;
    let next = match page.continuation() {
        Some(token) => Cursor::Next(token.to_string()),
        None => Cursor::Done,
    };
    Ok(Some((page.into_instances(), next)))
}

/// Drive [`pages`] to completion, handing each batch to `on_page` before the
/// next page is fetched.  The first failed page aborts the enumeration.
pub async fn enumerate_all<F>(
    source: &dyn InventorySource,
    project_id: &str,
    mut on_page: F,
) -> Result<PaginationSummary, RefreshError>
where
    F: FnMut(Vec<Instance>),
{
    let started = Instant::now();
    let batches = pages(source, project_id);
    pin_mut!(batches);

    let mut count = 0;
    loop {
        match batches.try_next().await {
            Ok(Some(batch)) => {
                count += 1;
                debug!("Fetched instance page {} ({} instances)", count, batch.len());
                on_page(batch);
            }
            Ok(None) => break,
            Err(source) => {
                return Err(RefreshError::Inventory {
                    page: count + 1,
                    source,
                })
            }
        }
    }

    Ok(PaginationSummary {
        duration: started.elapsed(),
        pages: count,
    })
}
