//! Bounded fan-out over an ordered collection.
//!
//! Every per-entity computation in the engines issues its own store
//! reads. Running all of them at once would saturate the store; running
//! them one by one is too slow. `map_bounded` is the middle ground: at
//! most `width` mapper futures in flight, results returned in input
//! order regardless of completion order.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use futures::future::join_all;

use crate::errors::{EngineError, EngineResult};

/// Apply `mapper` to every item with at most `min(width, items.len())`
/// futures in flight, returning outputs positionally aligned with the
/// inputs.
///
/// Workers cooperatively claim the next unclaimed index from a shared
/// cursor until the input is exhausted, so item N+1 starts as soon as
/// any worker frees up, not when a whole batch of `width` finishes.
///
/// A `width` of zero is a programming error and fails loudly with
/// [`EngineError::InvalidConcurrency`]. An empty input returns an empty
/// vec without ever invoking the mapper.
pub async fn map_bounded<T, R, F, Fut>(
    items: Vec<T>,
    width: usize,
    mapper: F,
) -> EngineResult<Vec<R>>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    if width == 0 {
        return Err(EngineError::InvalidConcurrency { got: width });
    }
    let total = items.len();
    if total == 0 {
        return Ok(Vec::new());
    }

    let slots: Vec<Mutex<Option<T>>> =
        items.into_iter().map(|item| Mutex::new(Some(item))).collect();
    let results: Mutex<Vec<Option<R>>> =
        Mutex::new((0..total).map(|_| None).collect());
    let cursor = AtomicUsize::new(0);

    let workers = (0..width.min(total)).map(|_| {
        let slots = &slots;
        let results = &results;
        let cursor = &cursor;
        let mapper = &mapper;
        async move {
            loop {
                let index = cursor.fetch_add(1, Ordering::Relaxed);
                if index >= total {
                    break;
                }
                // Each index is claimed exactly once, so the slot is
                // always populated here. No lock is held across an await.
                let item = slots[index]
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                let Some(item) = item else { break };
                let output = mapper(item).await;
                results.lock().unwrap_or_else(PoisonError::into_inner)[index] = Some(output);
            }
        }
    });
    join_all(workers).await;

    let outputs = results
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner)
        .into_iter()
        .flatten()
        .collect();
    Ok(outputs)
}

/// Like [`map_bounded`] but for fallible mappers: the first error (in
/// input order) is returned, otherwise all outputs.
pub async fn try_map_bounded<T, R, E, F, Fut>(
    items: Vec<T>,
    width: usize,
    mapper: F,
) -> EngineResult<Vec<R>>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
    E: Into<EngineError>,
{
    let outputs = map_bounded(items, width, mapper).await?;
    outputs
        .into_iter()
        .collect::<Result<Vec<R>, E>>()
        .map_err(Into::into)
}
