//! Single-flight cache for block timestamps.
//!
//! The vault engine asks for the same block timestamp from many concurrent reconciliation tasks.
//! Rather than locking around the RPC call, the cache stores the in-flight future itself: the
//! first requester starts the fetch and every concurrent requester awaits the same shared future.

use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex},
};

use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};

use crate::errors::ChainIoError;

type SharedFetch = Shared<BoxFuture<'static, Result<u32, Arc<ChainIoError>>>>;

/// A read-mostly map from block tag to its timestamp, with request coalescing.
#[derive(Debug, Clone, Default)]
pub struct BlockTimestampCache {
    inflight: Arc<Mutex<HashMap<u64, SharedFetch>>>,
}

impl BlockTimestampCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the timestamp for `block_tag`, starting `fetch` only if no equivalent request is
    /// already in flight or completed.
    ///
    /// A failed fetch is evicted so the next requester retries instead of caching the error
    /// forever.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        block_tag: u64,
        fetch: F,
    ) -> Result<u32, Arc<ChainIoError>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<u32, ChainIoError>> + Send + 'static,
    {
        let shared = {
            let mut inflight = self.inflight.lock().expect("cache mutex never poisoned");
            inflight
                .entry(block_tag)
                .or_insert_with(|| fetch().map(|res| res.map_err(Arc::new)).boxed().shared())
                .clone()
        };

        let result = shared.await;
        if result.is_err() {
            let mut inflight = self.inflight.lock().expect("cache mutex never poisoned");
            inflight.remove(&block_tag);
        }
        result
    }
}
