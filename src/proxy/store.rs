use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::future::Future;

use parking_lot::RwLock;

use crate::store::{BoxFuture, StoreError};

/// PGTIOU → proxy-granting ticket correlation table.
///
/// Filled by the proxy callback, read when a proxy ticket is requested. The
/// two sides run on different requests in no guaranteed order.
pub trait ProxyStore: Send + Sync + 'static {
    /// Proxy-granting ticket delivered for `iou`, if it has arrived.
    fn get(&self, iou: &str) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    /// Record the proxy-granting ticket for `iou`. An IOU resolves to at
    /// most one ticket: a later delivery for the same IOU is ignored.
    fn set(&self, iou: &str, pgt: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn delete(&self, iou: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn clear(&self) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// In-memory [`ProxyStore`].
#[derive(Debug, Default)]
pub struct MemoryProxyStore {
    tickets: RwLock<HashMap<String, String>>,
}

impl MemoryProxyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProxyStore for MemoryProxyStore {
    async fn get(&self, iou: &str) -> Result<Option<String>, StoreError> {
        Ok(self.tickets.read().get(iou).cloned())
    }

    async fn set(&self, iou: &str, pgt: &str) -> Result<(), StoreError> {
        match self.tickets.write().entry(iou.to_string()) {
            Entry::Occupied(existing) if existing.get() != pgt => {
                tracing::warn!(pgt_iou = %iou, "Ignoring second proxy granting ticket for IOU");
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(slot) => {
                slot.insert(pgt.to_string());
            }
        }
        Ok(())
    }

    async fn delete(&self, iou: &str) -> Result<(), StoreError> {
        self.tickets.write().remove(iou);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.tickets.write().clear();
        Ok(())
    }
}

/// Object-safe wrapper for ProxyStore (needed for Arc<dyn>).
pub(crate) trait ProxyStoreDyn: Send + Sync {
    fn get_dyn<'a>(&'a self, iou: &'a str) -> BoxFuture<'a, Result<Option<String>, StoreError>>;

    fn set_dyn<'a>(&'a self, iou: &'a str, pgt: &'a str) -> BoxFuture<'a, Result<(), StoreError>>;
}

impl<T: ProxyStore> ProxyStoreDyn for T {
    fn get_dyn<'a>(&'a self, iou: &'a str) -> BoxFuture<'a, Result<Option<String>, StoreError>> {
        Box::pin(self.get(iou))
    }

    fn set_dyn<'a>(&'a self, iou: &'a str, pgt: &'a str) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(self.set(iou, pgt))
    }
}
