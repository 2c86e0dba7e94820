use tracing::warn;

use crate::facade::{absent_on_error, CapabilityFacade};
use crate::platform::{KvDeleteMethod, KvItem};

/// Message recorded when the bound KV store exposes neither delete name.
pub const KV_DELETE_UNAVAILABLE: &str = "KV delete method not available";

/// Key-value group.
pub struct KvCapability<'a> {
    pub(super) facade: &'a CapabilityFacade,
}

impl KvCapability<'_> {
    pub async fn get(&self, key: &str) -> Option<String> {
        let platform = self.facade.platform()?;
        absent_on_error("kv.get", platform.kv().get(key).await).flatten()
    }

    /// Like [`KvCapability::get`], but keeps a missing key apart from a failed
    /// read: `Some(None)` means the store answered and the key is absent,
    /// `None` means there was no answer.
    pub async fn lookup(&self, key: &str) -> Option<Option<String>> {
        let platform = self.facade.platform()?;
        absent_on_error("kv.get", platform.kv().get(key).await)
    }

    pub async fn set(&self, key: &str, value: &str) -> Option<bool> {
        let platform = self.facade.platform()?;
        absent_on_error("kv.set", platform.kv().set(key, value).await)
    }

    /// Deletes through whichever method was negotiated at bind time. With no
    /// method available this is a logged no-op that also records a capability
    /// error in the shared state.
    pub async fn delete(&self, key: &str) -> Option<bool> {
        let binding = self.facade.bound()?;
        let kv = binding.platform.kv();
        match binding.kv_delete {
            Some(KvDeleteMethod::Delete) => absent_on_error("kv.delete", kv.delete(key).await),
            Some(KvDeleteMethod::Del) => absent_on_error("kv.del", kv.del(key).await),
            None => {
                warn!("{KV_DELETE_UNAVAILABLE}; '{key}' was not deleted");
                self.facade.state.record_error(KV_DELETE_UNAVAILABLE);
                None
            }
        }
    }

    pub async fn list(&self, pattern: &str, include_values: bool) -> Option<Vec<KvItem>> {
        let platform = self.facade.platform()?;
        absent_on_error("kv.list", platform.kv().list(pattern, include_values).await)
    }

    pub async fn flush(&self) -> Option<bool> {
        let platform = self.facade.platform()?;
        absent_on_error("kv.flush", platform.kv().flush().await)
    }
}
