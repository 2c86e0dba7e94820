//! Capability facade: uniform, failure-tolerant async wrappers over the
//! platform's four capability groups.
//!
//! No method here returns an error. When the platform is not bound yet every
//! call is a no-op with an absent result; platform failures are logged and
//! likewise become absent results. Inference failures and capability gaps are
//! additionally recorded in the shared error state.
//!
//! Version skew is resolved once, in [`CapabilityFacade::bind`]: the KV delete
//! method name is negotiated there and reused by every later call.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::platform::{KvApi, KvDeleteMethod, Platform, PlatformResult};
use crate::shared_state::SharedState;

pub mod ai;
pub mod auth;
pub mod fs;
pub mod kv;

pub use ai::AiCapability;
pub use auth::AuthCapability;
pub use fs::FsCapability;
pub use kv::KvCapability;

/// The platform plus what was negotiated when it was bound.
#[derive(Clone)]
struct Binding {
    platform: Arc<dyn Platform>,
    kv_delete: Option<KvDeleteMethod>,
}

#[derive(Clone)]
pub struct CapabilityFacade {
    state: SharedState,
    binding: Arc<RwLock<Option<Binding>>>,
}

impl CapabilityFacade {
    pub fn new(state: SharedState) -> Self {
        Self {
            state,
            binding: Arc::new(RwLock::new(None)),
        }
    }

    /// Binds the detected platform and negotiates version-dependent methods.
    pub fn bind(&self, platform: Arc<dyn Platform>) {
        let kv_delete = negotiate_kv_delete(platform.kv());
        match kv_delete {
            Some(method) => info!("Platform bound (KV delete via {})", method.name()),
            None => warn!("Platform bound without a KV delete method; deletions will be no-ops"),
        }
        *self.binding.write() = Some(Binding {
            platform,
            kv_delete,
        });
    }

    pub fn unbind(&self) {
        *self.binding.write() = None;
    }

    pub fn is_available(&self) -> bool {
        self.binding.read().is_some()
    }

    /// The KV delete method negotiated at bind time, if any.
    pub fn kv_delete_method(&self) -> Option<KvDeleteMethod> {
        self.binding.read().as_ref().and_then(|b| b.kv_delete)
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn clear_error(&self) {
        self.state.clear_error();
    }

    pub fn auth(&self) -> AuthCapability<'_> {
        AuthCapability { facade: self }
    }

    pub fn fs(&self) -> FsCapability<'_> {
        FsCapability { facade: self }
    }

    pub fn ai(&self) -> AiCapability<'_> {
        AiCapability { facade: self }
    }

    pub fn kv(&self) -> KvCapability<'_> {
        KvCapability { facade: self }
    }

    fn platform(&self) -> Option<Arc<dyn Platform>> {
        self.binding.read().as_ref().map(|b| b.platform.clone())
    }

    fn bound(&self) -> Option<Binding> {
        self.binding.read().clone()
    }
}

/// Picks `delete` when present, else `del`, else nothing.
pub fn negotiate_kv_delete(kv: &dyn KvApi) -> Option<KvDeleteMethod> {
    let exposed = kv.delete_methods();
    [KvDeleteMethod::Delete, KvDeleteMethod::Del]
        .into_iter()
        .find(|method| exposed.contains(method))
}

/// Turns a platform failure into an absent result, logging it.
fn absent_on_error<T>(operation: &str, result: PlatformResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("{operation} failed: {e}");
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::platform::memory::MemoryPlatform;
    use crate::shared_state::SharedState;

    use super::CapabilityFacade;

    /// A facade already bound to the given in-memory platform.
    pub fn bound_facade(platform: MemoryPlatform) -> (CapabilityFacade, Arc<MemoryPlatform>) {
        let platform = Arc::new(platform);
        let facade = CapabilityFacade::new(SharedState::new());
        facade.bind(platform.clone());
        (facade, platform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::MemoryPlatform;

    #[test]
    fn test_negotiation_prefers_delete() {
        let platform = MemoryPlatform::new();
        assert_eq!(
            negotiate_kv_delete(platform.kv()),
            Some(KvDeleteMethod::Delete)
        );
    }

    #[test]
    fn test_negotiation_falls_back_to_del() {
        let platform = MemoryPlatform::new().with_kv_delete_methods(vec![KvDeleteMethod::Del]);
        assert_eq!(negotiate_kv_delete(platform.kv()), Some(KvDeleteMethod::Del));
    }

    #[test]
    fn test_negotiation_finds_nothing() {
        let platform = MemoryPlatform::new().with_kv_delete_methods(vec![]);
        assert_eq!(negotiate_kv_delete(platform.kv()), None);
    }

    #[test]
    fn test_bind_and_unbind() {
        let facade = CapabilityFacade::new(SharedState::new());
        assert!(!facade.is_available());
        facade.bind(Arc::new(MemoryPlatform::new()));
        assert!(facade.is_available());
        assert_eq!(facade.kv_delete_method(), Some(KvDeleteMethod::Delete));
        facade.unbind();
        assert!(!facade.is_available());
        assert_eq!(facade.kv_delete_method(), None);
    }
}
