use std::sync::Arc;

use parking_lot::RwLock;

use crate::platform::Platform;

/// The slot the external platform is attached to. Starts empty; whoever hosts
/// the platform calls [`Environment::inject`] once it is ready, possibly long
/// after the application started.
#[derive(Clone, Default)]
pub struct Environment {
    slot: Arc<RwLock<Option<Arc<dyn Platform>>>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject(&self, platform: Arc<dyn Platform>) {
        *self.slot.write() = Some(platform);
    }

    /// Detaches the platform, returning it if one was attached.
    pub fn withdraw(&self) -> Option<Arc<dyn Platform>> {
        self.slot.write().take()
    }

    pub fn lookup(&self) -> Option<Arc<dyn Platform>> {
        self.slot.read().clone()
    }

    pub fn is_present(&self) -> bool {
        self.slot.read().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::MemoryPlatform;

    #[test]
    fn test_empty_until_injected() {
        let env = Environment::new();
        assert!(!env.is_present());
        assert!(env.lookup().is_none());

        env.inject(Arc::new(MemoryPlatform::new()));
        assert!(env.is_present());
        assert!(env.lookup().is_some());
    }

    #[test]
    fn test_clones_share_the_slot() {
        let env = Environment::new();
        let other = env.clone();
        other.inject(Arc::new(MemoryPlatform::new()));
        assert!(env.is_present());

        assert!(env.withdraw().is_some());
        assert!(!other.is_present());
    }
}
