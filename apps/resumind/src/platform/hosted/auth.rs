use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::platform::{AuthApi, Identity, PlatformError, PlatformResult};

/// Single-user identity provider configured at startup. Sign-in completes
/// immediately; there is no interactive flow to wait on.
pub struct LocalAuth {
    user: Identity,
    signed_in: AtomicBool,
}

impl LocalAuth {
    pub fn new(username: &str) -> Self {
        Self {
            user: Identity {
                uuid: Uuid::new_v4().to_string(),
                username: username.to_string(),
            },
            signed_in: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl AuthApi for LocalAuth {
    async fn get_user(&self) -> PlatformResult<Identity> {
        if !self.signed_in.load(Ordering::SeqCst) {
            return Err(PlatformError::Auth("not signed in".to_string()));
        }
        Ok(self.user.clone())
    }

    async fn is_signed_in(&self) -> PlatformResult<bool> {
        Ok(self.signed_in.load(Ordering::SeqCst))
    }

    async fn sign_in(&self) -> PlatformResult<()> {
        self.signed_in.store(true, Ordering::SeqCst);
        info!("Local identity '{}' signed in", self.user.username);
        Ok(())
    }

    async fn sign_out(&self) -> PlatformResult<()> {
        self.signed_in.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_in_then_out() {
        let auth = LocalAuth::new("alice");
        assert!(!auth.is_signed_in().await.unwrap());
        assert!(auth.get_user().await.is_err());

        auth.sign_in().await.unwrap();
        assert_eq!(auth.get_user().await.unwrap().username, "alice");

        auth.sign_out().await.unwrap();
        assert!(!auth.is_signed_in().await.unwrap());
    }
}
