use crate::facade::{absent_on_error, CapabilityFacade};
use crate::platform::Identity;

/// Identity group. Thin pass-through used by the session manager; a `None`
/// means "unavailable or failed" and callers treat it as not signed in.
pub struct AuthCapability<'a> {
    pub(super) facade: &'a CapabilityFacade,
}

impl AuthCapability<'_> {
    pub async fn get_user(&self) -> Option<Identity> {
        let platform = self.facade.platform()?;
        absent_on_error("auth.getUser", platform.auth().get_user().await)
    }

    pub async fn is_signed_in(&self) -> Option<bool> {
        let platform = self.facade.platform()?;
        absent_on_error("auth.isSignedIn", platform.auth().is_signed_in().await)
    }

    pub async fn sign_in(&self) -> Option<()> {
        let platform = self.facade.platform()?;
        absent_on_error("auth.signIn", platform.auth().sign_in().await)
    }

    pub async fn sign_out(&self) -> Option<()> {
        let platform = self.facade.platform()?;
        absent_on_error("auth.signOut", platform.auth().sign_out().await)
    }
}
