//! Subcommand implementations.

pub mod appointments;
pub mod auth;
pub mod cart;
pub mod forum;
pub mod orders;
pub mod products;

use petverse_client::{AppState, SessionUser};
use petverse_core::Email;

/// Email of the restored session, or an error telling the user to log in.
pub(crate) fn require_email(state: &AppState) -> Result<Email, Box<dyn std::error::Error>> {
    state
        .session()
        .current_email()
        .ok_or_else(|| "not signed in: run `pv login` or set PETVERSE_USER_EMAIL".into())
}

/// Replace the email-only session user with the stored profile.
///
/// Keeps the bare session when the profile cannot be loaded.
pub(crate) async fn load_profile(state: &AppState) -> Option<SessionUser> {
    let email = state.session().current_email()?;
    match state.users().single_user(&email).await {
        Ok(user) => {
            let session_user = SessionUser::from(&user);
            state.session().restore(session_user.clone());
            Some(session_user)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Profile not loaded");
            state.session().current_user()
        }
    }
}
