//! Login, logout and profile commands.

use petverse_client::users::UserUpdate;
use petverse_client::{AppState, SessionUser};
use petverse_core::Email;

use super::{load_profile, require_email};
use crate::ProfileAction;

/// Issue a token for `email` and sign in.
pub async fn login(
    state: &AppState,
    email: &str,
    name: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let email = Email::parse(email)?;
    let mut user = SessionUser::new(email);
    user.name = name;

    state.auth().sign_in(user).await?;
    let profile = load_profile(state).await;

    match &state.config().token_file {
        Some(path) => tracing::info!(path = %path.display(), "Token stored"),
        None => tracing::warn!("PETVERSE_TOKEN_FILE is not set; the token is not kept after exit"),
    }
    if let Some(profile) = profile {
        tracing::info!(
            email = %profile.email,
            name = profile.display_name(),
            admin = profile.is_admin(),
            "Signed in"
        );
    }
    Ok(())
}

pub fn logout(state: &AppState) {
    state.auth().logout();
}

pub async fn profile(state: &AppState, action: ProfileAction) -> Result<(), Box<dyn std::error::Error>> {
    let email = require_email(state)?;
    match action {
        ProfileAction::Show => {
            let user = state.users().single_user(&email).await?;
            tracing::info!(
                email = %user.email,
                name = %user.name,
                role = ?user.role,
                phone = user.phone.as_deref().unwrap_or("-"),
                address = user.address.as_deref().unwrap_or("-"),
                "Profile"
            );
        }
        ProfileAction::Update {
            name,
            photo,
            phone,
            address,
        } => {
            let update = UserUpdate {
                name,
                photo,
                phone,
                address,
            };
            if update.is_empty() {
                return Err("nothing to update: pass --name, --photo, --phone or --address".into());
            }
            state.users().update_user(&email, &update).await?;
            tracing::info!(%email, "Profile updated");
        }
    }
    Ok(())
}
