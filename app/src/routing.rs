use crate::Screen;
use threadist_core::{AuthUser, ErrorExt, InterestDirectory};
use tracing::info;

/// Where an auth-state change should take the user.
pub async fn route_for_user(directory: &dyn InterestDirectory, user: Option<&AuthUser>) -> Screen {
    let Some(user) = user else {
        return Screen::Welcome;
    };

    if !user.email_confirmed {
        return Screen::EmailConfirmation {
            email: user.email.clone(),
        };
    }

    match directory.has_completed_selection(&user.id).await {
        Ok(true) => Screen::Home,
        Ok(false) => Screen::Interests,
        Err(error) => {
            // Unknown selection status routes to onboarding.
            error.log_warn();
            info!("Routing user {} to interests after directory failure", user.id);
            Screen::Interests
        }
    }
}
