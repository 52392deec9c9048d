//! Signing in and out.

use crate::args::LoginArgs;
use crate::commands::Out;
use crate::model::User;
use crate::store::Store;
use crate::Result;
use serde::Serialize;

/// The signed in user, without the password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub name: String,
    pub email: String,
    pub color: String,
}

impl From<&User> for Profile {
    fn from(user: &User) -> Self {
        Self {
            name: user.name().to_string(),
            email: user.email().to_string(),
            color: user.color().to_string(),
        }
    }
}

/// Handles `expenses login`. The login is remembered in local storage.
pub async fn login(store: &Store, args: &LoginArgs) -> Result<Out<Profile>> {
    let user = store.sign_in(args.username(), args.password()).await?;
    Ok(Out::new(
        format!("Signed in as {}", user.name()),
        Profile::from(&user),
    ))
}

/// Handles `expenses logout`. Queued changes are kept and sent on the next sign in.
pub async fn logout(store: &Store) -> Result<Out<()>> {
    store.sign_out().await?;
    Ok("Signed out".into())
}

pub async fn whoami(store: &Store) -> Result<Out<Profile>> {
    let user = match store.user() {
        Some(user) => Some(user),
        None => store.load_user().await?,
    };
    Ok(match user {
        Some(user) => Out::new(
            format!("Signed in as {}", user.name()),
            Profile::from(&user),
        ),
        None => "Nobody is signed in".into(),
    })
}
