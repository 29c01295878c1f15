use crate::auth::{Credentials, Role, User};
use crate::error::{PredictorError, Result};
use crate::predict::MatchInput;

/// Per-user interaction context: who is logged in, and any inputs handed from the
/// predict view to the probabilities view.
#[derive(Debug, Clone, Default)]
pub struct Session {
    user: Option<User>,
    carried: Option<MatchInput>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn login(&mut self, credentials: &Credentials, username: &str, password: &str) -> Result<&User> {
        let user = credentials.authenticate(username.trim(), password)?;
        Ok(&*self.user.insert(user))
    }

    pub fn logout(&mut self) {
        self.user = None;
        self.carried = None;
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn require_user(&self) -> Result<&User> {
        self.user.as_ref().ok_or(PredictorError::NotLoggedIn)
    }

    pub fn require_admin(&self) -> Result<&User> {
        let user = self.require_user()?;
        if user.role != Role::Admin {
            return Err(PredictorError::AdminOnly);
        }
        Ok(user)
    }

    pub fn carry(&mut self, input: MatchInput) {
        self.carried = Some(input);
    }

    pub fn carried(&self) -> Option<&MatchInput> {
        self.carried.as_ref()
    }
}
