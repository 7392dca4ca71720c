use crate::Identity;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Session {
    identity: Option<Identity>,
}

impl Session {
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.identity.is_some()
    }

    /// Replaces the session with whatever the auth provider last reported.
    pub fn replace(&mut self, identity: Option<Identity>) {
        self.identity = identity;
    }

    pub fn display_name(&self) -> Option<&std::sync::Arc<str>> {
        self.identity.as_ref().map(|identity| &identity.display_name)
    }
}
