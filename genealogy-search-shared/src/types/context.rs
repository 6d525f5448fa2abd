//! Request-scoped tenant and user identity.

/// The acting tenant and user for one request or one consumed message.
///
/// Internal APIs take this explicitly; every tenant-scoped persistence call uses
/// `society_id` from here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub society_id: u32,
    /// `None` when the caller is unauthenticated.
    pub user_id: Option<u32>,
    system: bool,
}

impl RequestContext {
    pub fn new(society_id: u32, user_id: Option<u32>) -> Self {
        Self {
            society_id,
            user_id,
            system: false,
        }
    }

    /// Context for background work acting on behalf of the tenant itself.
    ///
    /// Carries no user, so privacy checks treat it like an unauthenticated caller; use
    /// [`RequestContext::is_system`] to tell the two apart.
    pub fn system(society_id: u32) -> Self {
        Self {
            society_id,
            user_id: None,
            system: true,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// Whether this context belongs to background work rather than a caller.
    pub fn is_system(&self) -> bool {
        self.system
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_context_is_distinct_from_anonymous() {
        let system = RequestContext::system(1);
        let anonymous = RequestContext::new(1, None);

        assert!(!system.is_authenticated());
        assert!(!anonymous.is_authenticated());
        assert!(system.is_system());
        assert!(!anonymous.is_system());
        assert_ne!(system, anonymous);
    }
}
