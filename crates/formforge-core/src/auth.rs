//! The resolved-user identity contract.
//!
//! User accounts, sessions, and authentication live in the host
//! application; formforge only ever sees a [`RequestUser`], the already
//! resolved identity of whoever is making the call. Permission checks on
//! forms are pure functions of (form, `RequestUser`).

use serde::{Deserialize, Serialize};

/// The identity of the caller, as resolved by the host's auth layer.
///
/// An anonymous caller has `id = None` and `is_authenticated = false`.
///
/// # Examples
///
/// ```
/// use formforge_core::auth::RequestUser;
///
/// let owner = RequestUser::authenticated(1, "ada");
/// assert!(owner.is_authenticated);
/// assert!(!owner.is_staff);
///
/// let anon = RequestUser::anonymous();
/// assert!(anon.id.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestUser {
    /// The user's primary key in the host's user store, if authenticated.
    pub id: Option<i64>,
    /// The username, empty for anonymous callers.
    pub username: String,
    /// Whether the user has staff privileges (may edit and delete any form).
    pub is_staff: bool,
    /// Whether the caller is authenticated at all.
    pub is_authenticated: bool,
}

impl RequestUser {
    /// Creates an authenticated, non-staff user.
    pub fn authenticated(id: i64, username: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            username: username.into(),
            is_staff: false,
            is_authenticated: true,
        }
    }

    /// Creates an authenticated staff user.
    pub fn staff(id: i64, username: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            username: username.into(),
            is_staff: true,
            is_authenticated: true,
        }
    }

    /// Creates an anonymous (unauthenticated) user.
    pub fn anonymous() -> Self {
        Self {
            id: None,
            username: String::new(),
            is_staff: false,
            is_authenticated: false,
        }
    }

    /// Returns `true` if this is an anonymous caller.
    pub fn is_anonymous(&self) -> bool {
        !self.is_authenticated
    }
}

impl Default for RequestUser {
    fn default() -> Self {
        Self::anonymous()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authenticated_user() {
        let user = RequestUser::authenticated(42, "ada");
        assert_eq!(user.id, Some(42));
        assert_eq!(user.username, "ada");
        assert!(user.is_authenticated);
        assert!(!user.is_staff);
        assert!(!user.is_anonymous());
    }

    #[test]
    fn test_staff_user() {
        let user = RequestUser::staff(1, "root");
        assert!(user.is_staff);
        assert!(user.is_authenticated);
    }

    #[test]
    fn test_anonymous_user() {
        let user = RequestUser::anonymous();
        assert_eq!(user.id, None);
        assert!(user.username.is_empty());
        assert!(user.is_anonymous());
        assert_eq!(user, RequestUser::default());
    }
}
