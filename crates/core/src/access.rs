//! Ownership and visibility rules for stored projects.
//!
//! Pure functions shared by the API handlers; authorization failures never
//! reach the store or repository layer.

use crate::error::CoreError;
use crate::types::UserId;

/// Who is asking. Listing and read endpoints accept anonymous requesters;
/// writes always require an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requester {
    Anonymous,
    User(UserId),
}

impl Requester {
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::Anonymous => None,
            Self::User(id) => Some(*id),
        }
    }

    fn is_owner(&self, owner_id: UserId) -> bool {
        matches!(self, Self::User(id) if *id == owner_id)
    }
}

/// Grant read access if the project is public or the requester owns it.
pub fn authorize_read(
    requester: Requester,
    owner_id: UserId,
    is_public: bool,
) -> Result<(), CoreError> {
    if is_public || requester.is_owner(owner_id) {
        Ok(())
    } else {
        Err(CoreError::Forbidden("Access denied".into()))
    }
}

/// Grant write access only to the owner.
pub fn authorize_write(requester: Requester, owner_id: UserId) -> Result<(), CoreError> {
    if requester.is_owner(owner_id) {
        Ok(())
    } else {
        Err(CoreError::Forbidden("Access denied".into()))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_private_project_denies_non_owner_and_anonymous() {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();

        assert_matches!(
            authorize_read(Requester::Anonymous, owner, false),
            Err(CoreError::Forbidden(_))
        );
        assert_matches!(
            authorize_read(Requester::User(other), owner, false),
            Err(CoreError::Forbidden(_))
        );
        assert!(authorize_read(Requester::User(owner), owner, false).is_ok());
    }

    #[test]
    fn test_public_project_readable_by_anyone() {
        let owner = Uuid::new_v4();
        assert!(authorize_read(Requester::Anonymous, owner, true).is_ok());
        assert!(authorize_read(Requester::User(Uuid::new_v4()), owner, true).is_ok());
    }

    #[test]
    fn test_write_is_owner_only() {
        let owner = Uuid::new_v4();
        assert!(authorize_write(Requester::User(owner), owner).is_ok());
        assert_matches!(
            authorize_write(Requester::User(Uuid::new_v4()), owner),
            Err(CoreError::Forbidden(_))
        );
        assert_matches!(
            authorize_write(Requester::Anonymous, owner),
            Err(CoreError::Forbidden(_))
        );
    }
}
