//! Role registry: owner (two-step handoff), admins, and the authorized
//! minter/burner/holder sets. Owned by the share ledger and passed by
//! handle wherever a check is needed; there is no ambient global state.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::errors::FundError;
use crate::AccountId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Minter,
    Burner,
    AllowedHolder,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Minter => "minter",
            Self::Burner => "burner",
            Self::AllowedHolder => "allowed_holder",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleRegistry {
    owner: AccountId,
    pending_owner: Option<AccountId>,
    admins: FxHashSet<AccountId>,
    minters: FxHashSet<AccountId>,
    burners: FxHashSet<AccountId>,
    allowed_holders: FxHashSet<AccountId>,
    /// When false the holder allow-list is not enforced.
    restrict_holders: bool,
}

impl RoleRegistry {
    pub fn new(owner: AccountId) -> Self {
        Self {
            owner,
            pending_owner: None,
            admins: FxHashSet::default(),
            minters: FxHashSet::default(),
            burners: FxHashSet::default(),
            allowed_holders: FxHashSet::default(),
            restrict_holders: false,
        }
    }

    pub fn owner(&self) -> AccountId {
        self.owner
    }

    pub fn is_privileged(&self, account: AccountId) -> bool {
        account == self.owner || self.admins.contains(&account)
    }

    pub fn require_privileged(&self, account: AccountId) -> Result<(), FundError> {
        if !self.is_privileged(account) {
            return Err(FundError::Unauthorized { account, required: "owner or admin" });
        }
        Ok(())
    }

    pub fn require_owner(&self, account: AccountId) -> Result<(), FundError> {
        if account != self.owner {
            return Err(FundError::Unauthorized { account, required: "owner" });
        }
        Ok(())
    }

    // Two-step owner handoff: the current owner nominates, the nominee
    // accepts. Nomination can be replaced until accepted.
    pub fn begin_owner_transfer(
        &mut self,
        caller: AccountId,
        pending: AccountId,
    ) -> Result<(), FundError> {
        self.require_owner(caller)?;
        self.pending_owner = Some(pending);
        Ok(())
    }

    pub fn accept_owner(&mut self, caller: AccountId) -> Result<(), FundError> {
        match self.pending_owner {
            Some(pending) if pending == caller => {
                self.owner = caller;
                self.pending_owner = None;
                Ok(())
            }
            _ => Err(FundError::Unauthorized { account: caller, required: "pending owner" }),
        }
    }

    pub fn pending_owner(&self) -> Option<AccountId> {
        self.pending_owner
    }

    pub fn grant(&mut self, caller: AccountId, account: AccountId, role: Role) -> Result<(), FundError> {
        self.check_role_authority(caller, role)?;
        self.set_for(role).insert(account);
        Ok(())
    }

    pub fn revoke(
        &mut self,
        caller: AccountId,
        account: AccountId,
        role: Role,
    ) -> Result<(), FundError> {
        self.check_role_authority(caller, role)?;
        self.set_for(role).remove(&account);
        Ok(())
    }

    pub fn has_role(&self, account: AccountId, role: Role) -> bool {
        match role {
            Role::Admin => self.admins.contains(&account),
            Role::Minter => self.minters.contains(&account),
            Role::Burner => self.burners.contains(&account),
            Role::AllowedHolder => self.allowed_holders.contains(&account),
        }
    }

    pub fn is_minter(&self, account: AccountId) -> bool {
        self.minters.contains(&account)
    }

    pub fn is_burner(&self, account: AccountId) -> bool {
        self.burners.contains(&account)
    }

    pub fn set_restrict_holders(&mut self, caller: AccountId, restrict: bool) -> Result<(), FundError> {
        self.require_privileged(caller)?;
        self.restrict_holders = restrict;
        Ok(())
    }

    pub fn is_holder_admitted(&self, account: AccountId) -> bool {
        !self.restrict_holders || self.allowed_holders.contains(&account)
    }

    fn check_role_authority(&self, caller: AccountId, role: Role) -> Result<(), FundError> {
        match role {
            // only the owner reshapes the admin set
            Role::Admin => self.require_owner(caller),
            _ => self.require_privileged(caller),
        }
    }

    fn set_for(&mut self, role: Role) -> &mut FxHashSet<AccountId> {
        match role {
            Role::Admin => &mut self.admins,
            Role::Minter => &mut self.minters,
            Role::Burner => &mut self.burners,
            Role::AllowedHolder => &mut self.allowed_holders,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: AccountId = 1;
    const ADMIN: AccountId = 2;
    const OUTSIDER: AccountId = 3;

    #[test]
    fn test_owner_handoff_two_step() {
        let mut registry = RoleRegistry::new(OWNER);

        assert!(registry.begin_owner_transfer(OUTSIDER, OUTSIDER).is_err());
        registry.begin_owner_transfer(OWNER, ADMIN).unwrap();

        // only the nominee may accept
        assert!(registry.accept_owner(OUTSIDER).is_err());
        registry.accept_owner(ADMIN).unwrap();
        assert_eq!(registry.owner(), ADMIN);
        assert_eq!(registry.pending_owner(), None);
    }

    #[test]
    fn test_admin_set_owner_only() {
        let mut registry = RoleRegistry::new(OWNER);
        registry.grant(OWNER, ADMIN, Role::Admin).unwrap();
        assert!(registry.is_privileged(ADMIN));

        // admins cannot mint new admins
        assert!(registry.grant(ADMIN, OUTSIDER, Role::Admin).is_err());
        // but may manage the handler sets
        registry.grant(ADMIN, OUTSIDER, Role::Minter).unwrap();
        assert!(registry.is_minter(OUTSIDER));
        registry.revoke(ADMIN, OUTSIDER, Role::Minter).unwrap();
        assert!(!registry.is_minter(OUTSIDER));
    }

    #[test]
    fn test_holder_restriction_toggle() {
        let mut registry = RoleRegistry::new(OWNER);
        assert!(registry.is_holder_admitted(OUTSIDER));

        registry.set_restrict_holders(OWNER, true).unwrap();
        assert!(!registry.is_holder_admitted(OUTSIDER));

        registry.grant(OWNER, OUTSIDER, Role::AllowedHolder).unwrap();
        assert!(registry.is_holder_admitted(OUTSIDER));
    }
}
