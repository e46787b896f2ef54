use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::{Authority, Identity, Role};
use super::event::LedgerEvent;
use crate::error::{Error, Result};

/// Voter registration status. Registrations are kept after revocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterRegistration {
    pub identity: Identity,
    pub registered: bool,
    pub registered_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Role grants, voter registrations and the root authority.
///
/// The Voter role and voter registration always move together: granting Voter
/// registers the identity and revoking it deregisters them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccessControl {
    root: Option<Identity>,
    roles: HashMap<Identity, BTreeSet<Role>>,
    voters: HashMap<Identity, VoterRegistration>,
}

impl AccessControl {
    /// The root authority, once the ledger has been initialised.
    pub fn root(&self) -> Option<&Identity> {
        self.root.as_ref()
    }

    pub fn is_root(&self, identity: &Identity) -> bool {
        self.root.as_ref() == Some(identity)
    }

    pub fn has_role(&self, identity: &Identity, role: Role) -> bool {
        self.roles
            .get(identity)
            .map_or(false, |roles| roles.contains(&role))
    }

    /// Can this identity cast votes?
    pub fn is_eligible_voter(&self, identity: &Identity) -> bool {
        self.has_role(identity, Role::Voter) && self.is_registered_voter(identity)
    }

    pub fn voter(&self, identity: &Identity) -> Option<&VoterRegistration> {
        self.voters.get(identity)
    }

    pub fn is_registered_voter(&self, identity: &Identity) -> bool {
        self.voters.get(identity).map_or(false, |v| v.registered)
    }

    pub fn registered_voter_count(&self) -> usize {
        self.voters.values().filter(|v| v.registered).count()
    }

    pub fn administrator_count(&self) -> usize {
        self.roles
            .values()
            .filter(|roles| roles.contains(&Role::Administrator))
            .count()
    }

    /// Fail with [`Error::Unauthorized`] unless the caller has the given authority.
    pub fn require(&self, caller: &Identity, required: Authority) -> Result<()> {
        let allowed = match required {
            Authority::Root => self.is_root(caller),
            Authority::Role(role) => self.has_role(caller, role),
            Authority::Either(a, b) => self.has_role(caller, a) || self.has_role(caller, b),
        };
        if allowed {
            Ok(())
        } else {
            Err(Error::Unauthorized {
                identity: caller.clone(),
                required,
            })
        }
    }

    pub fn check_genesis(&self, root: &Identity) -> Result<LedgerEvent> {
        if self.root.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        if root.is_empty() {
            return Err(Error::EmptyField("root"));
        }
        Ok(LedgerEvent::LedgerInitialized { root: root.clone() })
    }

    pub fn apply_genesis(&mut self, root: Identity) {
        self.roles
            .entry(root.clone())
            .or_default()
            .insert(Role::Administrator);
        self.root = Some(root);
    }

    pub fn check_grant(
        &self,
        caller: &Identity,
        identity: &Identity,
        role: Role,
    ) -> Result<LedgerEvent> {
        if role == Role::Voter {
            return self.check_register_voter(caller, identity);
        }
        self.require_admin(caller, identity)?;
        if self.has_role(identity, role) {
            return Err(Error::AlreadyRegistered {
                identity: identity.clone(),
                role,
            });
        }
        Ok(LedgerEvent::RoleGranted {
            identity: identity.clone(),
            role,
        })
    }

    pub fn apply_grant(&mut self, identity: &Identity, role: Role, at: DateTime<Utc>) {
        if role == Role::Voter {
            return self.apply_register_voter(identity, at);
        }
        self.roles.entry(identity.clone()).or_default().insert(role);
    }

    pub fn check_revoke(
        &self,
        caller: &Identity,
        identity: &Identity,
        role: Role,
    ) -> Result<LedgerEvent> {
        if role == Role::Voter {
            return self.check_revoke_voter(caller, identity);
        }
        self.require_admin(caller, identity)?;
        if !self.has_role(identity, role) {
            return Err(Error::NotRegistered {
                identity: identity.clone(),
                role,
            });
        }
        if role == Role::Administrator && self.administrator_count() <= 1 {
            return Err(Error::LastAdministrator(identity.clone()));
        }
        Ok(LedgerEvent::RoleRevoked {
            identity: identity.clone(),
            role,
        })
    }

    pub fn apply_revoke(&mut self, identity: &Identity, role: Role, at: DateTime<Utc>) {
        if role == Role::Voter {
            return self.apply_revoke_voter(identity, at);
        }
        self.remove_role(identity, role);
    }

    pub fn check_register_voter(
        &self,
        caller: &Identity,
        identity: &Identity,
    ) -> Result<LedgerEvent> {
        self.require_admin(caller, identity)?;
        if self.is_eligible_voter(identity) {
            return Err(Error::AlreadyRegistered {
                identity: identity.clone(),
                role: Role::Voter,
            });
        }
        Ok(LedgerEvent::VoterRegistered {
            identity: identity.clone(),
        })
    }

    pub fn apply_register_voter(&mut self, identity: &Identity, at: DateTime<Utc>) {
        self.voters.insert(
            identity.clone(),
            VoterRegistration {
                identity: identity.clone(),
                registered: true,
                registered_at: at,
                revoked_at: None,
            },
        );
        self.roles
            .entry(identity.clone())
            .or_default()
            .insert(Role::Voter);
    }

    pub fn check_revoke_voter(
        &self,
        caller: &Identity,
        identity: &Identity,
    ) -> Result<LedgerEvent> {
        self.require_admin(caller, identity)?;
        if !self.is_eligible_voter(identity) {
            return Err(Error::NotRegistered {
                identity: identity.clone(),
                role: Role::Voter,
            });
        }
        Ok(LedgerEvent::VoterRevoked {
            identity: identity.clone(),
        })
    }

    pub fn apply_revoke_voter(&mut self, identity: &Identity, at: DateTime<Utc>) {
        if let Some(voter) = self.voters.get_mut(identity) {
            voter.registered = false;
            voter.revoked_at = Some(at);
        }
        self.remove_role(identity, Role::Voter);
    }

    /// Common preamble of every role change: the caller must be an administrator
    /// and the target must be named.
    fn require_admin(&self, caller: &Identity, identity: &Identity) -> Result<()> {
        self.require(caller, Authority::Role(Role::Administrator))?;
        if identity.is_empty() {
            return Err(Error::EmptyField("identity"));
        }
        Ok(())
    }

    fn remove_role(&mut self, identity: &Identity, role: Role) {
        if let Some(roles) = self.roles.get_mut(identity) {
            roles.remove(&role);
            if roles.is_empty() {
                self.roles.remove(identity);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 1, 8, 0, 0).unwrap()
    }

    fn access() -> AccessControl {
        let mut access = AccessControl::default();
        access.check_genesis(&"root".into()).unwrap();
        access.apply_genesis("root".into());
        access
    }

    #[test]
    fn genesis_once() {
        let access = access();
        assert!(access.is_root(&"root".into()));
        assert!(access.has_role(&"root".into(), Role::Administrator));
        assert_eq!(
            access.check_genesis(&"other".into()),
            Err(Error::AlreadyInitialized)
        );
        assert_eq!(
            AccessControl::default().check_genesis(&"".into()),
            Err(Error::EmptyField("root"))
        );
    }

    #[test]
    fn voter_role_follows_registration() {
        let mut access = access();
        let root = Identity::from("root");
        let v1 = Identity::from("V1");

        assert_eq!(
            access.check_grant(&root, &v1, Role::Voter),
            Ok(LedgerEvent::VoterRegistered { identity: v1.clone() })
        );
        access.apply_grant(&v1, Role::Voter, now());
        assert!(access.is_eligible_voter(&v1));
        assert_eq!(access.registered_voter_count(), 1);
        assert_eq!(
            access.check_register_voter(&root, &v1),
            Err(Error::AlreadyRegistered {
                identity: v1.clone(),
                role: Role::Voter
            })
        );

        assert_eq!(
            access.check_revoke(&root, &v1, Role::Voter),
            Ok(LedgerEvent::VoterRevoked { identity: v1.clone() })
        );
        access.apply_revoke(&v1, Role::Voter, now());
        assert!(!access.has_role(&v1, Role::Voter));
        assert_eq!(access.voter(&v1).and_then(|v| v.revoked_at), Some(now()));
        assert_eq!(
            access.check_revoke_voter(&root, &v1),
            Err(Error::NotRegistered {
                identity: v1.clone(),
                role: Role::Voter
            })
        );

        // Revoked voters may come back.
        access.check_register_voter(&root, &v1).unwrap();
        access.apply_register_voter(&v1, now());
        assert!(access.is_eligible_voter(&v1));
    }

    #[test]
    fn role_changes_need_an_administrator() {
        let access = access();
        let v1 = Identity::from("V1");
        assert_eq!(
            access.check_grant(&v1, &v1, Role::Administrator),
            Err(Error::Unauthorized {
                identity: v1.clone(),
                required: Authority::Role(Role::Administrator),
            })
        );
        assert_eq!(
            access.check_grant(&"root".into(), &"  ".into(), Role::Auditor),
            Err(Error::EmptyField("identity"))
        );
    }

    #[test]
    fn last_administrator_stays() {
        let mut access = access();
        let root = Identity::from("root");
        let a2 = Identity::from("A2");
        assert_eq!(
            access.check_revoke(&root, &root, Role::Administrator),
            Err(Error::LastAdministrator(root.clone()))
        );

        access.check_grant(&root, &a2, Role::Administrator).unwrap();
        access.apply_grant(&a2, Role::Administrator, now());
        assert_eq!(access.administrator_count(), 2);
        assert_eq!(
            access.check_grant(&root, &a2, Role::Administrator),
            Err(Error::AlreadyRegistered {
                identity: a2.clone(),
                role: Role::Administrator
            })
        );

        access.check_revoke(&a2, &root, Role::Administrator).unwrap();
        access.apply_revoke(&root, Role::Administrator, now());
        // Root authority is separate from the Administrator role.
        assert!(access.is_root(&root));
        assert!(access.require(&root, Authority::Root).is_ok());
        assert!(access.require(&root, Authority::Role(Role::Administrator)).is_err());
        assert_eq!(
            access.check_revoke(&a2, &a2, Role::Administrator),
            Err(Error::LastAdministrator(a2.clone()))
        );
    }

    #[test]
    fn either_authority() {
        let mut access = access();
        let auditor = Identity::from("auditor");
        access.apply_grant(&auditor, Role::Auditor, now());
        let required = Authority::Either(Role::Auditor, Role::Administrator);
        assert!(access.require(&auditor, required).is_ok());
        assert!(access.require(&"root".into(), required).is_ok());
        assert!(access.require(&"V1".into(), required).is_err());
    }
}
