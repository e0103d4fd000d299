//! Organization-scoped membership roles.
//!
//! The role set is a fixed total order. It is deliberately not
//! configurable: adding a role is a code change, reviewed like any other
//! security-relevant change.

use serde::{Deserialize, Serialize};

/// Membership role within an organization.
///
/// Ordered `readonly < member < admin < owner`. All privilege comparisons go
/// through [`Role::satisfies`], which compares ranks; roles are never
/// compared as strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Readonly,
    Member,
    Admin,
    Owner,
}

impl Role {
    /// Fixed position in the privilege lattice.
    pub fn rank(&self) -> u8 {
        match self {
            Role::Readonly => 1,
            Role::Member => 2,
            Role::Admin => 3,
            Role::Owner => 4,
        }
    }

    /// True when this role grants everything `required` grants.
    pub fn satisfies(&self, required: Role) -> bool {
        self.rank() >= required.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Readonly => "readonly",
            Role::Member => "member",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }
}

impl PartialOrd for Role {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Role {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "readonly" => Ok(Role::Readonly),
            "member" => Ok(Role::Member),
            "admin" => Ok(Role::Admin),
            "owner" => Ok(Role::Owner),
            _ => Err(format!("unknown role: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const ALL: [Role; 4] = [Role::Readonly, Role::Member, Role::Admin, Role::Owner];

    #[test]
    fn satisfies_iff_rank_is_at_least_required() {
        for actual in ALL {
            for required in ALL {
                assert_eq!(
                    actual.satisfies(required),
                    actual.rank() >= required.rank(),
                    "{} vs {}",
                    actual,
                    required
                );
            }
        }
    }

    #[test]
    fn readonly_never_satisfies_owner() {
        assert!(!Role::Readonly.satisfies(Role::Owner));
        assert!(Role::Owner.satisfies(Role::Readonly));
    }

    #[test]
    fn total_order_matches_lattice() {
        assert!(Role::Readonly < Role::Member);
        assert!(Role::Member < Role::Admin);
        assert!(Role::Admin < Role::Owner);
    }

    #[test]
    fn from_str_round_trips() {
        for role in ALL {
            assert_eq!(Role::from_str(role.as_str()).unwrap(), role);
        }
        assert!(Role::from_str("superuser").is_err());
        // No case folding: stored values are canonical lowercase.
        assert!(Role::from_str("Admin").is_err());
    }
}
