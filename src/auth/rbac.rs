/*!
 * # Role-Based Access Control (RBAC) Module
 *
 * Maps console roles to capability sets. The table is evaluated on every
 * request; capabilities returned at login are only a projection for menus.
 */

use lazy_static::lazy_static;
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

use super::permissions::{consts, grants};
use crate::entities::user::UserRole;

/// Role definition with associated capabilities
#[derive(Debug, Clone)]
pub struct Role {
    pub role: UserRole,
    pub description: &'static str,
    pub capabilities: Vec<&'static str>,
}

lazy_static! {
    pub static ref ROLES: HashMap<UserRole, Role> = {
        let mut roles = HashMap::new();

        roles.insert(
            UserRole::Admin,
            Role {
                role: UserRole::Admin,
                description: "Administrator with full access",
                capabilities: vec![consts::ALL],
            },
        );

        // Block leader: looks after the registries and announcements
        roles.insert(
            UserRole::ToTruong,
            Role {
                role: UserRole::ToTruong,
                description: "Block leader managing households and notices",
                capabilities: vec![
                    "apartments:*",
                    "households:*",
                    "residents:*",
                    "vehicles:*",
                    "notifications:*",
                    consts::FEE_ITEMS_READ,
                    consts::FEE_PERIODS_READ,
                    consts::FEE_OBLIGATIONS_READ,
                    consts::FEE_OBLIGATIONS_READ_OWN,
                    consts::REPORTS_READ,
                ],
            },
        );

        // Accountant: owns the billing lifecycle
        roles.insert(
            UserRole::KeToan,
            Role {
                role: UserRole::KeToan,
                description: "Accountant running billing and collection",
                capabilities: vec![
                    "fee_items:*",
                    "fee_periods:*",
                    "fee_obligations:*",
                    consts::REPORTS_READ,
                    consts::HOUSEHOLDS_READ,
                    consts::APARTMENTS_READ,
                    consts::NOTIFICATIONS_READ,
                ],
            },
        );

        roles.insert(
            UserRole::Resident,
            Role {
                role: UserRole::Resident,
                description: "Resident with access to their own household",
                capabilities: vec![
                    consts::NOTIFICATIONS_READ,
                    consts::FEE_OBLIGATIONS_READ_OWN,
                ],
            },
        );

        roles
    };
}

/// RBAC service resolving roles to capabilities
#[derive(Debug, Clone, Default)]
pub struct RbacService;

impl RbacService {
    pub fn new() -> Self {
        Self
    }

    /// Get a role by its wire name (`ADMIN`, `KE_TOAN`, ...)
    pub fn get_role(&self, role_name: &str) -> Option<&'static Role> {
        match role_name.parse::<UserRole>() {
            Ok(role) => ROLES.get(&role),
            Err(_) => {
                warn!("Role not found: {}", role_name);
                None
            }
        }
    }

    /// Union of the capabilities of every named role; unknown names are ignored.
    pub fn capabilities_for_roles(&self, role_names: &[String]) -> BTreeSet<String> {
        role_names
            .iter()
            .filter_map(|name| self.get_role(name))
            .flat_map(|role| role.capabilities.iter().map(|c| c.to_string()))
            .collect()
    }

    /// Check if a granted capability covers the required one
    pub fn check_permission(&self, granted: &str, required: &str) -> bool {
        grants(granted, required)
    }

    /// Whether any of the roles grants `required`
    pub fn roles_grant(&self, role_names: &[String], required: &str) -> bool {
        self.capabilities_for_roles(role_names)
            .iter()
            .any(|granted| self.check_permission(granted, required))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn roles(role: &str) -> Vec<String> {
        vec![role.to_string()]
    }

    #[rstest]
    #[case("ADMIN", consts::USERS_WRITE, true)]
    #[case("ADMIN", consts::FEE_PERIODS_GENERATE, true)]
    #[case("KE_TOAN", consts::FEE_PERIODS_GENERATE, true)]
    #[case("KE_TOAN", consts::FEE_PERIODS_CLOSE, true)]
    #[case("KE_TOAN", consts::FEE_OBLIGATIONS_PAY, true)]
    #[case("KE_TOAN", consts::HOUSEHOLDS_WRITE, false)]
    #[case("KE_TOAN", consts::USERS_READ, false)]
    #[case("TO_TRUONG", consts::HOUSEHOLDS_WRITE, true)]
    #[case("TO_TRUONG", consts::NOTIFICATIONS_PUBLISH, true)]
    #[case("TO_TRUONG", consts::FEE_OBLIGATIONS_READ, true)]
    #[case("TO_TRUONG", consts::FEE_OBLIGATIONS_PAY, false)]
    #[case("TO_TRUONG", consts::FEE_PERIODS_GENERATE, false)]
    #[case("RESIDENT", consts::NOTIFICATIONS_READ, true)]
    #[case("RESIDENT", consts::FEE_OBLIGATIONS_READ_OWN, true)]
    #[case("RESIDENT", consts::FEE_OBLIGATIONS_READ, false)]
    #[case("RESIDENT", consts::REPORTS_READ, false)]
    fn role_capability_table(#[case] role: &str, #[case] cap: &str, #[case] allowed: bool) {
        let rbac = RbacService::new();
        assert_eq!(rbac.roles_grant(&roles(role), cap), allowed);
    }

    #[test]
    fn unknown_roles_grant_nothing() {
        let rbac = RbacService::new();
        assert!(rbac.capabilities_for_roles(&roles("SUPERUSER")).is_empty());
        assert!(!rbac.roles_grant(&roles("SUPERUSER"), consts::NOTIFICATIONS_READ));
    }

    #[test]
    fn capabilities_union_across_roles() {
        let rbac = RbacService::new();
        let caps = rbac.capabilities_for_roles(&[
            "RESIDENT".to_string(),
            "KE_TOAN".to_string(),
        ]);
        assert!(caps.contains("fee_periods:*"));
        assert!(caps.contains(consts::FEE_OBLIGATIONS_READ_OWN));
    }
}
