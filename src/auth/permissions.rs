/*!
 * # Capabilities
 *
 * Capabilities are `resource:action` strings. A trailing `:*` grants every
 * action on a resource and a bare `*` grants everything.
 */

/// Permission actions
pub struct Actions;

impl Actions {
    pub const READ: &'static str = "read";
    pub const WRITE: &'static str = "write";
    pub const GENERATE: &'static str = "generate";
    pub const CLOSE: &'static str = "close";
    pub const PAY: &'static str = "pay";
    pub const PUBLISH: &'static str = "publish";
    pub const READ_OWN: &'static str = "read_own";
    pub const ALL: &'static str = "*";
}

/// Resource types
pub struct Resources;

impl Resources {
    pub const APARTMENTS: &'static str = "apartments";
    pub const HOUSEHOLDS: &'static str = "households";
    pub const RESIDENTS: &'static str = "residents";
    pub const VEHICLES: &'static str = "vehicles";
    pub const FEE_ITEMS: &'static str = "fee_items";
    pub const FEE_PERIODS: &'static str = "fee_periods";
    pub const FEE_OBLIGATIONS: &'static str = "fee_obligations";
    pub const REPORTS: &'static str = "reports";
    pub const NOTIFICATIONS: &'static str = "notifications";
    pub const USERS: &'static str = "users";
}

/// Permission string constants used by route guards
pub mod consts {
    pub const ALL: &str = "*";

    pub const APARTMENTS_READ: &str = "apartments:read";
    pub const APARTMENTS_WRITE: &str = "apartments:write";

    pub const HOUSEHOLDS_READ: &str = "households:read";
    pub const HOUSEHOLDS_WRITE: &str = "households:write";

    pub const RESIDENTS_READ: &str = "residents:read";
    pub const RESIDENTS_WRITE: &str = "residents:write";

    pub const VEHICLES_READ: &str = "vehicles:read";
    pub const VEHICLES_WRITE: &str = "vehicles:write";

    pub const FEE_ITEMS_READ: &str = "fee_items:read";
    pub const FEE_ITEMS_WRITE: &str = "fee_items:write";

    pub const FEE_PERIODS_READ: &str = "fee_periods:read";
    pub const FEE_PERIODS_WRITE: &str = "fee_periods:write";
    pub const FEE_PERIODS_GENERATE: &str = "fee_periods:generate";
    pub const FEE_PERIODS_CLOSE: &str = "fee_periods:close";

    pub const FEE_OBLIGATIONS_READ: &str = "fee_obligations:read";
    /// Obligations of the caller's own household
    pub const FEE_OBLIGATIONS_READ_OWN: &str = "fee_obligations:read_own";
    pub const FEE_OBLIGATIONS_WRITE: &str = "fee_obligations:write";
    pub const FEE_OBLIGATIONS_PAY: &str = "fee_obligations:pay";

    pub const REPORTS_READ: &str = "reports:read";

    pub const NOTIFICATIONS_READ: &str = "notifications:read";
    pub const NOTIFICATIONS_WRITE: &str = "notifications:write";
    pub const NOTIFICATIONS_PUBLISH: &str = "notifications:publish";

    pub const USERS_READ: &str = "users:read";
    pub const USERS_WRITE: &str = "users:write";
}

/// Builds a capability string from its parts.
pub fn capability(resource: &str, action: &str) -> String {
    format!("{}:{}", resource, action)
}

/// Splits a capability into `(resource, action)`.
pub fn split_capability(capability: &str) -> Option<(&str, &str)> {
    capability.split_once(':')
}

/// Whether a granted capability covers a required one.
pub fn grants(granted: &str, required: &str) -> bool {
    if granted == Actions::ALL || granted == required {
        return true;
    }

    match (split_capability(granted), split_capability(required)) {
        (Some((granted_resource, Actions::ALL)), Some((required_resource, _))) => {
            granted_resource == required_resource
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("*", "fee_periods:close", true)]
    #[case("fee_periods:*", "fee_periods:close", true)]
    #[case("fee_periods:read", "fee_periods:read", true)]
    #[case("fee_periods:read", "fee_periods:close", false)]
    #[case("fee_items:*", "fee_periods:read", false)]
    #[case("fee:*", "fee_periods:read", false)]
    fn capability_matching(#[case] granted: &str, #[case] required: &str, #[case] ok: bool) {
        assert_eq!(grants(granted, required), ok);
    }

    #[test]
    fn builds_and_splits() {
        let cap = capability(Resources::FEE_OBLIGATIONS, Actions::PAY);
        assert_eq!(cap, consts::FEE_OBLIGATIONS_PAY);
        assert_eq!(split_capability(&cap), Some(("fee_obligations", "pay")));
    }
}
