//! Role-based access policy: a static (action, verb) -> required-level
//! table, loaded once at process start.

use std::collections::HashMap;

use axum::http::Method;

/// Applied to any (action, verb) pair absent from the table. Deliberately
/// high so unmapped routes are admin-only instead of silently open.
pub const DEFAULT_ACCESS_LEVEL: i32 = 7000;

/// A role created on demand by user provisioning.
#[derive(Clone, Copy, Debug)]
pub struct RoleSeed {
    pub name: &'static str,
    pub access_level: i32,
}

pub const ROLE_USER: RoleSeed = RoleSeed {
    name: "User",
    access_level: 2000,
};

pub const ROLE_ADMIN: RoleSeed = RoleSeed {
    name: "Admin",
    access_level: 7000,
};

/// Map an external role hint to a default role. Matching is
/// case-insensitive; unrecognized hints fall back to the lowest-privilege
/// role.
pub fn default_role_for_hint(hint: &str) -> RoleSeed {
    match hint.to_lowercase().as_str() {
        "admin" => ROLE_ADMIN,
        _ => ROLE_USER,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccessAction {
    TemplateList,
    /// The free-text-narrowed variant of the list route.
    TemplateSearch,
    /// Capability to see all public templates regardless of approval;
    /// widens the visibility base set instead of gating the route.
    TemplateListAll,
    TemplateDetail,
    TemplateCreate,
    TemplateUpdate,
    TemplateDelete,
    TemplateApprove,
    TemplateReject,
    TemplateCollisionCheck,
    FavoriteList,
    FavoriteAdd,
    FavoriteRemove,
    UserList,
    UserDetail,
    UserRoleChange,
    UserDelete,
    RoleList,
    RoleDetail,
    RoleCreate,
    RoleUpdate,
    RoleDelete,
}

pub struct AccessPolicy {
    required: HashMap<(AccessAction, Method), i32>,
}

impl AccessPolicy {
    pub fn new() -> Self {
        use AccessAction::*;
        let required = HashMap::from([
            ((TemplateList, Method::GET), 1003),
            ((TemplateSearch, Method::GET), 1004),
            ((TemplateDetail, Method::GET), 1005),
            ((TemplateCollisionCheck, Method::GET), 1008),
            ((TemplateCreate, Method::POST), 1101),
            ((TemplateUpdate, Method::PUT), 1102),
            ((TemplateDelete, Method::DELETE), 1103),
            ((TemplateListAll, Method::GET), 3001),
            ((TemplateApprove, Method::PATCH), 3101),
            ((TemplateReject, Method::PATCH), 3101),
            ((FavoriteList, Method::GET), 1009),
            ((FavoriteAdd, Method::POST), 1104),
            ((FavoriteRemove, Method::DELETE), 1105),
            ((UserDetail, Method::GET), 1000),
            ((UserList, Method::GET), 6001),
            ((UserRoleChange, Method::PATCH), 6101),
            ((UserDelete, Method::DELETE), 6102),
            ((RoleList, Method::GET), 6002),
            ((RoleDetail, Method::GET), 6002),
            ((RoleCreate, Method::POST), 6201),
            ((RoleUpdate, Method::PUT), 6202),
            ((RoleDelete, Method::DELETE), 6203),
        ]);
        Self { required }
    }

    pub fn required_level(&self, action: AccessAction, verb: &Method) -> i32 {
        self.required
            .get(&(action, verb.clone()))
            .copied()
            .unwrap_or(DEFAULT_ACCESS_LEVEL)
    }

    /// True iff the given access level clears the threshold for the pair.
    pub fn allows(&self, access_level: i32, action: AccessAction, verb: &Method) -> bool {
        access_level >= self.required_level(action, verb)
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapped_pairs_use_table_levels() {
        let policy = AccessPolicy::new();
        assert_eq!(
            policy.required_level(AccessAction::TemplateList, &Method::GET),
            1003
        );
        assert_eq!(
            policy.required_level(AccessAction::TemplateApprove, &Method::PATCH),
            3101
        );
        assert_eq!(
            policy.required_level(AccessAction::TemplateSearch, &Method::GET),
            1004
        );
        assert_eq!(
            policy.required_level(AccessAction::UserList, &Method::GET),
            6001
        );
    }

    #[test]
    fn unmapped_pairs_fall_back_to_default() {
        let policy = AccessPolicy::new();
        // Same action, wrong verb: not in the table.
        assert_eq!(
            policy.required_level(AccessAction::TemplateList, &Method::POST),
            DEFAULT_ACCESS_LEVEL
        );
    }

    #[test]
    fn allows_is_a_threshold_comparison() {
        let policy = AccessPolicy::new();
        assert!(policy.allows(1003, AccessAction::TemplateList, &Method::GET));
        assert!(policy.allows(9999, AccessAction::TemplateList, &Method::GET));
        assert!(!policy.allows(1002, AccessAction::TemplateList, &Method::GET));
    }

    #[test]
    fn ordinary_user_cannot_approve_or_list_all() {
        let policy = AccessPolicy::new();
        let level = ROLE_USER.access_level;
        assert!(policy.allows(level, AccessAction::TemplateCreate, &Method::POST));
        assert!(!policy.allows(level, AccessAction::TemplateApprove, &Method::PATCH));
        assert!(!policy.allows(level, AccessAction::TemplateListAll, &Method::GET));
    }

    #[test]
    fn role_hint_mapping_is_case_insensitive() {
        assert_eq!(default_role_for_hint("Admin").name, "Admin");
        assert_eq!(default_role_for_hint("ADMIN").name, "Admin");
        assert_eq!(default_role_for_hint("member").name, "User");
        assert_eq!(default_role_for_hint("").name, "User");
    }
}
