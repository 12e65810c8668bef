//! Role-based access policy.
//!
//! One table maps (resource, action) to the scope each role gets, and
//! `owner_link` says which column makes a record a role's own. Services
//! never compare roles themselves; they ask `check` for a scope and
//! `owner_link` for the ownership rule behind `Scope::Own`.

use serde::Serialize;

use crate::db::Role;
use crate::error::CrmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    User,
    Client,
    Contract,
    Event,
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Resource::User => "users",
            Resource::Client => "clients",
            Resource::Contract => "contracts",
            Resource::Event => "events",
        };
        f.pad(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    List,
    Update,
    Delete,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Action::Create => "create",
            Action::List => "list",
            Action::Update => "update",
            Action::Delete => "delete",
        };
        f.pad(s)
    }
}

/// What a role may touch for a given action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Any record
    All,
    /// Only records the acting user owns or is assigned to
    Own,
    Denied,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Scope::All => "all",
            Scope::Own => "own",
            Scope::Denied => "denied",
        };
        f.pad(s)
    }
}

/// The link that ties a record to a user holding `Scope::Own`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerLink {
    /// The sales user recorded on a client, or on the contract behind an event
    Commercial,
    /// The support user assigned to an event
    AssignedSupport,
}

/// How `role` owns records; `None` for roles that never hold `Scope::Own`
pub fn owner_link(role: Role) -> Option<OwnerLink> {
    match role {
        Role::Management => None,
        Role::Sales => Some(OwnerLink::Commercial),
        Role::Support => Some(OwnerLink::AssignedSupport),
    }
}

struct Rule {
    resource: Resource,
    action: Action,
    management: Scope,
    sales: Scope,
    support: Scope,
}

impl Rule {
    const fn new(resource: Resource, action: Action, management: Scope, sales: Scope, support: Scope) -> Self {
        Self {
            resource,
            action,
            management,
            sales,
            support,
        }
    }

    fn scope_for(&self, role: Role) -> Scope {
        match role {
            Role::Management => self.management,
            Role::Sales => self.sales,
            Role::Support => self.support,
        }
    }
}

use Action::*;
use Resource::{Client, Contract, Event, User};
use Scope::{All, Denied, Own};

#[rustfmt::skip]
const POLICY: &[Rule] = &[
    //        resource   action  management sales   support
    Rule::new(User,      Create, All,       Denied, Denied),
    Rule::new(User,      List,   All,       Denied, Denied),
    Rule::new(User,      Update, All,       Denied, Denied),
    Rule::new(User,      Delete, All,       Denied, Denied),

    Rule::new(Client,    Create, Denied,    Own,    Denied),
    Rule::new(Client,    List,   All,       Own,    Denied),
    Rule::new(Client,    Update, All,       Own,    Denied),
    Rule::new(Client,    Delete, All,       Denied, Denied),

    Rule::new(Contract,  Create, All,       Own,    Denied),
    Rule::new(Contract,  List,   All,       Own,    Denied),
    Rule::new(Contract,  Update, All,       Own,    Denied),
    Rule::new(Contract,  Delete, All,       Denied, Denied),

    Rule::new(Event,     Create, Denied,    Own,    Denied),
    Rule::new(Event,     List,   All,       Own,    Own),
    Rule::new(Event,     Update, All,       Denied, Own),
    Rule::new(Event,     Delete, Denied,    Denied, Denied),
];

/// Look up the scope `role` has for `action` on `resource`.
/// Pairs missing from the table are denied.
pub fn scope(role: Role, resource: Resource, action: Action) -> Scope {
    POLICY
        .iter()
        .find(|rule| rule.resource == resource && rule.action == action)
        .map(|rule| rule.scope_for(role))
        .unwrap_or(Denied)
}

/// Like `scope`, but a denial becomes a `Forbidden` error
pub fn check(role: Role, resource: Resource, action: Action) -> Result<Scope, CrmError> {
    match scope(role, resource, action) {
        Denied => {
            tracing::warn!("Denied {} {} for role {}", action, resource, role);
            Err(CrmError::forbidden(format!(
                "The {} role cannot {} {}",
                role, action, resource
            )))
        }
        allowed => Ok(allowed),
    }
}

/// Every action a role may perform, for menus and `whoami`
pub fn permitted(role: Role) -> Vec<(Resource, Action, Scope)> {
    POLICY
        .iter()
        .map(|rule| (rule.resource, rule.action, rule.scope_for(role)))
        .filter(|(_, _, scope)| *scope != Denied)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_user_management_is_management_only() {
        for action in [Create, List, Update, Delete] {
            assert_eq!(scope(Role::Management, User, action), All);
            assert_eq!(scope(Role::Sales, User, action), Denied);
            assert_eq!(scope(Role::Support, User, action), Denied);
        }
    }

    #[test]
    fn test_client_rules() {
        assert_eq!(scope(Role::Management, Client, Create), Denied);
        assert_eq!(scope(Role::Sales, Client, Create), Own);
        assert_eq!(scope(Role::Sales, Client, List), Own);
        assert_eq!(scope(Role::Support, Client, List), Denied);
        assert_eq!(scope(Role::Management, Client, Update), All);
        assert_eq!(scope(Role::Sales, Client, Delete), Denied);
    }

    #[test]
    fn test_contract_rules() {
        assert_eq!(scope(Role::Management, Contract, Create), All);
        assert_eq!(scope(Role::Sales, Contract, Create), Own);
        assert_eq!(scope(Role::Support, Contract, List), Denied);
        assert_eq!(scope(Role::Management, Contract, Delete), All);
        assert_eq!(scope(Role::Sales, Contract, Delete), Denied);
    }

    #[test]
    fn test_event_rules() {
        assert_eq!(scope(Role::Sales, Event, Create), Own);
        assert_eq!(scope(Role::Management, Event, Create), Denied);
        assert_eq!(scope(Role::Support, Event, List), Own);
        assert_eq!(scope(Role::Sales, Event, Update), Denied);
        assert_eq!(scope(Role::Support, Event, Update), Own);
        assert_eq!(scope(Role::Management, Event, Update), All);
    }

    #[test]
    fn test_every_pair_has_exactly_one_rule() {
        for resource in [User, Client, Contract, Event] {
            for action in [Create, List, Update, Delete] {
                let n = POLICY
                    .iter()
                    .filter(|r| r.resource == resource && r.action == action)
                    .count();
                assert_eq!(n, 1, "{} {}", resource, action);
            }
        }
    }

    #[test]
    fn test_check_denial_is_forbidden() {
        let err = check(Role::Support, Client, Create).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);
        assert_eq!(check(Role::Sales, Client, Create).unwrap(), Own);
    }

    #[test]
    fn test_display_respects_width() {
        assert_eq!(format!("{:<10}|", Client), "clients   |");
        assert_eq!(format!("{:<8}|", Update), "update  |");
        assert_eq!(format!("{:<7}|", Own), "own    |");
        assert_eq!(Denied.to_string(), "denied");
    }

    #[test]
    fn test_every_own_scope_has_an_owner_link() {
        for rule in POLICY {
            for role in Role::ALL {
                if rule.scope_for(role) == Own {
                    assert!(owner_link(role).is_some(), "{} {} {}", role, rule.action, rule.resource);
                }
            }
        }
        assert_eq!(owner_link(Role::Sales), Some(OwnerLink::Commercial));
        assert_eq!(owner_link(Role::Support), Some(OwnerLink::AssignedSupport));
    }

    #[test]
    fn test_permitted_for_support() {
        let allowed = permitted(Role::Support);
        assert_eq!(allowed, vec![(Event, List, Own), (Event, Update, Own)]);
    }
}
