//! Effective permission scope of a relation.
//!
//! The scope is the intersection of the data-share baseline with the
//! explicit permission map. It is recomputed from the relation on every
//! call and never cached.

use std::collections::BTreeSet;

use orglink_core::error::{OrgLinkError, OrgLinkResult};
use orglink_core::models::relation::{
    Action, DataShareType, OrganizationRelation, RelationStatus,
};
use serde::Serialize;
use uuid::Uuid;

/// Immutable snapshot of what a relation allows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveScope {
    pub relation_id: Uuid,
    pub allowed_actions: BTreeSet<Action>,
    /// Empty whenever no action is allowed.
    pub allowed_services: BTreeSet<String>,
}

impl EffectiveScope {
    pub fn allows(&self, action: Action) -> bool {
        self.allowed_actions.contains(&action)
    }

    pub fn covers_service(&self, service: &str) -> bool {
        self.allowed_services.contains(service)
    }

    pub fn is_empty(&self) -> bool {
        self.allowed_actions.is_empty()
    }
}

pub struct PermissionScopeResolver;

impl PermissionScopeResolver {
    /// Actions a data-share type permits before explicit permissions
    /// are applied. `Custom` leaves the decision to the permission map.
    pub fn baseline(share: DataShareType) -> BTreeSet<Action> {
        match share {
            DataShareType::ReadOnly => BTreeSet::from([Action::Read]),
            DataShareType::ReadWrite => {
                BTreeSet::from([Action::Read, Action::Write, Action::Update])
            }
            DataShareType::Full | DataShareType::Custom => Action::ALL.into_iter().collect(),
        }
    }

    pub fn resolve(relation: &OrganizationRelation) -> EffectiveScope {
        let allowed_actions: BTreeSet<Action> = Self::baseline(relation.data_share_type)
            .intersection(&relation.permissions.granted())
            .copied()
            .collect();
        let allowed_services = if allowed_actions.is_empty() {
            BTreeSet::new()
        } else {
            relation.shared_data.services.clone()
        };
        EffectiveScope {
            relation_id: relation.id,
            allowed_actions,
            allowed_services,
        }
    }

    /// Access check for a concrete request against `relation`.
    ///
    /// Only an `Active` relation grants anything. When `service` is given
    /// it must be one of the shared services.
    pub fn authorize(
        relation: &OrganizationRelation,
        action: Action,
        service: Option<&str>,
    ) -> OrgLinkResult<EffectiveScope> {
        if relation.status != RelationStatus::Active {
            return Err(OrgLinkError::AuthorizationDenied {
                reason: format!("relation {} is {}", relation.id, relation.status),
            });
        }
        let scope = Self::resolve(relation);
        if !scope.allows(action) {
            return Err(OrgLinkError::AuthorizationDenied {
                reason: format!("action {action:?} is outside the relation scope"),
            });
        }
        if let Some(service) = service.filter(|s| !scope.covers_service(s)) {
            return Err(OrgLinkError::AuthorizationDenied {
                reason: format!("service {service} is not shared by the relation"),
            });
        }
        Ok(scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use orglink_core::models::relation::{
        Priority, RelationPermissions, RelationType, SharedData,
    };

    fn relation(share: DataShareType, permissions: RelationPermissions) -> OrganizationRelation {
        OrganizationRelation {
            id: Uuid::new_v4(),
            from_org_id: "ORG_A".into(),
            to_org_id: "ORG_B".into(),
            relation_type: RelationType::Hierarchical,
            data_share_type: share,
            status: RelationStatus::Active,
            approved_by_from_org: true,
            approved_by_to_org: true,
            shared_data: SharedData {
                services: ["registry".to_string(), "budget".to_string()].into(),
                ..Default::default()
            },
            permissions,
            priority: Priority::Low,
            notes: None,
            status_reason: None,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            end_date: None,
            access_count: 0,
            last_accessed_at: None,
            version: 0,
        }
    }

    const EVERYTHING: RelationPermissions = RelationPermissions {
        read: true,
        write: true,
        update: true,
        export: true,
        delete: true,
    };

    #[test]
    fn read_only_baseline_caps_explicit_permissions() {
        let scope = PermissionScopeResolver::resolve(&relation(DataShareType::ReadOnly, EVERYTHING));
        assert_eq!(scope.allowed_actions, BTreeSet::from([Action::Read]));
        assert_eq!(scope.allowed_services.len(), 2);
    }

    #[test]
    fn explicit_permissions_narrow_full_baseline() {
        let perms = RelationPermissions {
            export: true,
            ..Default::default()
        };
        let scope = PermissionScopeResolver::resolve(&relation(DataShareType::Full, perms));
        assert_eq!(
            scope.allowed_actions,
            BTreeSet::from([Action::Read, Action::Export])
        );
    }

    #[test]
    fn read_write_excludes_export_and_delete() {
        let scope =
            PermissionScopeResolver::resolve(&relation(DataShareType::ReadWrite, EVERYTHING));
        assert!(scope.allows(Action::Update));
        assert!(!scope.allows(Action::Export));
        assert!(!scope.allows(Action::Delete));
    }

    #[test]
    fn no_actions_means_no_services() {
        let none = RelationPermissions {
            read: false,
            ..Default::default()
        };
        let scope = PermissionScopeResolver::resolve(&relation(DataShareType::Custom, none));
        assert!(scope.is_empty());
        assert!(scope.allowed_services.is_empty());
    }

    #[test]
    fn scope_tracks_relation_changes() {
        let mut rel = relation(DataShareType::Full, RelationPermissions::default());
        assert!(!PermissionScopeResolver::resolve(&rel).allows(Action::Write));
        rel.permissions.write = true;
        assert!(PermissionScopeResolver::resolve(&rel).allows(Action::Write));
    }

    #[test]
    fn authorize_requires_active_relation() {
        let mut rel = relation(DataShareType::Full, EVERYTHING);
        assert!(PermissionScopeResolver::authorize(&rel, Action::Read, Some("registry")).is_ok());

        rel.status = RelationStatus::Suspended;
        let err = PermissionScopeResolver::authorize(&rel, Action::Read, None).unwrap_err();
        assert!(matches!(err, OrgLinkError::AuthorizationDenied { .. }));
    }

    #[test]
    fn authorize_rejects_unshared_service() {
        let rel = relation(DataShareType::Full, EVERYTHING);
        let err =
            PermissionScopeResolver::authorize(&rel, Action::Read, Some("payroll")).unwrap_err();
        assert!(matches!(err, OrgLinkError::AuthorizationDenied { .. }));
    }
}
