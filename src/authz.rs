use std::sync::Arc;

use anyhow::Result;
use uuid::Uuid;

use crate::stores::{Directory, PermissionCatalog};

/// Closed set of logical roles. Raw role names (including the several
/// synonyms for the advisor role) are mapped to a variant exactly once, at
/// the authorization boundary; downstream logic never compares role strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleKind {
    Admin,
    Student,
    Advisor,
}

impl RoleKind {
    /// Case-sensitive match against the accepted role vocabulary.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Admin" => Some(RoleKind::Admin),
            "Mahasiswa" => Some(RoleKind::Student),
            "Dosen" | "Dosen Wali" | "Lecturer" => Some(RoleKind::Advisor),
            _ => None,
        }
    }
}

/// The authenticated identity a request acts as.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: RoleKind,
    pub role_name: String,
}

/// Answers permission and relationship questions. Pure with respect to
/// lifecycle state: the coordinator combines these answers with the
/// reference's current status to reach the final allow/deny decision.
pub struct AuthorizationResolver {
    directory: Arc<dyn Directory>,
    permissions: Arc<dyn PermissionCatalog>,
}

impl AuthorizationResolver {
    pub fn new(directory: Arc<dyn Directory>, permissions: Arc<dyn PermissionCatalog>) -> Self {
        Self {
            directory,
            permissions,
        }
    }

    /// Role-based permission membership. Admin implicitly satisfies every
    /// permission.
    pub async fn has_permission(&self, principal: &Principal, permission: &str) -> Result<bool> {
        if principal.role == RoleKind::Admin {
            return Ok(true);
        }
        let owned = self
            .permissions
            .permissions_for_role(&principal.role_name)
            .await?;
        Ok(owned.iter().any(|name| name == permission))
    }

    /// Whether the lecturer behind `lecturer_user_id` is the assigned advisor
    /// of the given student.
    pub async fn is_advisor_of(&self, lecturer_user_id: Uuid, student_id: Uuid) -> Result<bool> {
        let Some(student) = self.directory.student_by_id(student_id).await? else {
            return Ok(false);
        };
        let Some(advisor_id) = student.advisor_id else {
            return Ok(false);
        };
        let Some(lecturer) = self.directory.lecturer_by_id(advisor_id).await? else {
            return Ok(false);
        };
        Ok(lecturer.user_id == lecturer_user_id)
    }

    /// The raw permission set of a role. Admin's implicit grant is not
    /// expanded here; an empty set for Admin is expected.
    pub async fn permissions_for_role(&self, role_name: &str) -> Result<Vec<String>> {
        self.permissions.permissions_for_role(role_name).await
    }
}
