use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, warn};
use uuid::Uuid;

use crate::authz::{AuthorizationResolver, Principal, RoleKind};
use crate::error::{DomainError, DomainResult};
use crate::models::{
    Achievement, AchievementAttachment, AchievementContent, AchievementReference,
    AchievementStatus, Student,
};
use crate::stores::{ContentStore, Directory, ReferenceStore, TransitionOutcome};
use crate::uploads::UploadSink;

/// Content fields merged with the reference's lifecycle fields: the view a
/// caller gets back for a single achievement.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementView {
    pub id: String,
    pub student_id: Uuid,
    pub achievement_type: String,
    pub title: String,
    pub description: String,
    pub details: crate::models::AchievementDetails,
    pub tags: Vec<String>,
    pub attachments: Vec<AchievementAttachment>,
    pub status: String,
    pub submitted_at: Option<DateTime<Utc>>,
    pub verified_at: Option<DateTime<Utc>>,
    pub verified_by: Option<Uuid>,
    pub rejection_note: Option<String>,
    pub points: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn merge_view(achievement: Achievement, reference: &AchievementReference) -> AchievementView {
    let points = achievement.points();
    AchievementView {
        id: achievement.id,
        student_id: achievement.student_id,
        achievement_type: achievement.achievement_type,
        title: achievement.title,
        description: achievement.description,
        details: achievement.details,
        tags: achievement.tags,
        attachments: achievement.attachments,
        status: reference.status.clone(),
        submitted_at: reference.submitted_at,
        verified_at: reference.verified_at,
        verified_by: reference.verified_by,
        rejection_note: reference.rejection_note.clone(),
        points,
        created_at: achievement.created_at,
        updated_at: achievement.updated_at,
    }
}

/// One row of a role-dependent listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementSummary {
    pub id: String,
    pub student_id: Uuid,
    pub achievement_type: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub status: String,
    pub points: i64,
    pub created_at: DateTime<Utc>,
}

/// A file received for attachment, before it reaches the upload sink.
#[derive(Debug)]
pub struct AttachmentUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// The only component allowed to mutate both stores. Every mutating
/// operation runs the same guard sequence: fetch reference, check existence,
/// check ownership/relationship, check status precondition, then mutate
/// content (if any) and finally the reference.
pub struct LifecycleCoordinator {
    references: Arc<dyn ReferenceStore>,
    content: Arc<dyn ContentStore>,
    directory: Arc<dyn Directory>,
    uploads: Arc<dyn UploadSink>,
    authz: AuthorizationResolver,
}

impl LifecycleCoordinator {
    pub fn new(
        references: Arc<dyn ReferenceStore>,
        content: Arc<dyn ContentStore>,
        directory: Arc<dyn Directory>,
        uploads: Arc<dyn UploadSink>,
        authz: AuthorizationResolver,
    ) -> Self {
        Self {
            references,
            content,
            directory,
            uploads,
            authz,
        }
    }

    pub fn resolver(&self) -> &AuthorizationResolver {
        &self.authz
    }

    pub async fn create(
        &self,
        principal: &Principal,
        payload: AchievementContent,
    ) -> DomainResult<AchievementView> {
        if !matches!(principal.role, RoleKind::Student | RoleKind::Admin) {
            return Err(DomainError::Forbidden);
        }
        if !self
            .authz
            .has_permission(principal, "achievement:create")
            .await?
        {
            return Err(DomainError::Forbidden);
        }
        validate_content(&payload)?;

        let student = self
            .directory
            .student_by_user_id(principal.user_id)
            .await?
            .ok_or_else(|| DomainError::Validation("student profile not found".to_string()))?;

        let achievement = self.content.create(student.id, &payload).await?;

        // The two writes are not transactional. If the reference write fails
        // the content record is an orphan; compensate by deleting it, and if
        // even that fails, log the orphan and surface the store failure.
        let reference = match self.references.create(student.id, &achievement.id).await {
            Ok(reference) => reference,
            Err(err) => {
                if let Err(cleanup_err) = self.content.delete(&achievement.id).await {
                    error!(
                        content_id = %achievement.id,
                        error = %cleanup_err,
                        "orphaned achievement content left behind after failed reference write"
                    );
                }
                return Err(DomainError::Store(err));
            }
        };

        Ok(merge_view(achievement, &reference))
    }

    pub async fn get(
        &self,
        principal: &Principal,
        content_id: &str,
    ) -> DomainResult<AchievementView> {
        let reference = self.require_reference(content_id).await?;
        self.authorize_read(principal, &reference).await?;

        let achievement = self
            .content
            .get(&reference.content_id)
            .await?
            .ok_or(DomainError::NotFound)?;

        Ok(merge_view(achievement, &reference))
    }

    /// Role-dependent listing joined against the content store. Entries whose
    /// content lookup fails are dropped rather than failing the whole list.
    pub async fn list_for_principal(
        &self,
        principal: &Principal,
    ) -> DomainResult<Vec<AchievementSummary>> {
        let references = match principal.role {
            RoleKind::Student => {
                let student = self
                    .directory
                    .student_by_user_id(principal.user_id)
                    .await?
                    .ok_or_else(|| {
                        DomainError::Validation("student profile not found".to_string())
                    })?;
                self.references.list_by_student(student.id).await?
            }
            RoleKind::Admin => self.references.list_all().await?,
            RoleKind::Advisor => self.references.list_by_advisor_user(principal.user_id).await?,
        };

        let content_ids: Vec<String> = references
            .iter()
            .map(|reference| reference.content_id.clone())
            .collect();
        let achievements = self.content.get_many(&content_ids).await?;
        let mut by_id: HashMap<String, Achievement> = achievements
            .into_iter()
            .map(|achievement| (achievement.id.clone(), achievement))
            .collect();

        let mut summaries = Vec::with_capacity(references.len());
        for reference in &references {
            let Some(achievement) = by_id.remove(&reference.content_id) else {
                warn!(
                    content_id = %reference.content_id,
                    reference_id = %reference.id,
                    "reference without resolvable content dropped from listing"
                );
                continue;
            };
            summaries.push(AchievementSummary {
                points: achievement.points(),
                id: achievement.id,
                student_id: achievement.student_id,
                achievement_type: achievement.achievement_type,
                title: achievement.title,
                description: achievement.description,
                tags: achievement.tags,
                status: reference.status.clone(),
                created_at: achievement.created_at,
            });
        }
        Ok(summaries)
    }

    pub async fn update(
        &self,
        principal: &Principal,
        content_id: &str,
        payload: AchievementContent,
    ) -> DomainResult<()> {
        if principal.role != RoleKind::Student {
            return Err(DomainError::Forbidden);
        }
        validate_content(&payload)?;

        let reference = self.require_reference(content_id).await?;
        self.require_owner(principal, &reference).await?;
        require_status(
            &reference,
            AchievementStatus::Draft,
            "only draft achievements can be updated",
        )?;

        self.content.update(&reference.content_id, &payload).await?;
        Ok(())
    }

    pub async fn add_attachment(
        &self,
        principal: &Principal,
        content_id: &str,
        upload: AttachmentUpload,
    ) -> DomainResult<AchievementAttachment> {
        if principal.role != RoleKind::Student {
            return Err(DomainError::Forbidden);
        }
        if upload.file_name.trim().is_empty() {
            return Err(DomainError::Validation("file is required".to_string()));
        }

        let reference = self.require_reference(content_id).await?;
        self.require_owner(principal, &reference).await?;
        require_status(
            &reference,
            AchievementStatus::Draft,
            "only draft achievements can receive attachments",
        )?;

        let stored = self
            .uploads
            .store(
                &reference.content_id,
                &upload.file_name,
                upload.content_type,
                upload.bytes,
            )
            .await?;

        let attachment = AchievementAttachment {
            file_name: upload.file_name,
            file_url: stored.url,
            file_type: stored.content_type,
            uploaded_at: Utc::now(),
        };
        self.content
            .append_attachment(&reference.content_id, &attachment)
            .await?;
        Ok(attachment)
    }

    /// Soft delete. Content is left in place; only the reference leaves the
    /// visible set.
    pub async fn delete(&self, principal: &Principal, content_id: &str) -> DomainResult<()> {
        if principal.role != RoleKind::Student {
            return Err(DomainError::Forbidden);
        }

        let reference = self.require_reference(content_id).await?;
        self.require_owner(principal, &reference).await?;
        require_status(
            &reference,
            AchievementStatus::Draft,
            "only draft achievements can be deleted",
        )?;

        self.references.soft_delete(reference.id).await?;
        Ok(())
    }

    pub async fn submit(&self, principal: &Principal, content_id: &str) -> DomainResult<()> {
        if !matches!(principal.role, RoleKind::Student | RoleKind::Admin) {
            return Err(DomainError::Forbidden);
        }

        let reference = self.require_reference(content_id).await?;
        if principal.role == RoleKind::Student {
            self.require_owner(principal, &reference).await?;
        }
        require_status(
            &reference,
            AchievementStatus::Draft,
            "only draft achievements can be submitted",
        )?;

        match self.references.submit(reference.id).await? {
            TransitionOutcome::Applied => Ok(()),
            TransitionOutcome::PreconditionFailed => Err(DomainError::InvalidState(
                "only draft achievements can be submitted",
            )),
        }
    }

    pub async fn verify(&self, principal: &Principal, content_id: &str) -> DomainResult<()> {
        let reference = self.require_reference(content_id).await?;
        self.require_verifier(principal, &reference).await?;
        require_status(
            &reference,
            AchievementStatus::Submitted,
            "only submitted achievements can be verified",
        )?;

        match self
            .references
            .verify(reference.id, principal.user_id)
            .await?
        {
            TransitionOutcome::Applied => Ok(()),
            TransitionOutcome::PreconditionFailed => Err(DomainError::InvalidState(
                "only submitted achievements can be verified",
            )),
        }
    }

    pub async fn reject(
        &self,
        principal: &Principal,
        content_id: &str,
        note: &str,
    ) -> DomainResult<()> {
        let note = note.trim();
        if note.is_empty() {
            return Err(DomainError::Validation(
                "rejection note is required".to_string(),
            ));
        }

        let reference = self.require_reference(content_id).await?;
        self.require_verifier(principal, &reference).await?;
        require_status(
            &reference,
            AchievementStatus::Submitted,
            "only submitted achievements can be rejected",
        )?;

        match self
            .references
            .reject(reference.id, principal.user_id, note)
            .await?
        {
            TransitionOutcome::Applied => Ok(()),
            TransitionOutcome::PreconditionFailed => Err(DomainError::InvalidState(
                "only submitted achievements can be rejected",
            )),
        }
    }

    async fn require_reference(&self, content_id: &str) -> DomainResult<AchievementReference> {
        self.references
            .get_by_content_id(content_id)
            .await?
            .ok_or(DomainError::NotFound)
    }

    async fn authorize_read(
        &self,
        principal: &Principal,
        reference: &AchievementReference,
    ) -> DomainResult<()> {
        match principal.role {
            RoleKind::Admin => Ok(()),
            RoleKind::Student => {
                self.require_owner(principal, reference).await?;
                Ok(())
            }
            RoleKind::Advisor => {
                if self
                    .authz
                    .is_advisor_of(principal.user_id, reference.student_id)
                    .await?
                {
                    Ok(())
                } else {
                    Err(DomainError::Forbidden)
                }
            }
        }
    }

    async fn require_owner(
        &self,
        principal: &Principal,
        reference: &AchievementReference,
    ) -> DomainResult<Student> {
        let student = self
            .directory
            .student_by_user_id(principal.user_id)
            .await?
            .ok_or(DomainError::Forbidden)?;
        if student.id != reference.student_id {
            return Err(DomainError::Forbidden);
        }
        Ok(student)
    }

    /// Admin verifies anything; an advisor only their own advisees.
    async fn require_verifier(
        &self,
        principal: &Principal,
        reference: &AchievementReference,
    ) -> DomainResult<()> {
        match principal.role {
            RoleKind::Admin => Ok(()),
            RoleKind::Advisor => {
                if !self
                    .authz
                    .has_permission(principal, "achievement:verify")
                    .await?
                {
                    return Err(DomainError::Forbidden);
                }
                if self
                    .authz
                    .is_advisor_of(principal.user_id, reference.student_id)
                    .await?
                {
                    Ok(())
                } else {
                    Err(DomainError::Forbidden)
                }
            }
            RoleKind::Student => Err(DomainError::Forbidden),
        }
    }
}

fn validate_content(content: &AchievementContent) -> DomainResult<()> {
    if content.title.trim().is_empty() {
        return Err(DomainError::Validation("title must not be empty".to_string()));
    }
    if content.achievement_type.trim().is_empty() {
        return Err(DomainError::Validation(
            "achievementType must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn require_status(
    reference: &AchievementReference,
    expected: AchievementStatus,
    message: &'static str,
) -> DomainResult<()> {
    if reference.status() == Some(expected) {
        Ok(())
    } else {
        Err(DomainError::InvalidState(message))
    }
}
