pub mod mongo;
pub mod pg;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    Achievement, AchievementAttachment, AchievementContent, AchievementReference, Lecturer,
    Student, UserAccount,
};

/// Result of a guarded state transition. A conditional update that matched
/// zero rows is a precondition failure, not a store error: some other actor
/// got there first or the record was never in the required status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied,
    PreconditionFailed,
}

/// Lifecycle-tracking records, one per achievement. Authoritative for
/// existence and state. Every transition is a single atomic
/// "update where status = X" so concurrent conflicting attempts cannot both
/// succeed.
#[async_trait]
pub trait ReferenceStore: Send + Sync + 'static {
    /// Creates a reference in `draft` for a freshly written content record.
    async fn create(&self, student_id: Uuid, content_id: &str) -> Result<AchievementReference>;

    /// Looks up by content id, excluding `deleted` references.
    async fn get_by_content_id(&self, content_id: &str) -> Result<Option<AchievementReference>>;

    async fn list_by_student(&self, student_id: Uuid) -> Result<Vec<AchievementReference>>;

    async fn list_all(&self) -> Result<Vec<AchievementReference>>;

    /// References whose student's advisor resolves to the given lecturer user.
    async fn list_by_advisor_user(&self, user_id: Uuid) -> Result<Vec<AchievementReference>>;

    /// Unconditional soft delete. By contract only called after the caller
    /// has confirmed the reference is still in `draft`.
    async fn soft_delete(&self, id: Uuid) -> Result<()>;

    /// `draft` -> `submitted`, stamping `submitted_at`.
    async fn submit(&self, id: Uuid) -> Result<TransitionOutcome>;

    /// `submitted` -> `verified`, recording verifier and timestamp.
    async fn verify(&self, id: Uuid, verifier: Uuid) -> Result<TransitionOutcome>;

    /// `submitted` -> `rejected`, recording verifier, timestamp and note.
    async fn reject(&self, id: Uuid, verifier: Uuid, note: &str) -> Result<TransitionOutcome>;
}

/// Mutable achievement payload records. No authorization logic lives here;
/// callers are trusted to have gone through the coordinator.
#[async_trait]
pub trait ContentStore: Send + Sync + 'static {
    async fn create(&self, student_id: Uuid, content: &AchievementContent) -> Result<Achievement>;

    /// `None` for unknown or malformed identifiers.
    async fn get(&self, content_id: &str) -> Result<Option<Achievement>>;

    /// Batch fetch. Malformed identifiers are skipped, not fatal.
    async fn get_many(&self, content_ids: &[String]) -> Result<Vec<Achievement>>;

    /// Replaces type, title, description, details and tags. Attachments are
    /// untouched.
    async fn update(&self, content_id: &str, content: &AchievementContent) -> Result<()>;

    async fn append_attachment(
        &self,
        content_id: &str,
        attachment: &AchievementAttachment,
    ) -> Result<()>;

    /// Physical removal; only used to compensate an orphaned create.
    async fn delete(&self, content_id: &str) -> Result<()>;
}

/// Student/lecturer directory used to resolve principals to domain identities
/// and advisor relationships.
#[async_trait]
pub trait Directory: Send + Sync + 'static {
    async fn student_by_user_id(&self, user_id: Uuid) -> Result<Option<Student>>;

    async fn student_by_id(&self, id: Uuid) -> Result<Option<Student>>;

    async fn lecturer_by_user_id(&self, user_id: Uuid) -> Result<Option<Lecturer>>;

    async fn lecturer_by_id(&self, id: Uuid) -> Result<Option<Lecturer>>;
}

#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserAccount>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserAccount>>;
}

#[async_trait]
pub trait PermissionCatalog: Send + Sync + 'static {
    async fn permissions_for_role(&self, role_name: &str) -> Result<Vec<String>>;
}
