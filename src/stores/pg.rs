use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use diesel::PgConnection;
use uuid::Uuid;

use crate::db::PgPool;
use crate::models::{
    AchievementReference, AchievementStatus, Lecturer, NewAchievementReference, Student,
    UserAccount,
};
use crate::schema::{achievement_references, lecturers, permissions, role_permissions, roles,
    students, users};
use crate::stores::{
    Directory, PermissionCatalog, ReferenceStore, TransitionOutcome, UserStore,
};

type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

fn acquire(pool: &PgPool) -> Result<PgPooledConnection> {
    pool.get()
        .map_err(|err| anyhow!("database pool error: {err}"))
}

pub struct PgReferenceStore {
    pool: PgPool,
}

impl PgReferenceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReferenceStore for PgReferenceStore {
    async fn create(&self, student_id: Uuid, content_id: &str) -> Result<AchievementReference> {
        let mut conn = acquire(&self.pool)?;
        let new_reference = NewAchievementReference {
            id: Uuid::new_v4(),
            student_id,
            content_id: content_id.to_string(),
            status: AchievementStatus::Draft.as_str().to_string(),
        };
        let reference = diesel::insert_into(achievement_references::table)
            .values(&new_reference)
            .get_result(&mut conn)
            .context("failed to insert achievement reference")?;
        Ok(reference)
    }

    async fn get_by_content_id(&self, content_id: &str) -> Result<Option<AchievementReference>> {
        let mut conn = acquire(&self.pool)?;
        let reference = achievement_references::table
            .filter(achievement_references::content_id.eq(content_id))
            .filter(achievement_references::status.ne(AchievementStatus::Deleted.as_str()))
            .first::<AchievementReference>(&mut conn)
            .optional()
            .context("failed to load achievement reference")?;
        Ok(reference)
    }

    async fn list_by_student(&self, student_id: Uuid) -> Result<Vec<AchievementReference>> {
        let mut conn = acquire(&self.pool)?;
        let references = achievement_references::table
            .filter(achievement_references::student_id.eq(student_id))
            .filter(achievement_references::status.ne(AchievementStatus::Deleted.as_str()))
            .order(achievement_references::created_at.desc())
            .load(&mut conn)
            .context("failed to list references by student")?;
        Ok(references)
    }

    async fn list_all(&self) -> Result<Vec<AchievementReference>> {
        let mut conn = acquire(&self.pool)?;
        let references = achievement_references::table
            .filter(achievement_references::status.ne(AchievementStatus::Deleted.as_str()))
            .order(achievement_references::created_at.desc())
            .load(&mut conn)
            .context("failed to list references")?;
        Ok(references)
    }

    async fn list_by_advisor_user(&self, user_id: Uuid) -> Result<Vec<AchievementReference>> {
        let mut conn = acquire(&self.pool)?;
        let references = achievement_references::table
            .inner_join(students::table.inner_join(lecturers::table))
            .filter(lecturers::user_id.eq(user_id))
            .filter(achievement_references::status.ne(AchievementStatus::Deleted.as_str()))
            .order(achievement_references::created_at.desc())
            .select(achievement_references::all_columns)
            .load(&mut conn)
            .context("failed to list references by advisor")?;
        Ok(references)
    }

    async fn soft_delete(&self, id: Uuid) -> Result<()> {
        let mut conn = acquire(&self.pool)?;
        let now = Utc::now();
        diesel::update(achievement_references::table.find(id))
            .set((
                achievement_references::status.eq(AchievementStatus::Deleted.as_str()),
                achievement_references::updated_at.eq(now),
            ))
            .execute(&mut conn)
            .context("failed to soft-delete reference")?;
        Ok(())
    }

    async fn submit(&self, id: Uuid) -> Result<TransitionOutcome> {
        let mut conn = acquire(&self.pool)?;
        let now = Utc::now();
        let rows = diesel::update(
            achievement_references::table
                .find(id)
                .filter(achievement_references::status.eq(AchievementStatus::Draft.as_str())),
        )
        .set((
            achievement_references::status.eq(AchievementStatus::Submitted.as_str()),
            achievement_references::submitted_at.eq(now),
            achievement_references::updated_at.eq(now),
        ))
        .execute(&mut conn)
        .context("failed to submit reference")?;
        Ok(outcome(rows))
    }

    async fn verify(&self, id: Uuid, verifier: Uuid) -> Result<TransitionOutcome> {
        let mut conn = acquire(&self.pool)?;
        let now = Utc::now();
        let rows = diesel::update(
            achievement_references::table
                .find(id)
                .filter(achievement_references::status.eq(AchievementStatus::Submitted.as_str())),
        )
        .set((
            achievement_references::status.eq(AchievementStatus::Verified.as_str()),
            achievement_references::verified_at.eq(now),
            achievement_references::verified_by.eq(verifier),
            achievement_references::updated_at.eq(now),
        ))
        .execute(&mut conn)
        .context("failed to verify reference")?;
        Ok(outcome(rows))
    }

    async fn reject(&self, id: Uuid, verifier: Uuid, note: &str) -> Result<TransitionOutcome> {
        let mut conn = acquire(&self.pool)?;
        let now = Utc::now();
        let rows = diesel::update(
            achievement_references::table
                .find(id)
                .filter(achievement_references::status.eq(AchievementStatus::Submitted.as_str())),
        )
        .set((
            achievement_references::status.eq(AchievementStatus::Rejected.as_str()),
            achievement_references::rejection_note.eq(note),
            achievement_references::verified_at.eq(now),
            achievement_references::verified_by.eq(verifier),
            achievement_references::updated_at.eq(now),
        ))
        .execute(&mut conn)
        .context("failed to reject reference")?;
        Ok(outcome(rows))
    }
}

fn outcome(rows: usize) -> TransitionOutcome {
    if rows == 0 {
        TransitionOutcome::PreconditionFailed
    } else {
        TransitionOutcome::Applied
    }
}

pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Directory for PgDirectory {
    async fn student_by_user_id(&self, user_id: Uuid) -> Result<Option<Student>> {
        let mut conn = acquire(&self.pool)?;
        let student = students::table
            .filter(students::user_id.eq(user_id))
            .first(&mut conn)
            .optional()
            .context("failed to load student by user id")?;
        Ok(student)
    }

    async fn student_by_id(&self, id: Uuid) -> Result<Option<Student>> {
        let mut conn = acquire(&self.pool)?;
        let student = students::table
            .find(id)
            .first(&mut conn)
            .optional()
            .context("failed to load student")?;
        Ok(student)
    }

    async fn lecturer_by_user_id(&self, user_id: Uuid) -> Result<Option<Lecturer>> {
        let mut conn = acquire(&self.pool)?;
        let lecturer = lecturers::table
            .filter(lecturers::user_id.eq(user_id))
            .first(&mut conn)
            .optional()
            .context("failed to load lecturer by user id")?;
        Ok(lecturer)
    }

    async fn lecturer_by_id(&self, id: Uuid) -> Result<Option<Lecturer>> {
        let mut conn = acquire(&self.pool)?;
        let lecturer = lecturers::table
            .find(id)
            .first(&mut conn)
            .optional()
            .context("failed to load lecturer")?;
        Ok(lecturer)
    }
}

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserAccount>> {
        let mut conn = acquire(&self.pool)?;
        let account = users::table
            .inner_join(roles::table)
            .filter(users::username.eq(username))
            .select((
                users::id,
                users::username,
                users::email,
                users::full_name,
                users::password_hash,
                roles::name,
                users::is_active,
            ))
            .first::<UserAccount>(&mut conn)
            .optional()
            .context("failed to load user by username")?;
        Ok(account)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserAccount>> {
        let mut conn = acquire(&self.pool)?;
        let account = users::table
            .inner_join(roles::table)
            .filter(users::id.eq(id))
            .select((
                users::id,
                users::username,
                users::email,
                users::full_name,
                users::password_hash,
                roles::name,
                users::is_active,
            ))
            .first::<UserAccount>(&mut conn)
            .optional()
            .context("failed to load user")?;
        Ok(account)
    }
}

pub struct PgPermissionCatalog {
    pool: PgPool,
}

impl PgPermissionCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PermissionCatalog for PgPermissionCatalog {
    async fn permissions_for_role(&self, role_name: &str) -> Result<Vec<String>> {
        let mut conn = acquire(&self.pool)?;
        let names = role_permissions::table
            .inner_join(roles::table)
            .inner_join(permissions::table)
            .filter(roles::name.eq(role_name))
            .select(permissions::name)
            .load::<String>(&mut conn)
            .context("failed to load role permissions")?;
        Ok(names)
    }
}
