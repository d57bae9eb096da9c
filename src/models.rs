use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::*;

/// Lifecycle status of an achievement reference. Stored as text in Postgres;
/// everything outside the store layer switches on this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AchievementStatus {
    Draft,
    Submitted,
    Verified,
    Rejected,
    Deleted,
}

impl AchievementStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AchievementStatus::Draft => "draft",
            AchievementStatus::Submitted => "submitted",
            AchievementStatus::Verified => "verified",
            AchievementStatus::Rejected => "rejected",
            AchievementStatus::Deleted => "deleted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(AchievementStatus::Draft),
            "submitted" => Some(AchievementStatus::Submitted),
            "verified" => Some(AchievementStatus::Verified),
            "rejected" => Some(AchievementStatus::Rejected),
            "deleted" => Some(AchievementStatus::Deleted),
            _ => None,
        }
    }
}

/// One lifecycle-tracking row per achievement. The reference is authoritative
/// for existence and state; the content document holds the payload.
#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = achievement_references)]
pub struct AchievementReference {
    pub id: Uuid,
    pub student_id: Uuid,
    pub content_id: String,
    pub status: String,
    pub submitted_at: Option<DateTime<Utc>>,
    pub verified_at: Option<DateTime<Utc>>,
    pub verified_by: Option<Uuid>,
    pub rejection_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AchievementReference {
    pub fn status(&self) -> Option<AchievementStatus> {
        AchievementStatus::parse(&self.status)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = achievement_references)]
pub struct NewAchievementReference {
    pub id: Uuid,
    pub student_id: Uuid,
    pub content_id: String,
    pub status: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = students)]
pub struct Student {
    pub id: Uuid,
    pub user_id: Uuid,
    pub student_number: String,
    pub program_study: String,
    pub academic_year: String,
    pub advisor_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = lecturers)]
pub struct Lecturer {
    pub id: Uuid,
    pub user_id: Uuid,
    pub lecturer_number: String,
    pub department: String,
    pub created_at: DateTime<Utc>,
}

/// A user row joined with its role name, which is what login and the
/// principal extractor actually need.
#[derive(Debug, Clone, Queryable)]
pub struct UserAccount {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub role_name: String,
    pub is_active: bool,
}

/// Structured detail block of an achievement content document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementDetails {
    #[serde(default)]
    pub competition_name: String,
    #[serde(default)]
    pub competition_level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<f64>,
    #[serde(default)]
    pub medal_type: String,
    #[serde(default)]
    pub event_date: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub organizer: String,
}

impl AchievementDetails {
    /// Point value derived from the competition level; used by reporting and
    /// never persisted. Unrecognized levels earn a participation score.
    pub fn points(&self) -> i64 {
        let level = self.competition_level.trim().to_lowercase();
        match level.as_str() {
            "international" | "internasional" => 40,
            "national" | "nasional" => 30,
            "provincial" | "provinsi" | "regional" => 20,
            "university" | "universitas" | "local" | "lokal" => 10,
            _ => 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementAttachment {
    pub file_name: String,
    pub file_url: String,
    pub file_type: String,
    pub uploaded_at: DateTime<Utc>,
}

/// The mutable achievement payload as stored in the content store.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: String,
    pub student_id: Uuid,
    pub achievement_type: String,
    pub title: String,
    pub description: String,
    pub details: AchievementDetails,
    pub tags: Vec<String>,
    pub attachments: Vec<AchievementAttachment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Achievement {
    pub fn points(&self) -> i64 {
        self.details.points()
    }
}

/// Content fields written on create and replaced wholesale on update.
/// Attachments and lifecycle state are never part of this set.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementContent {
    pub achievement_type: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub details: AchievementDetails,
    #[serde(default)]
    pub tags: Vec<String>,
}
