use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Datelike;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::authz::RoleKind;
use crate::error::{AppError, AppResult};
use crate::models::{Achievement, AchievementStatus};
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentReportInfo {
    pub id: Uuid,
    pub student_number: String,
    pub program_study: String,
    pub academic_year: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub id: String,
    pub title: String,
    pub achievement_type: String,
    pub level: String,
    pub points: i64,
    pub status: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub total_achievements: usize,
    pub total_points: i64,
    pub competition_levels: HashMap<String, usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentReport {
    pub student: StudentReportInfo,
    pub achievements: Vec<ReportRow>,
    pub summary: StudentSummary,
}

fn level_of(achievement: &Achievement) -> String {
    let level = achievement.details.competition_level.trim();
    if level.is_empty() {
        "unknown".to_string()
    } else {
        level.to_string()
    }
}

/// Per-student report over non-deleted achievements. Points only count once
/// an achievement is verified.
pub async fn student_report(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(student_id): Path<Uuid>,
) -> AppResult<Json<StudentReport>> {
    let principal = user.principal()?;

    let student = state
        .directory
        .student_by_id(student_id)
        .await?
        .ok_or_else(AppError::not_found)?;

    match principal.role {
        RoleKind::Admin => {}
        RoleKind::Advisor => {
            let resolver = state.coordinator.resolver();
            if !resolver.has_permission(&principal, "report:read").await? {
                return Err(AppError::forbidden());
            }
            let allowed = resolver
                .is_advisor_of(principal.user_id, student.id)
                .await?;
            if !allowed {
                return Err(AppError::forbidden());
            }
        }
        RoleKind::Student => {
            if student.user_id != principal.user_id {
                return Err(AppError::forbidden());
            }
        }
    }

    let references = state.references.list_by_student(student.id).await?;
    let content_ids: Vec<String> = references
        .iter()
        .map(|reference| reference.content_id.clone())
        .collect();
    let achievements = state.content.get_many(&content_ids).await?;
    let by_id: HashMap<String, Achievement> = achievements
        .into_iter()
        .map(|achievement| (achievement.id.clone(), achievement))
        .collect();

    let mut rows = Vec::new();
    let mut total_points = 0;
    let mut competition_levels: HashMap<String, usize> = HashMap::new();

    for reference in &references {
        let Some(achievement) = by_id.get(&reference.content_id) else {
            continue;
        };
        let level = level_of(achievement);
        let points = achievement.points();

        if reference.status() == Some(AchievementStatus::Verified) {
            total_points += points;
        }
        *competition_levels.entry(level.clone()).or_default() += 1;

        rows.push(ReportRow {
            id: achievement.id.clone(),
            title: achievement.title.clone(),
            achievement_type: achievement.achievement_type.clone(),
            level,
            points,
            status: reference.status.clone(),
        });
    }

    Ok(Json(StudentReport {
        student: StudentReportInfo {
            id: student.id,
            student_number: student.student_number,
            program_study: student.program_study,
            academic_year: student.academic_year,
        },
        summary: StudentSummary {
            total_achievements: rows.len(),
            total_points,
            competition_levels,
        },
        achievements: rows,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopStudent {
    pub student_id: Uuid,
    pub points: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_verified: usize,
    pub per_type: HashMap<String, usize>,
    pub per_level: HashMap<String, usize>,
    pub per_month: HashMap<String, usize>,
    pub top_students: Vec<TopStudent>,
}

const TOP_STUDENTS_LIMIT: usize = 5;

/// Campus-wide statistics over verified achievements only. Admin only.
pub async fn statistics(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Statistics>> {
    let principal = user.principal()?;
    if principal.role != RoleKind::Admin {
        return Err(AppError::forbidden());
    }

    let references = state.references.list_all().await?;
    let content_ids: Vec<String> = references
        .iter()
        .map(|reference| reference.content_id.clone())
        .collect();
    let achievements = state.content.get_many(&content_ids).await?;
    let by_id: HashMap<String, Achievement> = achievements
        .into_iter()
        .map(|achievement| (achievement.id.clone(), achievement))
        .collect();

    let mut total_verified = 0;
    let mut per_type: HashMap<String, usize> = HashMap::new();
    let mut per_level: HashMap<String, usize> = HashMap::new();
    let mut per_month: HashMap<String, usize> = HashMap::new();
    let mut student_points: HashMap<Uuid, i64> = HashMap::new();

    for reference in &references {
        if reference.status() != Some(AchievementStatus::Verified) {
            continue;
        }
        let Some(achievement) = by_id.get(&reference.content_id) else {
            continue;
        };

        total_verified += 1;
        *per_type
            .entry(achievement.achievement_type.clone())
            .or_default() += 1;
        *per_level.entry(level_of(achievement)).or_default() += 1;
        if let Some(verified_at) = reference.verified_at {
            let month = format!("{:04}-{:02}", verified_at.year(), verified_at.month());
            *per_month.entry(month).or_default() += 1;
        }
        *student_points.entry(reference.student_id).or_default() += achievement.points();
    }

    let mut top_students: Vec<TopStudent> = student_points
        .into_iter()
        .map(|(student_id, points)| TopStudent { student_id, points })
        .collect();
    top_students.sort_by(|a, b| b.points.cmp(&a.points).then(a.student_id.cmp(&b.student_id)));
    top_students.truncate(TOP_STUDENTS_LIMIT);

    Ok(Json(Statistics {
        total_verified,
        per_type,
        per_level,
        per_month,
        top_students,
    }))
}
