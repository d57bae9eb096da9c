use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{doc, Bson};
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use mongodb::{Client, Collection, Database};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Achievement, AchievementAttachment, AchievementContent, AchievementDetails};
use crate::stores::ContentStore;

const ACHIEVEMENTS_COLLECTION: &str = "achievements";

pub async fn connect(url: &str, database: &str) -> Result<Database> {
    let client = Client::with_uri_str(url)
        .await
        .context("failed to connect to MongoDB")?;
    Ok(client.database(database))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttachmentDocument {
    file_name: String,
    file_url: String,
    file_type: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AchievementDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    student_id: Uuid,
    achievement_type: String,
    title: String,
    description: String,
    details: AchievementDetails,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    attachments: Vec<AttachmentDocument>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    updated_at: DateTime<Utc>,
}

impl AchievementDocument {
    fn into_achievement(self) -> Option<Achievement> {
        let id = self.id?.to_hex();
        Some(Achievement {
            id,
            student_id: self.student_id,
            achievement_type: self.achievement_type,
            title: self.title,
            description: self.description,
            details: self.details,
            tags: self.tags,
            attachments: self
                .attachments
                .into_iter()
                .map(|attachment| AchievementAttachment {
                    file_name: attachment.file_name,
                    file_url: attachment.file_url,
                    file_type: attachment.file_type,
                    uploaded_at: attachment.uploaded_at,
                })
                .collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

pub struct MongoContentStore {
    collection: Collection<AchievementDocument>,
}

impl MongoContentStore {
    pub fn new(database: &Database) -> Self {
        Self {
            collection: database.collection(ACHIEVEMENTS_COLLECTION),
        }
    }
}

#[async_trait]
impl ContentStore for MongoContentStore {
    async fn create(&self, student_id: Uuid, content: &AchievementContent) -> Result<Achievement> {
        let now = Utc::now();
        let document = AchievementDocument {
            id: None,
            student_id,
            achievement_type: content.achievement_type.clone(),
            title: content.title.clone(),
            description: content.description.clone(),
            details: content.details.clone(),
            tags: content.tags.clone(),
            attachments: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        let inserted = self
            .collection
            .insert_one(&document)
            .await
            .context("failed to insert achievement content")?;

        let id = inserted
            .inserted_id
            .as_object_id()
            .ok_or_else(|| anyhow!("content store returned a non-ObjectId identifier"))?;

        let mut stored = document;
        stored.id = Some(id);
        stored
            .into_achievement()
            .ok_or_else(|| anyhow!("inserted achievement lost its identifier"))
    }

    async fn get(&self, content_id: &str) -> Result<Option<Achievement>> {
        let Ok(oid) = ObjectId::parse_str(content_id) else {
            return Ok(None);
        };
        let document = self
            .collection
            .find_one(doc! { "_id": oid })
            .await
            .context("failed to load achievement content")?;
        Ok(document.and_then(AchievementDocument::into_achievement))
    }

    async fn get_many(&self, content_ids: &[String]) -> Result<Vec<Achievement>> {
        // Malformed identifiers are dropped rather than failing the batch.
        let oids: Vec<ObjectId> = content_ids
            .iter()
            .filter_map(|id| ObjectId::parse_str(id).ok())
            .collect();
        if oids.is_empty() {
            return Ok(Vec::new());
        }

        let cursor = self
            .collection
            .find(doc! { "_id": { "$in": oids } })
            .await
            .context("failed to query achievement contents")?;
        let documents: Vec<AchievementDocument> = cursor
            .try_collect()
            .await
            .context("failed to drain achievement cursor")?;

        Ok(documents
            .into_iter()
            .filter_map(AchievementDocument::into_achievement)
            .collect())
    }

    async fn update(&self, content_id: &str, content: &AchievementContent) -> Result<()> {
        let oid = ObjectId::parse_str(content_id)
            .map_err(|_| anyhow!("malformed content identifier: {content_id}"))?;
        let details = bson::to_bson(&content.details).context("failed to encode details")?;
        let tags: Bson = content
            .tags
            .iter()
            .map(|tag| Bson::String(tag.clone()))
            .collect::<Vec<_>>()
            .into();

        self.collection
            .update_one(
                doc! { "_id": oid },
                doc! { "$set": {
                    "achievementType": &content.achievement_type,
                    "title": &content.title,
                    "description": &content.description,
                    "details": details,
                    "tags": tags,
                    "updatedAt": bson::DateTime::from_chrono(Utc::now()),
                } },
            )
            .await
            .context("failed to update achievement content")?;
        Ok(())
    }

    async fn append_attachment(
        &self,
        content_id: &str,
        attachment: &AchievementAttachment,
    ) -> Result<()> {
        let oid = ObjectId::parse_str(content_id)
            .map_err(|_| anyhow!("malformed content identifier: {content_id}"))?;
        let now = Utc::now();

        self.collection
            .update_one(
                doc! { "_id": oid },
                doc! {
                    "$push": { "attachments": {
                        "fileName": &attachment.file_name,
                        "fileUrl": &attachment.file_url,
                        "fileType": &attachment.file_type,
                        "uploadedAt": bson::DateTime::from_chrono(attachment.uploaded_at),
                    } },
                    "$set": { "updatedAt": bson::DateTime::from_chrono(now) },
                },
            )
            .await
            .context("failed to append attachment")?;
        Ok(())
    }

    async fn delete(&self, content_id: &str) -> Result<()> {
        let oid = ObjectId::parse_str(content_id)
            .map_err(|_| anyhow!("malformed content identifier: {content_id}"))?;
        self.collection
            .delete_one(doc! { "_id": oid })
            .await
            .context("failed to delete achievement content")?;
        Ok(())
    }
}
