use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, ensure, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use bson::oid::ObjectId;
use chrono::Utc;
use serde::Serialize;
use tower::util::ServiceExt;
use uuid::Uuid;

use prestasi::auth::jwt::JwtService;
use prestasi::auth::password::hash_password;
use prestasi::auth::revocation::InMemoryRevocation;
use prestasi::authz::AuthorizationResolver;
use prestasi::config::AppConfig;
use prestasi::lifecycle::LifecycleCoordinator;
use prestasi::models::{
    Achievement, AchievementAttachment, AchievementContent, AchievementReference,
    AchievementStatus, Lecturer, Student, UserAccount,
};
use prestasi::routes;
use prestasi::state::AppState;
use prestasi::stores::{
    ContentStore, Directory, PermissionCatalog, ReferenceStore, TransitionOutcome, UserStore,
};
use prestasi::uploads::{StoredUpload, UploadSink};

/// In-memory reference store. All conditional transitions happen under one
/// mutex, which preserves the atomic update-where-status predicate the SQL
/// implementation relies on.
pub struct MemoryReferenceStore {
    rows: Mutex<Vec<AchievementReference>>,
    directory: Arc<MemoryDirectory>,
    fail_next_create: AtomicBool,
}

impl MemoryReferenceStore {
    pub fn new(directory: Arc<MemoryDirectory>) -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            directory,
            fail_next_create: AtomicBool::new(false),
        }
    }

    /// Makes the next `create` call fail, simulating a reference store
    /// outage after the content write already went through.
    pub fn fail_next_create(&self) {
        self.fail_next_create.store(true, Ordering::SeqCst);
    }

    pub fn status_of(&self, content_id: &str) -> Option<String> {
        let rows = self.rows.lock().unwrap();
        rows.iter()
            .find(|row| row.content_id == content_id)
            .map(|row| row.status.clone())
    }

    fn transition<F>(&self, id: Uuid, required: AchievementStatus, apply: F) -> TransitionOutcome
    where
        F: FnOnce(&mut AchievementReference),
    {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows
            .iter_mut()
            .find(|row| row.id == id && row.status == required.as_str())
        else {
            return TransitionOutcome::PreconditionFailed;
        };
        apply(row);
        row.updated_at = Utc::now();
        TransitionOutcome::Applied
    }
}

#[async_trait]
impl ReferenceStore for MemoryReferenceStore {
    async fn create(&self, student_id: Uuid, content_id: &str) -> Result<AchievementReference> {
        if self.fail_next_create.swap(false, Ordering::SeqCst) {
            return Err(anyhow!("reference store unavailable"));
        }
        let now = Utc::now();
        let reference = AchievementReference {
            id: Uuid::new_v4(),
            student_id,
            content_id: content_id.to_string(),
            status: AchievementStatus::Draft.as_str().to_string(),
            submitted_at: None,
            verified_at: None,
            verified_by: None,
            rejection_note: None,
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().push(reference.clone());
        Ok(reference)
    }

    async fn get_by_content_id(&self, content_id: &str) -> Result<Option<AchievementReference>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|row| {
                row.content_id == content_id
                    && row.status != AchievementStatus::Deleted.as_str()
            })
            .cloned())
    }

    async fn list_by_student(&self, student_id: Uuid) -> Result<Vec<AchievementReference>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|row| {
                row.student_id == student_id
                    && row.status != AchievementStatus::Deleted.as_str()
            })
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<AchievementReference>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|row| row.status != AchievementStatus::Deleted.as_str())
            .cloned()
            .collect())
    }

    async fn list_by_advisor_user(&self, user_id: Uuid) -> Result<Vec<AchievementReference>> {
        let advisees = self.directory.advisee_student_ids(user_id);
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|row| {
                advisees.contains(&row.student_id)
                    && row.status != AchievementStatus::Deleted.as_str()
            })
            .cloned()
            .collect())
    }

    async fn soft_delete(&self, id: Uuid) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|row| row.id == id) {
            row.status = AchievementStatus::Deleted.as_str().to_string();
            row.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn submit(&self, id: Uuid) -> Result<TransitionOutcome> {
        Ok(self.transition(id, AchievementStatus::Draft, |row| {
            row.status = AchievementStatus::Submitted.as_str().to_string();
            row.submitted_at = Some(Utc::now());
        }))
    }

    async fn verify(&self, id: Uuid, verifier: Uuid) -> Result<TransitionOutcome> {
        Ok(self.transition(id, AchievementStatus::Submitted, |row| {
            row.status = AchievementStatus::Verified.as_str().to_string();
            row.verified_at = Some(Utc::now());
            row.verified_by = Some(verifier);
        }))
    }

    async fn reject(&self, id: Uuid, verifier: Uuid, note: &str) -> Result<TransitionOutcome> {
        Ok(self.transition(id, AchievementStatus::Submitted, |row| {
            row.status = AchievementStatus::Rejected.as_str().to_string();
            row.verified_at = Some(Utc::now());
            row.verified_by = Some(verifier);
            row.rejection_note = Some(note.to_string());
        }))
    }
}

/// In-memory content store keyed by ObjectId-shaped hex strings.
#[derive(Default)]
pub struct MemoryContentStore {
    docs: Mutex<HashMap<String, Achievement>>,
}

impl MemoryContentStore {
    pub fn document_count(&self) -> usize {
        self.docs.lock().unwrap().len()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn create(&self, student_id: Uuid, content: &AchievementContent) -> Result<Achievement> {
        let now = Utc::now();
        let achievement = Achievement {
            id: ObjectId::new().to_hex(),
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
        self.docs
            .lock()
            .unwrap()
            .insert(achievement.id.clone(), achievement.clone());
        Ok(achievement)
    }

    async fn get(&self, content_id: &str) -> Result<Option<Achievement>> {
        if ObjectId::parse_str(content_id).is_err() {
            return Ok(None);
        }
        Ok(self.docs.lock().unwrap().get(content_id).cloned())
    }

    async fn get_many(&self, content_ids: &[String]) -> Result<Vec<Achievement>> {
        let docs = self.docs.lock().unwrap();
        Ok(content_ids
            .iter()
            .filter(|id| ObjectId::parse_str(id).is_ok())
            .filter_map(|id| docs.get(id).cloned())
            .collect())
    }

    async fn update(&self, content_id: &str, content: &AchievementContent) -> Result<()> {
        let mut docs = self.docs.lock().unwrap();
        let doc = docs
            .get_mut(content_id)
            .ok_or_else(|| anyhow!("content {content_id} missing"))?;
        doc.achievement_type = content.achievement_type.clone();
        doc.title = content.title.clone();
        doc.description = content.description.clone();
        doc.details = content.details.clone();
        doc.tags = content.tags.clone();
        doc.updated_at = Utc::now();
        Ok(())
    }

    async fn append_attachment(
        &self,
        content_id: &str,
        attachment: &AchievementAttachment,
    ) -> Result<()> {
        let mut docs = self.docs.lock().unwrap();
        let doc = docs
            .get_mut(content_id)
            .ok_or_else(|| anyhow!("content {content_id} missing"))?;
        doc.attachments.push(attachment.clone());
        doc.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, content_id: &str) -> Result<()> {
        self.docs.lock().unwrap().remove(content_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryDirectory {
    students: Mutex<Vec<Student>>,
    lecturers: Mutex<Vec<Lecturer>>,
}

impl MemoryDirectory {
    pub fn add_student(&self, user_id: Uuid, advisor_id: Option<Uuid>) -> Uuid {
        let id = Uuid::new_v4();
        self.students.lock().unwrap().push(Student {
            id,
            user_id,
            student_number: format!("NIM-{}", &id.simple().to_string()[..8]),
            program_study: "Informatika".to_string(),
            academic_year: "2025/2026".to_string(),
            advisor_id,
            created_at: Utc::now(),
        });
        id
    }

    pub fn add_lecturer(&self, user_id: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        self.lecturers.lock().unwrap().push(Lecturer {
            id,
            user_id,
            lecturer_number: format!("NIP-{}", &id.simple().to_string()[..8]),
            department: "Informatika".to_string(),
            created_at: Utc::now(),
        });
        id
    }

    fn advisee_student_ids(&self, lecturer_user_id: Uuid) -> Vec<Uuid> {
        let lecturers = self.lecturers.lock().unwrap();
        let Some(lecturer) = lecturers
            .iter()
            .find(|lecturer| lecturer.user_id == lecturer_user_id)
        else {
            return Vec::new();
        };
        let students = self.students.lock().unwrap();
        students
            .iter()
            .filter(|student| student.advisor_id == Some(lecturer.id))
            .map(|student| student.id)
            .collect()
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn student_by_user_id(&self, user_id: Uuid) -> Result<Option<Student>> {
        let students = self.students.lock().unwrap();
        Ok(students
            .iter()
            .find(|student| student.user_id == user_id)
            .cloned())
    }

    async fn student_by_id(&self, id: Uuid) -> Result<Option<Student>> {
        let students = self.students.lock().unwrap();
        Ok(students.iter().find(|student| student.id == id).cloned())
    }

    async fn lecturer_by_user_id(&self, user_id: Uuid) -> Result<Option<Lecturer>> {
        let lecturers = self.lecturers.lock().unwrap();
        Ok(lecturers
            .iter()
            .find(|lecturer| lecturer.user_id == user_id)
            .cloned())
    }

    async fn lecturer_by_id(&self, id: Uuid) -> Result<Option<Lecturer>> {
        let lecturers = self.lecturers.lock().unwrap();
        Ok(lecturers.iter().find(|lecturer| lecturer.id == id).cloned())
    }
}

#[derive(Default)]
pub struct MemoryUserStore {
    accounts: Mutex<Vec<UserAccount>>,
}

impl MemoryUserStore {
    pub fn add(&self, username: &str, password: &str, role_name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.accounts.lock().unwrap().push(UserAccount {
            id,
            username: username.to_string(),
            email: format!("{username}@kampus.test"),
            full_name: username.to_string(),
            password_hash: hash_password(password).expect("hash password"),
            role_name: role_name.to_string(),
            is_active: true,
        });
        id
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserAccount>> {
        let accounts = self.accounts.lock().unwrap();
        Ok(accounts
            .iter()
            .find(|account| account.username == username)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserAccount>> {
        let accounts = self.accounts.lock().unwrap();
        Ok(accounts.iter().find(|account| account.id == id).cloned())
    }
}

pub struct MemoryPermissionCatalog {
    by_role: HashMap<String, Vec<String>>,
}

impl Default for MemoryPermissionCatalog {
    fn default() -> Self {
        let mut by_role = HashMap::new();
        by_role.insert(
            "Mahasiswa".to_string(),
            vec![
                "achievement:create".to_string(),
                "achievement:read".to_string(),
            ],
        );
        by_role.insert(
            "Dosen Wali".to_string(),
            vec![
                "achievement:read".to_string(),
                "achievement:verify".to_string(),
                "report:read".to_string(),
            ],
        );
        Self { by_role }
    }
}

#[async_trait]
impl PermissionCatalog for MemoryPermissionCatalog {
    async fn permissions_for_role(&self, role_name: &str) -> Result<Vec<String>> {
        Ok(self.by_role.get(role_name).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct FakeUploadSink;

#[async_trait]
impl UploadSink for FakeUploadSink {
    async fn store(
        &self,
        content_id: &str,
        file_name: &str,
        content_type: Option<String>,
        _bytes: Vec<u8>,
    ) -> Result<StoredUpload> {
        Ok(StoredUpload {
            url: format!("https://files.test/{content_id}/{file_name}"),
            content_type: content_type.unwrap_or_else(|| "application/octet-stream".to_string()),
        })
    }
}

pub struct TestApp {
    router: Router,
    pub directory: Arc<MemoryDirectory>,
    pub references: Arc<MemoryReferenceStore>,
    pub content: Arc<MemoryContentStore>,
    users: Arc<MemoryUserStore>,
}

impl TestApp {
    pub fn new() -> Self {
        let config = AppConfig {
            database_url: "postgres://unused".to_string(),
            database_max_pool_size: 1,
            mongo_url: "mongodb://unused".to_string(),
            mongo_database: "unused".to_string(),
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            jwt_secret: "test-secret".to_string(),
            jwt_issuer: "test-issuer".to_string(),
            jwt_audience: "test-audience".to_string(),
            jwt_expiry_minutes: 60,
            cors_allowed_origin: None,
            aws_endpoint_url: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            aws_region: "us-east-1".to_string(),
            s3_bucket: "test-bucket".to_string(),
            s3_public_base_url: None,
        };

        let directory = Arc::new(MemoryDirectory::default());
        let references = Arc::new(MemoryReferenceStore::new(directory.clone()));
        let content = Arc::new(MemoryContentStore::default());
        let users = Arc::new(MemoryUserStore::default());
        let permissions = Arc::new(MemoryPermissionCatalog::default());
        let uploads = Arc::new(FakeUploadSink);

        let resolver = AuthorizationResolver::new(directory.clone(), permissions);
        let coordinator = Arc::new(LifecycleCoordinator::new(
            references.clone(),
            content.clone(),
            directory.clone(),
            uploads,
            resolver,
        ));

        let jwt = JwtService::from_config(&config).expect("jwt service");
        let revoked = Arc::new(InMemoryRevocation::new());

        let state = AppState::new(
            config,
            jwt,
            revoked,
            users.clone(),
            references.clone(),
            content.clone(),
            directory.clone(),
            coordinator,
        );
        let router = routes::create_router(state);

        Self {
            router,
            directory,
            references,
            content,
            users,
        }
    }

    pub fn insert_user(&self, username: &str, password: &str, role: &str) -> Uuid {
        self.users.add(username, password, role)
    }

    /// Seeds a user with a Mahasiswa role plus a student profile; returns
    /// (user id, student id).
    pub fn insert_student(
        &self,
        username: &str,
        password: &str,
        advisor_id: Option<Uuid>,
    ) -> (Uuid, Uuid) {
        let user_id = self.insert_user(username, password, "Mahasiswa");
        let student_id = self.directory.add_student(user_id, advisor_id);
        (user_id, student_id)
    }

    /// Seeds a user with an advisor role plus a lecturer profile; returns
    /// (user id, lecturer id).
    pub fn insert_lecturer(&self, username: &str, password: &str, role: &str) -> (Uuid, Uuid) {
        let user_id = self.insert_user(username, password, role);
        let lecturer_id = self.directory.add_lecturer(user_id);
        (user_id, lecturer_id)
    }

    pub async fn login_token(&self, username: &str, password: &str) -> Result<String> {
        #[derive(Serialize)]
        struct LoginPayload<'a> {
            username: &'a str,
            password: &'a str,
        }

        let response = self
            .post_json(
                "/api/auth/login",
                &LoginPayload { username, password },
                None,
            )
            .await?;

        ensure!(
            response.status() == StatusCode::OK,
            "login failed with status {}",
            response.status()
        );

        let body = body_to_vec(response.into_body()).await?;
        #[derive(serde::Deserialize)]
        struct LoginResponse {
            access_token: String,
        }
        let parsed: LoginResponse = serde_json::from_slice(&body)?;
        Ok(parsed.access_token)
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::POST, path, payload, token).await
    }

    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::PUT, path, payload, token).await
    }

    async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn post_empty(
        &self,
        path: &str,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(Method::POST).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(Method::GET).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(Method::DELETE).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn upload_attachment(
        &self,
        path: &str,
        file_name: &str,
        content_type: &str,
        data: &[u8],
        token: &str,
    ) -> Result<hyper::Response<Body>> {
        let boundary = format!("boundary-{}", Uuid::new_v4());
        let mut body = Vec::new();
        body.extend(format!("--{boundary}\r\n").as_bytes());
        body.extend(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        body.extend(data);
        body.extend(b"\r\n");
        body.extend(format!("--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .header("authorization", format!("Bearer {token}"))
            .body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    use http_body_util::BodyExt;
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}
