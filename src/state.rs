use std::sync::Arc;

use crate::auth::jwt::JwtService;
use crate::auth::revocation::TokenRevocation;
use crate::config::AppConfig;
use crate::lifecycle::LifecycleCoordinator;
use crate::stores::{ContentStore, Directory, ReferenceStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: JwtService,
    pub revoked: Arc<dyn TokenRevocation>,
    pub users: Arc<dyn UserStore>,
    pub references: Arc<dyn ReferenceStore>,
    pub content: Arc<dyn ContentStore>,
    pub directory: Arc<dyn Directory>,
    pub coordinator: Arc<LifecycleCoordinator>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: AppConfig,
        jwt: JwtService,
        revoked: Arc<dyn TokenRevocation>,
        users: Arc<dyn UserStore>,
        references: Arc<dyn ReferenceStore>,
        content: Arc<dyn ContentStore>,
        directory: Arc<dyn Directory>,
        coordinator: Arc<LifecycleCoordinator>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            jwt,
            revoked,
            users,
            references,
            content,
            directory,
            coordinator,
        }
    }
}
