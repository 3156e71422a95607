//! Application state and initialization
//!
//! This module wires a backend into the services. All services are created
//! here and made available through [`AppState`].

use crate::config::{BackendConfig, AUTH_TOKEN_FILE, DATABASE_FILE, OBJECTS_DIR};
use crate::database::{create_pool, Store};
use crate::error::Result;
use crate::remote::{HostedAuth, SupabaseClient};
use crate::services::{
    AuthProvider, CheckInService, ContactService, MoodService, PhoneAuthService, ProfileService,
    Session, SessionStore, SettingsService, WillService,
};
use crate::storage::{LocalObjectStore, ObjectStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Which backend the services talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// SQLite database and files in the data directory, phone-number accounts
    Local,
    /// Hosted project, email accounts
    Hosted,
}

/// Central application state holding all services
pub struct AppState {
    pub data_dir: PathBuf,
    pub backend: BackendKind,
    pub session: Session,
    pub check_ins: CheckInService,
    pub moods: MoodService,
    pub contacts: ContactService,
    pub will: WillService,
    pub settings: SettingsService,
    pub profiles: ProfileService,
}

impl AppState {
    /// Open the backend selected by `config` and restore the session
    pub async fn initialize(config: &BackendConfig) -> Result<Self> {
        tracing::info!("Initializing application");
        tracing::info!("Data directory: {:?}", config.data_dir);

        tokio::fs::create_dir_all(&config.data_dir).await?;

        let state = match &config.hosted {
            Some(hosted) => {
                tracing::info!("Using hosted backend at {}", hosted.url);
                Self::hosted(&config.data_dir, &hosted.url, &hosted.anon_key).await?
            }
            None => {
                tracing::info!("Using local backend");
                Self::local(&config.data_dir, config.files_url.as_deref()).await?
            }
        };

        tracing::info!("Application initialized successfully");
        Ok(state)
    }

    /// SQLite database and object files under `data_dir`.
    ///
    /// Object URLs point at `files_url` when a file server is publishing
    /// the objects directory, otherwise at `file://` paths.
    pub async fn local(data_dir: &Path, files_url: Option<&str>) -> Result<Self> {
        let pool = create_pool(&data_dir.join(DATABASE_FILE)).await?;
        let store: Arc<dyn Store> = Arc::new(crate::database::Repository::new(pool));

        let mut objects = LocalObjectStore::new(data_dir.join(OBJECTS_DIR));
        if let Some(base) = files_url {
            tracing::info!("Serving object URLs from {}", base);
            objects = objects.with_public_base(base);
        }
        objects.initialize().await?;

        let auth: Arc<dyn AuthProvider> = Arc::new(PhoneAuthService::new(Arc::clone(&store)));

        Self::assemble(data_dir, BackendKind::Local, store, Arc::new(objects), auth).await
    }

    /// Hosted project; the access token is kept next to the session file
    pub async fn hosted(data_dir: &Path, url: &str, anon_key: &str) -> Result<Self> {
        let client = SupabaseClient::new(url, anon_key)?;

        // Reuse the token of an earlier sign-in, if any
        let auth = HostedAuth::new(client.clone(), Some(data_dir.join(AUTH_TOKEN_FILE)));
        if let Err(e) = auth.restore_token().await {
            tracing::warn!("Ignoring unreadable auth token: {}", e);
        }

        let store: Arc<dyn Store> = Arc::new(client.clone());
        let objects: Arc<dyn ObjectStore> = Arc::new(client);

        Self::assemble(data_dir, BackendKind::Hosted, store, objects, Arc::new(auth)).await
    }

    async fn assemble(
        data_dir: &Path,
        backend: BackendKind,
        store: Arc<dyn Store>,
        objects: Arc<dyn ObjectStore>,
        auth: Arc<dyn AuthProvider>,
    ) -> Result<Self> {
        let profiles = ProfileService::new(Arc::clone(&auth), Arc::clone(&objects));
        let session = Session::start(auth, Some(SessionStore::new(data_dir))).await?;

        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            backend,
            session,
            check_ins: CheckInService::new(Arc::clone(&store)),
            moods: MoodService::new(Arc::clone(&store)),
            contacts: ContactService::new(Arc::clone(&store)),
            will: WillService::new(Arc::clone(&store), objects),
            settings: SettingsService::new(store),
            profiles,
        })
    }

    /// Tear down the session before exit
    pub async fn shutdown(self) {
        tracing::info!("Shutting down");
        self.session.shutdown().await;
    }
}
