pub mod context;
pub mod init;
pub mod log;
pub mod migrate;
pub mod pull;
pub mod push;
pub mod reindex;
pub mod search;
pub mod stats;
pub mod status;

use anyhow::Context as _;
use std::sync::Arc;
use wikitool_core::{
    fs::Filesystem,
    settings::{load_site, Settings},
    site::Site,
};
use wikitool_store::Database;
use wikitool_sync::{Client, SyncEngine};

/// Everything a local-only command needs.
pub(crate) struct Runtime {
    pub settings: Settings,
    pub site: Arc<Site>,
    pub db: Database,
    pub fs: Filesystem,
}

pub(crate) fn open_runtime() -> anyhow::Result<Runtime> {
    let settings = Settings::load().context("failed to resolve settings")?;
    let site = Arc::new(
        load_site(&settings.project_root).context("failed to load site configuration")?,
    );
    let db = Database::open(&settings.db_path)
        .with_context(|| format!("failed to open {}", settings.db_path.display()))?;
    let fs = Filesystem::new(&settings.project_root, site.clone());
    Ok(Runtime {
        settings,
        site,
        db,
        fs,
    })
}

/// Builds the full sync engine; logs in when credentials are configured and
/// `need_auth` asks for them.
pub(crate) async fn open_engine(need_auth: bool) -> anyhow::Result<SyncEngine<Client>> {
    let runtime = open_runtime()?;
    let client = Client::new(&runtime.settings).context("failed to build API client")?;
    if need_auth || runtime.settings.credentials().is_ok() {
        if let Ok((user, pass)) = runtime.settings.credentials() {
            client
                .login(user, pass)
                .await
                .context("failed to log in to the wiki")?;
        } else if need_auth {
            runtime.settings.credentials().context("missing credentials")?;
        }
    }
    Ok(SyncEngine::new(
        runtime.db,
        runtime.fs,
        client,
        runtime.site,
    ))
}
