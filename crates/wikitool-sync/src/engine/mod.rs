//! Reconciliation engine: classifies differences between wiki, database and
//! working tree, and applies them in either direction.

mod changes;
mod init;
mod pull;
mod push;

pub use changes::ChangesOptions;
pub use init::InitOptions;
pub use pull::PullOptions;
pub use push::PushOptions;

use crate::api::MediaWiki;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use wikitool_core::{fs::Filesystem, site::Site};
use wikitool_store::Database;

/// Cooperative cancellation. Checked between pages; in-flight requests run
/// to completion and partial progress stays committed.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Orchestrates pull / push / status / init over one database, one working
/// tree and one wiki client. Owns its resources for the lifetime of the
/// engine; single-threaded by design.
pub struct SyncEngine<C> {
    db: Database,
    fs: Filesystem,
    client: C,
    site: Arc<Site>,
    cancel: CancelFlag,
}

impl<C: MediaWiki> SyncEngine<C> {
    pub fn new(db: Database, fs: Filesystem, client: C, site: Arc<Site>) -> SyncEngine<C> {
        SyncEngine {
            db,
            fs,
            client,
            site,
            cancel: CancelFlag::default(),
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn fs(&self) -> &Filesystem {
        &self.fs
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn site(&self) -> &Site {
        &self.site
    }

    pub fn site_arc(&self) -> Arc<Site> {
        self.site.clone()
    }

    /// Handle for cancelling this engine's current operation from another
    /// task.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Consumes the engine, closing the database.
    pub fn close(self) -> crate::Result<()> {
        self.db.close()
    }
}
