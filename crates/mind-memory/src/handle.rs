//! One store per process, opened on first use.

use std::sync::Arc;

use mind_config::{ConfigOverrides, MindConfig};
use tokio::sync::OnceCell;

use crate::engine::MemoryBackend;
use crate::error::Result;
use crate::store::MindStore;

enum StoreSource {
    Environment(ConfigOverrides),
    Resolved {
        config: MindConfig,
        backend: Arc<dyn MemoryBackend>,
    },
}

/// Lazily opened, shared [`MindStore`].
///
/// Concurrent first callers wait on the same open. When opening fails the
/// handle stays empty and the next call tries again.
pub struct MindHandle {
    source: StoreSource,
    store: OnceCell<Arc<MindStore>>,
}

impl MindHandle {
    /// Open from the process environment (`CLAUDE_PROJECT_DIR`, config
    /// file, `MIND_DEBUG`) with `overrides` on top.
    pub fn new(overrides: ConfigOverrides) -> Self {
        Self {
            source: StoreSource::Environment(overrides),
            store: OnceCell::new(),
        }
    }

    pub fn with_backend(config: MindConfig, backend: Arc<dyn MemoryBackend>) -> Self {
        Self {
            source: StoreSource::Resolved { config, backend },
            store: OnceCell::new(),
        }
    }

    pub async fn get(&self) -> Result<Arc<MindStore>> {
        let store = self
            .store
            .get_or_try_init(|| async {
                let store = match &self.source {
                    StoreSource::Environment(overrides) => MindStore::open(overrides).await?,
                    StoreSource::Resolved { config, backend } => {
                        MindStore::open_with(config.clone(), backend.as_ref()).await?
                    }
                };
                Ok::<_, crate::MindError>(Arc::new(store))
            })
            .await?;
        Ok(Arc::clone(store))
    }

    /// The store if it has been opened already.
    pub fn get_initialized(&self) -> Option<Arc<MindStore>> {
        self.store.get().cloned()
    }
}
