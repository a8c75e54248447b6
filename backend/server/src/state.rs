use std::{fs::read_to_string, path::Path, sync::Arc};

use anyhow::{Context, Result};
use tracing::info;

use super::{
    config::{Backend, Config, read_secret},
    database::{ProfileStore, RedisStore, init_redis},
    memory::MemoryStore,
    models::Profile,
    pipeline::PipelineService,
    search::{ProfileIndex, init_meilisearch, sync_index},
};

pub struct AppState {
    pub config: Config,
    pub pipelines: PipelineService,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Arc<Self>> {
        let (store, index): (Arc<dyn ProfileStore>, Arc<dyn ProfileIndex>) = match config.backend {
            Backend::Redis => {
                let connection = init_redis(&config.redis_url)
                    .await
                    .context("Failed to connect to Redis")?;
                let meili_key = read_secret("MEILI_ADMIN_KEY")?;
                let index = init_meilisearch(&config.meili_url, &meili_key)
                    .await
                    .context("Failed to configure Meilisearch")?;

                let store: Arc<dyn ProfileStore> = Arc::new(RedisStore::new(connection));
                let index: Arc<dyn ProfileIndex> = Arc::new(index);

                (store, index)
            }
            Backend::Memory => {
                info!("Using in-memory profile store");
                let memory = Arc::new(MemoryStore::new());
                let store: Arc<dyn ProfileStore> = memory.clone();
                let index: Arc<dyn ProfileIndex> = memory;

                (store, index)
            }
        };

        if let Some(path) = &config.seed_file {
            seed(store.as_ref(), path).await?;
        }

        sync_index(store.as_ref(), index.as_ref())
            .await
            .context("Failed to sync search index")?;

        Ok(Self::with_store(config, store, index))
    }

    pub fn with_store(
        config: Config,
        store: Arc<dyn ProfileStore>,
        index: Arc<dyn ProfileIndex>,
    ) -> Arc<Self> {
        let pipelines = PipelineService::new(store, index, config.compatibility);

        Arc::new(Self { config, pipelines })
    }
}

/// Loads a JSON array of profiles, skipping ids that already exist.
pub async fn seed(store: &dyn ProfileStore, path: &Path) -> Result<usize> {
    let raw = read_to_string(path)
        .with_context(|| format!("Failed to read seed file {}", path.display()))?;
    let profiles: Vec<Profile> = serde_json::from_str(&raw)
        .with_context(|| format!("Malformed seed file {}", path.display()))?;

    let mut inserted = 0;
    for profile in &profiles {
        if store.insert(profile).await? {
            inserted += 1;
        }
    }

    info!(
        "Seeded {inserted} of {} profiles from {}",
        profiles.len(),
        path.display()
    );

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use std::{env, fs};

    use super::*;
    use crate::models::Experience;

    #[tokio::test]
    async fn test_seed_skips_existing() {
        let mut profile = Profile::new("Ada", "Lovelace");
        profile
            .pipeline
            .push(Experience::new("A", "Eng", "2020").unwrap());

        let path = env::temp_dir().join(format!("pipelines-seed-{}.json", profile.id));
        fs::write(&path, serde_json::to_string(&vec![profile.clone()]).unwrap()).unwrap();

        let store = MemoryStore::new();
        assert_eq!(seed(&store, &path).await.unwrap(), 1);
        assert_eq!(seed(&store, &path).await.unwrap(), 0);

        let loaded = store.load(&profile.id).await.unwrap().unwrap();
        assert_eq!(loaded.value, profile);

        fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn test_memory_backend_with_seed() {
        let profile = Profile::new("Grace", "Hopper");
        let path = env::temp_dir().join(format!("pipelines-seed-{}.json", profile.id));
        fs::write(&path, serde_json::to_string(&vec![profile.clone()]).unwrap()).unwrap();

        let config = Config {
            seed_file: Some(path.clone()),
            ..Config::default()
        };
        let state = AppState::new(config).await.unwrap();

        let pipeline = state
            .pipelines
            .get_pipeline(&crate::session::Session::anonymous(), &profile.id.to_string())
            .await
            .unwrap();
        assert!(pipeline.is_empty());

        fs::remove_file(path).unwrap();
    }
}
