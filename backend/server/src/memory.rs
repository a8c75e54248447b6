//! In-process store and index, used for local development without Redis or
//! Meilisearch and as the backing store in tests.
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    database::{ProfileStore, Swap},
    error::StoreError,
    models::{Profile, ProfileId, ProfileSummary, Versioned},
    search::ProfileIndex,
    utils::companies,
};

#[derive(Default)]
pub struct MemoryStore {
    profiles: RwLock<HashMap<ProfileId, Versioned<Profile>>>,
    // insertion order, so `all` and searches are stable
    order: RwLock<Vec<ProfileId>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn load(&self, id: &ProfileId) -> Result<Option<Versioned<Profile>>, StoreError> {
        Ok(self.profiles.read().await.get(id).cloned())
    }

    async fn compare_and_swap(
        &self,
        expected: u64,
        profile: &Profile,
    ) -> Result<Swap, StoreError> {
        let mut profiles = self.profiles.write().await;

        let Some(current) = profiles.get_mut(&profile.id) else {
            return Ok(Swap::Missing);
        };

        if current.version != expected {
            return Ok(Swap::Stale);
        }

        *current = Versioned {
            version: expected + 1,
            value: profile.clone(),
        };

        Ok(Swap::Committed)
    }

    async fn insert(&self, profile: &Profile) -> Result<bool, StoreError> {
        let mut profiles = self.profiles.write().await;

        if profiles.contains_key(&profile.id) {
            return Ok(false);
        }

        profiles.insert(
            profile.id,
            Versioned {
                version: 0,
                value: profile.clone(),
            },
        );
        self.order.write().await.push(profile.id);

        Ok(true)
    }

    async fn all(&self) -> Result<Vec<Profile>, StoreError> {
        let profiles = self.profiles.read().await;
        let order = self.order.read().await;

        Ok(order
            .iter()
            .filter_map(|id| profiles.get(id))
            .map(|versioned| versioned.value.clone())
            .collect())
    }
}

/// Searches go straight to the stored profiles, so there is nothing to keep in
/// sync and `upsert` is a no-op.
#[async_trait]
impl ProfileIndex for MemoryStore {
    async fn upsert(&self, _profiles: &[Profile]) -> Result<(), StoreError> {
        Ok(())
    }

    async fn search_company(&self, company: &str) -> Result<Vec<ProfileSummary>, StoreError> {
        Ok(ProfileStore::all(self)
            .await?
            .iter()
            .filter(|profile| companies(profile).iter().any(|c| c == company))
            .map(ProfileSummary::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Experience;

    fn profile_at(company: &str) -> Profile {
        let mut profile = Profile::new("Ada", "Lovelace");
        profile
            .pipeline
            .push(Experience::new(company, "Eng", "2020").unwrap());
        profile
    }

    #[tokio::test]
    async fn test_insert_never_overwrites() {
        let store = MemoryStore::new();
        let mut profile = profile_at("A");

        assert!(store.insert(&profile).await.unwrap());

        profile.first_name = "Changed".into();
        assert!(!store.insert(&profile).await.unwrap());

        let loaded = store.load(&profile.id).await.unwrap().unwrap();
        assert_eq!(loaded.value.first_name, "Ada");
        assert_eq!(loaded.version, 0);
    }

    #[tokio::test]
    async fn test_compare_and_swap() {
        let store = MemoryStore::new();
        let mut profile = profile_at("A");
        store.insert(&profile).await.unwrap();

        profile.pipeline.clear();
        assert_eq!(
            store.compare_and_swap(0, &profile).await.unwrap(),
            Swap::Committed
        );
        assert_eq!(store.compare_and_swap(0, &profile).await.unwrap(), Swap::Stale);

        let loaded = store.load(&profile.id).await.unwrap().unwrap();
        assert_eq!(loaded.version, 1);
        assert!(loaded.value.pipeline.is_empty());

        let stranger = Profile::new("No", "One");
        assert_eq!(
            store.compare_and_swap(0, &stranger).await.unwrap(),
            Swap::Missing
        );
    }

    #[tokio::test]
    async fn test_search_company() {
        let store = MemoryStore::new();
        let google = profile_at("Google");
        let meta = profile_at("Meta");
        store.insert(&google).await.unwrap();
        store.insert(&meta).await.unwrap();

        let hits = store.search_company("google").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, google.id);

        assert!(store.search_company("metal").await.unwrap().is_empty());
    }
}
