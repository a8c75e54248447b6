//! # Meilisearch
//!
//! Search index answering "who has worked at this company".
//!
//!
//!
//! ## Schema
//! - Index for all profiles
//! - Fields: id (**uuid string**), firstName, lastName, anonymous, pfp, pipeline,
//!   companies (**list of sanitized company names**, filterable)
//! - Names are stored already redacted, anonymous users never reach the index
//!   with their real name
//!
//!
//!
//! ## Matching
//! A profile matches a query when one of its sanitized companies equals the
//! sanitized query. See [`crate::utils::sanitize`]. We filter rather than
//! search so `meta` never matches `metal`.
//!
//!
//!
//! ## Sync
//! - On startup every profile in Redis is upserted
//! - After every committed pipeline change the profile is upserted again
//! - Redis stays the source of truth, the index may lag a mutation briefly
//!
//!
//!
//! ## Commands
//!
//! Grab relevant keys.
//! ```sh
//! curl -H "Authorization: Bearer $(cat /run/secrets/MEILI_MASTER_KEY)" http://localhost:7700/keys
//! ```
use std::sync::Arc;

use async_trait::async_trait;
use meilisearch_sdk::{client::Client, settings::Settings};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    database::ProfileStore,
    error::StoreError,
    models::{Experience, Profile, ProfileId, ProfileSummary},
    utils::companies,
};

pub const PROFILE_INDEX: &str = "profiles";
pub const PROFILE_ID: &str = "id";
pub const PROFILE_COMPANIES: &str = "companies";
pub const SEARCH_LIMIT: usize = 1000;

#[async_trait]
pub trait ProfileIndex: Send + Sync {
    async fn upsert(&self, profiles: &[Profile]) -> Result<(), StoreError>;

    /// `company` must already be sanitized.
    async fn search_company(&self, company: &str) -> Result<Vec<ProfileSummary>, StoreError>;
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeiliProfile {
    pub id: ProfileId,
    pub first_name: String,
    pub last_name: String,
    pub anonymous: bool,
    pub pfp: String,
    pub pipeline: Vec<Experience>,
    pub companies: Vec<String>,
}

impl From<&Profile> for MeiliProfile {
    fn from(profile: &Profile) -> Self {
        let summary = ProfileSummary::from(profile);

        Self {
            id: summary.id,
            first_name: summary.first_name,
            last_name: summary.last_name,
            anonymous: summary.anonymous,
            pfp: summary.pfp,
            pipeline: summary.pipeline,
            companies: companies(profile),
        }
    }
}

impl From<MeiliProfile> for ProfileSummary {
    fn from(document: MeiliProfile) -> Self {
        Self {
            id: document.id,
            first_name: document.first_name,
            last_name: document.last_name,
            anonymous: document.anonymous,
            pfp: document.pfp,
            pipeline: document.pipeline,
        }
    }
}

pub struct MeiliIndex {
    client: Arc<Client>,
}

pub async fn init_meilisearch(
    meili_url: &str,
    meili_admin_key: &str,
) -> Result<MeiliIndex, StoreError> {
    let client = Arc::new(Client::new(meili_url, Some(meili_admin_key))?);

    client
        .index(PROFILE_INDEX)
        .set_settings(&init_settings())
        .await?
        .wait_for_completion(&client, None, None)
        .await?;

    Ok(MeiliIndex { client })
}

/// Pushes every stored profile into the index.
pub async fn sync_index(
    store: &dyn ProfileStore,
    index: &dyn ProfileIndex,
) -> Result<usize, StoreError> {
    let profiles = store.all().await?;

    if !profiles.is_empty() {
        index.upsert(&profiles).await?;
    }

    info!("Synced {} profiles into the search index", profiles.len());

    Ok(profiles.len())
}

#[async_trait]
impl ProfileIndex for MeiliIndex {
    async fn upsert(&self, profiles: &[Profile]) -> Result<(), StoreError> {
        let documents: Vec<MeiliProfile> = profiles.iter().map(MeiliProfile::from).collect();

        let _task = self
            .client
            .index(PROFILE_INDEX)
            .add_or_update(&documents, Some(PROFILE_ID))
            .await?;

        #[cfg(feature = "verbose")]
        tracing::debug!("Meili task enqueued: {:?}", _task);

        Ok(())
    }

    async fn search_company(&self, company: &str) -> Result<Vec<ProfileSummary>, StoreError> {
        let filter = format!("{PROFILE_COMPANIES} = \"{company}\"");
        let index = self.client.index(PROFILE_INDEX);

        let results = index
            .search()
            .with_filter(&filter)
            .with_limit(SEARCH_LIMIT)
            .execute::<MeiliProfile>()
            .await?;

        Ok(results
            .hits
            .into_iter()
            .map(|hit| ProfileSummary::from(hit.result))
            .collect())
    }
}

fn init_settings() -> Settings {
    Settings::new()
        .with_filterable_attributes([PROFILE_COMPANIES])
        .with_searchable_attributes([PROFILE_COMPANIES])
}
