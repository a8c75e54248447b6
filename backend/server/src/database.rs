//! # Redis
//!
//! Profile store.
//!
//! Holds every profile document together with a version counter. The version
//! is what makes pipeline mutations safe: writers read a profile, change it in
//! memory, then ask Redis to swap it in only if nobody else wrote in between.
//!
//! ## Layout
//!
//! - `profile:{id}`: hash with `version` (**int**) and `doc` (**JSON string**)
//! - `profiles`: set of every profile id, used for the startup index sync
//!
//! ## Atomicity
//!
//! - Inserts and swaps run as Lua scripts, Redis executes a script as a single
//!   operation so the version check and the write cannot interleave
//! - Reads are a single `HMGET`
use std::time::Duration;

use async_trait::async_trait;
use redis::{
    Client, Script,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use tracing::debug;

use crate::{
    error::StoreError,
    models::{Profile, ProfileId, Versioned},
};

pub const PROFILES_KEY: &str = "profiles";

const INSERT_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
    return 0
end
redis.call('HSET', KEYS[1], 'version', 0, 'doc', ARGV[2])
redis.call('SADD', KEYS[2], ARGV[1])
return 1
"#;

const SWAP_SCRIPT: &str = r#"
local version = redis.call('HGET', KEYS[1], 'version')
if not version then
    return -1
end
if version ~= ARGV[1] then
    return 0
end
redis.call('HSET', KEYS[1], 'version', ARGV[2], 'doc', ARGV[3])
return 1
"#;

/// Outcome of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Swap {
    Committed,
    Stale,
    Missing,
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn load(&self, id: &ProfileId) -> Result<Option<Versioned<Profile>>, StoreError>;

    /// Writes `profile` only if the stored version still equals `expected`.
    async fn compare_and_swap(
        &self,
        expected: u64,
        profile: &Profile,
    ) -> Result<Swap, StoreError>;

    /// Creates a profile, never overwriting an existing one.
    async fn insert(&self, profile: &Profile) -> Result<bool, StoreError>;

    async fn all(&self) -> Result<Vec<Profile>, StoreError>;
}

pub async fn init_redis(redis_url: &str) -> Result<ConnectionManager, StoreError> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(100));

    let client = Client::open(redis_url)?;
    let connection_manager = client.get_connection_manager_with_config(config).await?;

    Ok(connection_manager)
}

pub struct RedisStore {
    connection: ConnectionManager,
    insert_script: Script,
    swap_script: Script,
}

impl RedisStore {
    pub fn new(connection: ConnectionManager) -> Self {
        Self {
            connection,
            insert_script: Script::new(INSERT_SCRIPT),
            swap_script: Script::new(SWAP_SCRIPT),
        }
    }
}

fn profile_key(id: &ProfileId) -> String {
    format!("profile:{id}")
}

fn decode(id: &ProfileId, doc: &str) -> Result<Profile, StoreError> {
    let profile: Profile = serde_json::from_str(doc)?;

    if profile.id != *id {
        return Err(StoreError::Corrupt(id.to_string()));
    }

    Ok(profile)
}

#[async_trait]
impl ProfileStore for RedisStore {
    async fn load(&self, id: &ProfileId) -> Result<Option<Versioned<Profile>>, StoreError> {
        let mut connection = self.connection.clone();

        let (version, doc): (Option<u64>, Option<String>) = redis::cmd("HMGET")
            .arg(profile_key(id))
            .arg("version")
            .arg("doc")
            .query_async(&mut connection)
            .await?;

        match (version, doc) {
            (Some(version), Some(doc)) => Ok(Some(Versioned {
                version,
                value: decode(id, &doc)?,
            })),
            (None, None) => Ok(None),
            _ => Err(StoreError::Corrupt(id.to_string())),
        }
    }

    async fn compare_and_swap(
        &self,
        expected: u64,
        profile: &Profile,
    ) -> Result<Swap, StoreError> {
        let mut connection = self.connection.clone();
        let doc = serde_json::to_string(profile)?;

        let result: i64 = self
            .swap_script
            .key(profile_key(&profile.id))
            .arg(expected)
            .arg(expected + 1)
            .arg(doc)
            .invoke_async(&mut connection)
            .await?;

        #[cfg(feature = "verbose")]
        debug!("Swap for {} at version {expected} returned {result}", profile.id);

        Ok(match result {
            1 => Swap::Committed,
            0 => Swap::Stale,
            _ => Swap::Missing,
        })
    }

    async fn insert(&self, profile: &Profile) -> Result<bool, StoreError> {
        let mut connection = self.connection.clone();
        let doc = serde_json::to_string(profile)?;

        let inserted: i64 = self
            .insert_script
            .key(profile_key(&profile.id))
            .key(PROFILES_KEY)
            .arg(profile.id.to_string())
            .arg(doc)
            .invoke_async(&mut connection)
            .await?;

        Ok(inserted == 1)
    }

    async fn all(&self) -> Result<Vec<Profile>, StoreError> {
        let mut connection = self.connection.clone();

        let ids: Vec<String> = redis::cmd("SMEMBERS")
            .arg(PROFILES_KEY)
            .query_async(&mut connection)
            .await?;

        let mut profiles = Vec::with_capacity(ids.len());
        for raw in ids {
            let Ok(id) = ProfileId::parse(&raw) else {
                debug!("Skipping unparseable profile id {raw}");
                continue;
            };

            if let Some(versioned) = self.load(&id).await? {
                profiles.push(versioned.value);
            }
        }

        Ok(profiles)
    }
}
