//! # Pipelines
//!
//! Reading and editing the ordered experiences of a single profile, plus the
//! company search across all profiles.
//!
//!
//!
//! ## Compatibility
//!
//! The first version of the API shipped with two quirks that clients may rely on:
//! - `index: 0` on add was treated like a missing index and appended
//! - remove spliced zero elements, so it never removed anything
//!
//! [`Compatibility::Legacy`] keeps both, along with the loose index handling of
//! the old controller: any truthy `index` (negative numbers, numeric strings)
//! is used as an array splice start. [`Compatibility::Corrected`] only takes
//! non-negative integers, inserts at the front for `index: 0` and removes
//! exactly one experience, rejecting indices outside the pipeline.
//!
//!
//!
//! ## Writes
//!
//! Every mutation is a versioned read-modify-write. If another writer got in
//! between our read and our write the store reports the version as stale and we
//! start over from a fresh read, at most [`MAX_ATTEMPTS`] times.
use std::{fmt, str::FromStr, sync::Arc};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    database::{ProfileStore, Swap},
    error::AppError,
    models::{Experience, Profile, ProfileId, ProfileSummary},
    search::ProfileIndex,
    session::Session,
    utils::sanitize,
};

pub const MAX_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compatibility {
    Legacy,
    #[default]
    Corrected,
}

impl FromStr for Compatibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "corrected" => Ok(Self::Corrected),
            other => Err(format!("unknown compatibility mode '{other}'")),
        }
    }
}

impl fmt::Display for Compatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => f.write_str("legacy"),
            Self::Corrected => f.write_str("corrected"),
        }
    }
}

/// `index` is kept as raw JSON: legacy clients send numbers, strings, negative
/// values and `null`, and legacy mode has to accept all of them.
#[derive(Debug, Clone, Deserialize)]
pub struct AddExperience {
    #[serde(default)]
    pub index: Option<Value>,
    pub company: String,
    pub title: String,
    pub date: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoveExperience {
    #[serde(default)]
    pub index: Option<Value>,
}

/// Corrected mode only takes non-negative integers. `null` counts as absent.
fn strict_index(index: Option<&Value>) -> Result<Option<usize>, AppError> {
    match index {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|index| usize::try_from(index).ok())
            .map(Some)
            .ok_or(AppError::MalformedPayload),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Start position of an array splice. Negative values count from the end,
/// everything is clamped to `0..=len`, and values that are not numeric
/// (objects, arrays, unparseable strings) start at 0.
fn splice_start(value: &Value, len: usize) -> usize {
    let start = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::String(s) if s.trim().is_empty() => 0.0,
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        Value::Null | Value::Array(_) | Value::Object(_) => 0.0,
    };

    let start = if start.is_nan() { 0.0 } else { start.trunc() };
    let len_f = len as f64;

    if start < 0.0 {
        (len_f + start).max(0.0) as usize
    } else {
        start.min(len_f) as usize
    }
}

/// Places `experience` into `pipeline`. Indices past the end append.
pub fn insert_experience(
    pipeline: &mut Vec<Experience>,
    index: Option<&Value>,
    experience: Experience,
    compatibility: Compatibility,
) -> Result<(), AppError> {
    let position = match compatibility {
        Compatibility::Legacy => match index {
            Some(value) if truthy(value) => splice_start(value, pipeline.len()),
            _ => pipeline.len(),
        },
        Compatibility::Corrected => match strict_index(index)? {
            Some(index) => index.min(pipeline.len()),
            None => pipeline.len(),
        },
    };

    pipeline.insert(position, experience);

    Ok(())
}

/// Legacy mode never removes anything, whatever `index` holds.
pub fn remove_experience(
    pipeline: &mut Vec<Experience>,
    index: Option<&Value>,
    compatibility: Compatibility,
) -> Result<(), AppError> {
    if compatibility == Compatibility::Legacy {
        return Ok(());
    }

    let len = pipeline.len();
    match strict_index(index)? {
        Some(index) if index < len => {
            pipeline.remove(index);
            Ok(())
        }
        Some(index) => Err(AppError::InvalidIndex { index, len }),
        None => Err(AppError::MissingIndex),
    }
}

pub struct PipelineService {
    store: Arc<dyn ProfileStore>,
    index: Arc<dyn ProfileIndex>,
    compatibility: Compatibility,
}

impl PipelineService {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        index: Arc<dyn ProfileIndex>,
        compatibility: Compatibility,
    ) -> Self {
        Self {
            store,
            index,
            compatibility,
        }
    }

    pub fn compatibility(&self) -> Compatibility {
        self.compatibility
    }

    pub async fn get_pipeline(
        &self,
        session: &Session,
        raw_id: &str,
    ) -> Result<Vec<Experience>, AppError> {
        let id = ProfileId::parse(raw_id)?;
        debug!("Pipeline read of {id} by {session}");

        let versioned = self.store.load(&id).await?.ok_or(AppError::NotFound)?;

        Ok(versioned.value.pipeline)
    }

    pub async fn add_experience(
        &self,
        session: &Session,
        raw_id: &str,
        request: AddExperience,
    ) -> Result<Profile, AppError> {
        let id = ProfileId::parse(raw_id)?;
        let experience = Experience::new(request.company, request.title, request.date)?;
        let compatibility = self.compatibility;

        info!("Adding experience to {id} by {session}");

        self.mutate(&id, |pipeline| {
            insert_experience(
                pipeline,
                request.index.as_ref(),
                experience.clone(),
                compatibility,
            )
        })
        .await
    }

    pub async fn remove_experience(
        &self,
        session: &Session,
        raw_id: &str,
        request: RemoveExperience,
    ) -> Result<Profile, AppError> {
        let id = ProfileId::parse(raw_id)?;
        let compatibility = self.compatibility;

        info!("Removing experience {:?} from {id} by {session}", request.index);

        self.mutate(&id, |pipeline| {
            remove_experience(pipeline, request.index.as_ref(), compatibility)
        })
        .await
    }

    /// Profiles with at least one experience at `company`. No match is an empty
    /// list, not an error.
    pub async fn search_by_company(
        &self,
        session: &Session,
        company: &str,
    ) -> Result<Vec<ProfileSummary>, AppError> {
        let company = sanitize(company);
        debug!("Company search for '{company}' by {session}");

        if company.is_empty() {
            return Ok(Vec::new());
        }

        Ok(self.index.search_company(&company).await?)
    }

    async fn mutate<F>(&self, id: &ProfileId, mut apply: F) -> Result<Profile, AppError>
    where
        F: FnMut(&mut Vec<Experience>) -> Result<(), AppError> + Send,
    {
        for attempt in 1..=MAX_ATTEMPTS {
            let Some(versioned) = self.store.load(id).await? else {
                return Err(AppError::NotFound);
            };

            let mut profile = versioned.value;
            apply(&mut profile.pipeline)?;

            match self.store.compare_and_swap(versioned.version, &profile).await? {
                Swap::Committed => {
                    self.refresh_index(&profile).await;
                    return Ok(profile);
                }
                Swap::Stale => {
                    warn!("Stale write to {id} on attempt {attempt}, retrying");
                }
                Swap::Missing => return Err(AppError::NotFound),
            }
        }

        Err(AppError::Conflict)
    }

    async fn refresh_index(&self, profile: &Profile) {
        if let Err(e) = self.index.upsert(std::slice::from_ref(profile)).await {
            warn!("Failed to refresh search index for {}: {e}", profile.id);
        }
    }
}
