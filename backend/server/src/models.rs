//! # Profiles
//!
//! Typed records for the profile documents held by the store.
//!
//! ## Wire Shape
//!
//! The client reads `_id`, `firstName`, `lastName`, `anonymous`, `pfp` and
//! `pipeline`. Field names stay camelCase so the existing frontend keeps working.
//!
//! ## Pipeline
//!
//! - Ordered list of experiences, order is curated by the user
//! - Never sorted by the backend
//! - An experience has no identity of its own, only its position
use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

pub const ANONYMOUS_NAME: &str = "Anonymous";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(Uuid);

impl ProfileId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Malformed identifiers are indistinguishable from missing profiles.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|_| AppError::NotFound)
    }
}

impl Default for ProfileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ProfileId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experience {
    pub company: String,
    pub title: String,
    pub date: String,
}

impl Experience {
    pub fn new(
        company: impl Into<String>,
        title: impl Into<String>,
        date: impl Into<String>,
    ) -> Result<Self, AppError> {
        let experience = Self {
            company: company.into(),
            title: title.into(),
            date: date.into(),
        };

        for (field, value) in [
            ("company", &experience.company),
            ("title", &experience.title),
            ("date", &experience.date),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::InvalidExperience(field));
            }
        }

        Ok(experience)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(rename = "_id")]
    pub id: ProfileId,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub anonymous: bool,
    #[serde(default)]
    pub pfp: String,
    #[serde(default)]
    pub pipeline: Vec<Experience>,
}

impl Profile {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            id: ProfileId::new(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            anonymous: false,
            pfp: String::new(),
            pipeline: Vec::new(),
        }
    }

    pub fn worked_at(&self) -> impl Iterator<Item = &str> {
        self.pipeline.iter().map(|experience| experience.company.as_str())
    }
}

/// A profile as it is returned from a search, with the name redacted for
/// anonymous users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    #[serde(rename = "_id")]
    pub id: ProfileId,
    pub first_name: String,
    pub last_name: String,
    pub anonymous: bool,
    pub pfp: String,
    pub pipeline: Vec<Experience>,
}

impl From<&Profile> for ProfileSummary {
    fn from(profile: &Profile) -> Self {
        let (first_name, last_name) = if profile.anonymous {
            (ANONYMOUS_NAME.to_string(), String::new())
        } else {
            (profile.first_name.clone(), profile.last_name.clone())
        };

        Self {
            id: profile.id,
            first_name,
            last_name,
            anonymous: profile.anonymous,
            pfp: profile.pfp.clone(),
            pipeline: profile.pipeline.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}
