//! Profile Service
//!
//! One optional profile per user.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::instrument;

use super::record_service::{DeleteMode, RecordContext, RecordError, RecordService};
use crate::domain::ports::Document;
use crate::domain::query::{fields, FieldFilter, QueryRequest};
use crate::domain::Profile;

/// Profile fields; `None` leaves a field untouched on update.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthday: Option<NaiveDate>,
}

impl ProfileDto {
    fn into_patch(self) -> Result<Document, ProfileError> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => Ok(map),
            Ok(_) => Ok(Document::new()),
            Err(e) => Err(ProfileError::Internal(e.to_string())),
        }
    }
}

/// Profile service errors
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Profile not found")]
    NotFound,

    #[error("Profile already exists")]
    AlreadyExists,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Record(#[from] RecordError),
}

#[derive(Clone)]
pub struct ProfileService {
    profiles: RecordService<Profile>,
}

impl ProfileService {
    pub fn new(ctx: &RecordContext) -> Self {
        Self {
            profiles: RecordService::new(ctx),
        }
    }

    fn by_user(user_id: i64) -> QueryRequest {
        QueryRequest::new().matching(fields([("user_id", FieldFilter::eq(user_id))]))
    }

    pub async fn get(&self, user_id: i64) -> Result<Profile, ProfileError> {
        self.profiles
            .find_one(&Self::by_user(user_id))
            .await?
            .ok_or(ProfileError::NotFound)
    }

    #[instrument(skip(self, dto))]
    pub async fn create(&self, user_id: i64, dto: ProfileDto) -> Result<Profile, ProfileError> {
        if self.profiles.count(&Self::by_user(user_id)).await? > 0 {
            return Err(ProfileError::AlreadyExists);
        }

        let profile = Profile {
            user_id,
            avatar: dto.avatar,
            address: dto.address,
            phone: dto.phone,
            description: dto.description,
            gender: dto.gender,
            position: dto.position,
            birthday: dto.birthday,
            ..Profile::default()
        };
        Ok(self.profiles.create_one(profile).await?)
    }

    #[instrument(skip(self, dto))]
    pub async fn update(&self, user_id: i64, dto: ProfileDto) -> Result<Profile, ProfileError> {
        let patch = dto.into_patch()?;
        let current = self.get(user_id).await?;
        if patch.is_empty() {
            return Ok(current);
        }
        Ok(self.profiles.update_one_by_id(current.id, patch).await?)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: i64) -> Result<(), ProfileError> {
        self.profiles
            .delete_one(&Self::by_user(user_id), DeleteMode::Soft)
            .await?
            .map(|_| ())
            .ok_or(ProfileError::NotFound)
    }
}
