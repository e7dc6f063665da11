//! Profile write handlers: create, sparse update, batch create.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use harvest_core::{CoreError, EducationEntry, ExperienceEntry, ProfileRecord};
use harvest_db::DbError;
use serde::{Deserialize, Deserializer, Serialize};

use crate::middleware::RequestId;

use super::super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};
use super::{parse_id, ProfileResponse};

pub(in crate::api) const MAX_BATCH_PROFILES: usize = 50;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

// Outer None = field absent (keep current), Some(None) = explicit null
// (clear), Some(Some(v)) = set.
#[allow(clippy::option_option)]
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::api) struct UpdateProfileRequest {
    pub name: Option<String>,
    pub url: Option<String>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub about: Option<Option<String>>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub bio: Option<Option<String>>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub location: Option<Option<String>>,
    pub follower_count: Option<u32>,
    pub connection_count: Option<u32>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub bio_line: Option<Option<String>>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub headline: Option<Option<String>>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub industry: Option<Option<String>>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub profile_picture: Option<Option<String>>,
    pub experience: Option<Vec<ExperienceEntry>>,
    pub education: Option<Vec<EducationEntry>>,
    pub skills: Option<Vec<String>>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub extraction_errors: Option<Option<String>>,
}

#[allow(clippy::option_option)]
fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl UpdateProfileRequest {
    /// Overlays the present fields onto `record`.
    pub(in crate::api) fn apply(self, record: &mut ProfileRecord) {
        fn overlay<T>(slot: &mut Option<T>, patch: Option<Option<T>>) {
            if let Some(value) = patch {
                *slot = value;
            }
        }

        if let Some(name) = self.name {
            record.name = name;
        }
        if let Some(url) = self.url {
            record.url = url;
        }
        if let Some(count) = self.follower_count {
            record.follower_count = count;
        }
        if let Some(count) = self.connection_count {
            record.connection_count = count;
        }
        if let Some(experience) = self.experience {
            record.experience = experience;
        }
        if let Some(education) = self.education {
            record.education = education;
        }
        if let Some(skills) = self.skills {
            record.skills = skills;
        }
        overlay(&mut record.about, self.about);
        overlay(&mut record.bio, self.bio);
        overlay(&mut record.location, self.location);
        overlay(&mut record.bio_line, self.bio_line);
        overlay(&mut record.headline, self.headline);
        overlay(&mut record.industry, self.industry);
        overlay(&mut record.profile_picture, self.profile_picture);
        overlay(&mut record.extraction_errors, self.extraction_errors);
    }
}

#[derive(Debug, Deserialize)]
pub(in crate::api) struct BatchCreateRequest {
    pub profiles: Vec<ProfileRecord>,
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, PartialEq, Eq)]
pub(in crate::api) struct BatchCreated {
    pub index: usize,
    pub id: i64,
    pub url: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub(in crate::api) struct BatchSkipped {
    pub index: usize,
    pub url: String,
    pub reason: String,
    pub existing_id: i64,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub(in crate::api) struct BatchFailed {
    pub index: usize,
    pub url: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub(in crate::api) struct BatchCounts {
    pub total: usize,
    pub created: usize,
    pub skipped: usize,
    pub errors: usize,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct BatchCreateResponse {
    pub created: Vec<BatchCreated>,
    pub skipped: Vec<BatchSkipped>,
    pub errors: Vec<BatchFailed>,
    pub summary: BatchCounts,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn body_or_error<T>(rid: &str, body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|e| ApiError::new(rid, "bad_request", e.body_text()))
}

fn core_validation(rid: &str, err: &CoreError) -> ApiError {
    match err {
        CoreError::Validation { field, reason } => ApiError::validation(rid, *field, reason.clone()),
        CoreError::InvalidProfileUrl { .. } => ApiError::validation(rid, "url", err.to_string()),
        other => ApiError::new(rid, "bad_request", other.to_string()),
    }
}

/// Normalizes and validates a record for storage. The status is always
/// recomputed here; whatever the caller sent is ignored.
fn prepare(record: &mut ProfileRecord) -> Result<(), CoreError> {
    record.normalize();
    record.validate()?;
    record.url = harvest_core::normalize_profile_url(&record.url)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /profiles: store one scraped profile.
pub(in crate::api) async fn create_profile(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Result<Json<ProfileRecord>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<ProfileResponse>>), ApiError> {
    let rid = &req_id.0;
    let mut record = body_or_error(rid, body)?;
    prepare(&mut record).map_err(|e| core_validation(rid, &e))?;

    let row = harvest_db::insert_profile(&state.pool, &record)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    tracing::info!(id = row.id, url = %row.url, "profile created");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: ProfileResponse::from_row(rid, row)?,
            meta: ResponseMeta::new(req_id.0.clone()),
        }),
    ))
}

/// PUT /profiles/{id}: sparse update; the status is recomputed.
pub(in crate::api) async fn update_profile(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(raw_id): Path<String>,
    body: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ProfileResponse>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &raw_id)?;
    let patch = body_or_error(rid, body)?;

    let existing = harvest_db::get_profile(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", format!("profile {id} not found")))?;
    let mut record = existing
        .into_record()
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    patch.apply(&mut record);
    prepare(&mut record).map_err(|e| core_validation(rid, &e))?;

    let row = harvest_db::update_profile(&state.pool, id, &record)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    tracing::info!(id, status = %row.extraction_status, "profile updated");

    Ok(Json(ApiResponse {
        data: ProfileResponse::from_row(rid, row)?,
        meta: ResponseMeta::new(req_id.0.clone()),
    }))
}

/// POST /profiles/batch: create up to fifty profiles, reporting each item.
pub(in crate::api) async fn create_profiles_batch(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Result<Json<BatchCreateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<BatchCreateResponse>>), ApiError> {
    let rid = &req_id.0;
    let BatchCreateRequest { profiles } = body_or_error(rid, body)?;

    if profiles.is_empty() || profiles.len() > MAX_BATCH_PROFILES {
        return Err(ApiError::validation(
            rid,
            "profiles",
            format!(
                "profiles must contain 1 to {MAX_BATCH_PROFILES} items, got {}",
                profiles.len()
            ),
        ));
    }

    let total = profiles.len();
    let mut created = Vec::new();
    let mut skipped = Vec::new();
    let mut errors = Vec::new();

    for (index, mut record) in profiles.into_iter().enumerate() {
        if let Err(e) = prepare(&mut record) {
            errors.push(BatchFailed {
                index,
                url: record.url,
                message: e.to_string(),
            });
            continue;
        }
        match harvest_db::insert_profile(&state.pool, &record).await {
            Ok(row) => created.push(BatchCreated {
                index,
                id: row.id,
                url: row.url,
            }),
            Err(DbError::Duplicate { existing_id }) => skipped.push(BatchSkipped {
                index,
                url: record.url,
                reason: "duplicate".to_string(),
                existing_id,
            }),
            Err(e) => {
                tracing::warn!(index, error = %e, "batch item insert failed");
                errors.push(BatchFailed {
                    index,
                    url: record.url,
                    message: "database error".to_string(),
                });
            }
        }
    }

    let summary = BatchCounts {
        total,
        created: created.len(),
        skipped: skipped.len(),
        errors: errors.len(),
    };
    tracing::info!(
        total,
        created = summary.created,
        skipped = summary.skipped,
        errors = summary.errors,
        "profile batch stored"
    );

    let status = if created.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((
        status,
        Json(ApiResponse {
            data: BatchCreateResponse {
                created,
                skipped,
                errors,
                summary,
            },
            meta: ResponseMeta::new(req_id.0.clone()),
        }),
    ))
}
