//! `/profiles` handlers. Reads live here, writes in `write`.

mod write;

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Extension, Json,
};
use harvest_core::{ExtractionStatus, ProfileRecord};
use harvest_db::{LocationCount, ProfileListFilters, ProfileRow, SortColumn, SortOrder};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, PaginatedResponse, Pagination, ResponseMeta};

pub(super) use write::{create_profile, create_profiles_batch, update_profile};

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

/// A stored profile on the wire: the record plus its id.
#[derive(Debug, Serialize)]
pub(in crate::api) struct ProfileResponse {
    pub id: i64,
    #[serde(flatten)]
    pub record: ProfileRecord,
}

impl ProfileResponse {
    fn from_row(request_id: &str, row: ProfileRow) -> Result<Self, ApiError> {
        let id = row.id;
        let record = row
            .into_record()
            .map_err(|e| map_db_error(request_id.to_owned(), &e))?;
        Ok(Self { id, record })
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub(in crate::api) struct StatusCounts {
    pub pending: i64,
    pub success: i64,
    pub partial: i64,
    pub failed: i64,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub(in crate::api) struct TopLocation {
    pub location: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::api) struct StatsResponse {
    pub total: i64,
    pub by_status: StatusCounts,
    pub top_locations: Vec<TopLocation>,
    pub recent: Vec<ProfileResponse>,
    pub average_followers: f64,
    pub average_connections: f64,
}

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::api) struct ListProfilesQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub status: Option<String>,
    pub location: Option<String>,
    pub search: Option<String>,
    pub min_followers: Option<i64>,
    pub max_followers: Option<i64>,
}

pub(super) fn normalize_page(page: Option<i64>) -> i64 {
    page.unwrap_or(1).max(1)
}

pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// Validates the query into db filters plus the normalized page number.
fn build_filters<'a>(
    rid: &str,
    query: &'a ListProfilesQuery,
    search: Option<&'a str>,
) -> Result<(ProfileListFilters<'a>, i64), ApiError> {
    let page = normalize_page(query.page);
    let limit = normalize_limit(query.limit);

    let sort_by = match non_blank(query.sort_by.as_ref()) {
        None => SortColumn::default(),
        Some(raw) => SortColumn::parse(raw).ok_or_else(|| {
            ApiError::validation(rid, "sortBy", format!("unsupported sortBy '{raw}'"))
        })?,
    };
    let sort_order = match non_blank(query.sort_order.as_ref()) {
        None => SortOrder::default(),
        Some(raw) => SortOrder::parse(raw).ok_or_else(|| {
            ApiError::validation(rid, "sortOrder", "sortOrder must be ASC or DESC")
        })?,
    };
    let status = match non_blank(query.status.as_ref()) {
        None => None,
        Some(raw) => Some(raw.parse::<ExtractionStatus>().map_err(|_| {
            ApiError::validation(
                rid,
                "status",
                format!("status must be one of pending, success, partial, failed; got '{raw}'"),
            )
        })?),
    };
    for (field, value) in [
        ("minFollowers", query.min_followers),
        ("maxFollowers", query.max_followers),
    ] {
        if value.is_some_and(|v| v < 0) {
            return Err(ApiError::validation(rid, field, format!("{field} must be >= 0")));
        }
    }

    let filters = ProfileListFilters {
        status,
        location: non_blank(query.location.as_ref()),
        search: search.or_else(|| non_blank(query.search.as_ref())),
        min_followers: query.min_followers,
        max_followers: query.max_followers,
        sort_by,
        sort_order,
        limit,
        offset: (page - 1).saturating_mul(limit),
    };
    Ok((filters, page))
}

fn query_or_error(
    rid: &str,
    query: Result<Query<ListProfilesQuery>, QueryRejection>,
) -> Result<ListProfilesQuery, ApiError> {
    query
        .map(|Query(q)| q)
        .map_err(|e| ApiError::new(rid, "bad_request", e.body_text()))
}

fn parse_id(rid: &str, raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::new(rid, "bad_request", format!("invalid profile id '{raw}'")))
}

async fn list_page(
    state: &AppState,
    rid: &str,
    query: &ListProfilesQuery,
    search: Option<&str>,
) -> Result<Json<PaginatedResponse<ProfileResponse>>, ApiError> {
    let (filters, page) = build_filters(rid, query, search)?;

    let rows = harvest_db::list_profiles(&state.pool, &filters)
        .await
        .map_err(|e| map_db_error(rid.to_owned(), &e))?;
    let total = harvest_db::count_profiles(&state.pool, &filters)
        .await
        .map_err(|e| map_db_error(rid.to_owned(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| ProfileResponse::from_row(rid, row))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(PaginatedResponse {
        data,
        pagination: Pagination::new(page, filters.limit, total),
        meta: ResponseMeta::new(rid.to_owned()),
    }))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /profiles: paginated and filtered listing.
pub(in crate::api) async fn list_profiles(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    query: Result<Query<ListProfilesQuery>, QueryRejection>,
) -> Result<Json<PaginatedResponse<ProfileResponse>>, ApiError> {
    let query = query_or_error(&req_id.0, query)?;
    list_page(&state, &req_id.0, &query, None).await
}

/// GET /profiles/search/{query}: `search` as a path segment.
pub(in crate::api) async fn search_profiles(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(term): Path<String>,
    query: Result<Query<ListProfilesQuery>, QueryRejection>,
) -> Result<Json<PaginatedResponse<ProfileResponse>>, ApiError> {
    let query = query_or_error(&req_id.0, query)?;
    let term = term.trim();
    if term.is_empty() {
        return Err(ApiError::validation(&req_id.0, "query", "search query is empty"));
    }
    list_page(&state, &req_id.0, &query, Some(term)).await
}

/// GET /profiles/{id}
pub(in crate::api) async fn get_profile(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(raw_id): Path<String>,
) -> Result<Json<ApiResponse<ProfileResponse>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &raw_id)?;

    let row = harvest_db::get_profile(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", format!("profile {id} not found")))?;

    Ok(Json(ApiResponse {
        data: ProfileResponse::from_row(rid, row)?,
        meta: ResponseMeta::new(req_id.0.clone()),
    }))
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct DeletedResponse {
    pub id: i64,
    pub deleted: bool,
}

/// DELETE /profiles/{id}
pub(in crate::api) async fn delete_profile(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(raw_id): Path<String>,
) -> Result<Json<ApiResponse<DeletedResponse>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &raw_id)?;

    let deleted = harvest_db::delete_profile(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    if !deleted {
        return Err(ApiError::new(rid, "not_found", format!("profile {id} not found")));
    }
    tracing::info!(id, "profile deleted");

    Ok(Json(ApiResponse {
        data: DeletedResponse { id, deleted },
        meta: ResponseMeta::new(req_id.0.clone()),
    }))
}

/// GET /profiles/stats
pub(in crate::api) async fn profile_stats(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<StatsResponse>>, ApiError> {
    let rid = &req_id.0;
    let stats = harvest_db::profile_stats(&state.pool)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    let mut by_status = StatusCounts {
        pending: 0,
        success: 0,
        partial: 0,
        failed: 0,
    };
    for (status, count) in stats.by_status {
        match status {
            ExtractionStatus::Pending => by_status.pending = count,
            ExtractionStatus::Success => by_status.success = count,
            ExtractionStatus::Partial => by_status.partial = count,
            ExtractionStatus::Failed => by_status.failed = count,
        }
    }

    let recent = stats
        .recent
        .into_iter()
        .map(|row| ProfileResponse::from_row(rid, row))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(ApiResponse {
        data: StatsResponse {
            total: stats.total,
            by_status,
            top_locations: stats
                .top_locations
                .into_iter()
                .map(|LocationCount { location, count }| TopLocation { location, count })
                .collect(),
            recent,
            average_followers: stats.average_followers,
            average_connections: stats.average_connections,
        },
        meta: ResponseMeta::new(req_id.0.clone()),
    }))
}
