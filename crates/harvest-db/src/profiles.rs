//! Database operations for the `profiles` table.

use chrono::{DateTime, Utc};
use harvest_core::{EducationEntry, ExperienceEntry, ExtractionStatus, ProfileRecord};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::DbError;

const PROFILE_COLUMNS: &str = "id, name, url, about, bio, location, follower_count, \
     connection_count, bio_line, headline, industry, profile_picture, experience, education, \
     skills, extraction_status, extraction_errors, extracted_at, last_updated";

const FILTER_CLAUSE: &str = "WHERE ($1::TEXT IS NULL OR extraction_status = $1) \
       AND ($2::TEXT IS NULL OR location ILIKE $2) \
       AND ($3::TEXT IS NULL OR name ILIKE $3 OR headline ILIKE $3 OR bio_line ILIKE $3 \
            OR about ILIKE $3 OR location ILIKE $3) \
       AND ($4::BIGINT IS NULL OR follower_count >= $4) \
       AND ($5::BIGINT IS NULL OR follower_count <= $5)";

const UNIQUE_VIOLATION: &str = "23505";

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `profiles` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProfileRow {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub about: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub follower_count: i64,
    pub connection_count: i64,
    pub bio_line: Option<String>,
    pub headline: Option<String>,
    pub industry: Option<String>,
    pub profile_picture: Option<String>,
    pub experience: Json<Vec<ExperienceEntry>>,
    pub education: Json<Vec<EducationEntry>>,
    pub skills: Vec<String>,
    pub extraction_status: String,
    pub extraction_errors: Option<String>,
    pub extracted_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl ProfileRow {
    /// Converts the row back into the shared record type.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::OutOfRange`] for counts that do not fit the record,
    /// or [`DbError::Core`] for an unknown status string.
    pub fn into_record(self) -> Result<ProfileRecord, DbError> {
        let follower_count =
            u32::try_from(self.follower_count).map_err(|_| DbError::OutOfRange {
                field: "follower_count",
                value: self.follower_count,
            })?;
        let connection_count =
            u32::try_from(self.connection_count).map_err(|_| DbError::OutOfRange {
                field: "connection_count",
                value: self.connection_count,
            })?;
        let extraction_status = self.extraction_status.parse::<ExtractionStatus>()?;

        Ok(ProfileRecord {
            name: self.name,
            url: self.url,
            about: self.about,
            bio: self.bio,
            location: self.location,
            follower_count,
            connection_count,
            bio_line: self.bio_line,
            headline: self.headline,
            industry: self.industry,
            profile_picture: self.profile_picture,
            experience: self.experience.0,
            education: self.education.0,
            skills: self.skills,
            extraction_status,
            extraction_errors: self.extraction_errors,
            extracted_at: Some(self.extracted_at),
            last_updated: Some(self.last_updated),
        })
    }
}

/// Aggregate count for one location value.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct LocationCount {
    pub location: String,
    pub count: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct StatusCount {
    extraction_status: String,
    count: i64,
}

/// Dashboard aggregates over the whole table.
#[derive(Debug, Clone)]
pub struct ProfileStats {
    pub total: i64,
    /// One entry per status, in [`ExtractionStatus::ALL`] order, zero-filled.
    pub by_status: Vec<(ExtractionStatus, i64)>,
    pub top_locations: Vec<LocationCount>,
    pub recent: Vec<ProfileRow>,
    pub average_followers: f64,
    pub average_connections: f64,
}

// ---------------------------------------------------------------------------
// List filters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortColumn {
    #[default]
    ExtractedAt,
    LastUpdated,
    Name,
    FollowerCount,
    ConnectionCount,
    Location,
}

impl SortColumn {
    /// Parses the camelCase names accepted by the `sortBy` query parameter.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "extractedAt" | "createdAt" => Some(Self::ExtractedAt),
            "lastUpdated" | "updatedAt" => Some(Self::LastUpdated),
            "name" => Some(Self::Name),
            "followerCount" => Some(Self::FollowerCount),
            "connectionCount" => Some(Self::ConnectionCount),
            "location" => Some(Self::Location),
            _ => None,
        }
    }

    fn column(self) -> &'static str {
        match self {
            Self::ExtractedAt => "extracted_at",
            Self::LastUpdated => "last_updated",
            Self::Name => "name",
            Self::FollowerCount => "follower_count",
            Self::ConnectionCount => "connection_count",
            Self::Location => "location",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("asc") {
            Some(Self::Asc)
        } else if value.eq_ignore_ascii_case("desc") {
            Some(Self::Desc)
        } else {
            None
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Input filters for profile listing. Substring filters are matched
/// case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct ProfileListFilters<'a> {
    pub status: Option<ExtractionStatus>,
    pub location: Option<&'a str>,
    pub search: Option<&'a str>,
    pub min_followers: Option<i64>,
    pub max_followers: Option<i64>,
    pub sort_by: SortColumn,
    pub sort_order: SortOrder,
    pub limit: i64,
    pub offset: i64,
}

fn like_pattern(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION))
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Inserts a profile and returns the stored row.
///
/// The caller is expected to have normalized and validated the record.
///
/// # Errors
///
/// Returns [`DbError::Duplicate`] carrying the existing row's id when the
/// url is already stored, or [`DbError::Sqlx`] for any other failure.
pub async fn insert_profile(pool: &PgPool, record: &ProfileRecord) -> Result<ProfileRow, DbError> {
    let sql = format!(
        "INSERT INTO profiles \
             (name, url, about, bio, location, follower_count, connection_count, bio_line, \
              headline, industry, profile_picture, experience, education, skills, \
              extraction_status, extraction_errors, extracted_at, last_updated) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
                 COALESCE($17, NOW()), NOW()) \
         RETURNING {PROFILE_COLUMNS}"
    );

    let result = sqlx::query_as::<_, ProfileRow>(&sql)
        .bind(&record.name)
        .bind(&record.url)
        .bind(&record.about)
        .bind(&record.bio)
        .bind(&record.location)
        .bind(i64::from(record.follower_count))
        .bind(i64::from(record.connection_count))
        .bind(&record.bio_line)
        .bind(&record.headline)
        .bind(&record.industry)
        .bind(&record.profile_picture)
        .bind(Json(&record.experience))
        .bind(Json(&record.education))
        .bind(&record.skills)
        .bind(record.extraction_status.as_str())
        .bind(&record.extraction_errors)
        .bind(record.extracted_at)
        .fetch_one(pool)
        .await;

    match result {
        Ok(row) => Ok(row),
        Err(err) if is_unique_violation(&err) => {
            let existing_id = find_profile_id_by_url(pool, &record.url)
                .await?
                .ok_or(DbError::NotFound)?;
            Err(DbError::Duplicate { existing_id })
        }
        Err(err) => Err(err.into()),
    }
}

/// Overwrites every column of an existing profile and bumps `last_updated`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row has this id, [`DbError::Duplicate`]
/// if the new url collides with another row, or [`DbError::Sqlx`].
pub async fn update_profile(
    pool: &PgPool,
    id: i64,
    record: &ProfileRecord,
) -> Result<ProfileRow, DbError> {
    let sql = format!(
        "UPDATE profiles SET \
             name = $2, url = $3, about = $4, bio = $5, location = $6, follower_count = $7, \
             connection_count = $8, bio_line = $9, headline = $10, industry = $11, \
             profile_picture = $12, experience = $13, education = $14, skills = $15, \
             extraction_status = $16, extraction_errors = $17, last_updated = NOW() \
         WHERE id = $1 \
         RETURNING {PROFILE_COLUMNS}"
    );

    let result = sqlx::query_as::<_, ProfileRow>(&sql)
        .bind(id)
        .bind(&record.name)
        .bind(&record.url)
        .bind(&record.about)
        .bind(&record.bio)
        .bind(&record.location)
        .bind(i64::from(record.follower_count))
        .bind(i64::from(record.connection_count))
        .bind(&record.bio_line)
        .bind(&record.headline)
        .bind(&record.industry)
        .bind(&record.profile_picture)
        .bind(Json(&record.experience))
        .bind(Json(&record.education))
        .bind(&record.skills)
        .bind(record.extraction_status.as_str())
        .bind(&record.extraction_errors)
        .fetch_optional(pool)
        .await;

    match result {
        Ok(Some(row)) => Ok(row),
        Ok(None) => Err(DbError::NotFound),
        Err(err) if is_unique_violation(&err) => {
            let existing_id = find_profile_id_by_url(pool, &record.url)
                .await?
                .ok_or(DbError::NotFound)?;
            Err(DbError::Duplicate { existing_id })
        }
        Err(err) => Err(err.into()),
    }
}

/// Deletes a profile. Returns `false` when no row had this id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_profile(pool: &PgPool, id: i64) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM profiles WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Fetches a single profile by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_profile(pool: &PgPool, id: i64) -> Result<Option<ProfileRow>, DbError> {
    let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1");
    let row = sqlx::query_as::<_, ProfileRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Looks up the id of the profile stored under `url`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_profile_id_by_url(pool: &PgPool, url: &str) -> Result<Option<i64>, DbError> {
    let id = sqlx::query_scalar::<_, i64>("SELECT id FROM profiles WHERE url = $1")
        .bind(url)
        .fetch_optional(pool)
        .await?;
    Ok(id)
}

/// Returns one page of profiles matching `filters`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_profiles(
    pool: &PgPool,
    filters: &ProfileListFilters<'_>,
) -> Result<Vec<ProfileRow>, DbError> {
    let order = filters.sort_order.keyword();
    let sql = format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles {FILTER_CLAUSE} \
         ORDER BY {column} {order} NULLS LAST, id {order} \
         LIMIT $6 OFFSET $7",
        column = filters.sort_by.column(),
    );

    let rows = sqlx::query_as::<_, ProfileRow>(&sql)
        .bind(filters.status.map(ExtractionStatus::as_str))
        .bind(filters.location.map(like_pattern))
        .bind(filters.search.map(like_pattern))
        .bind(filters.min_followers)
        .bind(filters.max_followers)
        .bind(filters.limit)
        .bind(filters.offset)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Counts all profiles matching `filters`, ignoring limit and offset.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_profiles(
    pool: &PgPool,
    filters: &ProfileListFilters<'_>,
) -> Result<i64, DbError> {
    let sql = format!("SELECT COUNT(*) FROM profiles {FILTER_CLAUSE}");
    let total = sqlx::query_scalar::<_, i64>(&sql)
        .bind(filters.status.map(ExtractionStatus::as_str))
        .bind(filters.location.map(like_pattern))
        .bind(filters.search.map(like_pattern))
        .bind(filters.min_followers)
        .bind(filters.max_followers)
        .fetch_one(pool)
        .await?;
    Ok(total)
}

/// Aggregate counts by status, the ten most common locations, the five most
/// recently extracted profiles, and average counts.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any query fails.
pub async fn profile_stats(pool: &PgPool) -> Result<ProfileStats, DbError> {
    let status_rows = sqlx::query_as::<_, StatusCount>(
        "SELECT extraction_status, COUNT(*) AS count \
         FROM profiles \
         GROUP BY extraction_status",
    )
    .fetch_all(pool)
    .await?;

    let by_status = ExtractionStatus::ALL
        .iter()
        .map(|status| {
            let count = status_rows
                .iter()
                .find(|r| r.extraction_status == status.as_str())
                .map_or(0, |r| r.count);
            (*status, count)
        })
        .collect::<Vec<_>>();
    let total = status_rows.iter().map(|r| r.count).sum();

    let top_locations = sqlx::query_as::<_, LocationCount>(
        "SELECT location, COUNT(*) AS count \
         FROM profiles \
         WHERE location IS NOT NULL AND location <> '' \
         GROUP BY location \
         ORDER BY count DESC, location ASC \
         LIMIT 10",
    )
    .fetch_all(pool)
    .await?;

    let recent_sql = format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY extracted_at DESC, id DESC LIMIT 5"
    );
    let recent = sqlx::query_as::<_, ProfileRow>(&recent_sql)
        .fetch_all(pool)
        .await?;

    let (average_followers, average_connections) = sqlx::query_as::<_, (f64, f64)>(
        "SELECT COALESCE(AVG(follower_count), 0)::float8, \
                COALESCE(AVG(connection_count), 0)::float8 \
         FROM profiles",
    )
    .fetch_one(pool)
    .await?;

    Ok(ProfileStats {
        total,
        by_status,
        top_locations,
        recent,
        average_followers,
        average_connections,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_column_accepts_camel_case_names() {
        assert_eq!(SortColumn::parse("followerCount"), Some(SortColumn::FollowerCount));
        assert_eq!(SortColumn::parse("createdAt"), Some(SortColumn::ExtractedAt));
        assert_eq!(SortColumn::parse("password"), None);
    }

    #[test]
    fn sort_order_is_case_insensitive() {
        assert_eq!(SortOrder::parse("asc"), Some(SortOrder::Asc));
        assert_eq!(SortOrder::parse("DESC"), Some(SortOrder::Desc));
        assert_eq!(SortOrder::parse("sideways"), None);
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("san"), "%san%");
        assert_eq!(like_pattern("100%_x"), "%100\\%\\_x%");
    }

    #[test]
    fn row_converts_into_record() {
        let now = Utc::now();
        let row = ProfileRow {
            id: 7,
            name: "Jane".to_string(),
            url: "https://linkedin.com/in/jane".to_string(),
            about: None,
            bio: None,
            location: Some("Berlin".to_string()),
            follower_count: 1_200,
            connection_count: 500,
            bio_line: None,
            headline: None,
            industry: None,
            profile_picture: None,
            experience: Json(vec![ExperienceEntry {
                title: "Engineer".to_string(),
                company: Some("Acme".to_string()),
            }]),
            education: Json(vec![]),
            skills: vec!["Rust".to_string()],
            extraction_status: "success".to_string(),
            extraction_errors: None,
            extracted_at: now,
            last_updated: now,
        };
        let record = row.into_record().unwrap();
        assert_eq!(record.follower_count, 1_200);
        assert_eq!(record.extraction_status, ExtractionStatus::Success);
        assert_eq!(record.experience[0].company.as_deref(), Some("Acme"));
        assert_eq!(record.extracted_at, Some(now));
    }
}
