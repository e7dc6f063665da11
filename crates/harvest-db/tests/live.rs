//! Live integration tests for harvest-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/harvest-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.

use harvest_core::{ExperienceEntry, ExtractionStatus, ProfileRecord};
use harvest_db::{
    count_profiles, delete_profile, find_profile_id_by_url, get_profile, insert_profile,
    list_profiles, profile_stats, update_profile, DbError, ProfileListFilters, SortColumn,
    SortOrder,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_record(slug: &str, location: Option<&str>, followers: u32) -> ProfileRecord {
    let mut record = ProfileRecord {
        name: format!("Person {slug}"),
        url: format!("https://linkedin.com/in/{slug}"),
        location: location.map(str::to_string),
        follower_count: followers,
        bio_line: Some(format!("Engineer at {slug} corp")),
        experience: vec![ExperienceEntry {
            title: "Engineer".to_string(),
            company: Some("Acme".to_string()),
        }],
        skills: vec!["Rust".to_string(), "SQL".to_string()],
        ..ProfileRecord::default()
    };
    record.normalize();
    record
}

fn page(limit: i64) -> ProfileListFilters<'static> {
    ProfileListFilters {
        limit,
        ..ProfileListFilters::default()
    }
}

// ---------------------------------------------------------------------------
// Insert / duplicate
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn insert_profile_round_trips_all_columns(pool: sqlx::PgPool) {
    let record = make_record("alice", Some("Berlin, Germany"), 1_500);
    let row = insert_profile(&pool, &record).await.expect("insert");

    let stored = get_profile(&pool, row.id)
        .await
        .expect("get")
        .expect("row exists")
        .into_record()
        .expect("convert");

    assert_eq!(stored.name, "Person alice");
    assert_eq!(stored.follower_count, 1_500);
    assert_eq!(stored.extraction_status, ExtractionStatus::Success);
    assert_eq!(stored.experience.len(), 1);
    assert_eq!(stored.skills, vec!["Rust".to_string(), "SQL".to_string()]);
    assert!(stored.extracted_at.is_some());
}

#[sqlx::test(migrations = "../../migrations")]
async fn insert_profile_twice_reports_duplicate_with_existing_id(pool: sqlx::PgPool) {
    let record = make_record("bob", None, 0);
    let first = insert_profile(&pool, &record).await.expect("first insert");

    let err = insert_profile(&pool, &record)
        .await
        .expect_err("second insert must fail");
    match err {
        DbError::Duplicate { existing_id } => assert_eq!(existing_id, first.id),
        other => panic!("expected Duplicate, got {other:?}"),
    }

    assert_eq!(count_profiles(&pool, &page(10)).await.unwrap(), 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn find_profile_id_by_url_returns_none_for_unknown(pool: sqlx::PgPool) {
    let found = find_profile_id_by_url(&pool, "https://linkedin.com/in/nobody")
        .await
        .unwrap();
    assert!(found.is_none());
}

// ---------------------------------------------------------------------------
// Update / delete
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn update_profile_overwrites_and_bumps_last_updated(pool: sqlx::PgPool) {
    let row = insert_profile(&pool, &make_record("carol", None, 10))
        .await
        .unwrap();

    let mut record = row.clone().into_record().unwrap();
    record.headline = Some("Staff Engineer".to_string());
    record.follower_count = 20;
    let updated = update_profile(&pool, row.id, &record).await.unwrap();

    assert_eq!(updated.headline.as_deref(), Some("Staff Engineer"));
    assert_eq!(updated.follower_count, 20);
    assert!(updated.last_updated >= row.last_updated);
}

#[sqlx::test(migrations = "../../migrations")]
async fn update_profile_to_taken_url_is_duplicate(pool: sqlx::PgPool) {
    let a = insert_profile(&pool, &make_record("dave", None, 0)).await.unwrap();
    let b = insert_profile(&pool, &make_record("erin", None, 0)).await.unwrap();

    let b_id = b.id;
    let mut record = b.into_record().unwrap();
    record.url = a.url.clone();
    let err = update_profile(&pool, b_id, &record).await.unwrap_err();
    assert!(
        matches!(err, DbError::Duplicate { existing_id } if existing_id == a.id),
        "got {err:?}"
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn update_unknown_profile_is_not_found(pool: sqlx::PgPool) {
    let record = make_record("frank", None, 0);
    let err = update_profile(&pool, 424_242, &record).await.unwrap_err();
    assert!(matches!(err, DbError::NotFound));
}

#[sqlx::test(migrations = "../../migrations")]
async fn delete_profile_reports_whether_row_existed(pool: sqlx::PgPool) {
    let row = insert_profile(&pool, &make_record("gina", None, 0)).await.unwrap();
    assert!(delete_profile(&pool, row.id).await.unwrap());
    assert!(!delete_profile(&pool, row.id).await.unwrap());
    assert!(get_profile(&pool, row.id).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Listing / filters
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn list_profiles_filters_by_follower_range_and_sorts(pool: sqlx::PgPool) {
    for (slug, followers) in [("h1", 10), ("h2", 500), ("h3", 5_000), ("h4", 50_000)] {
        insert_profile(&pool, &make_record(slug, None, followers))
            .await
            .unwrap();
    }

    let filters = ProfileListFilters {
        min_followers: Some(100),
        max_followers: Some(10_000),
        sort_by: SortColumn::FollowerCount,
        sort_order: SortOrder::Asc,
        limit: 10,
        ..ProfileListFilters::default()
    };
    let rows = list_profiles(&pool, &filters).await.unwrap();
    let followers: Vec<i64> = rows.iter().map(|r| r.follower_count).collect();
    assert_eq!(followers, vec![500, 5_000]);
    assert_eq!(count_profiles(&pool, &filters).await.unwrap(), 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn list_profiles_search_and_location_are_case_insensitive(pool: sqlx::PgPool) {
    insert_profile(&pool, &make_record("ivan", Some("San Francisco Bay Area"), 0))
        .await
        .unwrap();
    insert_profile(&pool, &make_record("judy", Some("London"), 0))
        .await
        .unwrap();

    let by_location = ProfileListFilters {
        location: Some("francisco"),
        limit: 10,
        ..ProfileListFilters::default()
    };
    let rows = list_profiles(&pool, &by_location).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].url, "https://linkedin.com/in/ivan");

    let by_search = ProfileListFilters {
        search: Some("JUDY"),
        limit: 10,
        ..ProfileListFilters::default()
    };
    let rows = list_profiles(&pool, &by_search).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].url, "https://linkedin.com/in/judy");
}

#[sqlx::test(migrations = "../../migrations")]
async fn list_profiles_paginates(pool: sqlx::PgPool) {
    for i in 0..5 {
        insert_profile(&pool, &make_record(&format!("p{i}"), None, i))
            .await
            .unwrap();
    }
    let filters = ProfileListFilters {
        sort_by: SortColumn::FollowerCount,
        sort_order: SortOrder::Asc,
        limit: 2,
        offset: 2,
        ..ProfileListFilters::default()
    };
    let rows = list_profiles(&pool, &filters).await.unwrap();
    let followers: Vec<i64> = rows.iter().map(|r| r.follower_count).collect();
    assert_eq!(followers, vec![2, 3]);
    assert_eq!(count_profiles(&pool, &filters).await.unwrap(), 5);
}

#[sqlx::test(migrations = "../../migrations")]
async fn list_profiles_filters_by_status(pool: sqlx::PgPool) {
    insert_profile(&pool, &make_record("kim", None, 0)).await.unwrap();
    let mut partial = make_record("lee", None, 0);
    partial.bio_line = None;
    partial.normalize();
    insert_profile(&pool, &partial).await.unwrap();

    let filters = ProfileListFilters {
        status: Some(ExtractionStatus::Partial),
        limit: 10,
        ..ProfileListFilters::default()
    };
    let rows = list_profiles(&pool, &filters).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].url, "https://linkedin.com/in/lee");
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn profile_stats_aggregates_statuses_and_locations(pool: sqlx::PgPool) {
    insert_profile(&pool, &make_record("m1", Some("Berlin"), 100))
        .await
        .unwrap();
    insert_profile(&pool, &make_record("m2", Some("Berlin"), 300))
        .await
        .unwrap();
    let mut partial = make_record("m3", None, 200);
    partial.bio_line = None;
    partial.normalize();
    insert_profile(&pool, &partial).await.unwrap();

    let stats = profile_stats(&pool).await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(
        stats.by_status,
        vec![
            (ExtractionStatus::Pending, 0),
            (ExtractionStatus::Success, 2),
            (ExtractionStatus::Partial, 1),
            (ExtractionStatus::Failed, 0),
        ]
    );
    assert_eq!(stats.top_locations.len(), 1);
    assert_eq!(stats.top_locations[0].location, "Berlin");
    assert_eq!(stats.top_locations[0].count, 2);
    assert_eq!(stats.recent.len(), 3);
    assert!((stats.average_followers - 200.0).abs() < f64::EPSILON);
}

#[sqlx::test(migrations = "../../migrations")]
async fn profile_stats_on_empty_table(pool: sqlx::PgPool) {
    let stats = profile_stats(&pool).await.unwrap();
    assert_eq!(stats.total, 0);
    assert!(stats.top_locations.is_empty());
    assert!(stats.recent.is_empty());
    assert!(stats.average_connections.abs() < f64::EPSILON);
}
