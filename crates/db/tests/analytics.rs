mod support;

use chrono::{Duration, FixedOffset, TimeZone, Utc};
use support::{make_record, setup_db, tokens, ts};
use tracker_core::{PricingTable, UsagePeriod};

#[test]
fn thirty_day_boundary_is_inclusive() {
    let mut test_db = setup_db();
    let db = &mut test_db.db;
    let now = ts("2025-06-30T12:00:00.000Z");
    let start = UsagePeriod::Last30Days.start_at(&now);
    let batch = vec![
        make_record(
            "before",
            "1",
            "claude-sonnet-4",
            tokens(1, 0, 0, 0),
            start - Duration::milliseconds(1),
        ),
        make_record("at", "1", "claude-sonnet-4", tokens(10, 0, 0, 0), start),
        make_record(
            "after",
            "1",
            "claude-sonnet-4",
            tokens(100, 0, 0, 0),
            start + Duration::milliseconds(1),
        ),
    ];
    db.import_usage_records(&batch, &PricingTable::default())
        .expect("import");

    let summary = db
        .summarize(UsagePeriod::Last30Days, &now)
        .expect("summary");
    assert_eq!(summary.start, start);
    assert_eq!(summary.usage.input_tokens, 110);
    assert_eq!(summary.record_count, 2);
}

#[test]
fn summary_sums_tokens_and_cost() {
    let mut test_db = setup_db();
    let db = &mut test_db.db;
    let now = ts("2025-06-30T12:00:00Z");
    let batch = vec![
        make_record(
            "a",
            "1",
            "claude-opus-4-5",
            tokens(1_000_000, 0, 0, 0),
            ts("2025-06-29T10:00:00Z"),
        ),
        make_record(
            "b",
            "1",
            "claude-sonnet-4-5",
            tokens(0, 1_000_000, 0, 0),
            ts("2025-06-20T10:00:00Z"),
        ),
        make_record("c", "1", "claude-sonnet-4-5", tokens(5, 5, 5, 5), ts("2025-01-01T10:00:00Z")),
    ];
    db.import_usage_records(&batch, &PricingTable::default())
        .expect("import");

    let week = db.summarize(UsagePeriod::Last7Days, &now).expect("week");
    assert_eq!(week.usage.input_tokens, 1_000_000);
    assert!((week.total_cost_usd - 5.0).abs() < 1e-9);

    let month = db.summarize(UsagePeriod::Last30Days, &now).expect("month");
    assert_eq!(month.record_count, 2);
    assert_eq!(month.total_tokens, 2_000_000);
    assert!((month.total_cost_usd - 20.0).abs() < 1e-9);

    let year = db.summarize(UsagePeriod::LastYear, &now).expect("year");
    assert_eq!(year.record_count, 3);
}

#[test]
fn breakdown_groups_by_model() {
    let mut test_db = setup_db();
    let db = &mut test_db.db;
    let now = ts("2025-06-30T12:00:00Z");
    let batch = vec![
        make_record("a", "1", "claude-opus-4-5", tokens(10, 1, 0, 0), ts("2025-06-29T10:00:00Z")),
        make_record("b", "1", "claude-opus-4-5", tokens(5, 1, 0, 0), ts("2025-06-28T10:00:00Z")),
        make_record("c", "1", "claude-haiku-4-5", tokens(1, 1, 1, 1), ts("2025-06-27T10:00:00Z")),
    ];
    db.import_usage_records(&batch, &PricingTable::default())
        .expect("import");

    let breakdown = db
        .breakdown_by_model(UsagePeriod::Last30Days, &now)
        .expect("breakdown");
    assert_eq!(breakdown.len(), 2);
    assert_eq!(breakdown["claude-opus-4-5"], tokens(15, 2, 0, 0));
    assert_eq!(breakdown["claude-haiku-4-5"], tokens(1, 1, 1, 1));
}

#[test]
fn snapshot_splits_today_from_month() {
    let mut test_db = setup_db();
    let db = &mut test_db.db;
    let zone = FixedOffset::west_opt(5 * 3600).expect("offset");
    let now = zone
        .with_ymd_and_hms(2025, 6, 30, 9, 0, 0)
        .single()
        .expect("now");
    let batch = vec![
        // 01:00 local today
        make_record(
            "today",
            "1",
            "claude-sonnet-4",
            tokens(7, 0, 0, 0),
            ts("2025-06-30T06:00:00Z"),
        ),
        // 23:00 local yesterday
        make_record(
            "yesterday",
            "1",
            "claude-sonnet-4",
            tokens(3, 0, 0, 0),
            ts("2025-06-30T04:00:00Z"),
        ),
    ];
    db.import_usage_records(&batch, &PricingTable::default())
        .expect("import");

    let snapshot = db.snapshot(&now).expect("snapshot");
    assert_eq!(snapshot.today.usage.input_tokens, 7);
    assert_eq!(snapshot.last_30_days.usage.input_tokens, 10);
    assert_eq!(snapshot.by_model["claude-sonnet-4"].input_tokens, 10);
    assert_eq!(snapshot.computed_at, now.with_timezone(&Utc));
}

#[test]
fn reader_connection_sees_committed_imports() {
    let mut test_db = setup_db();
    let reader = tracker_db::Db::open(&test_db.path).expect("reader");
    let now = ts("2025-06-30T12:00:00Z");
    let batch = vec![make_record(
        "a",
        "1",
        "claude-sonnet-4",
        tokens(42, 0, 0, 0),
        ts("2025-06-30T11:00:00Z"),
    )];
    test_db
        .db
        .import_usage_records(&batch, &PricingTable::default())
        .expect("import");

    let summary = reader.summarize(UsagePeriod::Today, &now).expect("summary");
    assert_eq!(summary.usage.input_tokens, 42);
}
