use std::sync::Arc;
use std::thread;

use chrono::NaiveDate;
use tablerow_core::{Params, TableRef, Value, row};
use tablerow_link::{Link, LinkConfig, LinkRegistry};
use tablerow_record::{
    Criteria, Found, IndexEntry, Record, RecordError, SchemaCache, Table, ZERO_DATE,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const DDL: &str = "
    CREATE TABLE users (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        age INTEGER,
        score REAL,
        joined DATETIME
    );
    CREATE TABLE memberships (
        user_id INTEGER NOT NULL,
        team TEXT NOT NULL,
        role TEXT,
        PRIMARY KEY (user_id, team)
    );
";

fn memory_link() -> Arc<Link> {
    let registry = LinkRegistry::new();
    let link = registry.connect("main", Some(LinkConfig::memory())).unwrap();
    link.with_connection(|conn| conn.execute_batch(DDL)).unwrap();
    link
}

fn file_link(dir: &tempfile::TempDir) -> Arc<Link> {
    let db = dir.path().join("records.db");
    let registry = LinkRegistry::new();
    let link = registry
        .connect("file", Some(LinkConfig::sqlite(db.to_string_lossy())))
        .unwrap();
    link.with_connection(|conn| conn.execute_batch(DDL)).unwrap();
    link
}

fn stored(link: &Link, sql: &str) -> Option<Value> {
    link.fetch_cell(sql, &Params::new()).unwrap()
}

// ---------------------------------------------------------------------------
// Record lifecycle
// ---------------------------------------------------------------------------

#[test]
fn test_insert_then_reload_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let link = file_link(&dir);
    let schemas = SchemaCache::new();

    let mut user = Record::new(Arc::clone(&link), &schemas, "users").unwrap();
    user.assign("name", "Ada")
        .assign("age", 36)
        .assign("score", 9.5)
        .assign("joined", "2021-07-04 10:30:00");
    assert!(user.save(false).unwrap());
    assert_eq!(user.found(), Found::Confirmed);
    assert_eq!(user.get("id"), Some(&Value::Integer(1)));

    let mut copy = Record::new(link, &schemas, "users").unwrap();
    assert!(copy.load_by_key(1).unwrap());
    assert_eq!(
        copy.fields(),
        &row([
            ("id", Value::from(1)),
            ("name", Value::from("Ada")),
            ("age", Value::from(36)),
            ("score", Value::from(9.5)),
            ("joined", Value::from("2021-07-04 10:30:00")),
        ])
    );
    assert_eq!(schemas.len(), 1);
}

#[test]
fn test_found_state_transitions() {
    let link = memory_link();
    let schemas = SchemaCache::new();
    let mut user = Record::new(link, &schemas, "users").unwrap();
    assert_eq!(user.found(), Found::Unknown);

    assert!(!user.load_by_key(7).unwrap());
    assert_eq!(user.found(), Found::Absent);
    assert_eq!(user.get("id"), Some(&Value::Integer(7)));

    // The auto-increment key is never written; the database assigns it.
    user.assign("name", "Grace");
    assert!(user.save(false).unwrap());
    assert_eq!(user.found(), Found::Confirmed);
    assert_eq!(user.get("id"), Some(&Value::Integer(1)));

    assert!(user.delete().unwrap());
    assert_eq!(user.found(), Found::Unknown);
    assert_eq!(user.get("id"), None);
    assert_eq!(user.get("name"), Some(&Value::from("Grace")));
    assert!(matches!(user.delete(), Err(RecordError::MissingPrimaryKeyError { .. })));
}

#[test]
fn test_second_save_updates_instead_of_inserting() {
    let link = memory_link();
    let schemas = SchemaCache::new();
    let mut user = Record::new(Arc::clone(&link), &schemas, "users").unwrap();
    user.assign("name", "Linus").assign("age", 20);
    assert!(user.save(false).unwrap());

    user.assign("age", 21);
    assert!(user.save(false).unwrap());

    assert_eq!(stored(&link, "SELECT COUNT(*) FROM users"), Some(Value::from(1)));
    assert_eq!(stored(&link, "SELECT age FROM users WHERE id = 1"), Some(Value::from(21)));
}

#[test]
fn test_save_with_known_key_probes_existing_row() {
    let link = memory_link();
    link.execute("INSERT INTO users (id, name) VALUES (3, 'old')", &Params::new())
        .unwrap();
    let schemas = SchemaCache::new();

    let mut user = Record::new(Arc::clone(&link), &schemas, "users").unwrap();
    user.assign("id", 3).assign("name", "new");
    assert!(user.save(false).unwrap());
    assert_eq!(user.found(), Found::Confirmed);

    assert_eq!(stored(&link, "SELECT COUNT(*) FROM users"), Some(Value::from(1)));
    assert_eq!(stored(&link, "SELECT name FROM users WHERE id = 3"), Some(Value::from("new")));
}

#[test]
fn test_replace_overwrites_row() {
    let link = memory_link();
    link.execute(
        "INSERT INTO memberships (user_id, team, role) VALUES (1, 'core', 'member')",
        &Params::new(),
    )
    .unwrap();
    let schemas = SchemaCache::new();

    let mut m = Record::new(Arc::clone(&link), &schemas, "memberships").unwrap();
    m.import(row([
        ("user_id", Value::from(1)),
        ("team", Value::from("core")),
        ("role", Value::from("lead")),
    ]));
    assert!(m.save(true).unwrap());

    assert_eq!(stored(&link, "SELECT COUNT(*) FROM memberships"), Some(Value::from(1)));
    assert_eq!(stored(&link, "SELECT role FROM memberships"), Some(Value::from("lead")));
}

#[test]
fn test_set_inserts_then_updates_composite_key() {
    let link = memory_link();
    let schemas = SchemaCache::new();
    let mut m = Record::new(Arc::clone(&link), &schemas, "memberships").unwrap();
    m.assign("user_id", 4).assign("team", "docs");

    assert!(m.set("role", "writer").unwrap());
    assert_eq!(m.found(), Found::Confirmed);
    assert!(m.set("role", "editor").unwrap());

    assert_eq!(stored(&link, "SELECT COUNT(*) FROM memberships"), Some(Value::from(1)));
    assert_eq!(stored(&link, "SELECT role FROM memberships"), Some(Value::from("editor")));
}

#[test]
fn test_set_can_change_key_column() {
    let link = memory_link();
    let schemas = SchemaCache::new();
    let mut m = Record::new(Arc::clone(&link), &schemas, "memberships").unwrap();
    m.import(row([("user_id", Value::from(1)), ("team", Value::from("a"))]));
    assert!(m.save(false).unwrap());

    assert!(m.set("team", "b").unwrap());
    assert_eq!(stored(&link, "SELECT team FROM memberships"), Some(Value::from("b")));

    // The record now addresses the renamed row.
    assert!(m.set("role", "lead").unwrap());
    assert_eq!(stored(&link, "SELECT role FROM memberships WHERE team = 'b'"), Some(Value::from("lead")));
}

#[test]
fn test_set_never_writes_auto_increment_column() {
    let link = memory_link();
    link.execute("INSERT INTO users (id, name) VALUES (1, 'Ada')", &Params::new())
        .unwrap();
    let schemas = SchemaCache::new();

    let mut user = Record::new(Arc::clone(&link), &schemas, "users").unwrap();
    assert!(user.load_by_key(1).unwrap());
    assert!(!user.set("id", 99).unwrap());
    assert_eq!(user.get("id"), Some(&Value::Integer(1)));

    // The record still addresses the original row.
    assert!(user.set("name", "Ada L.").unwrap());
    assert_eq!(stored(&link, "SELECT id FROM users"), Some(Value::from(1)));
    assert_eq!(stored(&link, "SELECT name FROM users"), Some(Value::from("Ada L.")));
}

#[test]
fn test_columns_with_clashing_parameter_names() {
    let link = memory_link();
    link.execute(
        "CREATE TABLE odd (id INTEGER PRIMARY KEY, \"a b\" TEXT, a_b TEXT, key__id TEXT)",
        &Params::new(),
    )
    .unwrap();
    let schemas = SchemaCache::new();

    let mut r = Record::new(Arc::clone(&link), &schemas, "odd").unwrap();
    r.import(row([
        ("a b", Value::from("first")),
        ("a_b", Value::from("second")),
        ("key__id", Value::from("third")),
    ]));
    assert!(r.save(false).unwrap());

    let saved = link
        .fetch_row("SELECT `a b`, a_b, key__id FROM odd", &Params::new())
        .unwrap()
        .unwrap();
    assert_eq!(saved["a b"], Value::from("first"));
    assert_eq!(saved["a_b"], Value::from("second"));
    assert_eq!(saved["key__id"], Value::from("third"));

    // Updates bind the key under `key__id` next to a column of that name.
    r.assign("a b", "one").assign("key__id", "three");
    assert!(r.save(false).unwrap());
    assert!(r.set("a_b", "two").unwrap());

    let updated = link
        .fetch_row("SELECT `a b`, a_b, key__id FROM odd WHERE id = 1", &Params::new())
        .unwrap()
        .unwrap();
    assert_eq!(updated["a b"], Value::from("one"));
    assert_eq!(updated["a_b"], Value::from("two"));
    assert_eq!(updated["key__id"], Value::from("three"));

    let mut found = Record::new(link, &schemas, "odd").unwrap();
    assert!(found.load_by(row([("a b", "one"), ("a_b", "two")])).unwrap());
    assert_eq!(found.get("id"), Some(&Value::Integer(1)));
}

#[test]
fn test_load_by_composite_criteria() {
    let link = memory_link();
    link.execute(
        "INSERT INTO memberships VALUES (1, 'core', 'lead'), (1, 'docs', NULL), (2, 'core', 'member')",
        &Params::new(),
    )
    .unwrap();
    let schemas = SchemaCache::new();

    let mut m = Record::new(Arc::clone(&link), &schemas, "memberships").unwrap();
    m.assign("user_id", 1).assign("team", "docs");
    assert!(m.load().unwrap());
    assert_eq!(m.get("role"), Some(&Value::Null));

    let mut by_role = Record::new(link, &schemas, "memberships").unwrap();
    assert!(by_role.load_by(row([("role", Value::Null)])).unwrap());
    assert_eq!(by_role.get("team"), Some(&Value::from("docs")));
}

#[test]
fn test_filter_and_allow_limit_written_columns() {
    let link = memory_link();
    let schemas = SchemaCache::new();
    let mut user = Record::new(Arc::clone(&link), &schemas, "users").unwrap();
    user.import(row([
        ("name", Value::from("Ken")),
        ("age", Value::from(50)),
        ("csrf_token", Value::from("abc")),
    ]));
    user.filter(&["age"]);
    assert!(user.save(false).unwrap());
    assert_eq!(stored(&link, "SELECT age FROM users"), Some(Value::Null));

    let mut other = Record::new(Arc::clone(&link), &schemas, "users").unwrap();
    other.import(row([("name", Value::from("Rob")), ("age", Value::from(60))]));
    other.allow(&["name"]);
    assert_eq!(other.fields().len(), 1);
    assert!(other.save(false).unwrap());
    assert_eq!(
        stored(&link, "SELECT COUNT(*) FROM users WHERE age IS NULL"),
        Some(Value::from(2))
    );
}

// ---------------------------------------------------------------------------
// Coercion
// ---------------------------------------------------------------------------

#[test]
fn test_values_are_coerced_before_binding() {
    let link = memory_link();
    let schemas = SchemaCache::new();

    let mut user = Record::new(Arc::clone(&link), &schemas, "users").unwrap();
    user.import(row([
        ("name", Value::from("Epoch")),
        ("age", Value::from("42 years")),
        ("score", Value::from("3.25")),
        ("joined", Value::from(1_700_000_000)),
    ]));
    assert!(user.save(false).unwrap());

    let saved = link
        .fetch_row("SELECT age, score, joined FROM users", &Params::new())
        .unwrap()
        .unwrap();
    assert_eq!(saved["age"], Value::Integer(42));
    assert_eq!(saved["score"], Value::Real(3.25));
    assert_eq!(saved["joined"], Value::from("2023-11-14 22:13:20"));
}

#[test]
fn test_date_markers() {
    let link = memory_link();
    let schemas = SchemaCache::new();
    let table = Table::open(Arc::clone(&link), &schemas, "users").unwrap();

    let mut now = table.record();
    now.assign("name", "now").assign("joined", "now");
    now.save(false).unwrap();

    let mut none = table.record();
    none.assign("name", "none").assign("joined", "none");
    none.save(false).unwrap();

    let mut null = table.record();
    null.assign("name", "null").assign("joined", Value::Null);
    null.save(false).unwrap();

    let mut structured = table.record();
    let dt = NaiveDate::from_ymd_opt(2020, 2, 29)
        .unwrap()
        .and_hms_opt(23, 59, 1)
        .unwrap();
    structured.assign("name", "structured").assign("joined", dt);
    structured.save(false).unwrap();

    let joined = |name: &str| {
        link.fetch_cell(
            "SELECT joined FROM users WHERE name = :name",
            &row([("name", name)]),
        )
        .unwrap()
    };

    let Some(Value::Text(stamp)) = joined("now") else {
        panic!("expected a timestamp");
    };
    assert!(chrono::NaiveDateTime::parse_from_str(&stamp, "%Y-%m-%d %H:%M:%S").is_ok());
    assert_eq!(joined("none"), Some(Value::from(ZERO_DATE)));
    assert_eq!(joined("null"), Some(Value::Null));
    assert_eq!(joined("structured"), Some(Value::from("2020-02-29 23:59:01")));
}

// ---------------------------------------------------------------------------
// Schema cache
// ---------------------------------------------------------------------------

#[test]
fn test_schema_cache_is_per_link() {
    let first = memory_link();
    let registry = LinkRegistry::new();
    let second = registry.connect("other", Some(LinkConfig::memory())).unwrap();
    second
        .with_connection(|c| c.execute_batch("CREATE TABLE users (uid TEXT PRIMARY KEY)"))
        .unwrap();

    let schemas = SchemaCache::new();
    let a = Record::new(first, &schemas, "users").unwrap();
    let b = Record::new(second, &schemas, "users").unwrap();
    assert_eq!(schemas.len(), 2);
    assert_eq!(a.schema().auto_increment.as_deref(), Some("id"));
    assert_eq!(b.schema().primary_keys, ["uid"]);
    assert_eq!(b.schema().auto_increment, None);
}

#[test]
fn test_missing_table_fails_schema_load() {
    let link = memory_link();
    let err = Record::new(link, &SchemaCache::new(), "ghosts").unwrap_err();
    assert!(matches!(err, RecordError::SchemaLoadError(_)));
}

#[test]
fn test_records_in_attached_database() {
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("archive.db");
    let registry = LinkRegistry::new();
    registry
        .add_link("main", LinkConfig::memory().with_attached("archive", &archive))
        .unwrap();
    let link = registry.link(None).unwrap();
    link.execute(
        "CREATE TABLE archive.events (id INTEGER PRIMARY KEY, label TEXT)",
        &Params::new(),
    )
    .unwrap();

    let schemas = SchemaCache::new();
    let table = TableRef::in_database("archive", "events");
    let mut event = Record::new(Arc::clone(&link), &schemas, table.clone()).unwrap();
    event.assign("label", "boot");
    assert!(event.save(false).unwrap());

    let events = Table::open(link, &schemas, "archive.events").unwrap();
    assert_eq!(events.total().unwrap(), 1);
    assert!(schemas.get("main", &table).is_some());
}

// ---------------------------------------------------------------------------
// Bulk helpers
// ---------------------------------------------------------------------------

fn seeded_names(names: &[&str]) -> (Arc<Link>, Table) {
    let link = memory_link();
    let schemas = SchemaCache::new();
    let table = Table::open(Arc::clone(&link), &schemas, "users").unwrap();
    for name in names {
        let mut r = table.record();
        r.assign("name", *name);
        r.save(false).unwrap();
    }
    (link, table)
}

#[test]
fn test_index_with_large_page_puts_all_groups_on_first_page() {
    let (_link, table) = seeded_names(&["Amy", "Al", "Bo", "Cy", "Cat", "Cal"]);
    let entries = table.index("name", Some(10)).unwrap();
    assert_eq!(
        entries,
        vec![
            IndexEntry { character: "A".into(), count: 2, page: Some(0) },
            IndexEntry { character: "B".into(), count: 1, page: Some(0) },
            IndexEntry { character: "C".into(), count: 3, page: Some(0) },
        ]
    );
}

#[test]
fn test_load_multiple_rejects_delete_without_touching_data() {
    let (link, table) = seeded_names(&["a", "b"]);
    let err = table
        .load_multiple(Criteria::Statement("DELETE FROM users".into()), &Params::new())
        .unwrap_err();
    assert!(matches!(err, RecordError::UsageError(_)));
    assert_eq!(stored(&link, "SELECT COUNT(*) FROM users"), Some(Value::from(2)));
}

#[test]
fn test_load_multiple_rejects_disguised_writes() {
    let (link, table) = seeded_names(&["a", "b"]);
    for sql in [
        "WITH gone AS (SELECT 1) DELETE FROM users",
        "/* tidy */ DELETE FROM users",
        "-- tidy\nUPDATE users SET age = 1",
        "WITH n AS (SELECT 9) INSERT INTO users (name) SELECT 'x' FROM n",
    ] {
        let err = table
            .load_multiple(Criteria::Statement(sql.into()), &Params::new())
            .unwrap_err();
        assert!(matches!(err, RecordError::UsageError(_)), "{sql}");
    }
    assert_eq!(stored(&link, "SELECT COUNT(*) FROM users"), Some(Value::from(2)));
    assert_eq!(
        stored(&link, "SELECT COUNT(*) FROM users WHERE age IS NOT NULL"),
        Some(Value::from(0))
    );
}

#[test]
fn test_index_pages_use_cumulative_counts() {
    let (_link, table) = seeded_names(&["Amy", "Al", "Bo", "Cy", "Cat", "Cal"]);
    let pages: Vec<_> = table
        .index("name", Some(2))
        .unwrap()
        .into_iter()
        .map(|e| (e.character, e.page))
        .collect();
    assert_eq!(
        pages,
        vec![
            ("A".to_string(), Some(1)),
            ("B".to_string(), Some(1)),
            ("C".to_string(), Some(3)),
        ]
    );
}

#[test]
fn test_load_multiple_variants() {
    let (_link, table) = seeded_names(&["x", "y", "z"]);

    let by_match = table
        .load_multiple(row([("name", "y")]).into(), &Params::new())
        .unwrap();
    assert_eq!(by_match.len(), 1);
    assert_eq!(by_match[0].found(), Found::Confirmed);
    assert_eq!(by_match[0].get("id"), Some(&Value::Integer(2)));

    let by_clause = table
        .load_multiple(Criteria::parse("ORDER BY name DESC").unwrap(), &Params::new())
        .unwrap();
    let names: Vec<_> = by_clause
        .iter()
        .filter_map(|r| r.get("name").and_then(Value::as_str))
        .collect();
    assert_eq!(names, ["z", "y", "x"]);

    let by_statement = table
        .load_multiple(
            Criteria::parse("SELECT * FROM users WHERE id > :min").unwrap(),
            &row([("min", 1)]),
        )
        .unwrap();
    assert_eq!(by_statement.len(), 2);
}

#[test]
fn test_bulk_records_can_be_updated() {
    let (link, table) = seeded_names(&["p", "q"]);
    for mut r in table.all(None, None, None).unwrap() {
        r.assign("age", 1);
        assert!(r.save(false).unwrap());
    }
    assert_eq!(
        stored(&link, "SELECT COUNT(*) FROM users WHERE age = 1"),
        Some(Value::from(2))
    );
}

#[test]
fn test_all_paginates() {
    let (_link, table) = seeded_names(&["a", "b", "c", "d", "e"]);
    let page = table.all(Some("id DESC"), Some(2), Some(1)).unwrap();
    let ids: Vec<_> = page
        .iter()
        .filter_map(|r| r.get("id").and_then(Value::as_i64))
        .collect();
    assert_eq!(ids, [4, 3]);
    assert_eq!(table.total().unwrap(), 5);
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
fn test_concurrent_saves_share_link_and_cache() {
    let dir = tempfile::tempdir().unwrap();
    let link = file_link(&dir);
    let schemas = Arc::new(SchemaCache::new());

    let workers: Vec<_> = (0..8)
        .map(|i| {
            let link = Arc::clone(&link);
            let schemas = Arc::clone(&schemas);
            thread::spawn(move || {
                let mut r = Record::new(link, &schemas, "users").unwrap();
                r.assign("name", format!("worker-{i}"));
                assert!(r.save(false).unwrap());
                r.get("id").and_then(Value::as_i64).unwrap()
            })
        })
        .collect();

    let mut ids: Vec<i64> = workers.into_iter().map(|w| w.join().unwrap()).collect();
    ids.sort_unstable();
    assert_eq!(ids, (1..=8).collect::<Vec<_>>());
    assert_eq!(schemas.len(), 1);
}
