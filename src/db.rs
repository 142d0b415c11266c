use std::path::Path;

use chrono::NaiveDate;
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, ErrorCode};

use crate::error::StoreError;
use crate::location::Location;
use crate::model::ActivityRecord;

pub type Result<T> = std::result::Result<T, StoreError>;

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS activities (
            id         INTEGER PRIMARY KEY,
            title      TEXT NOT NULL,
            action     TEXT NOT NULL,
            item       TEXT NOT NULL,
            channel    TEXT,
            date       TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(action, date, item)
        );
        CREATE INDEX IF NOT EXISTS idx_activities_date ON activities(date);
        CREATE INDEX IF NOT EXISTS idx_activities_item ON activities(item);
        CREATE INDEX IF NOT EXISTS idx_activities_channel ON activities(channel);

        CREATE TABLE IF NOT EXISTS location_history (
            timestamp_ms  INTEGER PRIMARY KEY,
            latitude_e7   INTEGER NOT NULL,
            longitude_e7  INTEGER NOT NULL
        );
        ",
    )?;
    Ok(())
}

/// Half-open `[start, end)` window over canonical date strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRange {
    pub label: String,
    pub start: String,
    pub end: String,
}

impl TimeRange {
    pub fn year(year: i32) -> Result<Self> {
        let bad = || StoreError::InvalidPeriod { year, month: None };
        let start = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(bad)?;
        let end = NaiveDate::from_ymd_opt(year + 1, 1, 1).ok_or_else(bad)?;
        Ok(Self::between(year.to_string(), start, end))
    }

    pub fn month(year: i32, month: u32) -> Result<Self> {
        let bad = || StoreError::InvalidPeriod {
            year,
            month: Some(month),
        };
        let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(bad)?;
        let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
        let end = NaiveDate::from_ymd_opt(next_year, next_month, 1).ok_or_else(bad)?;
        Ok(Self::between(format!("{}-{:02}", year, month), start, end))
    }

    fn between(label: String, start: NaiveDate, end: NaiveDate) -> Self {
        const FMT: &str = "%Y-%m-%dT00:00:00";
        Self {
            label,
            start: start.format(FMT).to_string(),
            end: end.format(FMT).to_string(),
        }
    }
}

// ── Activities ──

/// Insert one record. A record with the same (action, date, item) is a `Duplicate`.
pub fn insert(conn: &Connection, r: &ActivityRecord) -> Result<()> {
    let res = conn.execute(
        "INSERT INTO activities (title, action, item, channel, date)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![r.title, r.action, r.item, r.channel, r.date],
    );
    match res {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
            Err(StoreError::Duplicate {
                action: r.action.clone(),
                date: r.date.clone(),
                item: r.item.clone(),
            })
        }
        Err(e) => Err(e.into()),
    }
}

/// Insert many records in one transaction, skipping ones already stored.
/// Returns how many rows were added.
pub fn insert_all(conn: &Connection, records: &[ActivityRecord]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO activities (title, action, item, channel, date)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for r in records {
            count += stmt.execute(params![r.title, r.action, r.item, r.channel, r.date])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

/// Insert many records in one transaction, failing on the first `Duplicate`.
/// Nothing is stored unless every record is new.
pub fn insert_all_strict(conn: &Connection, records: &[ActivityRecord]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    for r in records {
        insert(&tx, r)?;
    }
    tx.commit()?;
    Ok(records.len())
}

pub fn delete(conn: &Connection, r: &ActivityRecord) -> Result<usize> {
    let n = conn.execute(
        "DELETE FROM activities WHERE action = ?1 AND date = ?2 AND item = ?3",
        params![r.action, r.date, r.item],
    )?;
    Ok(n)
}

const RECORD_COLUMNS: &str = "title, action, item, channel, date";

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<ActivityRecord> {
    Ok(ActivityRecord {
        title: row.get(0)?,
        action: row.get(1)?,
        item: row.get(2)?,
        channel: row.get(3)?,
        date: row.get(4)?,
    })
}

fn limit_clause(limit: Option<usize>) -> String {
    match limit {
        Some(n) => format!(" LIMIT {}", n),
        None => String::new(),
    }
}

fn query_records(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> Result<Vec<ActivityRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, row_to_record)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// All records in insertion order.
pub fn fetch_all(conn: &Connection, limit: Option<usize>) -> Result<Vec<ActivityRecord>> {
    let sql = format!(
        "SELECT {} FROM activities ORDER BY id{}",
        RECORD_COLUMNS,
        limit_clause(limit)
    );
    query_records(conn, &sql, &[])
}

/// Records dated inside `range`, oldest first. Undated records never match.
pub fn fetch_range(
    conn: &Connection,
    range: &TimeRange,
    limit: Option<usize>,
) -> Result<Vec<ActivityRecord>> {
    let sql = format!(
        "SELECT {} FROM activities
         WHERE date >= ?1 AND date < ?2
         ORDER BY date, id{}",
        RECORD_COLUMNS,
        limit_clause(limit)
    );
    query_records(conn, &sql, &[&range.start, &range.end])
}

/// Case-insensitive substring search over `item`. Case is folded in Rust
/// since SQLite's `LIKE` only folds ASCII.
pub fn search_items(
    conn: &Connection,
    needle: &str,
    limit: Option<usize>,
) -> Result<Vec<ActivityRecord>> {
    let needle = needle.to_lowercase();
    let sql = format!("SELECT {} FROM activities ORDER BY id", RECORD_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let mut hits = Vec::new();
    if limit == Some(0) {
        return Ok(hits);
    }
    for row in stmt.query_map([], row_to_record)? {
        let r = row?;
        if r.item.to_lowercase().contains(&needle) {
            hits.push(r);
            if limit.is_some_and(|n| hits.len() >= n) {
                break;
            }
        }
    }
    Ok(hits)
}

// ── Aggregates ──

/// Build `WHERE` conditions plus positional params for an optional range.
fn range_filter(base: &[&str], range: Option<&TimeRange>) -> (String, Vec<Box<dyn ToSql>>) {
    let mut conditions: Vec<String> = base.iter().map(|c| c.to_string()).collect();
    let mut params: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(r) = range {
        conditions.push(format!("date >= ?{}", params.len() + 1));
        params.push(Box::new(r.start.clone()));
        conditions.push(format!("date < ?{}", params.len() + 1));
        params.push(Box::new(r.end.clone()));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };
    (where_clause, params)
}

fn top_by(
    conn: &Connection,
    column: &str,
    base: &[&str],
    range: Option<&TimeRange>,
    limit: usize,
) -> Result<Vec<(String, usize)>> {
    let (where_clause, params) = range_filter(base, range);
    let sql = format!(
        "SELECT {col}, COUNT(*) AS n FROM activities{w}
         GROUP BY {col}
         ORDER BY n DESC, {col}
         LIMIT {limit}",
        col = column,
        w = where_clause,
        limit = limit
    );
    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Most frequent items, ties broken alphabetically.
pub fn top_items(
    conn: &Connection,
    range: Option<&TimeRange>,
    limit: usize,
) -> Result<Vec<(String, usize)>> {
    top_by(conn, "item", &["item != ''"], range, limit)
}

/// Most frequent channels; records without a channel are left out.
pub fn top_channels(
    conn: &Connection,
    range: Option<&TimeRange>,
    limit: usize,
) -> Result<Vec<(String, usize)>> {
    top_by(
        conn,
        "channel",
        &["channel IS NOT NULL", "channel != ''"],
        range,
        limit,
    )
}

pub fn count(conn: &Connection, range: Option<&TimeRange>) -> Result<usize> {
    count_where(conn, &[], range)
}

pub fn count_with_channel(conn: &Connection, range: Option<&TimeRange>) -> Result<usize> {
    count_where(conn, &["channel IS NOT NULL", "channel != ''"], range)
}

fn count_where(conn: &Connection, base: &[&str], range: Option<&TimeRange>) -> Result<usize> {
    let (where_clause, params) = range_filter(base, range);
    let sql = format!("SELECT COUNT(*) FROM activities{}", where_clause);
    let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let n: usize = conn.query_row(&sql, param_refs.as_slice(), |r| r.get(0))?;
    Ok(n)
}

// ── Location history ──

pub fn insert_locations(conn: &Connection, locations: &[Location]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO location_history (timestamp_ms, latitude_e7, longitude_e7)
             VALUES (?1, ?2, ?3)",
        )?;
        for loc in locations {
            let ts = loc.timestamp_ms()?;
            count += stmt.execute(params![ts, loc.latitude, loc.longitude])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub fn delete_location(conn: &Connection, loc: &Location) -> Result<usize> {
    let n = conn.execute(
        "DELETE FROM location_history WHERE timestamp_ms = ?1",
        params![loc.timestamp_ms()?],
    )?;
    Ok(n)
}

pub fn fetch_locations(conn: &Connection) -> Result<Vec<Location>> {
    let mut stmt = conn.prepare(
        "SELECT timestamp_ms, latitude_e7, longitude_e7
         FROM location_history
         ORDER BY timestamp_ms",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let ts: i64 = row.get(0)?;
            Ok(Location {
                timestamp: ts.to_string(),
                latitude: row.get(1)?,
                longitude: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn rec(action: &str, item: &str, channel: Option<&str>, date: &str) -> ActivityRecord {
        ActivityRecord {
            title: "YouTube".into(),
            action: action.into(),
            item: item.into(),
            channel: channel.map(str::to_string),
            date: date.into(),
        }
    }

    fn seeded() -> Connection {
        let conn = mem();
        let records = vec![
            rec("Watched", "Video A", Some("Chan 1"), "2019-12-31T23:59:59"),
            rec("Watched", "Video A", Some("Chan 1"), "2020-01-01T00:00:00"),
            rec("Watched", "Video B", Some("Chan 2"), "2020-02-10T10:00:00"),
            rec("Searched for", "rust 100% safe", None, "2020-02-11T10:00:00"),
            rec("Visited", "Video A", None, "2020-03-01T08:00:00"),
            rec("Searched for", "undated", None, ""),
        ];
        assert_eq!(insert_all(&conn, &records).unwrap(), 6);
        conn
    }

    #[test]
    fn insert_and_fetch_preserve_order() {
        let conn = mem();
        let a = rec("Watched", "A", Some("C"), "2020-01-01T00:00:00");
        let b = rec("Viewed", "B", None, "2019-01-01T00:00:00");
        insert(&conn, &a).unwrap();
        insert(&conn, &b).unwrap();
        assert_eq!(fetch_all(&conn, None).unwrap(), vec![a, b]);
        assert_eq!(fetch_all(&conn, Some(1)).unwrap().len(), 1);
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let conn = mem();
        let a = rec("Watched", "A", Some("C"), "2020-01-01T00:00:00");
        insert(&conn, &a).unwrap();
        let mut same_key = a.clone();
        same_key.title = "Other".into();
        same_key.channel = None;
        let err = insert(&conn, &same_key).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { ref item, .. } if item == "A"));

        let mut other_action = a.clone();
        other_action.action = "Viewed".into();
        insert(&conn, &other_action).unwrap();
    }

    #[test]
    fn insert_all_skips_existing() {
        let conn = seeded();
        let again = vec![
            rec("Watched", "Video B", Some("Chan 2"), "2020-02-10T10:00:00"),
            rec("Watched", "Video C", None, "2020-04-01T00:00:00"),
        ];
        assert_eq!(insert_all(&conn, &again).unwrap(), 1);
        assert_eq!(count(&conn, None).unwrap(), 7);
    }

    #[test]
    fn delete_by_key() {
        let conn = seeded();
        let target = rec("Watched", "Video B", None, "2020-02-10T10:00:00");
        assert_eq!(delete(&conn, &target).unwrap(), 1);
        assert_eq!(delete(&conn, &target).unwrap(), 0);
        assert_eq!(count(&conn, None).unwrap(), 5);
    }

    #[test]
    fn range_is_half_open() {
        let conn = seeded();
        let y2020 = TimeRange::year(2020).unwrap();
        let got = fetch_range(&conn, &y2020, None).unwrap();
        let dates: Vec<&str> = got.iter().map(|r| r.date.as_str()).collect();
        assert_eq!(
            dates,
            [
                "2020-01-01T00:00:00",
                "2020-02-10T10:00:00",
                "2020-02-11T10:00:00",
                "2020-03-01T08:00:00"
            ]
        );
        let y2019 = TimeRange::year(2019).unwrap();
        assert_eq!(fetch_range(&conn, &y2019, None).unwrap().len(), 1);
    }

    #[test]
    fn month_ranges() {
        let dec = TimeRange::month(2019, 12).unwrap();
        assert_eq!(dec.label, "2019-12");
        assert_eq!(dec.start, "2019-12-01T00:00:00");
        assert_eq!(dec.end, "2020-01-01T00:00:00");
        assert!(matches!(
            TimeRange::month(2020, 13),
            Err(StoreError::InvalidPeriod { month: Some(13), .. })
        ));
    }

    #[test]
    fn top_items_counts_and_ties() {
        let conn = seeded();
        let top = top_items(&conn, None, 2).unwrap();
        assert_eq!(top[0], ("Video A".to_string(), 3));
        assert_eq!(top[1], ("Video B".to_string(), 1));

        let y2020 = TimeRange::year(2020).unwrap();
        let top = top_items(&conn, Some(&y2020), 1).unwrap();
        assert_eq!(top, vec![("Video A".to_string(), 2)]);
    }

    #[test]
    fn top_channels_skip_missing() {
        let conn = seeded();
        let top = top_channels(&conn, None, 10).unwrap();
        assert_eq!(
            top,
            vec![("Chan 1".to_string(), 2), ("Chan 2".to_string(), 1)]
        );
        assert_eq!(count_with_channel(&conn, None).unwrap(), 3);
    }

    #[test]
    fn search_is_literal_substring() {
        let conn = seeded();
        let hits = search_items(&conn, "video", None).unwrap();
        assert_eq!(hits.len(), 4);
        let hits = search_items(&conn, "100%", None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].item, "rust 100% safe");
        assert!(search_items(&conn, "_", None).unwrap().is_empty());
        assert_eq!(search_items(&conn, "video", Some(2)).unwrap().len(), 2);
    }

    #[test]
    fn search_folds_non_ascii_case() {
        let conn = seeded();
        insert(&conn, &rec("Visited", "ÉCOLE Ünïcode", None, "2020-05-01T00:00:00")).unwrap();
        let hits = search_items(&conn, "école ünï", None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].item, "ÉCOLE Ünïcode");
        assert_eq!(search_items(&conn, "ÜNÏCODE", None).unwrap().len(), 1);
    }

    #[test]
    fn strict_batch_is_all_or_nothing() {
        let conn = mem();
        let a = rec("Watched", "A", Some("C"), "2020-01-01T00:00:00");
        let b = rec("Viewed", "B", None, "2020-01-02T00:00:00");
        let err = insert_all_strict(&conn, &[a.clone(), b.clone(), a.clone()]).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { ref item, .. } if item == "A"));
        assert_eq!(count(&conn, None).unwrap(), 0);

        assert_eq!(insert_all_strict(&conn, &[a, b]).unwrap(), 2);
        assert_eq!(count(&conn, None).unwrap(), 2);
    }

    #[test]
    fn locations_round_trip() {
        let conn = mem();
        let locs = vec![
            Location {
                timestamp: "2000".into(),
                latitude: 1,
                longitude: 2,
            },
            Location {
                timestamp: "1000".into(),
                latitude: 3,
                longitude: 4,
            },
        ];
        assert_eq!(insert_locations(&conn, &locs).unwrap(), 2);
        assert_eq!(insert_locations(&conn, &locs).unwrap(), 0);
        let stored = fetch_locations(&conn).unwrap();
        assert_eq!(stored[0].timestamp, "1000");
        assert_eq!(stored[1], locs[0]);
        assert_eq!(delete_location(&conn, &locs[1]).unwrap(), 1);
        assert_eq!(fetch_locations(&conn).unwrap().len(), 1);
    }

    #[test]
    fn bad_location_timestamp_aborts_batch() {
        let conn = mem();
        let locs = vec![
            Location {
                timestamp: "1000".into(),
                latitude: 1,
                longitude: 2,
            },
            Location {
                timestamp: "later".into(),
                latitude: 3,
                longitude: 4,
            },
        ];
        assert!(matches!(
            insert_locations(&conn, &locs),
            Err(StoreError::BadTimestamp(_))
        ));
        assert!(fetch_locations(&conn).unwrap().is_empty());
    }
}
