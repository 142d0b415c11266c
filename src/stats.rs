use std::fmt;

use rusqlite::Connection;

use crate::db::{self, Result, TimeRange};

/// Aggregate view of one period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub label: String,
    pub total: usize,
    /// Records carrying a channel (watched media).
    pub channel_count: usize,
    pub top_item: Option<(String, usize)>,
    pub top_channel: Option<(String, usize)>,
}

pub fn summarize(conn: &Connection, range: &TimeRange) -> Result<Summary> {
    Ok(Summary {
        label: range.label.clone(),
        total: db::count(conn, Some(range))?,
        channel_count: db::count_with_channel(conn, Some(range))?,
        top_item: db::top_items(conn, Some(range), 1)?.into_iter().next(),
        top_channel: db::top_channels(conn, Some(range), 1)?.into_iter().next(),
    })
}

pub fn yearly(conn: &Connection, year: i32) -> Result<Summary> {
    summarize(conn, &TimeRange::year(year)?)
}

/// One summary per calendar month, January first.
pub fn monthly(conn: &Connection, year: i32) -> Result<Vec<Summary>> {
    (1..=12)
        .map(|m| summarize(conn, &TimeRange::month(year, m)?))
        .collect()
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let top = |v: &Option<(String, usize)>| match v {
            Some((name, n)) => format!("{} ({})", name, n),
            None => "-".to_string(),
        };
        write!(
            f,
            "{:<8} | {:>6} total | {:>6} media | item: {} | channel: {}",
            self.label,
            self.total,
            self.channel_count,
            top(&self.top_item),
            top(&self.top_channel)
        )
    }
}
