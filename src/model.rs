use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// One parsed activity entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub title: String,
    pub action: String,
    pub item: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// `YYYY-MM-DDThh:mm:ss`, or empty when the source date was unreadable.
    pub date: String,
}

impl ActivityRecord {
    pub fn validate(&self, max_item_len: usize) -> Result<(), ValidationError> {
        if self.title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        if self.action.is_empty() {
            return Err(ValidationError::EmptyAction);
        }
        if self.item.is_empty() {
            return Err(ValidationError::EmptyItem);
        }
        if self.date.is_empty() {
            return Err(ValidationError::EmptyDate);
        }
        let len = self.item.chars().count();
        if len > max_item_len {
            return Err(ValidationError::ItemTooLong {
                len,
                max: max_item_len,
            });
        }
        Ok(())
    }
}

impl fmt::Display for ActivityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "*****")?;
        writeln!(f, "\tTitle: {}", self.title)?;
        writeln!(f, "\tAction: {}", self.action)?;
        writeln!(f, "\tItem: {}", self.item)?;
        if let Some(channel) = &self.channel {
            writeln!(f, "\tChannel: {}", channel)?;
        }
        writeln!(f, "\tDate: {}", self.date)?;
        write!(f, "*****")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ActivityRecord {
        ActivityRecord {
            title: "YouTube".into(),
            action: "Watched".into(),
            item: "Some video".into(),
            channel: Some("Some channel".into()),
            date: "2020-01-01T15:04:05".into(),
        }
    }

    #[test]
    fn valid_record() {
        assert_eq!(sample().validate(100), Ok(()));
    }

    #[test]
    fn validation_order() {
        let mut r = sample();
        r.item.clear();
        r.date.clear();
        assert_eq!(r.validate(100), Err(ValidationError::EmptyItem));
        r.item = "x".into();
        assert_eq!(r.validate(100), Err(ValidationError::EmptyDate));
    }

    #[test]
    fn item_length_counts_chars() {
        let mut r = sample();
        r.item = "é".repeat(5);
        assert_eq!(r.validate(5), Ok(()));
        assert_eq!(
            r.validate(4),
            Err(ValidationError::ItemTooLong { len: 5, max: 4 })
        );
    }

    #[test]
    fn display_shows_channel_only_when_present() {
        let with = sample().to_string();
        assert!(with.contains("Channel: Some channel"));
        let mut r = sample();
        r.channel = None;
        assert!(!r.to_string().contains("Channel"));
    }

    #[test]
    fn json_omits_missing_channel() {
        let mut r = sample();
        r.channel = None;
        let json = serde_json::to_string(&r).unwrap();
        assert!(!json.contains("channel"));
        let back: ActivityRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }
}
