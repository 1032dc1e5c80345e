use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;

/// A Slack message timestamp (`"1700000000.000200"`).
///
/// Ordering follows the instant the string denotes, so sorting messages by
/// `ts` is chronological regardless of how the API ordered them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "String")]
pub struct SlackTs {
    seconds: i64,
    micros: u32,
    raw: String,
}

impl SlackTs {
    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl TryFrom<String> for SlackTs {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        let (whole, fraction) = match raw.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (raw.as_str(), ""),
        };
        let seconds = whole
            .parse::<i64>()
            .map_err(|_| format!("invalid message timestamp {:?}", raw))?;
        if seconds < 0 || DateTime::<Utc>::from_timestamp(seconds, 0).is_none() {
            return Err(format!("message timestamp {:?} is out of range", raw));
        }
        if fraction.len() > 6 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("invalid message timestamp {:?}", raw));
        }
        let micros = if fraction.is_empty() {
            0
        } else {
            format!("{:0<6}", fraction)
                .parse::<u32>()
                .map_err(|_| format!("invalid message timestamp {:?}", raw))?
        };
        Ok(Self {
            seconds,
            micros,
            raw,
        })
    }
}

impl fmt::Display for SlackTs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// One entry of a daily snapshot. Only the fields the bot reads are decoded;
/// the snapshot file itself keeps everything the API returned.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Message {
    /// Absent on some bot and system messages.
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: String,
    pub ts: SlackTs,
    #[serde(default)]
    pub subtype: Option<String>,
}

impl Message {
    pub fn is_from(&self, user: &str) -> bool {
        self.user.as_deref() == Some(user)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn message(user: &str, text: &str, ts: &str) -> Message {
        serde_json::from_value(json!({ "user": user, "text": text, "ts": ts })).unwrap()
    }

    #[test]
    fn test_ts_parses_fraction() {
        let ts = SlackTs::try_from("1700000000.000200".to_string()).unwrap();
        assert_eq!(ts.seconds(), 1_700_000_000);
        assert_eq!(ts.as_str(), "1700000000.000200");
        let whole = SlackTs::try_from("1000".to_string()).unwrap();
        assert_eq!(whole.seconds(), 1000);
    }

    #[test]
    fn test_ts_rejects_garbage() {
        assert!(SlackTs::try_from("abc".to_string()).is_err());
        assert!(SlackTs::try_from("100.x1".to_string()).is_err());
        assert!(SlackTs::try_from("".to_string()).is_err());
    }

    #[test]
    fn test_ts_rejects_out_of_range_seconds() {
        assert!(SlackTs::try_from("99999999999999999".to_string()).is_err());
        assert!(SlackTs::try_from("-1".to_string()).is_err());
        assert!(SlackTs::try_from("-9223372036854775808".to_string()).is_err());
        assert!(SlackTs::try_from("0".to_string()).is_ok());
    }

    #[test]
    fn test_ts_orders_within_same_second() {
        let a = SlackTs::try_from("1000.000100".to_string()).unwrap();
        let b = SlackTs::try_from("1000.0002".to_string()).unwrap();
        let c = SlackTs::try_from("999.999999".to_string()).unwrap();
        assert!(a < b);
        assert!(c < a);
    }

    #[test]
    fn test_message_tolerates_missing_user() {
        let msg: Message = serde_json::from_value(json!({
            "type": "message",
            "subtype": "bot_message",
            "text": "使用者 <@U1> 今日尚未上線",
            "ts": "1000.1",
            "bot_id": "B1"
        }))
        .unwrap();
        assert_eq!(msg.user, None);
        assert_eq!(msg.subtype.as_deref(), Some("bot_message"));
        assert!(!msg.is_from("U1"));
    }
}
