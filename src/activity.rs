use std::collections::HashMap;

use crate::history::{Message, SlackTs};

/// The most recent message a roster member posted on a given day.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRecord {
    pub user: String,
    pub text: String,
    pub ts: SlackTs,
}

/// Roster members split by how recently they were seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Presence {
    /// Seen today, but not within the inactivity threshold. Roster order.
    pub away: Vec<ActivityRecord>,
    /// Not seen today at all. Roster order.
    pub offline: Vec<String>,
}

impl Presence {
    pub fn is_empty(&self) -> bool {
        self.away.is_empty() && self.offline.is_empty()
    }
}

/// Latest message per roster member.
///
/// The API usually returns newest first, but the order is not relied on:
/// messages are sorted by timestamp, newest first, before the first message
/// of each member is taken.
pub fn latest_activities(messages: &[Message], roster: &[String]) -> HashMap<String, ActivityRecord> {
    let mut newest_first: Vec<&Message> = messages.iter().collect();
    newest_first.sort_by(|a, b| b.ts.cmp(&a.ts));

    let mut activities = HashMap::new();
    for msg in newest_first {
        let Some(user) = msg.user.as_deref() else {
            continue;
        };
        if activities.contains_key(user) || !roster.iter().any(|member| member == user) {
            continue;
        }
        activities.insert(
            user.to_string(),
            ActivityRecord {
                user: user.to_string(),
                text: msg.text.clone(),
                ts: msg.ts.clone(),
            },
        );
    }
    activities
}

/// Classify every roster member. A member is away only when
/// `now - last_seen` is strictly greater than `limit_seconds`.
pub fn classify(
    roster: &[String],
    activities: &HashMap<String, ActivityRecord>,
    now: i64,
    limit_seconds: i64,
) -> Presence {
    let mut presence = Presence::default();
    for member in roster {
        match activities.get(member) {
            Some(record) if now.saturating_sub(record.ts.seconds()) > limit_seconds => {
                presence.away.push(record.clone());
            }
            Some(_) => {}
            None => presence.offline.push(member.clone()),
        }
    }
    presence
}
