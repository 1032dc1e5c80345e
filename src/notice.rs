use once_cell::sync::Lazy;
use regex::Regex;

use crate::activity::Presence;
use crate::history::Message;
use crate::time_utils::Zone;

const AWAY_PHRASE: &str = "沒發動態";
const OFFLINE_PHRASE: &str = "尚未上線";

/// Text shared by every notice the bot posts, used to find them again later.
static NOTICE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("{}|{}", AWAY_PHRASE, OFFLINE_PHRASE)).expect("valid regex"));

pub fn away_line(user: &str, limit_minutes: i64, last_seen: &str) -> String {
    format!(
        "使用者 <@{}> 已超過 {} 分鐘{}，最後動態時間：{}",
        user, limit_minutes, AWAY_PHRASE, last_seen
    )
}

pub fn offline_line(user: &str) -> String {
    format!("使用者 <@{}> 今日{}", user, OFFLINE_PHRASE)
}

/// Render the away/offline notice, or `None` when nobody needs a reminder.
pub fn render_presence(presence: &Presence, zone: &Zone, limit_minutes: i64) -> Option<String> {
    if presence.is_empty() {
        return None;
    }
    let away = presence.away.iter().map(|record| {
        let last_seen = zone.format(record.ts.seconds(), "%Y-%m-%d %H:%M:%S");
        away_line(&record.user, limit_minutes, &last_seen)
    });
    let offline = presence.offline.iter().map(|user| offline_line(user));
    Some(away.chain(offline).collect::<Vec<_>>().join("\n"))
}

/// Whether `msg` is an away/offline notice previously posted by a bot.
pub fn is_bot_notice(msg: &Message) -> bool {
    msg.subtype.as_deref() == Some("bot_message") && NOTICE_PATTERN.is_match(&msg.text)
}
