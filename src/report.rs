use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;

use crate::history::Message;
use crate::time_utils::Zone;

/// Separator between members' reports in the combined daily post.
pub const REPORT_SEPARATOR: &str = "-------------\n";

/// `<@U123>` or `<@U123|label>`.
static MENTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<@([A-Z0-9]+)(?:\|[^>]*)?>").expect("valid regex"));

/// How daily reports are selected and rendered.
#[derive(Debug, Clone)]
pub struct ReportStyle {
    /// Prefix a message must start with to count as a report entry.
    pub marker: String,
    /// Leading label of the report header.
    pub team_label: String,
    pub zone: Zone,
}

/// Replace user mentions with display names. Unknown ids are left as-is.
pub fn replace_mentions(text: &str, names: &HashMap<String, String>) -> String {
    MENTION
        .replace_all(text, |caps: &Captures| match names.get(&caps[1]) {
            Some(name) => name.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Render `user`'s report for `day` from that day's messages.
///
/// Entries are the user's messages posted after local midnight whose text
/// starts with the marker, oldest first, one `[HH:MM] text` line each.
pub fn render_report(
    messages: &[Message],
    user: &str,
    nickname: &str,
    day: NaiveDate,
    names: &HashMap<String, String>,
    style: &ReportStyle,
) -> String {
    let midnight = style.zone.midnight(day);
    let mut entries: Vec<&Message> = messages
        .iter()
        .filter(|msg| {
            msg.is_from(user) && msg.ts.seconds() > midnight && msg.text.starts_with(&style.marker)
        })
        .collect();
    entries.sort_by(|a, b| a.ts.cmp(&b.ts));

    let lines = entries
        .iter()
        .map(|msg| {
            format!(
                "[{}] {}",
                style.zone.format(msg.ts.seconds(), "%H:%M"),
                replace_mentions(&msg.text, names)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{} {} {} 工作日誌\n{}\n",
        style.team_label,
        nickname,
        day.format("%Y-%m-%d"),
        lines
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::tests::message;

    fn style() -> ReportStyle {
        ReportStyle {
            marker: "【".to_string(),
            team_label: "研發部".to_string(),
            zone: Zone::from_offset_minutes(Some(0)).unwrap(),
        }
    }

    fn names() -> HashMap<String, String> {
        HashMap::from([
            ("U1".to_string(), "manic".to_string()),
            ("U2".to_string(), "Alice".to_string()),
        ])
    }

    #[test]
    fn test_mention_replaced_with_display_name() {
        assert_eq!(replace_mentions("hi <@U2>", &names()), "hi Alice");
        assert_eq!(replace_mentions("cc <@U2|alice>", &names()), "cc Alice");
        assert_eq!(replace_mentions("cc <@U404>", &names()), "cc <@U404>");
    }

    #[test]
    fn test_report_keeps_only_marked_messages() {
        // A day whose local midnight falls at ts 900.
        let style = ReportStyle {
            zone: Zone::from_offset_minutes(Some(-15)).unwrap(),
            ..style()
        };
        let day = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        assert_eq!(style.zone.midnight(day), 900);

        let messages = vec![
            message("U1", "【done】task A", "1000"),
            message("U1", "chat", "1100"),
        ];
        let report = render_report(&messages, "U1", "manic", day, &names(), &style);
        assert_eq!(report, "研發部 manic 1970-01-01 工作日誌\n[00:01] 【done】task A\n");
    }

    #[test]
    fn test_report_is_chronological_and_skips_before_midnight() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let midnight = style().zone.midnight(day);
        let at = |offset: i64| (midnight + offset).to_string();
        // Newest first, the way the API returns history.
        let messages = vec![
            message("U1", "【3】 review with <@U2>", &at(3 * 3600)),
            message("U2", "【x】 someone else", &at(2 * 3600)),
            message("U1", "【1】 standup", &at(60)),
            message("U1", "【0】 exactly midnight", &at(0)),
            message("U1", "【-】 yesterday", &at(-60)),
        ];
        let report = render_report(&messages, "U1", "manic", day, &names(), &style());
        assert_eq!(
            report,
            "研發部 manic 2024-03-05 工作日誌\n[00:01] 【1】 standup\n[03:00] 【3】 review with Alice\n"
        );
    }

    #[test]
    fn test_report_without_entries_has_header_only() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let report = render_report(&[], "U1", "manic", day, &names(), &style());
        assert_eq!(report, "研發部 manic 2024-03-05 工作日誌\n\n");
    }
}
