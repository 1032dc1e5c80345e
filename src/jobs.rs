use anyhow::Result;
use chrono::NaiveDate;
use tracing::info;

use crate::bot::ReportBot;
use crate::config::Config;
use crate::slack::{ChatApi, SlackClient};

/// Build a fresh bot against the real Slack API.
pub fn slack_bot(config: &Config) -> Result<ReportBot<SlackClient>> {
    let client = SlackClient::new(&config.slack.api_base, &config.slack.bot_token)?;
    ReportBot::new(config.clone(), client)
}

/// Re-fetch today's history and remind away/offline members.
///
/// Ticks outside the working window do nothing unless `force` is set.
/// Returns whether the check ran.
pub async fn refresh_today<A: ChatApi>(bot: &mut ReportBot<A>, now: i64, force: bool) -> Result<bool> {
    let zone = bot.zone();
    let (weekday, hour) = zone.weekday_and_hour(now);
    if !force && !bot.config().schedule.in_working_window(weekday, hour) {
        info!("Outside working hours ({} {}:00), skipping refresh", weekday, hour);
        return Ok(false);
    }

    info!("Start refreshing today's history");
    bot.refresh_history(zone.date_of(now)).await?;
    bot.check_away(now).await?;
    info!("End refreshing today's history");
    Ok(true)
}

/// Post the reports of `day` to the main channel and, when configured, to
/// the secondary channel.
pub async fn send_reports<A: ChatApi>(bot: &mut ReportBot<A>, day: NaiveDate) -> Result<()> {
    info!("Start sending reports for {}", day);
    let slack = bot.config().slack.clone();
    bot.send_reports(day, &slack.channel_id).await?;
    if let Some(secondary) = slack.secondary_channel.as_deref() {
        bot.send_reports(day, secondary).await?;
    }
    info!("End sending reports for {}", day);
    Ok(())
}

pub async fn clean_notices<A: ChatApi>(bot: &mut ReportBot<A>, day: NaiveDate) -> Result<usize> {
    info!("Start cleaning bot notices for {}", day);
    let removed = bot.clean_bot_notices(day).await?;
    info!("End cleaning bot notices for {}", day);
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::tests::{test_config, Call, FakeSlack};
    use crate::time_utils::Zone;
    use httpmock::prelude::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn utc() -> Zone {
        Zone::from_offset_minutes(Some(0)).unwrap()
    }

    fn tuesday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
    }

    #[tokio::test]
    async fn test_refresh_skipped_outside_working_hours() {
        let temp = tempdir().expect("tempdir");
        let fake = FakeSlack::default();
        let mut bot = ReportBot::new(test_config(temp.path()), fake.clone()).unwrap();

        let early = utc().midnight(tuesday()) + 8 * 3600;
        assert!(!refresh_today(&mut bot, early, false).await.unwrap());
        assert!(fake.calls().is_empty());

        let saturday = utc().midnight(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()) + 12 * 3600;
        assert!(!refresh_today(&mut bot, saturday, false).await.unwrap());
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn test_forced_refresh_runs_anytime() {
        let temp = tempdir().expect("tempdir");
        let fake = FakeSlack::default();
        let mut bot = ReportBot::new(test_config(temp.path()), fake.clone()).unwrap();

        let early = utc().midnight(tuesday()) + 8 * 3600;
        assert!(refresh_today(&mut bot, early, true).await.unwrap());
        let calls = fake.calls();
        assert!(matches!(calls[0], Call::History(_)));
        assert!(matches!(calls.last(), Some(Call::Post { .. })));
        assert_eq!(calls.len(), 2);
    }

    #[tokio::test]
    async fn test_reports_go_to_both_channels_with_one_fetch() {
        let temp = tempdir().expect("tempdir");
        let fake = FakeSlack::default();
        let mut config = test_config(temp.path());
        config.slack.secondary_channel = Some("C2".to_string());
        let mut bot = ReportBot::new(config, fake.clone()).unwrap();
        bot.cache_directory().await.unwrap();

        send_reports(&mut bot, tuesday()).await.unwrap();

        let calls = fake.calls();
        let posted: Vec<&str> = calls
            .iter()
            .filter_map(|call| match call {
                Call::Post { channel, .. } => Some(channel.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(posted, vec!["C1", "C2"]);
        assert_eq!(
            calls.iter().filter(|c| matches!(c, Call::History(_))).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_clean_notices_against_slack_api() {
        let server = MockServer::start();
        let history = server.mock(|when, then| {
            when.method(GET).path("/conversations.history");
            then.status(200).json_body(json!({
                "ok": true,
                "messages": [
                    {"type": "message", "subtype": "bot_message", "text": "使用者 <@U1> 今日尚未上線", "ts": "1709600000.000100"},
                    {"type": "message", "user": "U1", "text": "【done】 deploy", "ts": "1709590000.000100"}
                ]
            }));
        });
        let delete = server.mock(|when, then| {
            when.method(POST)
                .path("/chat.delete")
                .body_includes("\"ts\":\"1709600000.000100\"");
            then.status(200).json_body(json!({"ok": true}));
        });

        let temp = tempdir().expect("tempdir");
        let mut config = test_config(temp.path());
        config.slack.api_base = server.base_url();
        let mut bot = slack_bot(&config).unwrap();

        let removed = clean_notices(&mut bot, tuesday()).await.unwrap();

        assert_eq!(removed, 1);
        history.assert_calls(1);
        delete.assert_calls(1);
        assert!(temp.path().join("history-dev_2024-03-05.json").exists());
    }

    #[tokio::test]
    async fn test_cache_directory_against_slack_api() {
        let server = MockServer::start();
        let info = server.mock(|when, then| {
            when.method(GET)
                .path("/conversations.info")
                .query_param("channel", "C1")
                .header("authorization", "Bearer xoxb-test");
            then.status(200)
                .json_body(json!({"ok": true, "channel": {"id": "C1", "name": "dev"}}));
        });
        let users = server.mock(|when, then| {
            when.method(GET)
                .path("/users.list")
                .header("authorization", "Bearer xoxb-test");
            then.status(200).json_body(json!({
                "ok": true,
                "members": [{"id": "U1", "name": "manic"}, {"id": "U2", "name": "alice"}]
            }));
        });

        let temp = tempdir().expect("tempdir");
        let mut config = test_config(temp.path());
        config.slack.api_base = server.base_url();
        let mut bot = slack_bot(&config).unwrap();

        bot.cache_directory().await.unwrap();

        info.assert_calls(1);
        users.assert_calls(1);
        assert!(temp.path().join("channels_info-dev.json").exists());
        assert!(temp.path().join("users_list.json").exists());
        assert_eq!(bot.nickname("U2").unwrap(), "alice");
    }
}
