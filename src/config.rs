use anyhow::Result;
use chrono::Weekday;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::BotError;
use crate::time_utils::Zone;

/// Environment variable that takes precedence over `slack.bot_token`.
pub const TOKEN_ENV_VAR: &str = "SLACK_BOT_TOKEN";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub slack: SlackConfig,
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SlackConfig {
    pub channel_id: String,
    pub channel_name: String,
    #[serde(default)]
    pub bot_token: String,
    /// Tracked user ids, in the order they appear in reports and notices.
    pub members: Vec<String>,
    /// Channel that receives a second copy of the daily reports.
    #[serde(default)]
    pub secondary_channel: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
    #[serde(default = "default_username")]
    pub username: String,
    /// Print posts instead of sending them; deletions are only logged.
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_away_limit_minutes")]
    pub away_limit_minutes: i64,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_report_marker")]
    pub report_marker: String,
    #[serde(default = "default_team_label")]
    pub team_label: String,
    /// Minutes east of UTC; the host zone is used when unset.
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    #[serde(default = "default_refresh_cron")]
    pub refresh: String,
    #[serde(default = "default_report_cron")]
    pub report: String,
    #[serde(default = "default_clean_cron")]
    pub clean: String,
    #[serde(default = "default_work_days")]
    pub work_days: Vec<Weekday>,
    #[serde(default = "default_work_start_hour")]
    pub work_start_hour: u32,
    #[serde(default = "default_work_end_hour")]
    pub work_end_hour: u32,
}

/// Largest `limit` Slack honours on `conversations.history`.
pub const MAX_HISTORY_LIMIT: u32 = 999;

fn default_api_base() -> String {
    "https://slack.com/api".to_string()
}

fn default_history_limit() -> u32 {
    MAX_HISTORY_LIMIT
}

fn default_username() -> String {
    "動態機器人".to_string()
}

fn default_away_limit_minutes() -> i64 {
    90
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("_data")
}

fn default_report_marker() -> String {
    "【".to_string()
}

fn default_team_label() -> String {
    "研發部".to_string()
}

fn default_refresh_cron() -> String {
    "0 0,30 * * * *".to_string()
}

fn default_report_cron() -> String {
    "0 0 6 * * Tue-Sat".to_string()
}

fn default_clean_cron() -> String {
    "0 0 5 * * Tue-Sat".to_string()
}

fn default_work_days() -> Vec<Weekday> {
    vec![
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
    ]
}

fn default_work_start_hour() -> u32 {
    10
}

fn default_work_end_hour() -> u32 {
    18
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            username: default_username(),
            dry_run: false,
            away_limit_minutes: default_away_limit_minutes(),
            data_dir: default_data_dir(),
            report_marker: default_report_marker(),
            team_label: default_team_label(),
            utc_offset_minutes: None,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            refresh: default_refresh_cron(),
            report: default_report_cron(),
            clean: default_clean_cron(),
            work_days: default_work_days(),
            work_start_hour: default_work_start_hour(),
            work_end_hour: default_work_end_hour(),
        }
    }
}

impl ScheduleConfig {
    /// Whether a refresh tick at this local weekday/hour should do any work.
    pub fn in_working_window(&self, weekday: Weekday, hour: u32) -> bool {
        self.work_days.contains(&weekday)
            && hour >= self.work_start_hour
            && hour <= self.work_end_hour
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BotError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let mut config = Self::parse(&content)?;
        config.apply_token_override(std::env::var(TOKEN_ENV_VAR).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| BotError::Config(format!("failed to parse config: {}", e)))?;
        Ok(config)
    }

    fn apply_token_override(&mut self, token: Option<String>) {
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.slack.bot_token = token;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let slack = &self.slack;
        if slack.bot_token.trim().is_empty() {
            return Err(BotError::Config(format!(
                "slack.bot_token is empty and {} is not set",
                TOKEN_ENV_VAR
            ))
            .into());
        }
        if slack.channel_id.trim().is_empty() || slack.channel_name.trim().is_empty() {
            return Err(
                BotError::Config("slack.channel_id and slack.channel_name are required".into())
                    .into(),
            );
        }
        if slack.members.is_empty() {
            return Err(BotError::Config("slack.members must list at least one user".into()).into());
        }
        if slack.history_limit == 0 || slack.history_limit > MAX_HISTORY_LIMIT {
            return Err(BotError::Config(format!(
                "slack.history_limit must be between 1 and {}",
                MAX_HISTORY_LIMIT
            ))
            .into());
        }
        if self.bot.away_limit_minutes <= 0 {
            return Err(BotError::Config("bot.away_limit_minutes must be positive".into()).into());
        }
        if self.bot.report_marker.is_empty() {
            return Err(BotError::Config("bot.report_marker must not be empty".into()).into());
        }
        if self.zone().is_none() {
            return Err(BotError::Config("bot.utc_offset_minutes is out of range".into()).into());
        }
        let schedule = &self.schedule;
        if schedule.work_start_hour > schedule.work_end_hour || schedule.work_end_hour > 23 {
            return Err(BotError::Config(format!(
                "invalid working window {}..={}",
                schedule.work_start_hour, schedule.work_end_hour
            ))
            .into());
        }
        Ok(())
    }

    /// Zone for day boundaries and rendered times. Validated at load time.
    pub fn zone(&self) -> Option<Zone> {
        Zone::from_offset_minutes(self.bot.utc_offset_minutes)
    }

    pub fn away_limit_seconds(&self) -> i64 {
        self.bot.away_limit_minutes * 60
    }
}
