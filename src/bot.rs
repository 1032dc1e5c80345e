use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::activity::{self, ActivityRecord};
use crate::config::Config;
use crate::error::BotError;
use crate::history::Message;
use crate::notice;
use crate::report::{self, ReportStyle, REPORT_SEPARATOR};
use crate::slack::{ChatApi, HistoryWindow};
use crate::store::DataStore;
use crate::time_utils::Zone;

/// State for one run of the bot.
///
/// Snapshots, the activity map and the display-name map are loaded lazily on
/// first use and live exactly as long as this value. A fresh `ReportBot` is
/// built for every invocation, so nothing carries over between runs.
pub struct ReportBot<A> {
    api: A,
    config: Config,
    store: DataStore,
    zone: Zone,
    snapshots: HashMap<NaiveDate, Vec<Message>>,
    /// Days already fetched from the API during this run.
    fetched: HashSet<NaiveDate>,
    activities: Option<(NaiveDate, HashMap<String, ActivityRecord>)>,
    names: Option<HashMap<String, String>>,
}

impl<A: ChatApi> ReportBot<A> {
    pub fn new(config: Config, api: A) -> Result<Self> {
        let zone = config
            .zone()
            .ok_or_else(|| BotError::Config("bot.utc_offset_minutes is out of range".into()))?;
        let store = DataStore::new(&config.bot.data_dir, &config.slack.channel_name);
        Ok(Self {
            api,
            config,
            store,
            zone,
            snapshots: HashMap::new(),
            fetched: HashSet::new(),
            activities: None,
            names: None,
        })
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetch `day` from the API and overwrite its snapshot.
    ///
    /// A day is fetched at most once per run; later calls reuse what was
    /// fetched.
    pub async fn refresh_history(&mut self, day: NaiveDate) -> Result<&[Message]> {
        if !self.fetched.contains(&day) {
            let (oldest, latest) = self.zone.day_window(day);
            let window = HistoryWindow {
                oldest,
                latest,
                limit: self.config.slack.history_limit,
            };
            info!("Fetching history for {} ({}..{})", day, oldest, latest);
            let page = self
                .api
                .history(&self.config.slack.channel_id, window)
                .await
                .with_context(|| format!("Failed to fetch history for {}", day))?;
            if page.has_more {
                warn!(
                    "History for {} has more than {} messages; older messages were dropped",
                    day, window.limit
                );
            }
            self.store.write_snapshot(day, &page.messages)?;
            self.fetched.insert(day);
            self.load_snapshot(day)?;
        } else {
            debug!("History for {} already fetched this run", day);
        }
        self.cached_history(day)
    }

    /// The messages of `day`: from memory, else from its snapshot, else
    /// fetched.
    pub async fn daily_history(&mut self, day: NaiveDate) -> Result<&[Message]> {
        if self.snapshots.contains_key(&day) {
            debug!("Using cached history for {}", day);
        } else if self.store.has_snapshot(day) {
            self.load_snapshot(day)?;
        } else {
            return self.refresh_history(day).await;
        }
        self.cached_history(day)
    }

    fn load_snapshot(&mut self, day: NaiveDate) -> Result<()> {
        let messages = self.store.read_snapshot(day)?;
        debug!("Loaded {} messages for {}", messages.len(), day);
        self.snapshots.insert(day, messages);
        if matches!(&self.activities, Some((cached, _)) if *cached == day) {
            self.activities = None;
        }
        Ok(())
    }

    fn cached_history(&self, day: NaiveDate) -> Result<&[Message]> {
        self.snapshots
            .get(&day)
            .map(Vec::as_slice)
            .ok_or_else(|| BotError::data(day, "history not loaded").into())
    }

    /// Latest message of every roster member on `day`.
    pub async fn latest_activities(
        &mut self,
        day: NaiveDate,
    ) -> Result<&HashMap<String, ActivityRecord>> {
        let cached = matches!(&self.activities, Some((cached, _)) if *cached == day);
        if !cached {
            self.daily_history(day).await?;
            let messages = self.cached_history(day)?;
            let derived = activity::latest_activities(messages, &self.config.slack.members);
            self.activities = Some((day, derived));
        }
        match &self.activities {
            Some((_, activities)) => Ok(activities),
            None => Err(BotError::data(day, "activities not derived").into()),
        }
    }

    /// Post an away/offline reminder for the day containing `now`.
    /// Returns the posted text, or `None` when everyone is active.
    pub async fn check_away(&mut self, now: i64) -> Result<Option<String>> {
        let day = self.zone.date_of(now);
        let limit_seconds = self.config.away_limit_seconds();
        let limit_minutes = self.config.bot.away_limit_minutes;
        let zone = self.zone;
        let members = self.config.slack.members.clone();

        let activities = self.latest_activities(day).await?;
        let presence = activity::classify(&members, activities, now, limit_seconds);
        let Some(text) = notice::render_presence(&presence, &zone, limit_minutes) else {
            info!("All {} members active on {}", self.config.slack.members.len(), day);
            return Ok(None);
        };

        for record in &presence.away {
            debug!("{} last posted at {}: {:?}", record.user, record.ts, record.text);
        }
        info!(
            "{} away, {} offline on {}",
            presence.away.len(),
            presence.offline.len(),
            day
        );
        let channel = self.config.slack.channel_id.clone();
        self.post(&text, &channel).await?;
        Ok(Some(text))
    }

    pub fn display_names(&mut self) -> Result<&HashMap<String, String>> {
        if self.names.is_none() {
            self.names = Some(
                self.store
                    .read_display_names()
                    .context("Failed to load display names; run the cache command first")?,
            );
        }
        match &self.names {
            Some(names) => Ok(names),
            None => Err(BotError::data(self.store.users_list_path().display(), "not loaded").into()),
        }
    }

    pub fn nickname(&mut self, user: &str) -> Result<String> {
        let path = self.store.users_list_path();
        self.display_names()?
            .get(user)
            .cloned()
            .ok_or_else(|| BotError::data(path.display(), format!("no member {}", user)).into())
    }

    /// Daily report for one user.
    pub async fn report(&mut self, user: &str, day: NaiveDate) -> Result<String> {
        let nickname = self.nickname(user)?;
        self.daily_history(day).await?;

        let style = ReportStyle {
            marker: self.config.bot.report_marker.clone(),
            team_label: self.config.bot.team_label.clone(),
            zone: self.zone,
        };
        let messages = self.cached_history(day)?;
        let names = self
            .names
            .as_ref()
            .ok_or_else(|| BotError::data(day, "display names not loaded"))?;
        Ok(report::render_report(
            messages, user, &nickname, day, names, &style,
        ))
    }

    /// Refresh `day` and post every member's report to `channel`.
    /// Returns the combined text.
    pub async fn send_reports(&mut self, day: NaiveDate, channel: &str) -> Result<String> {
        self.refresh_history(day).await?;
        let members = self.config.slack.members.clone();
        let mut reports = Vec::with_capacity(members.len());
        for member in &members {
            reports.push(
                self.report(member, day)
                    .await
                    .with_context(|| format!("Failed to build report for {}", member))?,
            );
        }
        let text = reports.join(REPORT_SEPARATOR);
        info!("Sending {} reports for {} to {}", reports.len(), day, channel);
        self.post(&text, channel).await?;
        Ok(text)
    }

    /// Delete the away/offline notices posted on `day`. Returns how many
    /// were deleted.
    pub async fn clean_bot_notices(&mut self, day: NaiveDate) -> Result<usize> {
        let stale: Vec<String> = self
            .refresh_history(day)
            .await?
            .iter()
            .filter(|msg| notice::is_bot_notice(msg))
            .map(|msg| msg.ts.as_str().to_string())
            .collect();
        for ts in &stale {
            self.delete(ts).await?;
        }
        info!("Removed {} bot notices from {}", stale.len(), day);
        Ok(stale.len())
    }

    /// Fetch the channel info and user list into the data directory.
    pub async fn cache_directory(&mut self) -> Result<()> {
        let channel_info = self
            .api
            .channel_info(&self.config.slack.channel_id)
            .await
            .context("Failed to fetch channel info")?;
        let path = self.store.write_channel_info(&channel_info)?;
        info!("Cached channel info in {}", path.display());

        let users = self
            .api
            .users_list()
            .await
            .context("Failed to fetch user list")?;
        let path = self.store.write_users_list(&users)?;
        info!("Cached user list in {}", path.display());

        self.names = None;
        Ok(())
    }

    pub async fn post(&self, text: &str, channel: &str) -> Result<()> {
        if self.config.bot.dry_run {
            info!("[dry run] would post {} chars to {}", text.chars().count(), channel);
            println!("{}", text);
            return Ok(());
        }
        let ts = self
            .api
            .post_message(channel, text, &self.config.bot.username)
            .await
            .with_context(|| format!("Failed to post to {}", channel))?;
        info!("Posted message {} to {}", ts, channel);
        Ok(())
    }

    pub async fn delete(&self, ts: &str) -> Result<()> {
        let channel = &self.config.slack.channel_id;
        if self.config.bot.dry_run {
            info!("[dry run] would delete {} from {}", ts, channel);
            return Ok(());
        }
        self.api
            .delete_message(channel, ts)
            .await
            .with_context(|| format!("Failed to delete {} from {}", ts, channel))?;
        info!("Deleted message {} from {}", ts, channel);
        Ok(())
    }
}
