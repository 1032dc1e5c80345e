use std::sync::Arc;

use tracing::error;

use crate::config::Config;
use crate::jobs;
use crate::scheduler::Scheduler;
use crate::time_utils::Zone;

/// Register the refresh, report and clean jobs.
///
/// Every tick builds its own bot, so caches never outlive one run. A failed
/// tick is logged and the next tick starts over.
pub async fn register_bot_jobs(scheduler: &Scheduler, config: Config) -> anyhow::Result<()> {
    let config = Arc::new(config);
    let schedule = config.schedule.clone();

    let cfg = Arc::clone(&config);
    scheduler
        .add_bot_job(&schedule.refresh, "refresh_today_history", move || {
            let cfg = Arc::clone(&cfg);
            Box::pin(async move {
                let result = async {
                    let mut bot = jobs::slack_bot(&cfg)?;
                    jobs::refresh_today(&mut bot, Zone::now_unix(), false).await
                }
                .await;
                if let Err(e) = result {
                    error!("refresh_today_history failed: {:#}", e);
                }
            })
        })
        .await?;

    let cfg = Arc::clone(&config);
    scheduler
        .add_bot_job(&schedule.clean, "clean_bot_notice_yesterday", move || {
            let cfg = Arc::clone(&cfg);
            Box::pin(async move {
                let result = async {
                    let mut bot = jobs::slack_bot(&cfg)?;
                    let day = bot.zone().yesterday();
                    jobs::clean_notices(&mut bot, day).await
                }
                .await;
                if let Err(e) = result {
                    error!("clean_bot_notice_yesterday failed: {:#}", e);
                }
            })
        })
        .await?;

    let cfg = Arc::clone(&config);
    scheduler
        .add_bot_job(&schedule.report, "report_yesterday", move || {
            let cfg = Arc::clone(&cfg);
            Box::pin(async move {
                let result = async {
                    let mut bot = jobs::slack_bot(&cfg)?;
                    let day = bot.zone().yesterday();
                    jobs::send_reports(&mut bot, day).await
                }
                .await;
                if let Err(e) = result {
                    error!("report_yesterday failed: {:#}", e);
                }
            })
        })
        .await?;

    Ok(())
}
