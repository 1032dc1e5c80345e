pub mod tasks;

use std::future::Future;
use std::pin::Pin;

use anyhow::{Context, Result};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;

use crate::time_utils::Zone;

/// One run of a bot job.
pub type Tick = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Cron clock that drives the refresh, report and clean jobs.
///
/// Cron expressions are evaluated in the bot's zone, so "06:00" means
/// 06:00 wherever the team is, not on the host clock.
pub struct Scheduler {
    inner: JobScheduler,
    zone: Zone,
}

impl Scheduler {
    pub async fn new(zone: Zone) -> Result<Self> {
        let inner = JobScheduler::new()
            .await
            .context("Failed to create job scheduler")?;
        Ok(Self { inner, zone })
    }

    /// Run `job` on every match of `cron_expr`. `job` is called afresh for
    /// each tick; a tick that fails must log its own error.
    pub async fn add_bot_job<F>(&self, cron_expr: &str, name: &str, job: F) -> Result<()>
    where
        F: Fn() -> Tick + Send + Sync + 'static,
    {
        let job_name = name.to_string();
        let run = move |_uuid, _lock| {
            let name = job_name.clone();
            let tick = job();
            Box::pin(async move {
                info!("Tick: {}", name);
                tick.await;
            }) as Tick
        };
        let cron_job = match self.zone {
            Zone::Local => Job::new_async_tz(cron_expr, chrono::Local, run),
            Zone::Fixed(offset) => Job::new_async_tz(cron_expr, offset, run),
        }
        .with_context(|| format!("Invalid cron expression {:?} for {}", cron_expr, name))?;

        self.inner
            .add(cron_job)
            .await
            .with_context(|| format!("Failed to register {}", name))?;

        info!("{} runs on '{}'", name, cron_expr);
        Ok(())
    }

    /// Begin firing registered jobs. Returns once the clock is running.
    pub async fn start(&self) -> Result<()> {
        self.inner
            .start()
            .await
            .context("Failed to start bot jobs")?;
        info!("Bot jobs running");
        Ok(())
    }

    /// Stop firing jobs.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner
            .shutdown()
            .await
            .context("Failed to stop bot jobs")?;
        info!("Bot jobs stopped");
        Ok(())
    }
}
