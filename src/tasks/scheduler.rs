use chrono::{Local, NaiveDateTime, NaiveTime, TimeDelta};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::Schedule;
use crate::services::pipeline::SharedPipeline;
use crate::services::writer::AttemptSink;

pub fn delay_until(at: NaiveTime, now: NaiveDateTime) -> Duration {
    let mut next = now.date().and_time(at);
    if next <= now {
        next += TimeDelta::days(1);
    }
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

async fn run_scheduled<S: AttemptSink>(pipeline: &SharedPipeline<S>) {
    tracing::info!("[ETL] Scheduled ingest triggered");

    match pipeline.run().await {
        Ok(report) => {
            tracing::info!("Ingest run completed: {}", report);
        }
        Err(e) => {
            tracing::error!("Ingest run aborted: {}", e);
        }
    }
}

pub fn start_ingest_task<S: AttemptSink + 'static>(
    pipeline: SharedPipeline<S>,
    schedule: Schedule,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match schedule {
            Schedule::Every(period) => {
                let start = tokio::time::Instant::now() + period;
                let mut interval = tokio::time::interval_at(start, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

                loop {
                    interval.tick().await;
                    run_scheduled(&pipeline).await;
                }
            }
            Schedule::Daily(at) => loop {
                let delay = delay_until(at, Local::now().naive_local());
                tracing::info!("Next ingest run in {}s", delay.as_secs());
                tokio::time::sleep(delay).await;
                run_scheduled(&pipeline).await;
            },
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::pipeline::{Pipeline, RunOptions};
    use crate::services::writer::tests::RecordingSink;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn now(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 12, 31)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_delay_until_later_today() {
        assert_eq!(delay_until(at(4, 0), now(3, 0, 0)), Duration::from_secs(3600));
    }

    #[test]
    fn test_delay_until_rolls_to_tomorrow() {
        assert_eq!(
            delay_until(at(4, 0), now(4, 0, 0)),
            Duration::from_secs(24 * 3600)
        );
        assert_eq!(
            delay_until(at(4, 0), now(23, 30, 0)),
            Duration::from_secs(4 * 3600 + 30 * 60)
        );
    }

    #[tokio::test]
    async fn test_interval_schedule_triggers_runs() {
        let mut log = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut log,
            b"Jan 5 03:14:07 host sshd[1]: Failed password for root from 1.2.3.4 port 22 ssh2\n",
        )
        .unwrap();

        let pipeline = Arc::new(Pipeline::new(
            log.path(),
            RecordingSink::default(),
            RunOptions::default(),
        ));
        let handle = start_ingest_task(
            pipeline.clone(),
            Schedule::Every(Duration::from_millis(50)),
        );

        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            if !pipeline.sink().inserted.lock().unwrap().is_empty() {
                break;
            }
        }
        handle.abort();

        let inserted = pipeline.sink().inserted.lock().unwrap();
        assert!(!inserted.is_empty());
        assert_eq!(inserted[0].username, "root");
    }

    #[tokio::test]
    async fn test_slow_runs_do_not_pile_up() {
        use crate::models::login_attempt::LoginAttempt;
        use crate::utils::error::EtlResult;
        use std::sync::atomic::{AtomicUsize, Ordering};

        #[derive(Default)]
        struct SlowSink {
            active: AtomicUsize,
            max_active: AtomicUsize,
            inserts: AtomicUsize,
        }

        impl AttemptSink for SlowSink {
            async fn insert(&self, _attempt: &LoginAttempt) -> EtlResult<()> {
                let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_active.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
                self.active.fetch_sub(1, Ordering::SeqCst);
                self.inserts.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let mut log = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut log,
            b"Jan 5 03:14:07 host sshd[1]: Failed password for root from 1.2.3.4 port 22 ssh2\n",
        )
        .unwrap();

        let pipeline = Arc::new(Pipeline::new(
            log.path(),
            SlowSink::default(),
            RunOptions::default(),
        ));
        let handle = start_ingest_task(
            pipeline.clone(),
            Schedule::Every(Duration::from_millis(10)),
        );

        tokio::time::sleep(Duration::from_millis(450)).await;
        handle.abort();
        let _ = handle.await;

        let inserts = pipeline.sink().inserts.load(Ordering::SeqCst);
        assert!((1..=5).contains(&inserts), "{} inserts", inserts);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(pipeline.sink().inserts.load(Ordering::SeqCst), inserts);
        assert_eq!(pipeline.sink().max_active.load(Ordering::SeqCst), 1);
    }
}
