//! Refresh-trigger scheduler.
//!
//! The scheduler owns the producer process's recurring jobs. Each armed job
//! walks a cron schedule and publishes a [`TriggerEvent`] on every firing.
//! An invalid expression disables that job only; the rest of the process
//! keeps running.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use cron::Schedule;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::channel::EventChannel;
use crate::events::{TriggerEvent, UPDATE_TOPIC};

/// Arms recurring trigger jobs and owns their task handles.
pub struct Scheduler {
    channel: Arc<EventChannel>,
    jobs: Vec<JoinHandle<()>>,
    stop_tx: watch::Sender<bool>,
}

impl Scheduler {
    pub fn new(channel: Arc<EventChannel>) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            channel,
            jobs: Vec::new(),
            stop_tx,
        }
    }

    /// Validate `expression` and arm the recurring trigger job.
    ///
    /// On an invalid expression nothing is armed and the error is logged;
    /// a misconfigured schedule must not take the process down.
    pub fn initialize(&mut self, expression: &str) {
        match Schedule::from_str(expression) {
            Ok(schedule) => {
                info!(schedule = %expression, "Refresh trigger job armed");
                let handle = self.spawn_trigger_loop(schedule);
                self.jobs.push(handle);
            }
            Err(e) => {
                error!(
                    schedule = %expression,
                    error = %e,
                    "Invalid cron expression, refresh trigger job disabled"
                );
            }
        }
    }

    /// Number of armed jobs.
    pub fn active_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// Disarm every job and wait for the loops to stop. Idempotent.
    ///
    /// Must run before the channel is closed so no firing publishes into a
    /// torn-down connection.
    pub async fn stop_all(&mut self) {
        self.stop_tx.send_replace(true);
        for job in self.jobs.drain(..) {
            if let Err(e) = job.await {
                warn!(error = %e, "Trigger job ended abnormally");
            }
        }
        info!("Scheduler stopped");
    }

    fn spawn_trigger_loop(&self, schedule: Schedule) -> JoinHandle<()> {
        let channel = Arc::clone(&self.channel);
        let mut stop_rx = self.stop_tx.subscribe();

        tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let Some(next) = schedule.upcoming(Utc).next() else {
                    info!("Schedule has no upcoming firings, trigger job done");
                    break;
                };
                let wait = (next - now).to_std().unwrap_or(std::time::Duration::ZERO);

                tokio::select! {
                    biased;

                    _ = stop_rx.changed() => {
                        if *stop_rx.borrow() {
                            break;
                        }
                    }

                    _ = tokio::time::sleep(wait) => {
                        let event = TriggerEvent::update_now();
                        debug!(at = %event.timestamp, "Schedule fired, publishing refresh trigger");
                        // Publish can block through the reconnect loop, so it
                        // races the stop signal; a firing abandoned at stop is
                        // just a lost trigger. On failure the next occurrence
                        // still fires.
                        tokio::select! {
                            biased;

                            _ = stop_rx.changed() => {
                                if *stop_rx.borrow() {
                                    break;
                                }
                            }

                            result = channel.publish(UPDATE_TOPIC, &event) => {
                                if let Err(e) = result {
                                    error!(error = %e, "Failed to publish refresh trigger");
                                }
                            }
                        }
                    }
                }
            }
            debug!("Trigger loop stopped");
        })
    }
}
