//! services/api/src/tasks/sweep.rs
//!
//! The background loop that drives time-based escalation.

use doubt_forum_core::EscalationEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Runs an escalation sweep every `period` until `token` is cancelled.
///
/// The first sweep runs immediately. A slow sweep delays the next tick rather
/// than triggering a burst of catch-up sweeps.
pub fn spawn_escalation_sweep(
    engine: Arc<EscalationEngine>,
    period: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = period.as_secs(), "Escalation sweep started");

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tick.tick() => {
                    let promoted = engine.run_escalation_sweep(engine.now()).await;
                    debug!(promoted, "Escalation sweep tick");
                }
            }
        }

        info!("Escalation sweep stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use doubt_forum_core::{
        AnswerGenerationService, DoubtStatus, EscalationPolicy, InMemoryDoubtStore, ManualClock,
        NewDoubt, Participant, PortResult, StudentAction,
    };

    struct EchoAnswer;

    #[async_trait]
    impl AnswerGenerationService for EchoAnswer {
        async fn generate(&self, _prompt: &str) -> PortResult<String> {
            Ok("Try drawing the recursion tree.".to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn promotes_on_tick_and_stops_when_cancelled() {
        let clock = Arc::new(ManualClock::new(
            chrono::Utc.with_ymd_and_hms(2024, 9, 2, 10, 0, 0).unwrap(),
        ));
        let engine = Arc::new(EscalationEngine::new(
            Arc::new(InMemoryDoubtStore::new()),
            Arc::new(EchoAnswer),
            clock.clone(),
            EscalationPolicy::default(),
        ));

        let doubt = engine
            .create_doubt(NewDoubt {
                content: "Why is merge sort n log n?".to_string(),
                course_id: "algo-101".to_string(),
                asker: Participant {
                    user_id: "s1".to_string(),
                    name: "Ada".to_string(),
                },
                tags: vec![],
            })
            .await
            .unwrap();
        engine
            .apply_student_action(doubt.id, StudentAction::Confused)
            .await
            .unwrap();

        let token = CancellationToken::new();
        let handle = spawn_escalation_sweep(engine.clone(), Duration::from_secs(10), token.clone());

        // The immediate first tick finds nothing due.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(
            engine.get_doubt(doubt.id).await.unwrap().status,
            DoubtStatus::Open
        );

        clock.advance(chrono::Duration::minutes(31));
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(
            engine.get_doubt(doubt.id).await.unwrap().status,
            DoubtStatus::SeniorVisible
        );

        token.cancel();
        handle.await.unwrap();
    }
}
