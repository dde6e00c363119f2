//! Async driver feeding a session from a frame channel.
//!
//! Frames are processed strictly in arrival order, one at a time. The task
//! ends when the frame channel closes or the event receiver is dropped, and
//! yields the session's final statistics.

use formcoach_core::PoseSnapshot;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::analyzer::{FormFeedback, FormSession};
use crate::scorer::RepAnalysis;
use crate::session::SessionStats;

#[derive(Debug, Clone, Serialize)]
pub enum SessionEvent {
    Feedback(FormFeedback),
    RepCompleted(RepAnalysis),
}

/// Spawn a task driving `session` from `frames`, publishing to `events`
pub fn spawn_session(
    mut session: FormSession,
    mut frames: mpsc::Receiver<PoseSnapshot>,
    events: mpsc::Sender<SessionEvent>,
) -> JoinHandle<SessionStats> {
    tokio::spawn(async move {
        tracing::info!("Streaming session {} started", session.id());

        while let Some(frame) = frames.recv().await {
            let outcome = session.process_frame(&frame);

            if events.send(SessionEvent::Feedback(outcome.feedback)).await.is_err() {
                tracing::debug!("Event receiver dropped, stopping session {}", session.id());
                break;
            }
            if let Some(rep) = outcome.completed_rep {
                if events.send(SessionEvent::RepCompleted(rep)).await.is_err() {
                    break;
                }
            }
        }

        session.finish()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use formcoach_core::{Landmark, LandmarkPoint, Timestamp};
    use formcoach_rules::RuleCatalog;

    fn hip_frame(millis: i64, hip_y: f64) -> PoseSnapshot {
        PoseSnapshot::new(Timestamp::from_millis(millis), 0.9)
            .with_landmark(Landmark::LeftHip, LandmarkPoint::new(0.5, hip_y, 0.0, 0.9))
    }

    fn session() -> FormSession {
        let catalog = RuleCatalog::bundled().unwrap();
        FormSession::start(&catalog, "Barbell Squat", &EngineConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_stream_emits_feedback_and_reps() {
        let (frame_tx, frame_rx) = mpsc::channel(64);
        let (event_tx, mut event_rx) = mpsc::channel(64);
        let handle = spawn_session(session(), frame_rx, event_tx);

        let trace = [0.5, 0.6, 0.65, 0.65, 0.65, 0.65, 0.5, 0.5];
        for (i, y) in trace.iter().enumerate() {
            frame_tx.send(hip_frame(i as i64 * 100, *y)).await.unwrap();
        }
        drop(frame_tx);

        let mut feedback = 0;
        let mut reps = Vec::new();
        while let Some(event) = event_rx.recv().await {
            match event {
                SessionEvent::Feedback(_) => feedback += 1,
                SessionEvent::RepCompleted(rep) => reps.push(rep),
            }
        }

        let stats = handle.await.unwrap();
        assert_eq!(feedback, trace.len());
        assert_eq!(reps.len(), 1);
        assert_eq!(stats.rep_count(), 1);
        assert_eq!(stats.history[0], reps[0]);
    }

    #[tokio::test]
    async fn test_dropped_receiver_ends_task() {
        let (frame_tx, frame_rx) = mpsc::channel(8);
        let (event_tx, event_rx) = mpsc::channel(8);
        let handle = spawn_session(session(), frame_rx, event_tx);

        drop(event_rx);
        // The send may fail once the task has exited
        let _ = frame_tx.send(hip_frame(0, 0.5)).await;

        let stats = handle.await.unwrap();
        assert_eq!(stats.rep_count(), 0);
    }
}
