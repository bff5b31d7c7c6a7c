//! Caller interruption handling.
//!
//! When the caller starts talking over the assistant, the assistant's reply
//! is cut at the point the caller actually heard: the AI backend is told to
//! truncate the response unit, the media player drops its buffer and the turn
//! state is reset.

use tracing::{debug, info, warn};

use crate::core::call::CallState;
use crate::core::media::MediaTransport;
use crate::core::realtime::BaseRealtime;

/// What to truncate after a barge-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncationPlan {
    pub item_id: String,
    pub elapsed_ms: u64,
}

/// Decide whether a speech-started event interrupts playing audio.
///
/// Requires a pending mark, a response start time and a response unit id.
pub fn plan_truncation(state: &CallState) -> Option<TruncationPlan> {
    if state.mark_queue.is_empty() {
        return None;
    }
    let start = state.response_start_timestamp?;
    let item_id = state.last_assistant_item_id.clone()?;

    Some(TruncationPlan {
        item_id,
        elapsed_ms: state.latest_media_timestamp.saturating_sub(start),
    })
}

/// Apply a barge-in. Returns true if anything was truncated.
pub async fn handle_speech_started(
    state: &mut CallState,
    ai: &mut dyn BaseRealtime,
    transport: &MediaTransport,
    show_timing_math: bool,
) -> bool {
    let Some(plan) = plan_truncation(state) else {
        debug!("Speech started with no assistant audio in flight");
        return false;
    };

    if show_timing_math {
        info!(
            "Calculating elapsed time for truncation: {} - {} = {}ms",
            state.latest_media_timestamp,
            state.response_start_timestamp.unwrap_or_default(),
            plan.elapsed_ms
        );
        info!(
            "Truncating item with ID: {}, Truncated at: {}ms",
            plan.item_id, plan.elapsed_ms
        );
    }

    if let Err(e) = ai
        .truncate_assistant_response(&plan.item_id, plan.elapsed_ms)
        .await
    {
        warn!("Failed to truncate assistant response: {}", e);
    }
    transport.clear_stream().await;
    state.reset_turn();
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(marks: bool, start: bool, item: bool) -> CallState {
        let mut state = CallState::default();
        state.latest_media_timestamp = 500;
        if marks {
            state.mark_queue.push_back("responsePart".to_string());
        }
        if start {
            state.response_start_timestamp = Some(120);
        }
        if item {
            state.last_assistant_item_id = Some("x1".to_string());
        }
        state
    }

    #[test]
    fn test_all_negative_combinations_plan_nothing() {
        for marks in [false, true] {
            for start in [false, true] {
                for item in [false, true] {
                    if marks && start && item {
                        continue;
                    }
                    assert_eq!(
                        plan_truncation(&state(marks, start, item)),
                        None,
                        "marks={marks} start={start} item={item}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_plan_computes_elapsed() {
        assert_eq!(
            plan_truncation(&state(true, true, true)),
            Some(TruncationPlan {
                item_id: "x1".to_string(),
                elapsed_ms: 380
            })
        );
    }

    #[test]
    fn test_elapsed_never_underflows() {
        let mut s = state(true, true, true);
        s.latest_media_timestamp = 100;
        assert_eq!(plan_truncation(&s).map(|p| p.elapsed_ms), Some(0));
    }

    #[tokio::test]
    async fn test_speech_started_truncates_and_clears() {
        use crate::core::media::MediaRoute;
        use crate::core::session::testing::FakeRealtime;
        use tokio::sync::mpsc;

        let (tx, mut rx) = mpsc::channel(8);
        let mut transport = MediaTransport::new(tx);
        transport.set_stream_sid("MZ1");
        let (mut ai, log) = FakeRealtime::new();
        let mut s = state(true, true, true);

        assert!(handle_speech_started(&mut s, &mut ai, &transport, true).await);
        assert_eq!(log.truncations(), vec![("x1".to_string(), 380)]);

        let Some(MediaRoute::Frame(frame)) = rx.recv().await else {
            panic!("expected a clear frame");
        };
        assert!(frame.contains("\"clear\""));
        assert!(s.mark_queue.is_empty());
        assert_eq!(s.response_start_timestamp, None);
        assert_eq!(s.last_assistant_item_id, None);

        // Nothing left to interrupt.
        assert!(!handle_speech_started(&mut s, &mut ai, &transport, false).await);
        assert_eq!(log.truncations().len(), 1);
    }
}
