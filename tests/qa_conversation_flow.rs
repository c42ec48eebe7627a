//! QA tests for end-to-end conversation flow.
//!
//! These drive a full circle (session controller, scheduler, script index,
//! memory, pacing) against mock speakers under paused tokio time:
//! - Session starts on presence and opens with a standalone line
//! - Exact trigger matches chain into the responder's reply pool
//! - Round-robin turn order
//! - Stop semantics: presence loss halts speaking, stop/start cannot overlap
//! - Speak failures back off and the conversation continues

use banter::testing::{
    assert_round_robin, assert_spoke_at_least, sample_script, MockSpeaker, SharedTranscript,
    SpeakOutcome,
};
use banter::{
    AgentSlot, CircleConfig, ConversationCircle, PresenceId, Script, Trigger,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

/// Poll until the transcript holds at least `n` lines. Wall-clock instant
/// under paused time; bounded so a stalled conversation fails the test.
async fn wait_for_lines(transcript: &SharedTranscript, n: usize) {
    for _ in 0..10_000 {
        if transcript.len() >= n {
            return;
        }
        time::sleep(Duration::from_millis(25)).await;
    }
    panic!(
        "timed out waiting for {n} spoken lines, have {}",
        transcript.len()
    );
}

fn circle(
    script: Script,
    speakers: Vec<(&str, Arc<MockSpeaker>)>,
) -> ConversationCircle {
    let slots = speakers
        .into_iter()
        .map(|(name, speaker)| AgentSlot::bound(name, speaker as Arc<dyn banter::Speaker>))
        .collect();
    ConversationCircle::new(CircleConfig::new("qa circle"), Arc::new(script), slots)
}

// =============================================================================
// OPENING AND REPLY CHAINING
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_conversation_opens_with_standalone_line() {
    let transcript = SharedTranscript::new();
    let script = sample_script();
    let mara_pool: Vec<String> = script
        .standalone_lines("Mara")
        .iter()
        .map(|l| l.to_string())
        .collect();

    let mut circle = circle(
        script,
        vec![
            ("Mara", MockSpeaker::always_ok("Mara", transcript.clone())),
            ("Silas", MockSpeaker::always_ok("Silas", transcript.clone())),
        ],
    );

    circle.presence_gained(PresenceId(1));
    wait_for_lines(&transcript, 1).await;
    circle.shutdown().await;

    let (speaker, text) = transcript.lines()[0].clone();
    assert_eq!(speaker, "Mara", "first registered agent opens");
    assert!(
        mara_pool.contains(&text),
        "opener must come from the standalone pool: {text}"
    );
}

#[tokio::test(start_paused = true)]
async fn test_exact_trigger_match_selects_reply_pool() {
    // Mara's only authored line is a trigger phrase with replies for Silas,
    // so turn two must come from that reply pool, not from standalone lines.
    let replies = vec![
        "Climbing prices never helped my stall.".to_string(),
        "Dawn is too early for honest work.".to_string(),
        "You say that every week.".to_string(),
    ];
    let script = Script::new(
        Vec::new(),
        vec![Trigger {
            speaker_filter: Some("Mara".to_string()),
            says_any_of: vec!["The harbor market opens at dawn tomorrow.".to_string()],
            replies_from: BTreeMap::from([("Silas".to_string(), replies.clone())]),
        }],
    )
    .unwrap();

    let transcript = SharedTranscript::new();
    let mut circle = circle(
        script,
        vec![
            ("Mara", MockSpeaker::always_ok("Mara", transcript.clone())),
            ("Silas", MockSpeaker::always_ok("Silas", transcript.clone())),
        ],
    );

    circle.presence_gained(PresenceId(1));
    wait_for_lines(&transcript, 2).await;
    circle.shutdown().await;

    let lines = transcript.lines();
    assert_eq!(lines[0].1, "The harbor market opens at dawn tomorrow.");
    assert_eq!(lines[1].0, "Silas");
    assert!(
        replies.contains(&lines[1].1),
        "reply must come from the trigger's pool: {}",
        lines[1].1
    );
}

#[tokio::test(start_paused = true)]
async fn test_replies_cycle_through_unused_pool() {
    // With only one trigger phrase for Mara and three replies for Silas,
    // Silas's first three replies must all differ.
    let replies = vec![
        "Reply one.".to_string(),
        "Reply two.".to_string(),
        "Reply three.".to_string(),
    ];
    let script = Script::new(
        Vec::new(),
        vec![Trigger {
            speaker_filter: Some("Mara".to_string()),
            says_any_of: vec!["Same opener every time.".to_string()],
            replies_from: BTreeMap::from([("Silas".to_string(), replies.clone())]),
        }],
    )
    .unwrap();

    let transcript = SharedTranscript::new();
    let mut circle = circle(
        script,
        vec![
            ("Mara", MockSpeaker::always_ok("Mara", transcript.clone())),
            ("Silas", MockSpeaker::always_ok("Silas", transcript.clone())),
        ],
    );

    circle.presence_gained(PresenceId(1));
    wait_for_lines(&transcript, 6).await;
    circle.shutdown().await;

    let lines = transcript.lines();
    let silas_lines: Vec<&String> = lines
        .iter()
        .take(6)
        .filter(|(speaker, _)| speaker == "Silas")
        .map(|(_, text)| text)
        .collect();
    assert_eq!(silas_lines.len(), 3);
    assert_ne!(silas_lines[0], silas_lines[1]);
    assert_ne!(silas_lines[1], silas_lines[2]);
    assert_ne!(silas_lines[0], silas_lines[2]);
}

#[tokio::test(start_paused = true)]
async fn test_empty_winning_reply_list_falls_back_to_standalone() {
    // The trigger matches and defines a list for Silas, but the list is
    // empty, so selection has nothing to pick and Silas says a standalone
    // line instead.
    let script = Script::new(
        Vec::new(),
        vec![
            Trigger {
                speaker_filter: Some("Mara".to_string()),
                says_any_of: vec!["Nothing to add, Silas?".to_string()],
                replies_from: BTreeMap::from([("Silas".to_string(), Vec::new())]),
            },
            Trigger {
                speaker_filter: Some("Silas".to_string()),
                says_any_of: vec!["I keep my own counsel.".to_string()],
                replies_from: BTreeMap::new(),
            },
        ],
    )
    .unwrap();

    let transcript = SharedTranscript::new();
    let mut circle = circle(
        script,
        vec![
            ("Mara", MockSpeaker::always_ok("Mara", transcript.clone())),
            ("Silas", MockSpeaker::always_ok("Silas", transcript.clone())),
        ],
    );

    circle.presence_gained(PresenceId(1));
    wait_for_lines(&transcript, 2).await;
    circle.shutdown().await;

    let lines = transcript.lines();
    assert_eq!(lines[0], ("Mara".to_string(), "Nothing to add, Silas?".to_string()));
    assert_eq!(
        lines[1],
        ("Silas".to_string(), "I keep my own counsel.".to_string())
    );
}

// =============================================================================
// TURN ORDER
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_round_robin_fairness() {
    let transcript = SharedTranscript::new();
    let mut circle = circle(
        sample_script(),
        vec![
            ("Mara", MockSpeaker::always_ok("Mara", transcript.clone())),
            ("Silas", MockSpeaker::always_ok("Silas", transcript.clone())),
        ],
    );

    circle.presence_gained(PresenceId(1));
    wait_for_lines(&transcript, 6).await;
    circle.shutdown().await;

    assert_round_robin(&transcript, &["Mara", "Silas"], 6);
}

// =============================================================================
// STOP SEMANTICS
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_presence_loss_halts_speaking() {
    let transcript = SharedTranscript::new();
    let mara = MockSpeaker::always_ok("Mara", transcript.clone());
    let silas = MockSpeaker::always_ok("Silas", transcript.clone());
    let mut circle = circle(
        sample_script(),
        vec![("Mara", mara.clone()), ("Silas", silas.clone())],
    );

    circle.presence_gained(PresenceId(1));
    wait_for_lines(&transcript, 2).await;
    circle.presence_lost(PresenceId(1)).await;

    assert!(!circle.is_active());
    let frozen = transcript.len();

    // Long after the stop, nothing further is spoken.
    time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transcript.len(), frozen, "no speak call may follow stop");

    // Every agent was asked to stop any speech in progress.
    assert!(mara.stop_count() >= 1);
    assert!(silas.stop_count() >= 1);

    // The conversation record is observable once idle.
    assert!(circle.last_line().is_some());
    assert!(!circle.scheduler().memory_of("Mara").unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stop_while_speak_call_is_outstanding() {
    let transcript = SharedTranscript::new();
    // Mara's playback takes ten seconds; the circle is stopped one second
    // in, while her speak call is still outstanding.
    let mara = MockSpeaker::with_outcomes(
        "Mara",
        transcript.clone(),
        vec![SpeakOutcome::Slow(Duration::from_secs(10))],
    );
    let silas = MockSpeaker::always_ok("Silas", transcript.clone());
    let mut circle = circle(
        sample_script(),
        vec![("Mara", mara.clone()), ("Silas", silas)],
    );

    circle.presence_gained(PresenceId(1));
    time::sleep(Duration::from_secs(1)).await;
    assert!(transcript.is_empty(), "playback is still in progress");

    circle.presence_lost(PresenceId(1)).await;
    assert!(!circle.is_active());
    assert!(mara.stop_count() >= 1, "in-flight playback is asked to stop");

    // The line was committed to the conversation record before playback
    // began, but the interrupted call never lands in the transcript and no
    // further turn runs.
    assert!(circle.last_line().is_some());
    time::sleep(Duration::from_secs(120)).await;
    assert!(transcript.is_empty(), "no speak outcome may land after stop");
    assert!(!circle.is_active());
}

#[tokio::test(start_paused = true)]
async fn test_stop_then_start_does_not_overlap_turn_chains() {
    let transcript = SharedTranscript::new();
    let mut circle = circle(
        sample_script(),
        vec![
            ("Mara", MockSpeaker::always_ok("Mara", transcript.clone())),
            ("Silas", MockSpeaker::always_ok("Silas", transcript.clone())),
        ],
    );

    circle.presence_gained(PresenceId(1));
    wait_for_lines(&transcript, 2).await;
    circle.presence_lost(PresenceId(1)).await;
    let frozen = transcript.len();

    // Restart immediately. The rotation resets to the first agent and only
    // one turn chain may produce lines.
    circle.presence_gained(PresenceId(2));
    wait_for_lines(&transcript, frozen + 3).await;
    circle.shutdown().await;

    let lines = transcript.lines();
    assert_eq!(lines[frozen].0, "Mara", "restart begins at the first agent");
    // The restarted chain alternates strictly; an overlapping leftover chain
    // would break the rotation.
    for (i, (speaker, _)) in lines[frozen..].iter().enumerate() {
        let expected = if i % 2 == 0 { "Mara" } else { "Silas" };
        assert_eq!(speaker, expected, "turn {i} after restart");
    }
}

// =============================================================================
// FAILURE RECOVERY
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_speak_failure_backs_off_and_continues() {
    let transcript = SharedTranscript::new();
    // Mara's first speak call fails; nothing is heard but the turn still
    // advances to Silas after the backoff.
    let mara = MockSpeaker::with_outcomes("Mara", transcript.clone(), vec![SpeakOutcome::Fail]);
    let silas = MockSpeaker::always_ok("Silas", transcript.clone());

    let mut circle = circle(
        sample_script(),
        vec![("Mara", mara), ("Silas", silas)],
    );

    circle.presence_gained(PresenceId(1));
    wait_for_lines(&transcript, 3).await;
    circle.shutdown().await;

    let lines = transcript.lines();
    assert_eq!(lines[0].0, "Silas", "failed line is never heard");
    assert_eq!(lines[1].0, "Mara", "rotation recovers after the failure");
    assert_spoke_at_least(&transcript, 3);
}
