//! End-to-end pipeline tests: detections in, stored fast-break events out.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use fastbreak_analysis::{AnalysisConfig, PossessionConfig};
use fastbreak_jobs::{MemoryStatusStore, StatusStore};
use fastbreak_models::{
    BoundingBox, FastBreakEvent, FrameRecord, MatchId, MatchStatus, ObjectClass, Point, RawDetection,
};
use fastbreak_storage::{EventStore, HeatmapAggregator, MemoryEventStore, MemoryHeatmap, StorageError, StorageResult};
use fastbreak_worker::{
    DetectionSource, MatchExecutor, MatchPipeline, PipelineOutcome, PipelineSettings, PipelineSinks, SourceError,
    VecSource,
};

const FPS: f64 = 10.0;
const ROW_Y: f64 = 540.0;
/// Players in zones 7, 8, 9 and 11 of the default 3 x 6 grid
const PLAYER_XS: [f64; 4] = [160.0, 480.0, 800.0, 1440.0];

struct Harness {
    events: Arc<MemoryEventStore>,
    heatmap: Arc<MemoryHeatmap>,
    status: Arc<MemoryStatusStore>,
}

impl Harness {
    fn new() -> Self {
        Self {
            events: Arc::new(MemoryEventStore::new()),
            heatmap: Arc::new(MemoryHeatmap::new()),
            status: Arc::new(MemoryStatusStore::new()),
        }
    }

    fn sinks(&self) -> PipelineSinks {
        PipelineSinks {
            events: self.events.clone(),
            heatmap: self.heatmap.clone(),
            status: self.status.clone(),
        }
    }

    fn pipeline(&self, match_id: &str, settings: PipelineSettings) -> MatchPipeline {
        self.pipeline_with(match_id, &analysis_config(), settings)
    }

    fn pipeline_with(&self, match_id: &str, config: &AnalysisConfig, settings: PipelineSettings) -> MatchPipeline {
        MatchPipeline::new(MatchId::from(match_id), config, settings, self.sinks()).unwrap()
    }
}

fn analysis_config() -> AnalysisConfig {
    AnalysisConfig::new(PossessionConfig::new(60.0, 2))
}

fn settings() -> PipelineSettings {
    PipelineSettings {
        frame_timeout: Duration::from_secs(1),
        max_consecutive_timeouts: 3,
        max_consecutive_failures: 3,
        status_batch_frames: 5,
    }
}

fn detection(class: ObjectClass, x: f64, y: f64) -> RawDetection {
    let (width, height) = match class {
        ObjectClass::Player => (40.0, 80.0),
        ObjectClass::Ball => (10.0, 10.0),
    };
    RawDetection::new(BoundingBox::centered_at(Point::new(x, y), width, height), class, 0.9)
}

/// `total` frames where the ball moves to player `handoffs[k].1` (an index
/// into `PLAYER_XS`) at frame `handoffs[k].0`. Handoffs must be ordered and
/// the first must start at frame 0.
fn handoff_frames(handoffs: &[(u64, usize)], total: u64) -> Vec<FrameRecord> {
    (0..total)
        .map(|i| {
            let holder = handoffs
                .iter()
                .take_while(|(start, _)| *start <= i)
                .last()
                .map_or(0, |(_, player)| *player);
            let mut detections: Vec<RawDetection> = PLAYER_XS
                .iter()
                .map(|x| detection(ObjectClass::Player, *x, ROW_Y))
                .collect();
            detections.push(detection(ObjectClass::Ball, PLAYER_XS[holder] + 5.0, ROW_Y));
            FrameRecord::new(i, i as f64 / FPS, detections)
        })
        .collect()
}

/// The ball rests at each player in turn for `frames_per_holder` frames.
fn passing_frames(frames_per_holder: u64) -> Vec<FrameRecord> {
    let handoffs: Vec<(u64, usize)> = (0..PLAYER_XS.len())
        .map(|player| (player as u64 * frames_per_holder, player))
        .collect();
    handoff_frames(&handoffs, frames_per_holder * PLAYER_XS.len() as u64)
}

async fn run(harness: &Harness, match_id: &str, settings: PipelineSettings, source: &mut dyn DetectionSource) -> PipelineOutcome {
    let (_cancel_tx, cancel_rx) = watch::channel(false);
    harness.pipeline(match_id, settings).run(source, cancel_rx).await
}

/// Yields scripted frames, stalls and errors.
enum Step {
    Frame(FrameRecord),
    Stall,
    Fail,
}

struct ScriptedSource {
    steps: VecDeque<Step>,
}

impl ScriptedSource {
    fn new(steps: Vec<Step>) -> Self {
        Self { steps: steps.into() }
    }
}

#[async_trait]
impl DetectionSource for ScriptedSource {
    async fn next_frame(&mut self) -> Result<Option<FrameRecord>, SourceError> {
        match self.steps.pop_front() {
            Some(Step::Frame(frame)) => Ok(Some(frame)),
            Some(Step::Stall) => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(None)
            }
            Some(Step::Fail) => Err(SourceError::parse(1, "expected value")),
            None => Ok(None),
        }
    }

    fn total_frames(&self) -> Option<u64> {
        None
    }
}

/// Fails the first `failures` writes, then stores normally.
struct FlakyEventStore {
    inner: MemoryEventStore,
    failures: AtomicUsize,
}

impl FlakyEventStore {
    fn new(failures: usize) -> Self {
        Self {
            inner: MemoryEventStore::new(),
            failures: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl EventStore for FlakyEventStore {
    async fn write_event(&self, event: &FastBreakEvent) -> StorageResult<()> {
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StorageError::unavailable("event store offline"));
        }
        self.inner.write_event(event).await
    }

    async fn list_events(&self, match_id: &MatchId) -> StorageResult<Vec<FastBreakEvent>> {
        self.inner.list_events(match_id).await
    }
}

/// Requests cancellation while handing out the frame at `cancel_at`.
struct CancellingSource {
    inner: VecSource,
    cancel_at: u64,
    cancel: watch::Sender<bool>,
}

#[async_trait]
impl DetectionSource for CancellingSource {
    async fn next_frame(&mut self) -> Result<Option<FrameRecord>, SourceError> {
        let frame = self.inner.next_frame().await?;
        if frame.as_ref().is_some_and(|f| f.frame_index == self.cancel_at) {
            self.cancel.send_replace(true);
        }
        Ok(frame)
    }

    fn total_frames(&self) -> Option<u64> {
        self.inner.total_frames()
    }
}

#[tokio::test]
async fn test_three_pass_break_end_to_end() {
    let harness = Harness::new();
    let mut source = VecSource::new(passing_frames(10));

    let outcome = run(&harness, "final", settings(), &mut source).await;

    assert_eq!(outcome.status, MatchStatus::Completed);
    assert_eq!(outcome.frames_processed, 40);
    assert_eq!(outcome.passes, 3);
    assert_eq!(outcome.events.len(), 1);

    let event = &outcome.events[0];
    assert_eq!(event.event_type, "fast_break");
    assert_eq!(event.rule, "three_pass_break");
    assert_eq!(event.pass_count, 3);
    assert_eq!(event.zone_sum, 28);
    assert_eq!(event.start_time, 1.0);
    assert_eq!(event.end_time, 3.0);
    assert_eq!(event.duration, 2.0);
    let zones: Vec<u16> = event.event_data.zones_touched.iter().map(|z| z.get()).collect();
    assert_eq!(zones, vec![8, 9, 11]);
    assert_eq!(event.event_data.player_ids.len(), 4);
    assert!(!event.event_data.ball_trajectory.is_empty());
    assert!(event.confidence_score > 0.0 && event.confidence_score <= 1.0);

    let match_id = MatchId::from("final");
    let stored = harness.events.list_events(&match_id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, event.id);

    let heatmap = harness.heatmap.heatmap(&match_id).await.unwrap();
    assert_eq!(heatmap.total(), 3);

    let status = harness.status.get(&match_id).await.unwrap().unwrap();
    assert_eq!(status.status, MatchStatus::Completed);
    assert_eq!(status.progress, 1.0);
    assert_eq!(status.events_emitted, 1);
}

#[tokio::test]
async fn test_progress_is_monotonic() {
    let harness = Harness::new();
    let mut source = VecSource::new(passing_frames(10));
    run(&harness, "progress", settings(), &mut source).await;

    let history = harness.status.history(&MatchId::from("progress")).await;
    assert!(history.len() > 2);
    for pair in history.windows(2) {
        assert!(pair[1].progress >= pair[0].progress);
        assert!(pair[1].event_seq > pair[0].event_seq);
    }
    assert!(history.iter().rev().skip(1).all(|s| !s.is_terminal()));
}

#[tokio::test]
async fn test_slow_build_up_is_not_flagged() {
    let harness = Harness::new();
    // 7 s between passes exceeds the 5 s gap limit
    let mut source = VecSource::new(passing_frames(70));

    let outcome = run(&harness, "slow", settings(), &mut source).await;

    assert_eq!(outcome.status, MatchStatus::Completed);
    assert_eq!(outcome.passes, 3);
    assert!(outcome.events.is_empty());
    assert!(harness.events.is_empty().await);
}

#[tokio::test]
async fn test_gap_is_measured_between_pass_times_for_any_debounce() {
    // passes dated 1.0, 2.0 and 6.9: the last gap is 4.9 s, inside the limit,
    // but the third pass only commits once the debounce window agrees
    let handoffs: [(u64, usize); 4] = [(0, 0), (10, 1), (20, 2), (69, 3)];

    for debounce_frames in [2, 5] {
        let harness = Harness::new();
        let config = AnalysisConfig::new(PossessionConfig::new(60.0, debounce_frames));
        let mut source = VecSource::new(handoff_frames(&handoffs, 80));
        let (_cancel_tx, cancel_rx) = watch::channel(false);

        let outcome = harness
            .pipeline_with("late", &config, settings())
            .run(&mut source, cancel_rx)
            .await;

        assert_eq!(outcome.status, MatchStatus::Completed);
        assert_eq!(outcome.passes, 3, "debounce {}", debounce_frames);
        assert_eq!(outcome.events.len(), 1, "debounce {}", debounce_frames);
        let event = &outcome.events[0];
        assert_eq!(event.pass_count, 3);
        assert_eq!(event.start_time, 1.0);
        assert!((event.end_time - 6.9).abs() < 1e-9);
        let zones: Vec<u16> = event.event_data.zones_touched.iter().map(|z| z.get()).collect();
        assert_eq!(zones, vec![8, 9, 11]);
    }
}

#[tokio::test]
async fn test_storage_failure_loses_one_event_and_match_continues() {
    let harness = Harness::new();
    let store = Arc::new(FlakyEventStore::new(1));
    let sinks = PipelineSinks {
        events: store.clone(),
        ..harness.sinks()
    };
    let pipeline = MatchPipeline::new(MatchId::from("flaky"), &analysis_config(), settings(), sinks).unwrap();
    // two consecutive three-pass breaks: zones 8, 9, 11 then 7, 8, 9
    let handoffs: [(u64, usize); 7] = [(0, 0), (10, 1), (20, 2), (30, 3), (40, 0), (50, 1), (60, 2)];
    let mut source = VecSource::new(handoff_frames(&handoffs, 70));
    let (_cancel_tx, cancel_rx) = watch::channel(false);

    let outcome = pipeline.run(&mut source, cancel_rx).await;

    assert_eq!(outcome.status, MatchStatus::Completed);
    assert_eq!(outcome.frames_processed, 70);
    assert_eq!(outcome.passes, 6);
    assert_eq!(outcome.storage_failures, 1);
    assert_eq!(outcome.events.len(), 1);

    let event = &outcome.events[0];
    assert_eq!(event.sequence_id, 2);
    assert_eq!(event.zone_sum, 24);
    assert_eq!(event.start_time, 4.0);

    let match_id = MatchId::from("flaky");
    let stored = store.list_events(&match_id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, event.id);
    // only the stored break reaches the heatmap
    assert_eq!(harness.heatmap.heatmap(&match_id).await.unwrap().total(), 3);

    let status = harness.status.get(&match_id).await.unwrap().unwrap();
    assert_eq!(status.status, MatchStatus::Completed);
    assert_eq!(status.events_emitted, 1);
}

#[tokio::test]
async fn test_cancellation_discards_building_sequence() {
    let harness = Harness::new();
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let mut source = CancellingSource {
        inner: VecSource::new(passing_frames(10)),
        cancel_at: 25,
        cancel: cancel_tx,
    };

    let outcome = harness.pipeline("cancelled", settings()).run(&mut source, cancel_rx).await;

    assert_eq!(outcome.status, MatchStatus::Cancelled);
    assert_eq!(outcome.frames_processed, 26);
    // two passes were building when the match stopped
    assert_eq!(outcome.passes, 2);
    assert!(outcome.events.is_empty());
    assert!(harness.events.is_empty().await);

    let status = harness.status.get(&MatchId::from("cancelled")).await.unwrap().unwrap();
    assert_eq!(status.status, MatchStatus::Cancelled);
}

#[tokio::test]
async fn test_repeated_timeouts_fail_the_match() {
    let harness = Harness::new();
    let mut settings = settings();
    settings.frame_timeout = Duration::from_millis(20);
    let mut source = ScriptedSource::new(vec![
        Step::Frame(FrameRecord::empty(0, 0.0)),
        Step::Stall,
        Step::Stall,
        Step::Stall,
        Step::Frame(FrameRecord::empty(1, 0.1)),
    ]);

    let outcome = run(&harness, "stalled", settings, &mut source).await;

    assert_eq!(outcome.status, MatchStatus::Failed);
    assert_eq!(outcome.timeouts, 3);
    assert_eq!(outcome.frames_processed, 1);
    assert!(outcome.error.as_deref().unwrap_or_default().contains("timeout"));

    let status = harness.status.get(&MatchId::from("stalled")).await.unwrap().unwrap();
    assert_eq!(status.status, MatchStatus::Failed);
    assert!(status.error_message.is_some());
}

#[tokio::test]
async fn test_single_timeout_is_tolerated() {
    let harness = Harness::new();
    let mut settings = settings();
    settings.frame_timeout = Duration::from_millis(20);
    let mut steps: Vec<Step> = passing_frames(10).into_iter().map(Step::Frame).collect();
    steps.insert(5, Step::Stall);
    let mut source = ScriptedSource::new(steps);

    let outcome = run(&harness, "hiccup", settings, &mut source).await;

    assert_eq!(outcome.status, MatchStatus::Completed);
    assert_eq!(outcome.timeouts, 1);
    assert_eq!(outcome.frames_processed, 40);
    assert_eq!(outcome.events.len(), 1);
}

#[tokio::test]
async fn test_repeated_source_errors_fail_the_match() {
    let harness = Harness::new();
    let mut source = ScriptedSource::new(vec![
        Step::Frame(FrameRecord::empty(0, 0.0)),
        Step::Fail,
        Step::Fail,
        Step::Fail,
        Step::Frame(FrameRecord::empty(1, 0.1)),
    ]);

    let outcome = run(&harness, "garbled", settings(), &mut source).await;

    assert_eq!(outcome.status, MatchStatus::Failed);
    assert_eq!(outcome.frame_failures, 3);
    assert!(outcome.error.is_some());
}

#[tokio::test]
async fn test_out_of_order_frame_is_skipped() {
    let harness = Harness::new();
    let mut frames = passing_frames(10);
    // older than frame 5, which precedes it
    frames.insert(6, FrameRecord::empty(99, 0.1));
    let mut source = VecSource::new(frames);

    let outcome = run(&harness, "jitter", settings(), &mut source).await;

    assert_eq!(outcome.status, MatchStatus::Completed);
    assert_eq!(outcome.frame_failures, 1);
    assert_eq!(outcome.events.len(), 1);
}

/// Event content that does not depend on ids or wall-clock time.
fn fingerprint(events: &[FastBreakEvent]) -> Vec<(String, u64, u32, u32, Vec<u16>, String)> {
    events
        .iter()
        .map(|e| {
            (
                e.rule.clone(),
                e.sequence_id,
                e.pass_count,
                e.zone_sum,
                e.event_data.zones_touched.iter().map(|z| z.get()).collect(),
                format!("{:.6}-{:.6}-{:.6}", e.start_time, e.end_time, e.confidence_score),
            )
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_matches_match_sequential_runs() {
    let scenarios: [(&str, u64); 3] = [("alpha", 10), ("bravo", 70), ("charlie", 15)];

    let sequential = Harness::new();
    for (match_id, frames_per_holder) in scenarios {
        let mut source = VecSource::new(passing_frames(frames_per_holder));
        run(&sequential, match_id, settings(), &mut source).await;
    }

    let concurrent = Harness::new();
    let executor = MatchExecutor::new(analysis_config(), settings(), concurrent.sinks(), 3).unwrap();
    let handles: Vec<_> = scenarios
        .iter()
        .map(|(match_id, frames_per_holder)| {
            let source = VecSource::new(passing_frames(*frames_per_holder)).with_delay(Duration::from_millis(1));
            executor.spawn(MatchId::from(*match_id), source)
        })
        .collect();
    for handle in handles {
        let outcome = tokio_test::assert_ok!(handle.join().await);
        assert_eq!(outcome.status, MatchStatus::Completed);
    }

    for (match_id, _) in scenarios {
        let match_id = MatchId::from(match_id);
        let expected = sequential.events.list_events(&match_id).await.unwrap();
        let actual = concurrent.events.list_events(&match_id).await.unwrap();
        assert_eq!(fingerprint(&actual), fingerprint(&expected), "match {}", match_id);
        assert_eq!(
            concurrent.heatmap.heatmap(&match_id).await.unwrap(),
            sequential.heatmap.heatmap(&match_id).await.unwrap()
        );
    }
}
