//! Pipeline tests against a scripted in-memory codec engine.
//!
//! The mock implements the engine's working-area semantics (trim produces a
//! deterministic segment derived from the staged bytes, concat replays the
//! manifest in order), so byte-level properties of the pipelines can be
//! checked without a real codec.

use async_trait::async_trait;
use audioloop::engine::{CodecEngine, ProgressFn};
use audioloop::{
    run_extract_job, run_loop_job, AudioSource, AudioloopError, LoopJob, Region, Result, Session,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

struct MockEngine {
    files: Mutex<HashMap<String, Vec<u8>>>,
    calls: AtomicUsize,
    fail_on_concat: bool,
    /// When set, `write` blocks until permits are added; used to hold a job
    /// in flight.
    gate: Option<Arc<Semaphore>>,
}

impl MockEngine {
    fn new() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            fail_on_concat: false,
            gate: None,
        }
    }

    fn failing_on_concat() -> Self {
        Self {
            fail_on_concat: true,
            ..Self::new()
        }
    }

    fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new()
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn has_file(&self, name: &str) -> bool {
        self.files.lock().unwrap().contains_key(name)
    }
}

fn arg_after(args: &[String], flag: &str) -> Option<String> {
    let position = args.iter().position(|a| a == flag)?;
    args.get(position + 1).cloned()
}

#[async_trait]
impl CodecEngine for MockEngine {
    async fn write(&self, name: &str, bytes: &[u8]) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.expect("gate closed");
        }
        self.files
            .lock()
            .unwrap()
            .insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn exec(&self, args: &[String], progress: ProgressFn<'_>) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let is_concat = args.iter().any(|a| a == "concat");
        if is_concat && self.fail_on_concat {
            return Err(AudioloopError::EngineFailure {
                step: "exec",
                input: args.join(" "),
                message: "scripted concat failure".to_string(),
            });
        }

        // raw per-step fractions deliberately regress to exercise the tracker
        progress(0.9);
        progress(0.4);

        let input = arg_after(args, "-i").expect("exec without -i");
        let output = args.last().expect("exec without output").clone();

        let mut files = self.files.lock().unwrap();
        if is_concat {
            let manifest = String::from_utf8(
                files.get(&input).expect("missing manifest").clone(),
            )
            .expect("manifest not utf-8");
            let mut bytes = Vec::new();
            for line in manifest.lines() {
                let name = line
                    .trim()
                    .trim_start_matches("file '")
                    .trim_end_matches('\'');
                bytes.extend_from_slice(files.get(name).expect("missing segment"));
            }
            files.insert(output, bytes);
        } else {
            let ss = arg_after(args, "-ss").expect("trim without -ss");
            let t = arg_after(args, "-t").expect("trim without -t");
            let staged = files.get(&input).expect("missing input").clone();
            let mut bytes = format!("SEG[{ss}+{t}]<").into_bytes();
            bytes.extend_from_slice(&staged);
            bytes.push(b'>');
            files.insert(output, bytes);
        }
        drop(files);

        progress(1.0);
        Ok(())
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.files
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| AudioloopError::EngineFailure {
                step: "read",
                input: name.to_string(),
                message: "no such file".to_string(),
            })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

fn source() -> AudioSource {
    AudioSource::new("song.mp3", None, b"MP3DATA".to_vec(), 100.0).unwrap()
}

fn region(start: f64, end: f64) -> Region {
    Region { start, end }
}

#[tokio::test]
async fn loop_of_one_equals_extract_byte_for_byte() {
    let r = region(2.0, 5.0);

    let engine = MockEngine::new();
    let job = LoopJob::new(r, 1).unwrap();
    let looped = run_loop_job(&engine, &source(), job, |_| {}).await.unwrap();

    let engine = MockEngine::new();
    let extracted = run_extract_job(&engine, &source(), r, |_| {}).await.unwrap();

    assert_eq!(looped.bytes, extracted.bytes);
    assert_eq!(looped.suggested_filename, "loop_song.mp3");
    assert_eq!(extracted.suggested_filename, "extracted_0:03_song.mp3");
}

#[tokio::test]
async fn loop_repeats_segment_in_order() {
    let engine = MockEngine::new();
    let job = LoopJob::new(region(2.0, 5.0), 4).unwrap();
    let artifact = run_loop_job(&engine, &source(), job, |_| {}).await.unwrap();

    let segment = b"SEG[2.000+3.000]<MP3DATA>".to_vec();
    let expected: Vec<u8> = segment
        .iter()
        .cycle()
        .take(segment.len() * 4)
        .copied()
        .collect();
    assert_eq!(artifact.bytes, expected);
    assert_eq!(artifact.suggested_filename, "loop_song.mp3");
    assert_eq!(artifact.mime_type, "audio/mpeg");
    assert!((job.projected_duration() - 12.0).abs() < 1e-9);
}

#[tokio::test]
async fn extract_filename_embeds_duration() {
    let engine = MockEngine::new();
    let artifact = run_extract_job(&engine, &source(), region(0.0, 65.0), |_| {})
        .await
        .unwrap();
    assert_eq!(artifact.suggested_filename, "extracted_1:05_song.mp3");
}

#[tokio::test]
async fn mime_type_follows_source_format() {
    let engine = MockEngine::new();
    let wav = AudioSource::new("take.wav", None, b"WAVDATA".to_vec(), 30.0).unwrap();
    let artifact = run_extract_job(&engine, &wav, region(1.0, 2.0), |_| {})
        .await
        .unwrap();
    assert_eq!(artifact.mime_type, "audio/wav");
    assert_eq!(artifact.suggested_filename, "extracted_0:01_take.wav");
}

#[tokio::test]
async fn progress_starts_at_zero_and_rises_to_completion() {
    let engine = MockEngine::new();
    let percents: Mutex<Vec<u8>> = Mutex::new(Vec::new());
    let job = LoopJob::new(region(2.0, 5.0), 3).unwrap();

    run_loop_job(&engine, &source(), job, |p| {
        percents.lock().unwrap().push(p);
    })
    .await
    .unwrap();

    let percents = percents.into_inner().unwrap();
    assert_eq!(percents.first(), Some(&0));
    assert_eq!(percents.last(), Some(&100));
    assert!(
        percents.windows(2).all(|w| w[0] <= w[1]),
        "progress regressed: {percents:?}"
    );
}

#[tokio::test]
async fn failed_step_aborts_with_step_context() {
    let engine = MockEngine::failing_on_concat();
    let job = LoopJob::new(region(2.0, 5.0), 2).unwrap();
    let err = run_loop_job(&engine, &source(), job, |_| {})
        .await
        .unwrap_err();

    match err {
        AudioloopError::EngineFailure { step, input, .. } => {
            assert_eq!(step, "concat");
            assert_eq!(input, "song.mp3");
        }
        other => panic!("expected EngineFailure, got {other}"),
    }
    // no partial artifact: the output file was never produced or read
    assert!(!engine.has_file("output.mp3"));
}

#[tokio::test]
async fn job_slot_released_after_failure() {
    let engine = Arc::new(MockEngine::failing_on_concat());
    let mut session = Session::new(engine as Arc<dyn CodecEngine>);
    session.load_source(source()).unwrap();
    session.set_region(2.0, 5.0).unwrap();

    let err = session.generate_loop(2, |_| {}).await.unwrap_err();
    assert!(matches!(err, AudioloopError::EngineFailure { .. }));
    assert!(!session.is_busy());

    // a new job is accepted afterwards instead of bouncing off Busy
    let err = session.generate_loop(2, |_| {}).await.unwrap_err();
    assert!(matches!(err, AudioloopError::EngineFailure { .. }));
    assert!(!session.is_busy());
}

#[tokio::test]
async fn invalid_region_rejected_before_any_engine_call() {
    let engine = MockEngine::new();
    let err = run_extract_job(&engine, &source(), region(5.0, 2.0), |_| {})
        .await
        .unwrap_err();
    assert!(matches!(err, AudioloopError::InvalidRegion(_)));
    assert_eq!(engine.call_count(), 0);

    let err = run_extract_job(&engine, &source(), region(0.0, 500.0), |_| {})
        .await
        .unwrap_err();
    assert!(matches!(err, AudioloopError::InvalidRegion(_)));
    assert_eq!(engine.call_count(), 0);
}

#[tokio::test]
async fn second_job_while_one_is_in_flight_returns_busy() {
    let gate = Arc::new(Semaphore::new(0));
    let engine = Arc::new(MockEngine::gated(gate.clone()));

    let mut session = Session::new(engine.clone() as Arc<dyn CodecEngine>);
    session.load_source(source()).unwrap();
    session.set_region(2.0, 5.0).unwrap();
    let session = Arc::new(session);

    let first = {
        let session = session.clone();
        tokio::spawn(async move { session.generate_loop(2, |_| {}).await })
    };

    // wait until the first job is blocked inside the engine
    while engine.call_count() == 0 {
        tokio::task::yield_now().await;
    }
    assert!(session.is_busy());

    let err = session.generate_loop(2, |_| {}).await.unwrap_err();
    assert!(matches!(err, AudioloopError::Busy));

    // releasing the gate lets the first job finish normally
    gate.add_permits(100);
    let artifact = first.await.unwrap().unwrap();
    assert_eq!(artifact.suggested_filename, "loop_song.mp3");
    assert!(!session.is_busy());
}
