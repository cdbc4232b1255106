use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{Instant, sleep};
use tracing::{error, info};

use crate::comfy::ImageRenderer;
use crate::compose::CompositionPipeline;
use crate::config::AppConfig;
use crate::error::{CycleError, FailureStage};
use crate::history::{GenerationLog, HistoryWindow};
use crate::news::HeadlineSource;
use crate::schedule::CycleRunner;
use crate::selector::{HeadlineSelector, Style};
use crate::state_machine::GenerationRecord;
use crate::summary::Summarizer;

const LOG_PREFIX_LEN: usize = 50;

fn headline_prefix(headline: &str) -> String {
    headline.chars().take(LOG_PREFIX_LEN).collect()
}

/// Per-cycle knobs taken from the scheduler and news configuration.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub fetch_limit: usize,
    pub max_images_per_run: usize,
    pub generation_delay: Duration,
    /// `None` disables the artifact cleanup pass.
    pub cleanup_after: Option<Duration>,
    pub max_history: usize,
    pub history_window: usize,
}

impl CycleSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let scheduler = &config.scheduler;
        Self {
            fetch_limit: config.news.fetch_limit,
            max_images_per_run: scheduler.max_images_per_run,
            generation_delay: scheduler.generation_delay(),
            cleanup_after: scheduler
                .cleanup_enabled
                .then(|| scheduler.max_image_age()),
            max_history: scheduler.max_history,
            history_window: scheduler.history_window,
        }
    }
}

/// One headline that did not make it to an artifact.
#[derive(Debug, Clone, Serialize)]
pub struct HeadlineFailure {
    pub headline: String,
    pub stage: FailureStage,
    pub message: String,
}

/// Outcome of a single cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub fetched: usize,
    pub selected: usize,
    pub generated: Vec<PathBuf>,
    pub failures: Vec<HeadlineFailure>,
    pub cleaned_up: usize,
    pub duration: Duration,
}

/// Snapshot of cross-cycle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrchestratorStatus {
    pub total_generated: usize,
    pub generated_today: usize,
    pub last_generation: Option<DateTime<Utc>>,
    pub history_window_len: usize,
    pub cycles_completed: u64,
}

struct CycleState {
    window: HistoryWindow,
    log: GenerationLog,
    cycles_completed: u64,
}

/// Drives fetch, select, render, compose and record for each cycle.
///
/// At most one cycle runs at a time; a trigger arriving while a cycle is in
/// progress gets [`CycleError::AlreadyRunning`].
pub struct CycleOrchestrator<S, M, R> {
    source: S,
    summarizer: M,
    renderer: R,
    pipeline: CompositionPipeline,
    selector: HeadlineSelector,
    settings: CycleSettings,
    cycle_lock: Mutex<()>,
    state: RwLock<CycleState>,
}

impl<S, M, R> CycleOrchestrator<S, M, R>
where
    S: HeadlineSource,
    M: Summarizer,
    R: ImageRenderer,
{
    pub fn new(
        source: S,
        summarizer: M,
        renderer: R,
        pipeline: CompositionPipeline,
        selector: HeadlineSelector,
        settings: CycleSettings,
    ) -> Self {
        let state = CycleState {
            window: HistoryWindow::new(settings.history_window),
            log: GenerationLog::new(settings.max_history),
            cycles_completed: 0,
        };
        Self {
            source,
            summarizer,
            renderer,
            pipeline,
            selector,
            settings,
            cycle_lock: Mutex::new(()),
            state: RwLock::new(state),
        }
    }

    /// Run one full cycle. Per-headline failures are collected in the
    /// report; only fetch problems and overlap end the cycle early.
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let _cycle = self
            .cycle_lock
            .try_lock()
            .map_err(|_| CycleError::AlreadyRunning)?;
        let started = Instant::now();

        let candidates = self
            .source
            .get_latest_headlines(self.settings.fetch_limit)
            .await
            .map_err(CycleError::Fetch)?;
        if candidates.is_empty() {
            return Err(CycleError::FetchEmpty);
        }

        let selection = {
            let state = self.state.read().await;
            self.selector
                .select(&candidates, &state.window, self.settings.max_images_per_run)
        };
        info!(
            fetched = candidates.len(),
            selected = selection.len(),
            "cycle started"
        );

        let mut report = CycleReport {
            fetched: candidates.len(),
            selected: selection.len(),
            ..Default::default()
        };

        for (i, (headline, style)) in selection.iter().enumerate() {
            if i > 0 && !self.settings.generation_delay.is_zero() {
                sleep(self.settings.generation_delay).await;
            }

            match self.produce(headline, *style).await {
                Ok(record) => {
                    report.generated.push(record.artifact_path.clone());
                    self.state.write().await.log.push(record);
                }
                Err(failure) => {
                    error!(
                        headline = %headline_prefix(&failure.headline),
                        stage = %failure.stage,
                        "{}",
                        failure.message
                    );
                    report.failures.push(failure);
                }
            }
        }

        {
            let mut state = self.state.write().await;
            state.window.extend(candidates);
            state.cycles_completed += 1;
        }

        if let Some(max_age) = self.settings.cleanup_after {
            report.cleaned_up = self.pipeline.cleanup_older_than(max_age);
        }

        report.duration = started.elapsed();
        info!(
            generated = report.generated.len(),
            failed = report.failures.len(),
            cleaned_up = report.cleaned_up,
            elapsed_ms = report.duration.as_millis() as u64,
            "cycle complete"
        );
        Ok(report)
    }

    /// Render and compose a single headline outside the cycle flow. The
    /// style defaults to what the selector would assign at position 0.
    pub async fn generate_one(
        &self,
        headline: &str,
        style: Option<Style>,
    ) -> Result<GenerationRecord, HeadlineFailure> {
        let style = style.unwrap_or_else(|| self.selector.style_for(headline, 0));
        let record = self.produce(headline, style).await?;
        self.state.write().await.log.push(record.clone());
        Ok(record)
    }

    /// First headline the source currently offers, if any.
    pub async fn first_headline(&self) -> Result<String, CycleError> {
        self.source
            .get_latest_headlines(1)
            .await
            .map_err(CycleError::Fetch)?
            .into_iter()
            .next()
            .ok_or(CycleError::FetchEmpty)
    }

    async fn produce(&self, headline: &str, style: Style) -> Result<GenerationRecord, HeadlineFailure> {
        let fail = |stage, message: String| HeadlineFailure {
            headline: headline.to_string(),
            stage,
            message,
        };

        info!(headline = %headline_prefix(headline), %style, "generating");
        let image = self
            .renderer
            .generate(headline, style)
            .await
            .map_err(|e| fail(FailureStage::Render, e.to_string()))?;

        let summary = self.summarizer.summarize(headline);
        let artifact = self
            .pipeline
            .compose(&image, headline, &summary)
            .map_err(|e| fail(FailureStage::Compose, e.to_string()))?;

        Ok(GenerationRecord::new(headline.to_string(), style, artifact))
    }

    pub async fn status(&self) -> OrchestratorStatus {
        let state = self.state.read().await;
        OrchestratorStatus {
            total_generated: state.log.len(),
            generated_today: state.log.count_since_midnight(),
            last_generation: state.log.latest().map(|r| r.timestamp),
            history_window_len: state.window.len(),
            cycles_completed: state.cycles_completed,
        }
    }
}

impl<S, M, R> CycleRunner for CycleOrchestrator<S, M, R>
where
    S: HeadlineSource,
    M: Summarizer,
    R: ImageRenderer,
{
    async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        CycleOrchestrator::run_cycle(self).await
    }

    async fn status(&self) -> OrchestratorStatus {
        CycleOrchestrator::status(self).await
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Mutex as StdMutex;

    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

    use super::*;
    use crate::comfy::RenderError;
    use crate::config::CompositionConfig;
    use crate::selector::FallbackPolicy;
    use crate::summary::KeywordSummarizer;

    struct MockSource {
        headlines: Vec<String>,
        fail: bool,
    }

    impl MockSource {
        fn with(headlines: &[&str]) -> Self {
            Self {
                headlines: headlines.iter().map(|h| h.to_string()).collect(),
                fail: false,
            }
        }
    }

    impl HeadlineSource for MockSource {
        async fn get_latest_headlines(&self, limit: usize) -> anyhow::Result<Vec<String>> {
            if self.fail {
                anyhow::bail!("all feeds unreachable");
            }
            Ok(self.headlines.iter().take(limit).cloned().collect())
        }
    }

    /// Returns a small PNG, fails for headlines containing `fail_on`, and
    /// returns undecodable bytes for headlines containing `garbage_on`.
    #[derive(Default)]
    struct MockRenderer {
        fail_on: Option<&'static str>,
        garbage_on: Option<&'static str>,
        latency: Duration,
        calls: StdMutex<Vec<(String, Style)>>,
    }

    impl ImageRenderer for MockRenderer {
        async fn generate(&self, headline: &str, style: Style) -> Result<Vec<u8>, RenderError> {
            self.calls.lock().unwrap().push((headline.to_string(), style));
            if !self.latency.is_zero() {
                sleep(self.latency).await;
            }
            if self.fail_on.is_some_and(|s| headline.contains(s)) {
                return Err(RenderError::GenerationFailed {
                    job_id: "job-1".into(),
                    message: "CUDA out of memory".into(),
                });
            }
            if self.garbage_on.is_some_and(|s| headline.contains(s)) {
                return Ok(b"not an image".to_vec());
            }
            let mut out = Cursor::new(Vec::new());
            DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 36, Rgb([10, 20, 30])))
                .write_to(&mut out, ImageFormat::Png)
                .unwrap();
            Ok(out.into_inner())
        }
    }

    fn settings() -> CycleSettings {
        CycleSettings {
            fetch_limit: 20,
            max_images_per_run: 3,
            generation_delay: Duration::ZERO,
            cleanup_after: None,
            max_history: 1000,
            history_window: 50,
        }
    }

    fn orchestrator(
        dir: &std::path::Path,
        source: MockSource,
        renderer: MockRenderer,
        settings: CycleSettings,
    ) -> CycleOrchestrator<MockSource, KeywordSummarizer, MockRenderer> {
        let pipeline = CompositionPipeline::new(&CompositionConfig {
            output_dir: dir.to_path_buf(),
            ..Default::default()
        })
        .unwrap();
        let selector = HeadlineSelector::new(
            &["breakthrough".to_string()],
            vec![Style::News, Style::Artistic],
            FallbackPolicy::Unfiltered,
        );
        CycleOrchestrator::new(source, KeywordSummarizer, renderer, pipeline, selector, settings)
    }

    async fn records(
        orch: &CycleOrchestrator<MockSource, KeywordSummarizer, MockRenderer>,
    ) -> Vec<GenerationRecord> {
        orch.state.read().await.log.iter().cloned().collect()
    }

    const HEADLINES: [&str; 3] = [
        "Scientists discover breakthrough material",
        "Local bakery wins award",
        "City council approves new cycling lanes downtown",
    ];

    #[tokio::test]
    async fn happy_path_generates_every_selected_headline() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), MockSource::with(&HEADLINES), MockRenderer::default(), settings());

        let report = orch.run_cycle().await.unwrap();

        assert_eq!(report.fetched, 3);
        assert_eq!(report.selected, 3);
        assert_eq!(report.generated.len(), 3);
        assert!(report.failures.is_empty());
        assert!(report.generated.iter().all(|p| p.exists()));

        let status = orch.status().await;
        assert_eq!(status.total_generated, 3);
        assert_eq!(status.generated_today, 3);
        assert_eq!(status.history_window_len, 3);
        assert_eq!(status.cycles_completed, 1);
        assert!(status.last_generation.is_some());
    }

    #[tokio::test]
    async fn priority_headline_is_rendered_first() {
        let dir = tempfile::tempdir().unwrap();
        let source = MockSource::with(&["Local bakery wins award", HEADLINES[0], "..."]);
        let mut s = settings();
        s.max_images_per_run = 1;
        let orch = orchestrator(dir.path(), source, MockRenderer::default(), s);

        orch.run_cycle().await.unwrap();

        let records = records(&orch).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].headline, "Scientists discover breakthrough material");
    }

    #[tokio::test]
    async fn render_failure_does_not_abort_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = MockRenderer {
            fail_on: Some("bakery"),
            ..Default::default()
        };
        let orch = orchestrator(dir.path(), MockSource::with(&HEADLINES), renderer, settings());

        let report = orch.run_cycle().await.unwrap();

        assert_eq!(report.generated.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].stage, FailureStage::Render);
        assert_eq!(report.failures[0].headline, "Local bakery wins award");
        assert!(report.failures[0].message.contains("CUDA out of memory"));
        // The failed headline is still remembered.
        assert_eq!(orch.status().await.history_window_len, 3);
    }

    #[tokio::test]
    async fn compose_failure_is_reported_with_stage() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = MockRenderer {
            garbage_on: Some("cycling"),
            ..Default::default()
        };
        let orch = orchestrator(dir.path(), MockSource::with(&HEADLINES), renderer, settings());

        let report = orch.run_cycle().await.unwrap();

        assert_eq!(report.generated.len(), 2);
        assert_eq!(report.failures[0].stage, FailureStage::Compose);
        assert_eq!(records(&orch).await.len(), 2);
    }

    #[tokio::test]
    async fn empty_fetch_leaves_state_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), MockSource::with(&[]), MockRenderer::default(), settings());

        let err = orch.run_cycle().await.unwrap_err();
        assert!(matches!(err, CycleError::FetchEmpty));

        let status = orch.status().await;
        assert_eq!(status.cycles_completed, 0);
        assert_eq!(status.history_window_len, 0);
        assert_eq!(status.total_generated, 0);
    }

    #[tokio::test]
    async fn fetch_error_is_a_cycle_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = MockSource {
            headlines: vec![],
            fail: true,
        };
        let orch = orchestrator(dir.path(), source, MockRenderer::default(), settings());

        let err = CycleRunner::run_cycle(&orch).await.unwrap_err();
        assert!(matches!(err, CycleError::Fetch(_)));
        // The orchestrator is still usable afterwards.
        assert_eq!(orch.status().await.cycles_completed, 0);
    }

    #[tokio::test]
    async fn fallback_reuses_seen_headlines_when_nothing_is_new() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings();
        s.max_images_per_run = 1;
        let renderer = MockRenderer::default();
        let orch = orchestrator(dir.path(), MockSource::with(&HEADLINES[..2]), renderer, s);

        orch.run_cycle().await.unwrap();
        // Both fetched headlines are now in the window, so the fallback
        // re-admits the unfiltered list.
        orch.run_cycle().await.unwrap();

        let calls = orch.renderer.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, HEADLINES[0]);
        assert_eq!(calls[1].0, HEADLINES[0]);
    }

    #[tokio::test]
    async fn new_headline_preferred_over_seen_ones() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), MockSource::with(&HEADLINES[..1]), MockRenderer::default(), settings());
        orch.run_cycle().await.unwrap();

        {
            let mut state = orch.state.write().await;
            state.window.extend([HEADLINES[1].to_string()]);
        }
        let orch2 = CycleOrchestrator {
            source: MockSource::with(&HEADLINES),
            ..orch
        };
        let report = orch2.run_cycle().await.unwrap();

        assert_eq!(report.selected, 1);
        let calls = orch2.renderer.calls.lock().unwrap().clone();
        assert_eq!(calls.last().unwrap().0, HEADLINES[2]);
    }

    #[tokio::test]
    async fn records_evicted_beyond_max_history() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings();
        s.max_history = 2;
        let orch = orchestrator(dir.path(), MockSource::with(&HEADLINES), MockRenderer::default(), s);

        orch.run_cycle().await.unwrap();

        let records = records(&orch).await;
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.headline != HEADLINES[0]));
        assert_eq!(orch.status().await.total_generated, 2);
    }

    #[tokio::test]
    async fn overlapping_cycle_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = MockRenderer {
            latency: Duration::from_millis(50),
            ..Default::default()
        };
        let orch = orchestrator(dir.path(), MockSource::with(&HEADLINES[..1]), renderer, settings());

        let (first, second) = tokio::join!(orch.run_cycle(), orch.run_cycle());

        assert!(first.is_ok());
        assert!(matches!(second, Err(CycleError::AlreadyRunning)));
        assert_eq!(orch.status().await.cycles_completed, 1);
    }

    #[tokio::test]
    async fn delay_between_headlines() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings();
        s.generation_delay = Duration::from_millis(40);
        let orch = orchestrator(dir.path(), MockSource::with(&HEADLINES[..2]), MockRenderer::default(), s);

        let report = orch.run_cycle().await.unwrap();
        assert!(report.duration >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn no_delay_after_last_headline() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings();
        s.generation_delay = Duration::from_secs(30);
        let orch = orchestrator(dir.path(), MockSource::with(&HEADLINES[..1]), MockRenderer::default(), s);

        let report = orch.run_cycle().await.unwrap();
        assert!(report.duration < Duration::from_secs(30));
    }

    #[tokio::test]
    async fn cleanup_runs_after_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("stale.png");
        std::fs::write(&stale, b"x").unwrap();
        std::fs::File::options()
            .write(true)
            .open(&stale)
            .unwrap()
            .set_modified(std::time::SystemTime::now() - Duration::from_secs(30 * 24 * 3600))
            .unwrap();

        let mut s = settings();
        s.cleanup_after = Some(Duration::from_secs(7 * 24 * 3600));
        let orch = orchestrator(dir.path(), MockSource::with(&HEADLINES[..1]), MockRenderer::default(), s);

        let report = orch.run_cycle().await.unwrap();
        assert_eq!(report.cleaned_up, 1);
        assert!(!stale.exists());
        assert!(report.generated[0].exists());
        let status = orch.status().await;
        assert_eq!(status.history_window_len, 1);
        assert_eq!(status.cycles_completed, 1);
    }

    #[tokio::test]
    async fn generate_one_uses_selector_style() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), MockSource::with(&HEADLINES), MockRenderer::default(), settings());

        let record = orch
            .generate_one("Bizarre weather baffles forecasters", None)
            .await
            .unwrap();
        assert_eq!(record.style, Style::Funny);
        assert!(record.artifact_path.exists());

        let record = orch.generate_one("Anything at all", Some(Style::Realistic)).await.unwrap();
        assert_eq!(record.style, Style::Realistic);
        assert_eq!(orch.status().await.total_generated, 2);

        assert_eq!(orch.first_headline().await.unwrap(), HEADLINES[0]);
    }

    #[test]
    fn settings_from_config() {
        let mut config = AppConfig::default();
        config.scheduler.cleanup_enabled = false;
        let s = CycleSettings::from_config(&config);
        assert_eq!(s.fetch_limit, 20);
        assert_eq!(s.max_images_per_run, 3);
        assert_eq!(s.generation_delay, Duration::from_secs(5));
        assert!(s.cleanup_after.is_none());
        assert_eq!(headline_prefix(&"x".repeat(80)).len(), 50);
    }
}
