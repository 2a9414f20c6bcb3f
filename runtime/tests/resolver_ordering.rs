//! Resolver ordering and short-circuit behavior with scripted strategies.

mod common;

use async_trait::async_trait;
use common::{CannedAnalyzer, FailingAnalyzer};
use policyscope_runtime::analysis::AnalysisError;
use policyscope_runtime::discovery::ExtractedDocument;
use policyscope_runtime::error::{PipelineError, Result};
use policyscope_runtime::resolver::{
    AttemptLog, MultiStrategyResolver, ResolveTarget, Strategy, StrategyAttempt,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

enum Script {
    Fail,
    Short,
    Succeed,
}

struct ScriptedStrategy {
    name: &'static str,
    script: Script,
    calls: Arc<AtomicUsize>,
}

impl ScriptedStrategy {
    fn boxed(name: &'static str, script: Script) -> (Box<dyn Strategy>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let strategy = Self {
            name,
            script,
            calls: Arc::clone(&calls),
        };
        (Box::new(strategy), calls)
    }
}

#[async_trait]
impl Strategy for ScriptedStrategy {
    fn name(&self) -> &str {
        self.name
    }

    async fn discover(&self, target: &ResolveTarget, _log: &mut AttemptLog) -> Result<ExtractedDocument> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script {
            Script::Fail => Err(PipelineError::NoCandidate(format!("{} found nothing", self.name))),
            Script::Short => Ok(ExtractedDocument::new("Loading...", &target.url)),
            Script::Succeed => Ok(ExtractedDocument::new(
                &"We collect personal information. ".repeat(10),
                &format!("{}privacy", target.url),
            )),
        }
    }
}

/// A strategy that records a sub-attempt before failing.
struct NoisyStrategy;

#[async_trait]
impl Strategy for NoisyStrategy {
    fn name(&self) -> &str {
        "noisy"
    }

    async fn discover(&self, _target: &ResolveTarget, log: &mut AttemptLog) -> Result<ExtractedDocument> {
        log.record(StrategyAttempt::failure("noisy-sub", "timed out", Instant::now()));
        Err(PipelineError::DynamicContent {
            url: "https://social.example/privacy".to_string(),
        })
    }
}

fn target() -> ResolveTarget {
    ResolveTarget::new("https://acme.example/", None).unwrap()
}

#[tokio::test]
async fn test_only_third_strategy_succeeds() {
    let (s1, c1) = ScriptedStrategy::boxed("one", Script::Fail);
    let (s2, c2) = ScriptedStrategy::boxed("two", Script::Fail);
    let (s3, c3) = ScriptedStrategy::boxed("three", Script::Succeed);
    let (s4, c4) = ScriptedStrategy::boxed("four", Script::Succeed);
    let (s5, c5) = ScriptedStrategy::boxed("five", Script::Succeed);
    let analyzer = Arc::new(CannedAnalyzer::complete());

    let resolver = MultiStrategyResolver::new(vec![s1, s2, s3, s4, s5], analyzer.clone(), 100);
    let resolution = resolver.resolve(&target()).await.unwrap();

    assert_eq!(resolution.strategy_used, "three");
    assert_eq!(resolution.document.origin_url, "https://acme.example/privacy");
    assert!(resolution.analysis.is_complete());

    let names: Vec<_> = resolution.attempts.iter().map(|a| a.strategy_name.as_str()).collect();
    assert_eq!(names, vec!["one", "two", "three"]);
    assert!(!resolution.attempts[0].succeeded);
    assert!(!resolution.attempts[1].succeeded);
    assert!(resolution.attempts[2].succeeded);
    assert!(resolution.attempts[2].result_document.is_some());

    for (calls, expected) in [(&c1, 1), (&c2, 1), (&c3, 1), (&c4, 0), (&c5, 0)] {
        assert_eq!(calls.load(Ordering::SeqCst), expected);
    }
    assert_eq!(analyzer.calls(), 1);
}

#[tokio::test]
async fn test_short_document_is_a_failure_without_analysis() {
    let (s1, _) = ScriptedStrategy::boxed("short", Script::Short);
    let (s2, _) = ScriptedStrategy::boxed("good", Script::Succeed);
    let analyzer = Arc::new(CannedAnalyzer::complete());

    let resolver = MultiStrategyResolver::new(vec![s1, s2], analyzer.clone(), 100);
    let resolution = resolver.resolve(&target()).await.unwrap();

    assert_eq!(resolution.strategy_used, "good");
    let first = &resolution.attempts[0];
    assert!(first.error.as_deref().unwrap().contains("content too short"));
    // Only the adequate document reached the analyzer.
    assert_eq!(analyzer.calls(), 1);
}

#[tokio::test]
async fn test_incomplete_analysis_moves_to_next_strategy() {
    let (s1, c1) = ScriptedStrategy::boxed("a", Script::Succeed);
    let (s2, c2) = ScriptedStrategy::boxed("b", Script::Succeed);
    let analyzer = Arc::new(CannedAnalyzer::with_points(3));

    let resolver = MultiStrategyResolver::new(vec![s1, s2], analyzer.clone(), 100);
    let err = resolver.resolve(&target()).await.unwrap_err();

    match err {
        PipelineError::AllStrategiesExhausted { attempts } => {
            assert_eq!(attempts.len(), 2);
            assert!(attempts.iter().all(|a| !a.succeeded));
            assert!(attempts[0].error.as_deref().unwrap().contains("3 summary points"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(c1.load(Ordering::SeqCst), 1);
    assert_eq!(c2.load(Ordering::SeqCst), 1);
    assert_eq!(analyzer.calls(), 2);
}

#[tokio::test]
async fn test_exhaustion_keeps_sub_attempts_in_order() {
    let (s1, _) = ScriptedStrategy::boxed("first", Script::Fail);
    let resolver = MultiStrategyResolver::new(
        vec![s1, Box::new(NoisyStrategy)],
        Arc::new(CannedAnalyzer::complete()),
        100,
    );
    let err = resolver.resolve(&target()).await.unwrap_err();
    assert!(err.hint().contains("policy page directly"));

    let PipelineError::AllStrategiesExhausted { attempts } = err else {
        panic!("expected exhaustion");
    };
    let names: Vec<_> = attempts.iter().map(|a| a.strategy_name.as_str()).collect();
    assert_eq!(names, vec!["first", "noisy-sub", "noisy"]);
    assert!(attempts[2].error.as_deref().unwrap().contains("dynamic content"));
}

#[tokio::test]
async fn test_rate_limited_backend_stops_the_chain() {
    let (s1, c1) = ScriptedStrategy::boxed("a", Script::Succeed);
    let (s2, c2) = ScriptedStrategy::boxed("b", Script::Succeed);
    let analyzer = Arc::new(FailingAnalyzer(|| AnalysisError::RateLimited("HTTP 429".into())));

    let resolver = MultiStrategyResolver::new(vec![s1, s2], analyzer, 100);
    let err = resolver.resolve(&target()).await.unwrap_err();

    assert!(matches!(err, PipelineError::UpstreamRateLimited(_)));
    assert!(err.is_retryable());
    assert_eq!(c1.load(Ordering::SeqCst), 1);
    assert_eq!(c2.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_chain_is_exhausted() {
    let resolver = MultiStrategyResolver::new(Vec::new(), Arc::new(CannedAnalyzer::complete()), 100);
    assert!(resolver.strategy_names().is_empty());
    let err = resolver.resolve(&target()).await.unwrap_err();
    assert!(matches!(err, PipelineError::AllStrategiesExhausted { ref attempts } if attempts.is_empty()));
}
