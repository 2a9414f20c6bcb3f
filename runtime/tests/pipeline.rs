//! Whole-pipeline runs: in-place analysis, resolution and exhaustion.

mod common;

use common::{fast_config, policy_html, CannedAnalyzer, FailingAnalyzer};
use policyscope_runtime::analysis::AnalysisError;
use policyscope_runtime::error::PipelineError;
use policyscope_runtime::pipeline::{PageSnapshot, Pipeline, CURRENT_PAGE};
use policyscope_runtime::renderer::NoopRenderer;
use policyscope_runtime::resolver::strategies::DiscoveryEnv;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STOREFRONT: &str = r#"<html><head><title>Acme</title></head><body>
  <main><h1>Boots</h1><p>Waterproof, warm, on sale.</p></main>
  <footer><a href="/careers">Careers</a><a href="/terms">Terms</a>
  <a href="/privacy-policy">Privacy Policy</a></footer>
</body></html>"#;

fn pipeline(search_url: Option<String>, analyzer: Arc<CannedAnalyzer>) -> Pipeline {
    let mut config = fast_config();
    if let Some(url) = search_url {
        config.resolver.search_url = url;
    }
    let env = Arc::new(DiscoveryEnv::new(config, Arc::new(NoopRenderer)));
    Pipeline::new(env, analyzer)
}

async fn serve(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_policy_page_is_analyzed_in_place() {
    let analyzer = Arc::new(CannedAnalyzer::complete());
    let pipeline = pipeline(None, analyzer.clone());
    let page = PageSnapshot {
        url: "https://acme.example/privacy".to_string(),
        html: policy_html("Privacy Policy"),
    };

    let report = pipeline.run(&page).await.unwrap();
    assert_eq!(report.provenance.strategy_used, CURRENT_PAGE);
    assert_eq!(report.provenance.origin_url, page.url);
    assert!(report.provenance.confidence.unwrap() >= 70);
    assert!(report.attempts.is_empty());
    assert_eq!(analyzer.calls(), 1);
}

#[tokio::test]
async fn test_storefront_resolves_through_standard() {
    let server = MockServer::start().await;
    serve(&server, "/privacy-policy", policy_html("Privacy Policy")).await;

    let analyzer = Arc::new(CannedAnalyzer::complete());
    let pipeline = pipeline(None, analyzer.clone());
    let page = PageSnapshot {
        url: format!("{}/", server.uri()),
        html: STOREFRONT.to_string(),
    };

    let report = pipeline.run(&page).await.unwrap();
    assert_eq!(report.provenance.strategy_used, "standard");
    assert_eq!(report.provenance.origin_url, format!("{}/privacy-policy", server.uri()));
    assert_eq!(report.provenance.confidence, None);
    assert_eq!(report.analysis.summary_points.len(), 7);
    assert_eq!(report.attempts.len(), 1);
    assert!(report.attempts[0].succeeded);

    // The text sent for analysis is the policy, not the storefront.
    let texts = analyzer.texts.lock().unwrap();
    assert!(texts[0].contains("We collect personal information"));
}

#[tokio::test]
async fn test_every_strategy_failing_reports_all_attempts() {
    let server = MockServer::start().await;
    serve(&server, "/html/", "<html><body>No results.</body></html>".to_string()).await;

    let pipeline = pipeline(
        Some(format!("{}/html/", server.uri())),
        Arc::new(CannedAnalyzer::complete()),
    );
    let page = PageSnapshot {
        url: format!("{}/", server.uri()),
        html: "<html><body><p>Welcome</p></body></html>".to_string(),
    };

    let err = pipeline.run(&page).await.unwrap_err();
    assert!(!err.is_retryable());
    let PipelineError::AllStrategiesExhausted { attempts } = err else {
        panic!("expected exhaustion");
    };
    let names: Vec<_> = attempts.iter().map(|a| a.strategy_name.as_str()).collect();
    assert_eq!(names, vec!["standard", "enhanced", "direct-guess", "search", "sitemap"]);
    assert!(attempts.iter().all(|a| !a.succeeded && a.error.is_some()));
    assert!(attempts[1].error.as_deref().unwrap().contains("browser unavailable"));
}

#[tokio::test]
async fn test_upstream_outage_surfaces_as_retryable() {
    let server = MockServer::start().await;
    serve(&server, "/privacy-policy", policy_html("Privacy Policy")).await;

    let env = Arc::new(DiscoveryEnv::new(fast_config(), Arc::new(NoopRenderer)));
    let pipeline = Pipeline::new(
        env,
        Arc::new(FailingAnalyzer(|| AnalysisError::Unavailable("HTTP 503".into()))),
    );
    let page = PageSnapshot {
        url: format!("{}/", server.uri()),
        html: STOREFRONT.to_string(),
    };

    let err = pipeline.run(&page).await.unwrap_err();
    assert!(matches!(err, PipelineError::UpstreamUnavailable(_)));
    assert!(err.hint().contains("try again later"));
}

#[tokio::test]
async fn test_all_candidates_are_analyzed_in_rank_order() {
    let server = MockServer::start().await;
    serve(&server, "/privacy-policy", policy_html("Privacy Policy")).await;
    serve(&server, "/terms", policy_html("Terms of Service")).await;

    let analyzer = Arc::new(CannedAnalyzer::complete());
    let pipeline = pipeline(None, analyzer.clone());
    let page = PageSnapshot {
        url: format!("{}/", server.uri()),
        html: STOREFRONT.to_string(),
    };

    let reports = pipeline.run_all_candidates(&page).await.unwrap();
    assert!(!reports.is_empty());
    assert!(reports[0].candidate.url.ends_with("/privacy-policy"));
    for report in &reports {
        let result = report.result.as_ref().unwrap();
        assert_eq!(result.provenance.strategy_used, "candidate");
        assert_eq!(result.provenance.origin_url, report.candidate.url);
    }
    assert_eq!(analyzer.calls(), reports.len());
}

#[tokio::test]
async fn test_all_candidates_without_links() {
    let pipeline = pipeline(None, Arc::new(CannedAnalyzer::complete()));
    let page = PageSnapshot {
        url: "https://acme.example/".to_string(),
        html: "<p>No links here</p>".to_string(),
    };
    assert!(matches!(
        pipeline.run_all_candidates(&page).await,
        Err(PipelineError::NoCandidate(_))
    ));
}
