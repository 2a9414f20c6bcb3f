//! End-to-end flow for one page: classify it, analyze it directly when it
//! is itself a policy page, otherwise resolve a policy document through the
//! strategy chain.

use crate::analysis::{AnalysisResult, Analyzer};
use crate::discovery::extractor::{extract_title, visible_text};
use crate::discovery::link_scorer::rank_document;
use crate::discovery::{classify_page, extract_document, ExtractedDocument, PageClassification, PageSignals, PolicyCandidate};
use crate::error::{PipelineError, Result};
use crate::resolver::strategies::{default_strategies, DiscoveryEnv};
use crate::resolver::{AttemptLog, MultiStrategyResolver, ResolveTarget, StrategyAttempt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Strategy name reported when the page itself was analyzed.
pub const CURRENT_PAGE: &str = "current-page";

/// A loaded page: its URL and HTML.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    pub url: String,
    pub html: String,
}

/// Where an analyzed document came from.
#[derive(Debug, Clone, Serialize)]
pub struct Provenance {
    pub origin_url: String,
    pub strategy_used: String,
    /// Classifier confidence, set when the page itself was analyzed.
    pub confidence: Option<u32>,
}

/// Final output of a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyReport {
    pub analysis: AnalysisResult,
    pub document: ExtractedDocument,
    pub provenance: Provenance,
    pub attempts: Vec<StrategyAttempt>,
}

/// Outcome of analyzing one candidate in the comparative flow.
#[derive(Debug)]
pub struct CandidateReport {
    pub candidate: PolicyCandidate,
    pub result: Result<PolicyReport>,
}

pub struct Pipeline {
    env: Arc<DiscoveryEnv>,
    analyzer: Arc<dyn Analyzer>,
    resolver: MultiStrategyResolver,
}

impl Pipeline {
    /// A pipeline with the default strategy chain.
    pub fn new(env: Arc<DiscoveryEnv>, analyzer: Arc<dyn Analyzer>) -> Self {
        let resolver = MultiStrategyResolver::new(
            default_strategies(&env),
            Arc::clone(&analyzer),
            env.config.adequacy.link_flow,
        );
        Self::with_resolver(env, analyzer, resolver)
    }

    pub fn with_resolver(
        env: Arc<DiscoveryEnv>,
        analyzer: Arc<dyn Analyzer>,
        resolver: MultiStrategyResolver,
    ) -> Self {
        Self {
            env,
            analyzer,
            resolver,
        }
    }

    pub fn resolver(&self) -> &MultiStrategyResolver {
        &self.resolver
    }

    /// Classify a page and extract its main text.
    pub fn classify(&self, page: &PageSnapshot) -> (PageClassification, ExtractedDocument) {
        let title = extract_title(&page.html);
        let content = visible_text(&page.html);
        let classification = classify_page(
            PageSignals {
                url: &page.url,
                title: &title,
                content: &content,
            },
            &self.env.patterns,
            &self.env.config.classifier,
        );
        (classification, extract_document(&page.html, &page.url))
    }

    /// Produce an analysis for the policy governing `page`.
    pub async fn run(&self, page: &PageSnapshot) -> Result<PolicyReport> {
        let (classification, document) = self.classify(page);
        let current_min = self.env.config.adequacy.current_page;

        if classification.is_policy_page {
            if document.is_adequate(current_min) {
                info!(
                    url = %page.url,
                    confidence = classification.confidence_score,
                    "page is a policy page, analyzing in place"
                );
                let analysis = self.analyzer.analyze(&document.text).await?;
                return Ok(PolicyReport {
                    analysis,
                    provenance: Provenance {
                        origin_url: page.url.clone(),
                        strategy_used: CURRENT_PAGE.to_string(),
                        confidence: Some(classification.confidence_score),
                    },
                    document,
                    attempts: Vec::new(),
                });
            }
            info!(
                url = %page.url,
                chars = document.length_chars,
                "classified as policy but text is too short, resolving instead"
            );
        } else {
            debug!(
                url = %page.url,
                confidence = classification.confidence_score,
                "not a policy page"
            );
        }

        let target = ResolveTarget::new(&page.url, Some(page.html.clone()))?;
        let resolution = self.resolver.resolve(&target).await?;
        Ok(PolicyReport {
            analysis: resolution.analysis,
            provenance: Provenance {
                origin_url: resolution.document.origin_url.clone(),
                strategy_used: resolution.strategy_used,
                confidence: None,
            },
            document: resolution.document,
            attempts: resolution.attempts,
        })
    }

    /// Analyze the primary candidate and every secondary candidate above the
    /// relevance floor, one at a time.
    pub async fn run_all_candidates(&self, page: &PageSnapshot) -> Result<Vec<CandidateReport>> {
        let ranking = rank_document(
            &page.html,
            &page.url,
            &self.env.patterns,
            &self.env.config.links,
        );
        let Some(primary) = ranking.primary() else {
            return Err(PipelineError::NoCandidate(format!(
                "no policy-like links on {}",
                page.url
            )));
        };

        let mut reports = Vec::new();
        for candidate in std::iter::once(primary).chain(ranking.secondary()) {
            match self.analyze_candidate(candidate).await {
                Err(e) if e.is_retryable() => return Err(e),
                result => reports.push(CandidateReport {
                    candidate: candidate.clone(),
                    result,
                }),
            }
        }
        Ok(reports)
    }

    async fn analyze_candidate(&self, candidate: &PolicyCandidate) -> Result<PolicyReport> {
        let mut log = AttemptLog::new();
        let document = self.env.fetch_candidate(&candidate.url, &mut log).await?;
        let analysis = self.analyzer.analyze(&document.text).await?;
        Ok(PolicyReport {
            analysis,
            provenance: Provenance {
                origin_url: document.origin_url.clone(),
                strategy_used: "candidate".to_string(),
                confidence: None,
            },
            document,
            attempts: log.into_entries(),
        })
    }
}
