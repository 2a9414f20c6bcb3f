//! In-document discovery: classify the active page, rank its outbound links,
//! and extract clean text from whatever document is finally chosen.
//!
//! Everything here is synchronous and side-effect free. Network access and
//! browser rendering live in `acquisition` and `renderer`.

pub mod classifier;
pub mod extractor;
pub mod link_scorer;
pub mod site_overrides;

pub use classifier::{classify_page, PageClassification, PageSignals};
pub use extractor::{extract_document, normalize_whitespace, ExtractedDocument};
pub use link_scorer::{rank_document, CandidateRanking, PolicyCandidate};
