//! HTTP-based acquisition: page fetches, sitemaps and web search.
//!
//! None of this needs a browser. The renderer is only brought in when these
//! paths fail to produce usable text.

pub mod http_client;
pub mod search;
pub mod sitemap;

pub use http_client::{HttpClient, HttpResponse};
