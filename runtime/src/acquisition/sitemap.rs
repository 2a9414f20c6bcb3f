//! Parse sitemap.xml, sitemap index files and robots.txt hints.

use anyhow::Result;
use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use std::sync::OnceLock;

use crate::patterns::PatternLibrary;

/// An entry from a sitemap `<urlset>`.
#[derive(Debug, Clone)]
pub struct SitemapEntry {
    pub url: String,
    pub lastmod: Option<DateTime<Utc>>,
}

/// A parsed sitemap document.
#[derive(Debug, Clone, Default)]
pub struct Sitemap {
    /// Page URLs from `<url><loc>`.
    pub entries: Vec<SitemapEntry>,
    /// Child sitemaps from `<sitemap><loc>` (sitemap index files).
    pub nested: Vec<String>,
}

/// Parse a sitemap XML string. Handles both `urlset` and `sitemapindex`.
pub fn parse_sitemap(xml: &str) -> Result<Sitemap> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut sitemap = Sitemap::default();
    let mut buf = Vec::new();

    let mut in_url = false;
    let mut in_sitemap = false;
    let mut current_tag = String::new();
    let mut current_loc = String::new();
    let mut current_lastmod = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match name.as_str() {
                    "url" => {
                        in_url = true;
                        current_loc.clear();
                        current_lastmod.clear();
                    }
                    "sitemap" => {
                        in_sitemap = true;
                        current_loc.clear();
                    }
                    _ => current_tag = name,
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match name.as_str() {
                    "url" if in_url => {
                        if !current_loc.is_empty() {
                            sitemap.entries.push(SitemapEntry {
                                url: current_loc.clone(),
                                lastmod: parse_date(&current_lastmod),
                            });
                        }
                        in_url = false;
                    }
                    "sitemap" if in_sitemap => {
                        if !current_loc.is_empty() {
                            sitemap.nested.push(current_loc.clone());
                        }
                        in_sitemap = false;
                    }
                    _ => current_tag.clear(),
                }
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                if (in_url || in_sitemap) && current_tag == "loc" {
                    current_loc = text.trim().to_string();
                } else if in_url && current_tag == "lastmod" {
                    current_lastmod = text.trim().to_string();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow::anyhow!("XML parse error: {e}")),
            _ => {}
        }
        buf.clear();
    }

    Ok(sitemap)
}

/// `Sitemap:` lines from a robots.txt body.
pub fn robots_sitemaps(robots: &str) -> Vec<String> {
    robots
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            if key.trim().eq_ignore_ascii_case("sitemap") {
                let value = value.trim();
                (!value.is_empty()).then(|| value.to_string())
            } else {
                None
            }
        })
        .collect()
}

/// Absolute URLs found anywhere in a text body.
///
/// Used when a sitemap is served as plain text or is malformed XML.
pub fn scan_urls(text: &str) -> Vec<String> {
    static URL_RE: OnceLock<Option<Regex>> = OnceLock::new();
    let Some(re) = URL_RE
        .get_or_init(|| Regex::new(r#"https?://[^\s<>"']+"#).ok())
        .as_ref()
    else {
        return Vec::new();
    };
    re.find_iter(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ')']).to_string())
        .collect()
}

/// Rank sitemap URLs by how policy-like they look, best first.
///
/// URLs carrying the privacy-policy token outrank plain pattern hits; among
/// equals the higher pattern weight wins and then document order.
pub fn policy_urls(urls: &[String], patterns: &PatternLibrary) -> Vec<String> {
    let mut scored: Vec<(bool, u32, &String)> = urls
        .iter()
        .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
        .filter_map(|u| {
            let weight = patterns.link.best_weight(u)?;
            Some((patterns.has_policy_token(u), weight, u))
        })
        .collect();
    scored.sort_by(|a, b| (b.0, b.1).cmp(&(a.0, a.1)));

    let mut out: Vec<String> = Vec::with_capacity(scored.len());
    for (_, _, url) in scored {
        if !out.contains(url) {
            out.push(url.clone());
        }
    }
    out
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = s.parse::<DateTime<Utc>>() {
        return Some(dt);
    }
    if let Ok(d) = chrono::NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
        return Some(d.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}
