//! Site-restricted web search over an HTML results page.
//!
//! The default endpoint is DuckDuckGo's HTML frontend. Result anchors there
//! point at a `/l/?uddg=<target>` redirect, which is unwrapped here so callers
//! only ever see the destination URL.

use scraper::{ElementRef, Html, Selector};

/// Result-anchor selectors, tried in order.
const RESULT_SELECTORS: &[&str] = &["a.result__a", "li.b_algo h2 a", "h3.r a"];

/// Ancestor classes marking sponsored results.
const AD_CLASSES: &[&str] = &["result--ad", "b_ad"];

/// The query used to find a domain's policy documents.
pub fn policy_query(domain: &str) -> String {
    format!("site:{domain} \"privacy policy\" OR \"terms of service\"")
}

/// Full search URL for `query` against the configured endpoint.
pub fn search_url(endpoint: &str, query: &str) -> Option<String> {
    let mut url = url::Url::parse(endpoint).ok()?;
    url.query_pairs_mut().append_pair("q", query);
    Some(url.to_string())
}

/// Organic result URLs from a results page, in page order.
pub fn parse_results(html: &str, page_url: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let base = url::Url::parse(page_url).ok();

    for sel_str in RESULT_SELECTORS {
        let Ok(sel) = Selector::parse(sel_str) else {
            continue;
        };
        let urls: Vec<String> = document
            .select(&sel)
            .filter(|el| !is_sponsored(el))
            .filter_map(|el| el.value().attr("href"))
            .filter_map(|href| resolve_result(href, base.as_ref()))
            .collect();
        if !urls.is_empty() {
            return urls;
        }
    }
    Vec::new()
}

/// Whether `url` belongs to `domain` or one of its subdomains.
pub fn on_domain(url: &str, domain: &str) -> bool {
    let Some(host) = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
    else {
        return false;
    };
    let domain = domain.to_ascii_lowercase();
    host == domain || host.ends_with(&format!(".{domain}"))
}

fn is_sponsored(el: &ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| a.value().classes().any(|c| AD_CLASSES.contains(&c)))
}

fn resolve_result(href: &str, base: Option<&url::Url>) -> Option<String> {
    let parsed = match base {
        Some(base) => base.join(href).ok()?,
        None => url::Url::parse(href).ok()?,
    };

    if parsed.path().starts_with("/l/") {
        let target = parsed
            .query_pairs()
            .find(|(k, _)| k == "uddg")
            .map(|(_, v)| v.into_owned())?;
        return url::Url::parse(&target).ok().map(|u| u.to_string());
    }

    matches!(parsed.scheme(), "http" | "https").then(|| parsed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS: &str = r#"<html><body>
      <div class="result result--ad">
        <a class="result__a" href="https://ads.example/buy">Buy now</a>
      </div>
      <div class="result">
        <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Facme.example%2Flegal%2Fprivacy&amp;rut=abc">Privacy Policy | Acme</a>
      </div>
      <div class="result">
        <a class="result__a" href="https://acme.example/terms">Terms of Service</a>
      </div>
    </body></html>"#;

    #[test]
    fn test_parse_results_unwraps_redirects_and_skips_ads() {
        let urls = parse_results(RESULTS, "https://html.duckduckgo.com/html/?q=x");
        assert_eq!(
            urls,
            vec!["https://acme.example/legal/privacy", "https://acme.example/terms"]
        );
    }

    #[test]
    fn test_search_url_encodes_query() {
        let url = search_url("https://html.duckduckgo.com/html/", &policy_query("acme.example"))
            .unwrap();
        assert!(url.starts_with("https://html.duckduckgo.com/html/?q=site%3Aacme.example"));
        assert!(search_url("not a url", "q").is_none());
    }

    #[test]
    fn test_on_domain() {
        assert!(on_domain("https://acme.example/privacy", "acme.example"));
        assert!(on_domain("https://www.acme.example/privacy", "acme.example"));
        assert!(!on_domain("https://notacme.example/privacy", "acme.example"));
        assert!(!on_domain("garbage", "acme.example"));
    }

    #[test]
    fn test_no_results() {
        assert!(parse_results("<html><body>No results.</body></html>", "https://x.example/").is_empty());
    }
}
