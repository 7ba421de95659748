//! Citation formatting for completed responses
//!
//! URLs in the response body are replaced by bracketed footnote numbers and
//! a source list is appended. Footnotes are deduplicated by exact URL: two
//! links to different pages of the same site get separate numbers.
//!
//! The transform is pure and idempotent. Text that already carries the
//! source section is returned untouched.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::LazyLock;

/// Heading line that opens the appended source section
pub const SOURCES_HEADING: &str = "**Sources**";

/// Separator placed between the body and the source section
const SOURCES_MARKER: &str = "\n---\n**Sources**\n";

/// Punctuation that ends a sentence rather than a URL
const TRAILING_PUNCTUATION: [char; 3] = ['.', ',', ';'];

// ASCII-only so that a URL directly followed by non-Latin text, quotes or
// brackets stops at the boundary.
static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://[A-Za-z0-9\-._~:/?#@!$&*+,;=%]+").expect("URL pattern is valid")
});

/// Government and public-institution domain suffixes
const PUBLIC_SUFFIXES: &[&str] = &[
    "go.kr", "korea.kr", "gov", "mil", "ac.kr", "edu", "gov.uk", "europa.eu", "who.int", "un.org",
];

/// Known press domains and their display names
const PRESS_DOMAINS: &[(&str, &str)] = &[
    ("ytn.co.kr", "YTN"),
    ("yna.co.kr", "Yonhap News"),
    ("kbs.co.kr", "KBS"),
    ("mbc.co.kr", "MBC"),
    ("sbs.co.kr", "SBS"),
    ("chosun.com", "Chosun Ilbo"),
    ("joongang.co.kr", "JoongAng Ilbo"),
    ("donga.com", "Dong-A Ilbo"),
    ("hani.co.kr", "Hankyoreh"),
    ("khan.co.kr", "Kyunghyang Shinmun"),
    ("reuters.com", "Reuters"),
    ("apnews.com", "AP News"),
    ("bbc.com", "BBC"),
    ("bbc.co.uk", "BBC"),
    ("nytimes.com", "The New York Times"),
];

/// Display names for well-known non-press sites
const SITE_NAMES: &[(&str, &str)] = &[
    ("korea.kr", "Korea.kr"),
    ("law.go.kr", "National Law Information Center"),
    ("data.go.kr", "Public Data Portal"),
    ("wikipedia.org", "Wikipedia"),
    ("github.com", "GitHub"),
];

/// Trust classification shown next to each source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrustLevel {
    Public,
    Press,
    General,
}

impl TrustLevel {
    pub fn icon(&self) -> &'static str {
        match self {
            TrustLevel::Public => "🏛️",
            TrustLevel::Press => "📰",
            TrustLevel::General => "🔗",
        }
    }
}

/// One numbered source derived from a response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub number: usize,
    pub url: String,
    pub domain: String,
    pub trust: TrustLevel,
    pub site_name: String,
}

impl Citation {
    fn new(number: usize, url: &str, domain: String) -> Self {
        Self {
            number,
            url: url.to_string(),
            trust: classify_domain(&domain),
            site_name: site_name(&domain),
            domain,
        }
    }

    /// Icon plus site name, e.g. `📰 YTN`
    pub fn label(&self) -> String {
        format!("{} {}", self.trust.icon(), self.site_name)
    }
}

/// Replace URLs with footnotes and append the source section
pub fn format_citations(text: &str) -> String {
    if text.contains(SOURCES_MARKER) {
        return text.to_string();
    }

    let mut citations: Vec<Citation> = Vec::new();
    let mut numbers: HashMap<String, usize> = HashMap::new();
    let mut body = String::with_capacity(text.len());
    let mut cursor = 0;

    for found in URL_PATTERN.find_iter(text) {
        let raw = found.as_str();
        let url = raw.trim_end_matches(TRAILING_PUNCTUATION);
        let Some(domain) = domain_of(url) else {
            continue;
        };

        let number = *numbers.entry(url.to_string()).or_insert_with(|| {
            let number = citations.len() + 1;
            citations.push(Citation::new(number, url, domain));
            number
        });

        body.push_str(&text[cursor..found.start()]);
        let _ = write!(body, "[{number}]");
        body.push_str(&raw[url.len()..]);
        cursor = found.end();
    }

    if citations.is_empty() {
        return text.to_string();
    }

    body.push_str(&text[cursor..]);
    body.push_str(&render_sources(&citations));
    body
}

fn render_sources(citations: &[Citation]) -> String {
    let mut section = String::from("\n");
    section.push_str(SOURCES_MARKER);
    for citation in citations {
        let _ = writeln!(
            section,
            "[{}] {} - {}",
            citation.number,
            citation.label(),
            citation.url
        );
    }
    section
}

/// Lower-cased host without `www.`, userinfo or port
fn domain_of(url: &str) -> Option<String> {
    let rest = url.split_once("://")?.1;
    let authority = rest.split(['/', '?', '#']).next()?;
    let host = authority.rsplit('@').next()?;
    let host = host.split(':').next()?;
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    let host = host.strip_prefix("www.").map(str::to_string).unwrap_or(host);

    if host.is_empty() || !host.contains('.') {
        None
    } else {
        Some(host)
    }
}

fn matches_domain(domain: &str, entry: &str) -> bool {
    domain == entry
        || domain
            .strip_suffix(entry)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Classify a domain against the static allow-lists
pub fn classify_domain(domain: &str) -> TrustLevel {
    if PUBLIC_SUFFIXES.iter().any(|s| matches_domain(domain, s)) {
        TrustLevel::Public
    } else if PRESS_DOMAINS.iter().any(|(d, _)| matches_domain(domain, d)) {
        TrustLevel::Press
    } else {
        TrustLevel::General
    }
}

/// Human-readable site name, falling back to the bare domain
pub fn site_name(domain: &str) -> String {
    // most specific entry wins, e.g. law.go.kr over go.kr
    PRESS_DOMAINS
        .iter()
        .chain(SITE_NAMES.iter())
        .filter(|(d, _)| matches_domain(domain, d))
        .max_by_key(|(d, _)| d.len())
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| domain.to_string())
}
