// src/utils/html.rs

//! HTML text and link helpers.

use std::collections::HashSet;

use scraper::{Html, Node, Selector};

use crate::error::{AppError, Result};
use crate::utils::url::normalize;

/// Elements whose text never counts as visible page content.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript"];

/// Collapse all whitespace runs into single spaces.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Visible text of a parsed page, whitespace-collapsed.
pub fn page_text(document: &Html) -> String {
    let mut parts = Vec::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| match ancestor.value() {
            Node::Element(el) => HIDDEN_ELEMENTS.contains(&el.name()),
            _ => false,
        });
        if !hidden {
            parts.push(&**text);
        }
    }
    collapse_whitespace(&parts.join(" "))
}

/// Strip markup from an HTML fragment, keeping its text.
pub fn strip_html(fragment: &str) -> String {
    let parsed = Html::parse_fragment(fragment);
    collapse_whitespace(&parsed.root_element().text().collect::<Vec<_>>().join(" "))
}

/// All normalized outbound links of a page, first occurrence order, no duplicates.
pub fn extract_links(document: &Html, base_url: &str) -> Result<Vec<String>> {
    let selector =
        Selector::parse("a[href]").map_err(|e| AppError::crawl(base_url, format!("{e:?}")))?;

    let mut seen = HashSet::new();
    Ok(document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| normalize(base_url, href))
        .filter(|link| seen.insert(link.clone()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_text_skips_scripts_and_styles() {
        let doc = Html::parse_document(
            r#"<html><head><style>body { color: red }</style>
            <script>var food = "free pizza";</script></head>
            <body><h1>Chess   Club</h1><noscript>enable js</noscript>
            <p>Weekly
            meeting</p></body></html>"#,
        );
        assert_eq!(page_text(&doc), "Chess Club Weekly meeting");
    }

    #[test]
    fn test_strip_html() {
        assert_eq!(
            strip_html("<p>Join us for <strong>free pizza</strong>!</p><br/>All welcome"),
            "Join us for free pizza ! All welcome"
        );
        assert_eq!(strip_html("plain text"), "plain text");
    }

    #[test]
    fn test_extract_links_normalizes_and_dedups() {
        let doc = Html::parse_document(
            r##"<body>
            <a href="/events/1">one</a>
            <a href="/events/1#details">one again</a>
            <a href="mailto:x@example.edu">mail</a>
            <a href="about.html">about</a>
            <a>no href</a>
            </body>"##,
        );
        let links = extract_links(&doc, "https://example.edu/home/").unwrap();
        assert_eq!(
            links,
            vec![
                "https://example.edu/events/1".to_string(),
                "https://example.edu/home/about.html".to_string(),
            ]
        );
    }
}
