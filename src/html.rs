#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Small helpers over `scraper` shared by the page parsers.

use itertools::Itertools;
use scraper::{ElementRef, Html, Selector};

/// Compiles a selector that is known at compile time.
pub(crate) fn selector(css: &'static str) -> Selector {
    Selector::parse(css).unwrap_or_else(|err| panic!("invalid built-in selector `{css}`: {err}"))
}

/// Parses an HTML document.
pub(crate) fn document(body: &str) -> Html {
    Html::parse_document(body)
}

/// Text content of an element with runs of whitespace collapsed to one space.
pub(crate) fn text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .join(" ")
}

/// Raw text content of an element, only trimmed.
pub(crate) fn raw_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Class list of an element.
pub(crate) fn classes(element: ElementRef<'_>) -> Vec<String> {
    element.value().classes().map(str::to_string).collect()
}

/// True if the element carries `class`.
pub(crate) fn has_class(element: ElementRef<'_>, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

/// First anchor in `doc` whose collapsed text equals `label`.
pub(crate) fn link_with_text<'a>(doc: &'a Html, label: &str) -> Option<ElementRef<'a>> {
    let anchors = selector("a[href]");
    doc.select(&anchors).find(|a| text(*a) == label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_collapses_whitespace() {
        let doc = document("<p id='x'>  Wrong\n\t output  </p>");
        let p = doc.select(&selector("#x")).next().expect("paragraph");
        assert_eq!(text(p), "Wrong output");
    }

    #[test]
    fn finds_links_by_label() {
        let doc = document("<a href='/a'>Overview</a><a href='/b'>Status</a>");
        let link = link_with_text(&doc, "Status").expect("status link");
        assert_eq!(link.value().attr("href"), Some("/b"));
    }
}
