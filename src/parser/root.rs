use scraper::node::Node;
use scraper::{ElementRef, Html};

use crate::error::ParseError;

/// Find the first `tag` element in document order (node first, then its
/// children left to right).
///
/// The tree is html5ever's arena, so the walk is an explicit stack of node
/// handles instead of recursion.
pub fn find_root<'a>(doc: &'a Html, tag: &str) -> Result<ElementRef<'a>, ParseError> {
    let mut stack = vec![doc.tree.root()];
    while let Some(node) = stack.pop() {
        if let Node::Element(el) = node.value() {
            if el.name().eq_ignore_ascii_case(tag) {
                if let Some(found) = ElementRef::wrap(node) {
                    return Ok(found);
                }
            }
        }
        let children: Vec<_> = node.children().collect();
        stack.extend(children.into_iter().rev());
    }
    Err(ParseError::RootNotFound {
        tag: tag.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_body() {
        let doc = Html::parse_document("<html><head><title>t</title></head><body><p>x</p></body></html>");
        let body = find_root(&doc, "body").unwrap();
        assert_eq!(body.value().name(), "body");
        assert!(body.html().contains("<p>x</p>"));
    }

    #[test]
    fn first_match_in_document_order() {
        let doc = Html::parse_document(
            r#"<div id="outer"><section id="a"><section id="nested"></section></section><section id="b"></section></div>"#,
        );
        let found = find_root(&doc, "section").unwrap();
        assert_eq!(found.value().attr("id"), Some("a"));
    }

    #[test]
    fn depth_before_breadth() {
        let doc = Html::parse_document(
            r#"<div><span><em id="deep"></em></span></div><em id="shallow"></em>"#,
        );
        let found = find_root(&doc, "em").unwrap();
        assert_eq!(found.value().attr("id"), Some("deep"));
    }

    #[test]
    fn missing_root() {
        let doc = Html::parse_fragment("<p>no body element here</p>");
        let err = find_root(&doc, "body").unwrap_err();
        assert!(matches!(err, ParseError::RootNotFound { ref tag } if tag == "body"));
    }
}
