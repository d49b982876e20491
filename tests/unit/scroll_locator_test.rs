//! Unit tests for scroll-container discovery and change detection.

use rstest::rstest;

use prompttrail::dom::{HostDocument, MemoryDocument, NodeId};
use prompttrail::services::scroll_locator::{locate_scroll_container, ContainerChange, ScrollContainerPoller};
use prompttrail::types::geometry::{Overflow, ScrollMetrics};

const ATTR: &str = "data-message-id";

struct Page {
    doc: MemoryDocument,
    outer: NodeId,
    inner: NodeId,
}

/// `html > body > outer > inner > message`, with nothing scrollable yet.
fn page() -> Page {
    let mut doc = MemoryDocument::new();
    let body = doc.append_element(doc.root(), "body");
    let outer = doc.append_element(body, "div");
    let inner = doc.append_element(outer, "div");
    let message = doc.append_element(inner, "div");
    doc.set_attribute(message, ATTR, "m1");
    doc.append_text(message, "hi");
    Page { doc, outer, inner }
}

fn make_scrollable(doc: &mut MemoryDocument, node: NodeId) {
    doc.set_overflow_y(node, Overflow::Auto);
    doc.set_scroll_metrics(node, ScrollMetrics::new(0.0, 3000.0, 700.0));
}

#[test]
fn test_no_transcript_falls_back_to_document() {
    let doc = MemoryDocument::new();
    assert_eq!(locate_scroll_container(&doc, ATTR), doc.scrolling_element());
}

#[test]
fn test_nothing_scrollable_falls_back_to_document() {
    let p = page();
    assert_eq!(locate_scroll_container(&p.doc, ATTR), p.doc.scrolling_element());
}

#[test]
fn test_nearest_scrollable_ancestor_wins() {
    let mut p = page();
    make_scrollable(&mut p.doc, p.outer);
    make_scrollable(&mut p.doc, p.inner);
    assert_eq!(locate_scroll_container(&p.doc, ATTR), p.inner);
}

#[rstest]
#[case(Overflow::Visible, false)]
#[case(Overflow::Hidden, false)]
#[case(Overflow::Clip, false)]
#[case(Overflow::Auto, true)]
#[case(Overflow::Scroll, true)]
fn test_overflow_style_must_allow_scrolling(#[case] overflow: Overflow, #[case] picked: bool) {
    let mut p = page();
    p.doc.set_overflow_y(p.inner, overflow);
    p.doc.set_scroll_metrics(p.inner, ScrollMetrics::new(0.0, 3000.0, 700.0));
    let found = locate_scroll_container(&p.doc, ATTR);
    assert_eq!(found == p.inner, picked);
}

#[test]
fn test_content_must_exceed_box() {
    let mut p = page();
    p.doc.set_overflow_y(p.inner, Overflow::Scroll);
    p.doc.set_scroll_metrics(p.inner, ScrollMetrics::new(0.0, 700.0, 700.0));
    assert_ne!(locate_scroll_container(&p.doc, ATTR), p.inner);
}

// ─── Poller ───

#[test]
fn test_first_poll_reports_container() {
    let mut p = page();
    make_scrollable(&mut p.doc, p.inner);
    let mut poller = ScrollContainerPoller::new(ATTR);
    assert_eq!(
        poller.poll(&p.doc),
        Some(ContainerChange {
            previous: None,
            current: p.inner
        })
    );
    assert_eq!(poller.poll(&p.doc), None);
    assert_eq!(poller.current(), Some(p.inner));
}

#[test]
fn test_poll_detects_silent_container_swap() {
    let mut p = page();
    make_scrollable(&mut p.doc, p.inner);
    let mut poller = ScrollContainerPoller::new(ATTR);
    poller.poll(&p.doc);

    // The host moves scrolling to the outer element without any event.
    p.doc.set_overflow_y(p.inner, Overflow::Visible);
    make_scrollable(&mut p.doc, p.outer);

    assert_eq!(
        poller.poll(&p.doc),
        Some(ContainerChange {
            previous: Some(p.inner),
            current: p.outer
        })
    );
}

#[test]
fn test_reset_reports_again() {
    let p = page();
    let mut poller = ScrollContainerPoller::new(ATTR);
    assert!(poller.poll(&p.doc).is_some());
    poller.reset();
    assert!(poller.poll(&p.doc).is_some());
}
