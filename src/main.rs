//! PromptTrail — text anchors and scroll-rail bookmarks for conversation transcripts.
//!
//! Console demo: builds a synthetic transcript in memory and walks through
//! selection, bookmarking, marker placement, reveal and persistence.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use prompttrail::app::{load_settings, HostEvent, TrailSession};
use prompttrail::database::{Database, SqliteStorage};
use prompttrail::dom::{HostDocument, MemoryDocument, NodeId};
use prompttrail::rpc_handler::handle_method;
use prompttrail::services::selection_tracker::SelectionState;
use prompttrail::types::geometry::{Overflow, Rect, ScrollMetrics};
use serde_json::json;

fn main() {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║              PromptTrail v{} — Demo Mode                  ║", env!("CARGO_PKG_VERSION"));
    println!("║     Text anchors and bookmarks for chat transcripts         ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime");
    let local = tokio::task::LocalSet::new();
    local.block_on(&runtime, run_demo());

    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("  ✅ All components demonstrated successfully!");
    println!("═══════════════════════════════════════════════════════════════");
}

fn section(name: &str) {
    println!("───────────────────────────────────────────────────────────────");
    println!("  📦 {}", name);
    println!("───────────────────────────────────────────────────────────────");
}

struct Transcript {
    doc: MemoryDocument,
    container: NodeId,
    first_message: NodeId,
    first_text: NodeId,
}

/// Two messages inside a scrollable `main` element.
fn build_transcript() -> Transcript {
    let mut doc = MemoryDocument::new();
    let root = doc.root();
    let body = doc.append_element(root, "body");
    let container = doc.append_element(body, "main");
    doc.set_overflow_y(container, Overflow::Auto);
    doc.set_scroll_metrics(container, ScrollMetrics::new(0.0, 2000.0, 600.0));
    doc.set_rect(container, Rect::new(0.0, 0.0, 800.0, 600.0));

    let first_message = doc.append_element(container, "div");
    doc.set_attribute(first_message, "data-message-id", "msg-user-1");
    doc.set_attribute(first_message, "data-message-author-role", "user");
    doc.set_rect(first_message, Rect::new(100.0, 0.0, 800.0, 80.0));
    let p = doc.append_element(first_message, "p");
    let first_text = doc.append_text(p, "Hello world");
    doc.set_rect(first_text, Rect::new(120.0, 0.0, 200.0, 20.0));

    let second = doc.append_element(container, "div");
    doc.set_attribute(second, "data-message-id", "msg-assistant-1");
    doc.set_attribute(second, "data-message-author-role", "assistant");
    doc.set_rect(second, Rect::new(700.0, 0.0, 800.0, 300.0));
    let p = doc.append_element(second, "p");
    let t = doc.append_text(p, "Offsets into the flattened text ");
    doc.set_rect(t, Rect::new(720.0, 0.0, 400.0, 20.0));
    let code = doc.append_element(p, "code");
    let t = doc.append_text(code, "survive re-renders");
    doc.set_rect(t, Rect::new(720.0, 400.0, 200.0, 20.0));

    Transcript {
        doc,
        container,
        first_message,
        first_text,
    }
}

async fn run_demo() {
    section("Settings");
    let settings = load_settings(None);
    println!(
        "  Debounce: selection {} ms, render {} ms; container poll {} ms",
        settings.timing.selection_debounce_ms,
        settings.timing.render_debounce_ms,
        settings.timing.container_poll_ms
    );
    println!("  Storage namespace: {}", settings.storage.namespace);
    println!();

    section("Session");
    let transcript = build_transcript();
    let doc = Rc::new(RefCell::new(transcript.doc));
    let db = Database::open_in_memory().expect("Failed to open database");
    let session = TrailSession::new(settings, Rc::clone(&doc), Some(Box::new(SqliteStorage::new(db))));
    let conversation = session.enter_conversation("/c/demo-1234");
    session.start();
    tokio::time::sleep(Duration::from_millis(10)).await;
    println!("  Conversation: {}", conversation);
    println!(
        "  Scroll container: {:?} (expected {:?})",
        session.markers().attached_container(),
        transcript.container
    );
    println!();

    section("Selection Tracker");
    doc.borrow_mut().select_offsets(transcript.first_message, 6, 11);
    session.handle_event(HostEvent::SelectionChanged);
    session.handle_event(HostEvent::PointerUp);
    println!("  State right after the burst: {:?}", session.tracker().state());
    tokio::time::sleep(Duration::from_millis(150)).await;
    match session.tracker().state() {
        SelectionState::Ready(payload) => println!(
            "  Anchor: {} [{}..{}] \"{}\"",
            payload.message_id, payload.start_abs, payload.end_abs, payload.selected_text
        ),
        other => println!("  No anchor: {:?}", other),
    }
    println!();

    section("Bookmark Store");
    let bookmark = session
        .bookmark_selection(Some("the world part"))
        .expect("Failed to bookmark selection");
    let again = session.bookmark_selection(None).expect("Failed to re-bookmark");
    println!("  Added {} ({})", bookmark.id, bookmark.label());
    println!("  Same anchor again returns {} -> {} bookmark(s)", again.id, session.bookmarks().len());

    doc.borrow_mut().select_offsets(transcript.first_message, 0, 5);
    let hello = session.bookmark_selection(None).expect("Failed to bookmark selection");
    println!("  Added {} ({})", hello.id, hello.label());
    println!();

    section("Marker Position Engine");
    for marker in session.compute_markers().iter() {
        println!("  {} -> {:.3} ({:?})", marker.bookmark_id, marker.percent, marker.placement);
    }
    let plan = session.reveal_bookmark(&bookmark.id).expect("Failed to plan reveal");
    println!(
        "  Reveal {}: scroll container {:?} to {:.0}px, flash {} ms",
        plan.bookmark_id,
        plan.container,
        plan.target_scroll_top,
        plan.flash.as_millis()
    );
    println!();

    section("Stale anchors");
    doc.borrow_mut().set_text(transcript.first_text, "Hi");
    session.handle_event(HostEvent::Mutation(transcript.first_text));
    tokio::time::sleep(Duration::from_millis(200)).await;
    for marker in session.markers().markers().iter() {
        println!("  {} -> {:.3} ({:?})", marker.bookmark_id, marker.percent, marker.placement);
    }
    println!();

    section("Tooltip");
    session.tooltip().open(&bookmark);
    println!("  Open for {:?}", session.tooltip().active_bookmark_id());
    session.remove(&bookmark.id).expect("Failed to remove bookmark");
    println!("  After delete, open: {}", session.tooltip().is_open());
    println!();

    section("JSON bridge");
    for (method, params) in [
        ("ping", json!({})),
        ("bookmarks.list", json!({})),
        ("scroll.locate", json!({})),
    ] {
        match handle_method(&session, method, &params) {
            Ok(value) => println!("  {} -> {}", method, value),
            Err(e) => println!("  {} failed: {}", method, e),
        }
    }
    println!();

    section("Persistence");
    tokio::time::sleep(Duration::from_millis(10)).await;
    println!("  Pending writes: {}", session.store().has_pending_writes());
    session.handle_event(HostEvent::Navigated("/c/other-5678".to_string()));
    println!("  Other conversation holds {} bookmark(s)", session.bookmarks().len());
    session.handle_event(HostEvent::Navigated("/c/demo-1234".to_string()));
    println!("  Back on demo-1234: {} bookmark(s)", session.bookmarks().len());

    session.dispose();
    println!("  ✓ Session disposed");
}
