//! JSON method handler for PromptTrail's presentation collaborators.
//!
//! The badge, index dropdown, tooltip editor and floating action button talk to
//! the core through `handle_method`, which dispatches a method name and JSON
//! params to the session and answers with JSON.

use serde_json::{json, Value};

use crate::app::TrailSession;
use crate::dom::HostDocument;
use crate::types::anchor::{AnchorPayload, TextRange};
use crate::types::bookmark::Bookmark;
use crate::types::errors::StoreError;

fn str_param<'a>(params: &'a Value, name: &str) -> Result<&'a str, String> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| format!("missing {}", name))
}

fn usize_param(params: &Value, name: &str) -> Result<usize, String> {
    params
        .get(name)
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .ok_or_else(|| format!("missing {}", name))
}

fn bookmark_json(bookmark: &Bookmark) -> Result<Value, String> {
    let mut value = serde_json::to_value(bookmark).map_err(|e| e.to_string())?;
    if let Value::Object(map) = &mut value {
        map.insert("label".to_string(), json!(bookmark.label()));
    }
    Ok(value)
}

fn range_json(range: &TextRange, text: Option<String>) -> Value {
    json!({
        "start": {"node": range.start.node.0, "offset": range.start.offset},
        "end": {"node": range.end.node.0, "offset": range.end.offset},
        "text": text,
    })
}

/// Dispatch a method call to the session.
///
/// Returns `Ok(Value)` on success or `Err(String)` with an error message.
pub fn handle_method<D: HostDocument + 'static>(
    session: &TrailSession<D>,
    method: &str,
    params: &Value,
) -> Result<Value, String> {
    match method {
        "ping" => Ok(json!({"pong": true})),

        // ─── Bookmarks ───
        "bookmarks.list" => {
            let items = session
                .bookmarks()
                .iter()
                .map(bookmark_json)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(json!({
                "conversationId": session.store().conversation_id(),
                "items": items,
            }))
        }
        "bookmarks.add" => {
            let anchor = params.get("anchor").cloned().ok_or("missing anchor")?;
            let mut payload: AnchorPayload =
                serde_json::from_value(anchor).map_err(|e| format!("invalid anchor: {}", e))?;
            // The digest always comes from the live transcript, never from the caller.
            payload.fingerprint = {
                let doc = session.document().borrow();
                session.markers().engine().mapper().span_fingerprint(
                    &*doc,
                    &payload.message_id,
                    payload.start_abs,
                    payload.end_abs,
                )
            };
            let desc = params.get("desc").and_then(|v| v.as_str());
            let bookmark = Bookmark::from_anchor(&payload, desc);
            match session.add(bookmark.clone()) {
                Ok(()) => Ok(json!({"id": bookmark.id, "added": true})),
                Err(StoreError::DuplicateAnchor(existing)) => Ok(json!({"id": existing, "added": false})),
                Err(e) => Err(e.to_string()),
            }
        }
        "bookmarks.add_from_selection" => {
            let desc = params.get("desc").and_then(|v| v.as_str());
            let bookmark = session.bookmark_selection(desc).map_err(|e| e.to_string())?;
            bookmark_json(&bookmark)
        }
        "bookmarks.update_description" => {
            let id = str_param(params, "id")?;
            let desc = str_param(params, "desc")?;
            session.update_description(id, desc).map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "bookmarks.delete" => {
            let id = str_param(params, "id")?;
            session.remove(id).map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "bookmarks.ordered" => {
            let items = session
                .ordered_bookmarks()
                .iter()
                .map(bookmark_json)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(json!(items))
        }

        // ─── Anchors ───
        "anchor.resolve_selection" => match session.resolve_anchor_from_selection() {
            Ok(payload) => serde_json::to_value(payload).map_err(|e| e.to_string()),
            Err(_) => Ok(Value::Null),
        },
        "anchor.reconstruct" => {
            if let Some(id) = params.get("id").and_then(|v| v.as_str()) {
                return match session.reconstruct_range_for_bookmark(id) {
                    Ok(range) => Ok(range_json(&range, None)),
                    Err(_) => Ok(Value::Null),
                };
            }
            let message_id = str_param(params, "messageId")?;
            let start = usize_param(params, "start")?;
            let end = usize_param(params, "end")?;
            let doc = session.document().borrow();
            let mapper = session.markers().engine().mapper();
            let Some(message) = mapper.message_element(&*doc, message_id) else {
                return Ok(Value::Null);
            };
            match mapper.reconstruct_range(&*doc, message, start, end) {
                Some(range) => Ok(range_json(
                    &range,
                    mapper.slice_text(&*doc, message, start, end),
                )),
                None => Ok(Value::Null),
            }
        }

        // ─── Markers ───
        "markers.compute" => {
            let markers = session.compute_markers();
            serde_json::to_value(&*markers).map_err(|e| e.to_string())
        }
        "markers.reveal" => {
            let id = str_param(params, "id")?;
            let plan = session.reveal_bookmark(id).map_err(|e| e.to_string())?;
            Ok(json!({
                "bookmarkId": plan.bookmark_id,
                "message": plan.message.0,
                "container": plan.container.0,
                "targetScrollTop": plan.target_scroll_top,
                "scrollWindow": plan.scroll_window,
                "flashMs": plan.flash.as_millis() as u64,
                "range": range_json(&plan.range, None),
            }))
        }

        // ─── Scroll container ───
        "scroll.locate" => Ok(json!({"node": session.locate_scroll_container().0})),

        // ─── Settings ───
        "settings.get" => serde_json::to_value(session.settings()).map_err(|e| e.to_string()),

        _ => Err(format!("unknown method: {}", method)),
    }
}
