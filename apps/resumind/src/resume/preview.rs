//! Preview images for uploaded resumes, and the scoped handles that expose
//! them to a view.
//!
//! Rendering is synchronous and CPU-bound; callers run it inside
//! `tokio::task::spawn_blocking`. A document that cannot be read still gets a
//! placeholder page, so every stored resume has an image blob.

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

const PAGE_WIDTH: u32 = 612;
const PAGE_HEIGHT: u32 = 792;
const MARGIN: u32 = 48;
const LINE_HEIGHT: u32 = 16;
pub const DEFAULT_MAX_LINES: usize = 40;

/// Scheme prefix of handles issued by a [`PreviewScope`].
pub const HANDLE_PREFIX: &str = "blob:resumind/";

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPreview {
    pub bytes: Bytes,
    /// File extension without the dot, used to name the stored blob.
    pub extension: &'static str,
}

pub trait PreviewRenderer: Send + Sync {
    fn render(&self, file_name: &str, document: &[u8]) -> RenderedPreview;
}

/// Renders the first lines of a PDF's extracted text onto an SVG page.
pub struct TextSnapshotRenderer {
    max_lines: usize,
}

impl Default for TextSnapshotRenderer {
    fn default() -> Self {
        Self {
            max_lines: DEFAULT_MAX_LINES,
        }
    }
}

impl TextSnapshotRenderer {
    fn snapshot_lines(&self, document: &[u8]) -> Option<Vec<String>> {
        // pdf-extract panics on some malformed inputs instead of returning Err.
        let text = match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(document)) {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                debug!("PDF text extraction failed: {e}");
                return None;
            }
            Err(_) => {
                warn!("PDF text extraction panicked");
                return None;
            }
        };

        let lines: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .take(self.max_lines)
            .map(str::to_string)
            .collect();
        (!lines.is_empty()).then_some(lines)
    }
}

impl PreviewRenderer for TextSnapshotRenderer {
    fn render(&self, file_name: &str, document: &[u8]) -> RenderedPreview {
        let svg = match self.snapshot_lines(document) {
            Some(lines) => page_svg(&lines, 11),
            None => {
                debug!("Rendering placeholder preview for {file_name}");
                return placeholder(file_name);
            }
        };
        RenderedPreview {
            bytes: Bytes::from(svg),
            extension: "svg",
        }
    }
}

/// A page showing only the file name.
pub fn placeholder(file_name: &str) -> RenderedPreview {
    let svg = page_svg(&[file_name.to_string(), "Preview unavailable".to_string()], 14);
    RenderedPreview {
        bytes: Bytes::from(svg),
        extension: "svg",
    }
}

fn page_svg(lines: &[String], font_size: u32) -> String {
    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{PAGE_WIDTH}" height="{PAGE_HEIGHT}" viewBox="0 0 {PAGE_WIDTH} {PAGE_HEIGHT}">"#
    );
    svg.push_str(r##"<rect width="100%" height="100%" fill="#ffffff"/>"##);
    svg.push_str(&format!(
        r##"<g font-family="Helvetica, Arial, sans-serif" font-size="{font_size}" fill="#1f2937">"##
    ));
    for (i, line) in lines.iter().enumerate() {
        let y = MARGIN + LINE_HEIGHT * (i as u32 + 1);
        if y > PAGE_HEIGHT - MARGIN {
            break;
        }
        svg.push_str(&format!(
            r#"<text x="{MARGIN}" y="{y}">{}</text>"#,
            escape_xml(line)
        ));
    }
    svg.push_str("</g></svg>");
    svg
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

/// Content type for a blob path, by extension.
pub fn content_type_for(path: &str) -> &'static str {
    let ext = path.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scoped handles
// ────────────────────────────────────────────────────────────────────────────

/// A short-lived local handle to preview bytes. Valid only while the
/// [`PreviewScope`] that issued it holds it.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewHandle {
    pub url: String,
    pub content_type: &'static str,
    pub bytes: Bytes,
}

/// Owns the handles issued for one view. Dropping the scope revokes them all.
#[derive(Default)]
pub struct PreviewScope {
    handles: Mutex<HashMap<String, (Bytes, &'static str)>>,
}

impl PreviewScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self, bytes: Bytes, content_type: &'static str) -> PreviewHandle {
        let url = format!("{HANDLE_PREFIX}{}", Uuid::new_v4());
        self.handles
            .lock()
            .insert(url.clone(), (bytes.clone(), content_type));
        PreviewHandle {
            url,
            content_type,
            bytes,
        }
    }

    /// Bytes behind a handle, if it has not been revoked.
    pub fn fetch(&self, url: &str) -> Option<(Bytes, &'static str)> {
        self.handles.lock().get(url).cloned()
    }

    pub fn revoke(&self, url: &str) -> bool {
        self.handles.lock().remove(url).is_some()
    }

    pub fn clear(&self) {
        let mut handles = self.handles.lock();
        if !handles.is_empty() {
            debug!("Revoking {} preview handle(s)", handles.len());
        }
        handles.clear();
    }

    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for PreviewScope {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreadable_document_renders_placeholder() {
        let renderer = TextSnapshotRenderer::default();
        let preview = renderer.render("cv <draft>.pdf", b"definitely not a pdf");
        let svg = std::str::from_utf8(&preview.bytes).unwrap();

        assert_eq!(preview.extension, "svg");
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("cv &lt;draft&gt;.pdf"));
        assert!(svg.contains("Preview unavailable"));
    }

    #[test]
    fn test_page_svg_stops_at_bottom_margin() {
        let lines: Vec<String> = (0..200).map(|i| format!("line {i}")).collect();
        let svg = page_svg(&lines, 11);
        assert!(svg.contains(">line 0<"));
        assert!(!svg.contains(">line 199<"));
        assert!(svg.ends_with("</g></svg>"));
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("R&D <lead> \"x\""), "R&amp;D &lt;lead&gt; &quot;x&quot;");
        assert_eq!(escape_xml("a\u{0}b"), "ab");
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("/abc-preview.svg"), "image/svg+xml");
        assert_eq!(content_type_for("/photo.JPG"), "image/jpeg");
        assert_eq!(content_type_for("/noext"), "application/octet-stream");
    }

    #[test]
    fn test_scope_issue_fetch_revoke() {
        let scope = PreviewScope::new();
        let handle = scope.issue(Bytes::from_static(b"<svg/>"), "image/svg+xml");

        assert!(handle.url.starts_with(HANDLE_PREFIX));
        assert_eq!(
            scope.fetch(&handle.url),
            Some((Bytes::from_static(b"<svg/>"), "image/svg+xml"))
        );
        assert!(scope.revoke(&handle.url));
        assert!(!scope.revoke(&handle.url));
        assert!(scope.fetch(&handle.url).is_none());
    }

    #[test]
    fn test_scope_clear_revokes_everything() {
        let scope = PreviewScope::new();
        let a = scope.issue(Bytes::from_static(b"a"), "image/png");
        scope.issue(Bytes::from_static(b"b"), "image/png");
        assert_eq!(scope.len(), 2);

        scope.clear();
        assert!(scope.is_empty());
        assert!(scope.fetch(&a.url).is_none());
    }
}
