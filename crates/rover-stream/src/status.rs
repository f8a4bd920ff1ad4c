use axum::response::Html;
use std::fmt::Write;

use crate::StreamState;

/// Extra rows for the status page, supplied by whoever owns the rest of the
/// bridge (drive, command clients, tunnel).
pub trait StatusReport: Send + Sync {
    fn rows(&self) -> Vec<(String, String)>;
}

pub(crate) fn page(state: &StreamState) -> Html<String> {
    let camera = if state.camera_live().is_some() { "active" } else { "not available" };
    let mut rows = vec![
        ("Camera".to_string(), camera.to_string()),
        ("Stream".to_string(), "/?action=stream".to_string()),
        ("Viewers".to_string(), state.viewers().to_string()),
    ];
    rows.extend(state.report.rows());

    let mut body = String::from(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>Rover bridge</title></head>\n<body>\n<h1>Rover bridge</h1>\n<table>\n",
    );
    for (k, v) in &rows {
        let _ = writeln!(body, "<tr><th>{}</th><td>{}</td></tr>", escape(k), escape(v));
    }
    body.push_str("</table>\n");
    if state.camera_live().is_some() {
        body.push_str("<img src=\"/?action=stream\" alt=\"live stream\">\n");
    }
    body.push_str("</body></html>\n");
    Html(body)
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape("<a href='x'>&</a>"), "&lt;a href=&#39;x&#39;&gt;&amp;&lt;/a&gt;");
        assert_eq!(escape("plain"), "plain");
    }
}
