//! HTML page handlers — serves the live map UI.
//!
//! The page is a complete HTML document composed from a shared base layout
//! and the map content (CSS + HTML + JS), embedded at compile time via
//! `include_str!`.

use axum::response::Html;

const BASE_CSS: &str = r#"* { margin: 0; padding: 0; box-sizing: border-box; }
body { font-family: 'Courier New', monospace; background: #0a0a0a; color: #e0e0e0; }
nav { background: #111; border-bottom: 1px solid #333; padding: 8px 16px; display: flex; align-items: center; gap: 24px; }
nav .brand { color: #ffd84d; font-weight: bold; font-size: 14px; text-decoration: none; }
nav a { color: #888; text-decoration: none; font-size: 13px; }
nav a:hover, nav a.active { color: #ffd84d; }
nav .gauge { margin-left: auto; font-size: 12px; color: #888; }
nav .gauge b { color: #ffd84d; }
#map { position: absolute; top: 37px; bottom: 0; left: 0; right: 0; background: #0a0a0a; }"#;

const NAV_HTML: &str = r#"<nav>
    <a href="/" class="brand">strikefeed</a>
    <a href="/" class="active">Live Map</a>
    <span class="gauge">strikes stored: <b id="stat-strikes">&mdash;</b></span>
</nav>"#;

fn render_page(title: &str, body: &str) -> Html<String> {
    let mut s = String::with_capacity(body.len() + BASE_CSS.len() + NAV_HTML.len() + 512);
    s.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    s.push_str("<meta charset=\"UTF-8\">\n");
    s.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
    s.push_str("<title>strikefeed");
    if !title.is_empty() {
        s.push_str(" \u{2014} "); // em dash
        s.push_str(title);
    }
    s.push_str("</title>\n");
    s.push_str("<link rel=\"stylesheet\" href=\"https://unpkg.com/leaflet@1.9.4/dist/leaflet.css\" />\n");
    s.push_str("<style>\n");
    s.push_str(BASE_CSS);
    s.push_str("\n</style>\n");
    s.push_str("</head>\n<body>\n");
    s.push_str(NAV_HTML);
    s.push_str("\n");
    s.push_str(body);
    s.push_str("\n</body>\n</html>");
    Html(s)
}

// ---------------------------------------------------------------------------
// Page handlers
// ---------------------------------------------------------------------------

pub async fn page_map() -> Html<String> {
    render_page("Live Map", include_str!("../../templates/map.html"))
}
