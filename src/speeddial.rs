//! Speed-dial start page served under the internal scheme.
//!
//! Pages are rendered once when the responder is built and handed out as
//! [`SyntheticResponse`]s, so answering a request never touches the disk:
//!
//! - `<scheme>:speeddial` : the HTML page
//! - `<scheme>:speeddial/base.css`, `<scheme>:speeddial/custom.css`
//! - `<scheme>:speeddial/img/<n>` : the tile icon of entry `n`

use serde::{Deserialize, Serialize};
use url::Url;

use crate::filter::SyntheticResponse;
use crate::scheme::internal_action;

/// One tile of the start page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedDial {
    pub title: String,
    pub url: String,
}

const BASE_CSS: &str = r#"* { margin: 0; padding: 0; box-sizing: border-box; }
body {
    font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
    background: #1a1a1a; color: #e0e0e0;
    max-width: 900px; margin: 0 auto; padding: 32px 16px;
}
.grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(120px, 1fr)); gap: 16px; }
.tile { display: flex; flex-direction: column; align-items: center; text-decoration: none; color: inherit; }
.tile img { width: 72px; height: 72px; border-radius: 12px; }
.tile span { margin-top: 8px; font-size: 13px; text-align: center; word-break: break-word; }
.empty { color: #666; text-align: center; margin-top: 48px; }
"#;

/// Tile colours, picked from the title.
const PALETTE: &[&str] = &["#6a9eff", "#ff8a65", "#81c784", "#ba68c8", "#4db6ac", "#f06292"];

#[derive(Debug, Clone)]
pub struct SpeedDialResponder {
    scheme: String,
    page: SyntheticResponse,
    base_css: SyntheticResponse,
    custom_css: SyntheticResponse,
    images: Vec<SyntheticResponse>,
}

impl SpeedDialResponder {
    pub fn new(scheme: &str, dials: &[SpeedDial], custom_css: &str) -> Self {
        let scheme = scheme.to_ascii_lowercase();
        let html = generate_speed_dial_html(&scheme, dials);
        Self {
            page: SyntheticResponse::new("text/html", Some("utf-8"), html.into_bytes()),
            base_css: SyntheticResponse::new("text/css", Some("utf-8"), BASE_CSS.as_bytes()),
            custom_css: SyntheticResponse::new(
                "text/css",
                Some("utf-8"),
                custom_css.as_bytes(),
            ),
            images: dials
                .iter()
                .map(|d| {
                    SyntheticResponse::new("image/svg+xml", Some("utf-8"), tile_svg(&d.title).into_bytes())
                })
                .collect(),
            scheme,
        }
    }

    /// Synthetic response for an internal start-page URL, `None` for
    /// anything else (the request goes on to the next filter stage).
    pub fn respond(&self, url: &Url) -> Option<SyntheticResponse> {
        if url.scheme() != self.scheme {
            return None;
        }
        let action = internal_action(url);
        match action.as_str() {
            "speeddial" => Some(self.page.clone()),
            "speeddial/base.css" => Some(self.base_css.clone()),
            "speeddial/custom.css" => Some(self.custom_css.clone()),
            _ => {
                let index: usize = action.strip_prefix("speeddial/img/")?.parse().ok()?;
                self.images.get(index).cloned()
            }
        }
    }
}

/// Generates the start page with one tile per entry.
pub fn generate_speed_dial_html(scheme: &str, dials: &[SpeedDial]) -> String {
    let tiles = if dials.is_empty() {
        r#"<p class="empty">No speed dial yet.</p>"#.to_string()
    } else {
        let mut tiles = String::from(r#"<div class="grid">"#);
        for (i, dial) in dials.iter().enumerate() {
            tiles.push_str(&format!(
                r#"
<a class="tile" href="{url}"><img src="{scheme}:speeddial/img/{i}" alt=""><span>{title}</span></a>"#,
                url = html_escape(&dial.url),
                title = html_escape(&dial.title),
            ));
        }
        tiles.push_str("\n</div>");
        tiles
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Speed Dial</title>
<link rel="stylesheet" href="{scheme}:speeddial/base.css">
<link rel="stylesheet" href="{scheme}:speeddial/custom.css">
</head>
<body>
{tiles}
</body>
</html>"#
    )
}

fn tile_svg(title: &str) -> String {
    let letter = title
        .chars()
        .find(|c| c.is_alphanumeric())
        .map(|c| c.to_uppercase().to_string())
        .unwrap_or_else(|| "?".to_string());
    let colour = PALETTE[title.bytes().map(usize::from).sum::<usize>() % PALETTE.len()];
    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="72" height="72" viewBox="0 0 72 72"><rect width="72" height="72" rx="12" fill="{colour}"/><text x="36" y="47" font-size="32" font-family="sans-serif" text-anchor="middle" fill="#fff">{letter}</text></svg>"##,
        letter = html_escape(&letter),
    )
}

/// Escapes HTML special characters in attribute values.
pub(crate) fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
