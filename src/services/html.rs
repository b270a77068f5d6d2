//! Generated HTML documents: the in-app-browser interstitial and the Open
//! Graph preview pages.
//!
//! All dynamic content is escaped; URLs placed into inline JavaScript are
//! additionally JS-string escaped. These documents are tiny by design: one
//! inline script, no external assets.

use crate::storage::Link;
use crate::utils::escape::{html_escape, js_string_escape};

/// Milliseconds before the interstitial falls back to the store URL.
const INTERSTITIAL_FALLBACK_MS: u32 = 1500;

/// In-app-browser escape page.
///
/// Immediately assigns `window.location` to the custom-scheme URL; if the
/// app did not take over within the timeout, replaces location with the
/// store fallback. Both URLs are also rendered as visible links.
pub fn render_interstitial(app_url: &str, fallback_url: &str, title: Option<&str>) -> String {
    let title_html = html_escape(title.unwrap_or("Opening app..."));
    let app_js = js_string_escape(app_url);
    let fallback_js = js_string_escape(fallback_url);
    let app_html = html_escape(app_url);
    let fallback_html = html_escape(fallback_url);

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title_html}</title>
<style>
body{{font-family:-apple-system,system-ui,sans-serif;margin:0;padding:48px 24px;text-align:center;color:#1a1a1a}}
a{{color:#0066cc;word-break:break-all}}
p{{color:#666}}
</style>
</head>
<body>
<h1>{title_html}</h1>
<p>If nothing happens, use one of the links below.</p>
<p><a href="{app_html}">Open in app</a></p>
<p><a href="{fallback_html}">Continue without the app</a></p>
<script>
window.location = '{app_js}';
setTimeout(function() {{
  window.location.replace('{fallback_js}');
}}, {INTERSTITIAL_FALLBACK_MS});
</script>
</body>
</html>"#
    )
}

/// Open Graph + Twitter Card document served to social scrapers.
pub fn render_og_page(link: &Link, canonical_url: &str) -> String {
    og_document(link, canonical_url, None)
}

/// Preview page (`/{code}/preview`): OG document plus a meta refresh to the
/// origin URL for humans following the preview link.
pub fn render_preview_page(link: &Link, canonical_url: &str) -> String {
    og_document(link, canonical_url, Some(&link.original_url))
}

fn og_document(link: &Link, canonical_url: &str, refresh_to: Option<&str>) -> String {
    let title = html_escape(link.og_title.as_deref().unwrap_or(&link.short_code));
    let description = html_escape(
        link.og_description
            .as_deref()
            .unwrap_or(&link.original_url),
    );
    let canonical = html_escape(canonical_url);

    let image_tags = match &link.og_image_url {
        Some(image) if !image.is_empty() => {
            let image = html_escape(image);
            format!(
                "<meta property=\"og:image\" content=\"{image}\">\n<meta name=\"twitter:image\" content=\"{image}\">\n"
            )
        }
        _ => String::new(),
    };

    let card = if link.og_image_url.is_some() {
        "summary_large_image"
    } else {
        "summary"
    };

    let refresh_tag = match refresh_to {
        Some(url) => format!(
            "<meta http-equiv=\"refresh\" content=\"0;url={}\">\n",
            html_escape(url)
        ),
        None => String::new(),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
{refresh_tag}<meta property="og:type" content="website">
<meta property="og:title" content="{title}">
<meta property="og:description" content="{description}">
<meta property="og:url" content="{canonical}">
{image_tags}<meta name="twitter:card" content="{card}">
<meta name="twitter:title" content="{title}">
<meta name="twitter:description" content="{description}">
</head>
<body>
<p><a href="{canonical}">{title}</a></p>
</body>
</html>"#
    )
}
