// src/render.rs
//! Dashboard HTML. A pure function of (outcome, static page data, now),
//! called once per page request.

use std::fmt::Write as _;

use chrono::{DateTime, Local};
use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::config::{AppConfig, AuthorProfile};
use crate::feed::types::{FeedError, FeedSnapshot, PaperRecord, SnapshotOutcome};

const PAGE_TITLE: &str = "Quant Alpha Monitor";

/// Static parts of the page: sidebar and the monitored category label.
#[derive(Debug, Clone)]
pub struct Dashboard {
    pub profile: AuthorProfile,
    pub category_label: String,
}

impl Dashboard {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            profile: cfg.profile.clone(),
            category_label: cfg.feed.category_label.clone(),
        }
    }

    pub fn render(&self, outcome: &SnapshotOutcome, now: DateTime<Local>) -> String {
        let mut out = String::with_capacity(16 * 1024);
        out.push_str("<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
        let _ = writeln!(out, "<title>{PAGE_TITLE}</title>");
        out.push_str(STYLE);
        out.push_str("</head>\n<body>\n<div class=\"layout\">\n");

        self.render_sidebar(&mut out);

        out.push_str("<main>\n");
        let _ = writeln!(out, "<h1>{PAGE_TITLE} | Quant Strategy Lab</h1>");
        out.push_str("<h3>Latest quantitative finance papers</h3>\n");
        let _ = writeln!(
            out,
            "<p class=\"updated\">Last updated: {} (server local time)</p>\n<hr>",
            now.format("%Y-%m-%d %H:%M")
        );

        match outcome {
            Ok(snap) => self.render_snapshot(&mut out, snap),
            Err(e) => render_warning(&mut out, e),
        }

        out.push_str("</main>\n</div>\n</body>\n</html>\n");
        out
    }

    fn render_sidebar(&self, out: &mut String) {
        let p = &self.profile;
        out.push_str("<aside class=\"sidebar\">\n");
        if let Some(url) = p.avatar_url.as_deref().and_then(safe_href) {
            let _ = writeln!(
                out,
                "<img src=\"{}\" width=\"100\" alt=\"avatar\">",
                encode_double_quoted_attribute(url)
            );
        }
        out.push_str("<h2>About the author</h2>\n");
        let _ = writeln!(
            out,
            "<p><strong>{}</strong> <em>{}</em></p>",
            encode_text(&p.name),
            encode_text(&p.role)
        );
        if !p.focus.is_empty() {
            out.push_str("<p>Focus areas:</p>\n<ul>\n");
            for f in &p.focus {
                let _ = writeln!(out, "<li>{}</li>", encode_text(f));
            }
            out.push_str("</ul>\n");
        }
        if !p.note.is_empty() {
            let _ = writeln!(out, "<p class=\"info\">{}</p>", encode_text(&p.note));
        }
        let _ = writeln!(
            out,
            "<hr>\n<p class=\"caption\">Data Source: {}</p>",
            encode_text(&p.data_source)
        );
        out.push_str("</aside>\n");
    }

    fn render_snapshot(&self, out: &mut String, snap: &FeedSnapshot) {
        out.push_str("<div class=\"metrics\">\n");
        let _ = writeln!(
            out,
            "<div class=\"metric\"><span class=\"label\">Papers fetched</span><span class=\"value\">{}</span></div>",
            snap.len()
        );
        let _ = writeln!(
            out,
            "<div class=\"metric\"><span class=\"label\">Monitored category</span><span class=\"value\">{}</span></div>",
            encode_text(&self.category_label)
        );
        out.push_str("</div>\n<h4>Latest papers</h4>\n");
        for rec in snap.records() {
            render_card(out, rec);
        }
    }
}

fn render_card(out: &mut String, rec: &PaperRecord) {
    let _ = writeln!(
        out,
        "<details class=\"card\">\n<summary>{} | {}</summary>",
        encode_text(&rec.published_date),
        encode_text(&rec.title)
    );
    let _ = writeln!(
        out,
        "<p><strong>Authors:</strong> {}</p>",
        encode_text(&rec.authors_joined())
    );
    if !rec.categories.is_empty() {
        out.push_str("<p class=\"tags\">");
        for c in &rec.categories {
            let _ = write!(out, "<span class=\"tag\">{}</span>", encode_text(c));
        }
        out.push_str("</p>\n");
    }
    let _ = writeln!(
        out,
        "<p><strong>Summary:</strong> {}</p>",
        encode_text(&rec.summary)
    );
    match safe_href(&rec.link) {
        Some(href) => {
            let _ = writeln!(
                out,
                "<p><a href=\"{}\" target=\"_blank\" rel=\"noopener\">Read the full paper ({})</a></p>",
                encode_double_quoted_attribute(href),
                encode_text(href)
            );
        }
        None => {
            let _ = writeln!(out, "<p>{}</p>", encode_text(&rec.link));
        }
    }
    out.push_str("</details>\n");
}

fn render_warning(out: &mut String, e: &FeedError) {
    let _ = writeln!(
        out,
        "<div class=\"warning\" data-reason=\"{}\">Unable to fetch data right now, please try again later. ({})</div>",
        e.reason(),
        encode_text(&e.to_string())
    );
}

/// Only http(s) URLs become links.
fn safe_href(url: &str) -> Option<&str> {
    let u = url.trim();
    let lower = u.to_ascii_lowercase();
    (lower.starts_with("http://") || lower.starts_with("https://")).then_some(u)
}

const STYLE: &str = r#"<style>
body { font-family: sans-serif; margin: 0; }
.layout { display: flex; }
.sidebar { width: 260px; padding: 1rem; background: #f4f5f7; min-height: 100vh; }
main { flex: 1; padding: 1rem 2rem; }
.metrics { display: flex; gap: 3rem; margin: 1rem 0; }
.metric .label { display: block; font-size: .85rem; color: #555; }
.metric .value { font-size: 1.8rem; }
.card { border: 1px solid #ddd; border-radius: 6px; margin: .5rem 0; padding: .5rem 1rem; }
.card summary { cursor: pointer; font-weight: 600; }
.tag { background: #e8eefc; border-radius: 4px; padding: 0 .4rem; margin-right: .3rem; font-size: .8rem; }
.warning { background: #fff4d6; border: 1px solid #f0c36d; padding: 1rem; border-radius: 6px; }
.info { background: #e8f4fd; padding: .5rem; border-radius: 4px; }
.caption, .updated { color: #777; font-size: .85rem; }
</style>
"#;
