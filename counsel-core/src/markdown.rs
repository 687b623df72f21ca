//! Markdown handling for LLM output: HTML rendering for advice cards and
//! heading-based section extraction for session summaries.

use pulldown_cmark::{html, Options, Parser};

pub const SUMMARY_PLACEHOLDER: &str = "Summary not available";
pub const NOTES_PLACEHOLDER: &str = "Notes not available";

/// Render markdown (tables and fenced code enabled) to an HTML fragment.
pub fn render_html(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, Options::ENABLE_TABLES);
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Wrap rendered advice in the styled card the front end expects.
pub fn advice_card(inner_html: &str) -> String {
    format!(
        r#"
    <div class="bg-white p-6 rounded-lg shadow border prose prose-indigo max-w-none">
        {inner_html}
    </div>
    "#
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummarySections {
    pub summary: String,
    pub notes: String,
}

/// Split a summarization response on `##` markers.
///
/// Titles are matched by substring: a title containing `Summary` becomes the
/// summary (last one wins); titles containing `Key Themes` or `Clinical Notes`
/// are appended to the notes, each re-headed with `## {title}`. Anything else
/// is dropped. Missing sections fall back to placeholder text.
pub fn parse_summary_sections(markdown: &str) -> SummarySections {
    let mut summary = String::new();
    let mut notes = String::new();

    for section in markdown.split("##") {
        let section = section.trim();
        if section.is_empty() {
            continue;
        }

        let Some((title, content)) = section.split_once('\n') else {
            continue;
        };
        let title = title.trim();
        let content = content.trim();

        if title.contains("Summary") {
            summary = content.to_string();
        } else if title.contains("Key Themes") || title.contains("Clinical Notes") {
            if !notes.is_empty() {
                notes.push_str("\n\n");
            }
            notes.push_str("## ");
            notes.push_str(title);
            notes.push('\n');
            notes.push_str(content);
        }
    }

    if summary.is_empty() {
        summary = SUMMARY_PLACEHOLDER.to_string();
    }
    if notes.is_empty() {
        notes = NOTES_PLACEHOLDER.to_string();
    }

    SummarySections { summary, notes }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_RESPONSE: &str = "## Summary\nThe client reported work stress.\n\n## Key Themes\n- Anxiety\n- Workload\n\n## Clinical Notes\n**Presenting issues:** stress at work.\n";

    #[test]
    fn test_parse_all_sections() {
        let sections = parse_summary_sections(FULL_RESPONSE);
        assert_eq!(sections.summary, "The client reported work stress.");
        assert_eq!(
            sections.notes,
            "## Key Themes\n- Anxiety\n- Workload\n\n## Clinical Notes\n**Presenting issues:** stress at work."
        );
    }

    #[test]
    fn test_title_matching_is_substring() {
        let md = "## Session Summary (draft)\nShort.\n## Clinical Notes and Plan\nPlan here.";
        let sections = parse_summary_sections(md);
        assert_eq!(sections.summary, "Short.");
        assert_eq!(sections.notes, "## Clinical Notes and Plan\nPlan here.");
    }

    #[test]
    fn test_unmatched_sections_are_dropped() {
        let md = "Preamble text\n## Recommendations\nSleep more.\n## Summary\nOk.";
        let sections = parse_summary_sections(md);
        assert_eq!(sections.summary, "Ok.");
        assert_eq!(sections.notes, NOTES_PLACEHOLDER);
    }

    #[test]
    fn test_heading_without_body_is_skipped() {
        let sections = parse_summary_sections("## Summary");
        assert_eq!(sections.summary, SUMMARY_PLACEHOLDER);
    }

    #[test]
    fn test_placeholders_for_plain_text() {
        let sections = parse_summary_sections("The model ignored the format.");
        assert_eq!(sections.summary, SUMMARY_PLACEHOLDER);
        assert_eq!(sections.notes, NOTES_PLACEHOLDER);
    }

    #[test]
    fn test_render_html_table_and_code() {
        let html = render_html("# Plan\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\n```\ncode\n```\n");
        assert!(html.contains("<h1>Plan</h1>"));
        assert!(html.contains("<table>"));
        assert!(html.contains("<pre><code>code\n</code></pre>"));
    }

    #[test]
    fn test_advice_card_wraps_html() {
        let card = advice_card("<p>hi</p>");
        assert!(card.contains(r#"<div class="bg-white p-6 rounded-lg shadow border prose prose-indigo max-w-none">"#));
        assert!(card.contains("<p>hi</p>"));
        assert!(card.trim_end().ends_with("</div>"));
    }
}
