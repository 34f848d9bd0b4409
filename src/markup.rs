//! Rich-text runs and their rendering into the output dialect.

use serde::Deserialize;

/// Lightweight markup dialect of the output document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Emacs Org mode (`*` headings)
    #[default]
    Org,
    /// CommonMark (`#` headings)
    Markdown,
}

impl Dialect {
    /// Character repeated to mark a heading's level.
    pub fn heading_marker(self) -> char {
        match self {
            Dialect::Org => '*',
            Dialect::Markdown => '#',
        }
    }

    /// Default output file name for this dialect.
    pub fn default_document_name(self) -> &'static str {
        match self {
            Dialect::Org => "notes.org",
            Dialect::Markdown => "notes.md",
        }
    }

    /// Deepest heading level the dialect can express.
    pub fn max_level(self) -> Option<usize> {
        match self {
            Dialect::Org => None,
            Dialect::Markdown => Some(6),
        }
    }

    /// Render a heading line (without trailing newline) for a node at `depth`.
    ///
    /// Top-level nodes have depth 0 and get a single marker. Markdown stops at
    /// six markers; deeper nodes share the level-6 heading.
    pub fn heading(self, depth: usize, title: &str) -> String {
        let level = self.max_level().map_or(depth + 1, |max| (depth + 1).min(max));
        let markers: String = std::iter::repeat_n(self.heading_marker(), level).collect();
        let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
        format!("{markers} {title}")
    }

    /// Heading level of `line`, if it is a heading in this dialect.
    ///
    /// Markdown follows CommonMark ATX headings: up to three spaces of
    /// indentation, one to six `#`, then a space, a tab or the end of line.
    pub fn heading_level(self, line: &str) -> Option<usize> {
        let rest = match self {
            Dialect::Org => line,
            Dialect::Markdown => {
                let indent = leading_spaces(line);
                if indent > 3 {
                    return None;
                }
                &line[indent..]
            }
        };

        let marker = self.heading_marker();
        let level = rest.chars().take_while(|&c| c == marker).count();
        if level == 0 || self.max_level().is_some_and(|max| level > max) {
            return None;
        }
        match (self, rest[level..].chars().next()) {
            (_, Some(' ' | '\t')) => Some(level),
            (Dialect::Markdown, None) => Some(level),
            _ => None,
        }
    }

    fn wrap(self, style: Style, core: &str) -> String {
        if style.code {
            return match self {
                Dialect::Org => format!("~{core}~"),
                Dialect::Markdown => code_span(core),
            };
        }

        let mut out = core.to_string();
        let (strike, italic, bold) = match self {
            Dialect::Org => ("+", "/", "*"),
            Dialect::Markdown => ("~~", "*", "**"),
        };
        if style.strike {
            out = format!("{strike}{out}{strike}");
        }
        if style.italic {
            out = format!("{italic}{out}{italic}");
        }
        if style.bold {
            out = format!("{bold}{out}{bold}");
        }
        out
    }

    /// Neutralize a body line that would otherwise read as a heading.
    fn escape_line(self, line: &str) -> String {
        match self {
            Dialect::Org => {
                let only_markers = !line.is_empty() && line.chars().all(|c| c == '*');
                if self.heading_level(line).is_none() && !only_markers {
                    return line.to_string();
                }
                format!("\\ast{{}}{}", &line[1..])
            }
            Dialect::Markdown => {
                if self.heading_level(line).is_none() && !is_setext_underline(line) {
                    return line.to_string();
                }
                let indent = leading_spaces(line);
                format!("{}\\{}", &line[..indent], &line[indent..])
            }
        }
    }
}

fn leading_spaces(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

/// A line of only `=` or only `-` turns the paragraph above it into a
/// CommonMark heading.
fn is_setext_underline(line: &str) -> bool {
    let indent = leading_spaces(line);
    if indent > 3 {
        return false;
    }
    let core = line[indent..].trim_end();
    !core.is_empty() && (core.chars().all(|c| c == '=') || core.chars().all(|c| c == '-'))
}

/// Markdown code span whose fence is longer than any backtick run inside.
fn code_span(core: &str) -> String {
    let longest = core
        .split(|c: char| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest + 1);
    if core.starts_with('`') || core.ends_with('`') {
        format!("{fence} {core} {fence}")
    } else {
        format!("{fence}{core}{fence}")
    }
}

/// Formatting carried by a run of text.
///
/// Only the constructs both dialects can express are kept; colours, links,
/// scale and the like degrade to plain text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Style {
    pub bold: bool,
    pub italic: bool,
    pub code: bool,
    pub strike: bool,
}

impl Style {
    /// Fold one `rich_text` attribute into the style.
    pub fn apply(&mut self, key: &str, value: &str) {
        match (key, value) {
            ("weight", "heavy") => self.bold = true,
            ("style", "italic") => self.italic = true,
            ("family", "monospace") => self.code = true,
            ("strikethrough", "true") => self.strike = true,
            _ => {}
        }
    }

    pub fn is_plain(&self) -> bool {
        *self == Style::default()
    }
}

/// A contiguous piece of body text with uniform formatting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Run {
    pub text: String,
    pub style: Style,
}

impl Run {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: Style::default(),
        }
    }

    fn render_into(&self, dialect: Dialect, out: &mut String) {
        if self.style.is_plain() {
            out.push_str(&self.text);
            return;
        }

        for (i, line) in self.text.split('\n').enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let core = line.trim();
            if core.is_empty() {
                out.push_str(line);
                continue;
            }
            let start = line.len() - line.trim_start().len();
            let end = start + core.len();
            out.push_str(&line[..start]);
            out.push_str(&dialect.wrap(self.style, core));
            out.push_str(&line[end..]);
        }
    }
}

/// Whether the runs contain anything besides whitespace.
pub fn has_text(runs: &[Run]) -> bool {
    runs.iter().any(|run| !run.text.trim().is_empty())
}

/// Render a node body into `dialect`, trimming trailing whitespace.
///
/// Lines that would be parsed as headings are escaped so that the heading
/// structure of the output document only reflects the note tree.
pub fn render_body(runs: &[Run], dialect: Dialect) -> String {
    let mut raw = String::new();
    for run in runs {
        run.render_into(dialect, &mut raw);
    }

    raw.trim_end()
        .split('\n')
        .map(|line| dialect.escape_line(line))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn styled(text: &str, apply: &[(&str, &str)]) -> Run {
        let mut style = Style::default();
        for (k, v) in apply {
            style.apply(k, v);
        }
        Run {
            text: text.to_string(),
            style,
        }
    }

    #[test]
    fn headings_use_depth_plus_one_markers() {
        assert_eq!(Dialect::Org.heading(0, "Root"), "* Root");
        assert_eq!(Dialect::Org.heading(2, "Leaf"), "*** Leaf");
        assert_eq!(Dialect::Markdown.heading(1, "Child"), "## Child");
    }

    #[test]
    fn heading_titles_are_single_line() {
        assert_eq!(Dialect::Org.heading(0, "two\nlines  here"), "* two lines here");
    }

    #[test]
    fn heading_level_requires_a_space() {
        assert_eq!(Dialect::Org.heading_level("** Two"), Some(2));
        assert_eq!(Dialect::Org.heading_level("*bold* text"), None);
        assert_eq!(Dialect::Markdown.heading_level("### Three"), Some(3));
        assert_eq!(Dialect::Markdown.heading_level("#hashtag"), None);
        assert_eq!(Dialect::Markdown.heading_level("plain"), None);
    }

    #[test]
    fn styles_map_to_org() {
        let runs = vec![
            Run::plain("a "),
            styled("bold", &[("weight", "heavy")]),
            Run::plain(" "),
            styled("it", &[("style", "italic")]),
            Run::plain(" "),
            styled("x()", &[("family", "monospace"), ("weight", "heavy")]),
            Run::plain(" "),
            styled("gone", &[("strikethrough", "true")]),
        ];
        assert_eq!(render_body(&runs, Dialect::Org), "a *bold* /it/ ~x()~ +gone+");
    }

    #[test]
    fn styles_map_to_markdown() {
        let runs = vec![
            styled("both", &[("weight", "heavy"), ("style", "italic")]),
            Run::plain(" "),
            styled("code", &[("family", "monospace")]),
            Run::plain(" "),
            styled("old", &[("strikethrough", "true")]),
        ];
        assert_eq!(render_body(&runs, Dialect::Markdown), "***both*** `code` ~~old~~");
    }

    #[test]
    fn unsupported_attributes_degrade_to_plain_text() {
        let runs = vec![styled(
            "link",
            &[("link", "webs https://example.com"), ("foreground", "#ff0000")],
        )];
        assert_eq!(render_body(&runs, Dialect::Org), "link");
    }

    #[test]
    fn markers_wrap_only_the_line_core() {
        let runs = vec![styled("  first \n\nsecond", &[("weight", "heavy")])];
        assert_eq!(render_body(&runs, Dialect::Markdown), "  **first** \n\n**second**");
    }

    #[test]
    fn heading_like_lines_are_escaped() {
        let runs = vec![Run::plain("* item\n** deeper\n*bold* stays\n")];
        assert_eq!(
            render_body(&runs, Dialect::Org),
            "\\ast{} item\n\\ast{}* deeper\n*bold* stays"
        );

        let runs = vec![Run::plain("# title\n#tag")];
        assert_eq!(render_body(&runs, Dialect::Markdown), "\\# title\n#tag");
    }

    #[test]
    fn bare_marker_lines_are_escaped() {
        let runs = vec![Run::plain("***")];
        assert_eq!(render_body(&runs, Dialect::Org), "\\ast{}**");
    }

    #[test]
    fn markdown_heading_variants_are_escaped() {
        let cases = [
            ("#\tTabbed", "\\#\tTabbed"),
            ("   # Indented", "   \\# Indented"),
            ("    # Code block", "    # Code block"),
            ("###### Six", "\\###### Six"),
            ("####### Seven", "####### Seven"),
            ("#", "\\#"),
            ("Para\n===", "Para\n\\==="),
            ("Para\n---", "Para\n\\---"),
            ("Para\n  ---  ", "Para\n  \\---"),
            ("- item\n-- not a rule --", "- item\n-- not a rule --"),
        ];
        for (body, expected) in cases {
            let rendered = render_body(&[Run::plain(body)], Dialect::Markdown);
            assert_eq!(rendered, expected, "{body:?}");
            assert!(heading_levels(&rendered).is_empty(), "{body:?}");
        }
    }

    fn heading_levels(text: &str) -> Vec<usize> {
        text.lines()
            .filter_map(|line| Dialect::Markdown.heading_level(line))
            .collect()
    }

    #[test]
    fn markdown_heading_level_follows_atx_rules() {
        assert_eq!(Dialect::Markdown.heading_level("#\tTab"), Some(1));
        assert_eq!(Dialect::Markdown.heading_level("  ## Indented"), Some(2));
        assert_eq!(Dialect::Markdown.heading_level("    ## Too deep"), None);
        assert_eq!(Dialect::Markdown.heading_level("###"), Some(3));
        assert_eq!(Dialect::Markdown.heading_level("####### Seven"), None);
        assert_eq!(Dialect::Org.heading_level("**\tTab"), Some(2));
    }

    #[test]
    fn markdown_headings_stop_at_level_six() {
        assert_eq!(Dialect::Markdown.heading(5, "Six"), "###### Six");
        assert_eq!(Dialect::Markdown.heading(6, "Seven"), "###### Seven");
        assert_eq!(Dialect::Markdown.heading_level(&Dialect::Markdown.heading(9, "x")), Some(6));
        assert_eq!(Dialect::Org.heading(6, "Seven"), "******* Seven");
    }

    #[test]
    fn code_spans_outgrow_inner_backticks() {
        let code = |text: &str| render_body(&[styled(text, &[("family", "monospace")])], Dialect::Markdown);
        assert_eq!(code("a`b"), "``a`b``");
        assert_eq!(code("x``y`"), "``` x``y` ```");
        assert_eq!(code("`quoted`"), "`` `quoted` ``");
        assert_eq!(code("plain"), "`plain`");
    }

    #[test]
    fn has_text_ignores_whitespace() {
        assert!(!has_text(&[]));
        assert!(!has_text(&[Run::plain(" \n\t")]));
        assert!(has_text(&[Run::plain(" x ")]));
    }
}
