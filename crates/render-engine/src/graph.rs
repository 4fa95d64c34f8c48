//! Filter graph construction and static checking.
//!
//! Streams are move-only handles allocated from a per-build [`LabelArena`],
//! so a label can only be consumed once by construction. The emitted text
//! program is additionally checked by [`lint_program`], which catches
//! dangling or reused labels and text that breaks the engine's quoting.

use std::collections::HashSet;
use std::fmt;

/// Media kind of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
}

impl StreamKind {
    fn specifier(self) -> char {
        match self {
            StreamKind::Video => 'v',
            StreamKind::Audio => 'a',
        }
    }
}

/// Allocates unique labels for one graph build.
#[derive(Debug, Default)]
pub struct LabelArena {
    names: Vec<String>,
}

impl LabelArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh label. `hint` must be alphabetic so the numeric
    /// suffix keeps every label unique.
    pub fn alloc(&mut self, hint: &str) -> String {
        debug_assert!(hint.chars().all(|c| c.is_ascii_alphabetic()), "label hint {hint:?}");
        let name = format!("{hint}{}", self.names.len());
        self.names.push(name.clone());
        name
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A labelled intermediate stream. Not `Clone`: consuming it moves it.
#[derive(Debug, PartialEq, Eq)]
pub struct Stream {
    label: String,
    kind: StreamKind,
}

impl Stream {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }
}

/// Something a statement can read from.
#[derive(Debug)]
pub enum Pad {
    /// An input file stream, e.g. `[2:a]`.
    Input { index: usize, kind: StreamKind },
    Stream(Stream),
}

impl Pad {
    pub fn input(index: usize, kind: StreamKind) -> Self {
        Pad::Input { index, kind }
    }

    fn label(&self) -> String {
        match self {
            Pad::Input { index, kind } => format!("{index}:{}", kind.specifier()),
            Pad::Stream(s) => s.label.clone(),
        }
    }
}

impl From<Stream> for Pad {
    fn from(stream: Stream) -> Self {
        Pad::Stream(stream)
    }
}

/// One `[in]...filter,filter[out]...` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub inputs: Vec<String>,
    pub filters: Vec<String>,
    pub outputs: Vec<String>,
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for input in &self.inputs {
            write!(f, "[{input}]")?;
        }
        f.write_str(&self.filters.join(","))?;
        for output in &self.outputs {
            write!(f, "[{output}]")?;
        }
        Ok(())
    }
}

/// Incrementally builds a filter program.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    arena: LabelArena,
    statements: Vec<Statement>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a filter chain to `inputs`, producing one new stream.
    pub fn chain<I, F>(&mut self, inputs: I, filters: F, kind: StreamKind, hint: &str) -> Stream
    where
        I: IntoIterator<Item = Pad>,
        F: IntoIterator<Item = String>,
    {
        let label = self.arena.alloc(hint);
        self.push(inputs, filters, vec![label.clone()], kind);
        Stream { label, kind }
    }

    /// A chain with no inputs (e.g. a `color` or `anullsrc` source).
    pub fn source<F>(&mut self, filters: F, kind: StreamKind, hint: &str) -> Stream
    where
        F: IntoIterator<Item = String>,
    {
        self.chain(std::iter::empty(), filters, kind, hint)
    }

    /// A chain producing several streams (e.g. `asplit`).
    pub fn split<I, F>(
        &mut self,
        inputs: I,
        filters: F,
        kind: StreamKind,
        hint: &str,
        count: usize,
    ) -> Vec<Stream>
    where
        I: IntoIterator<Item = Pad>,
        F: IntoIterator<Item = String>,
    {
        let labels: Vec<String> = (0..count).map(|_| self.arena.alloc(hint)).collect();
        self.push(inputs, filters, labels.clone(), kind);
        labels.into_iter().map(|label| Stream { label, kind }).collect()
    }

    /// Terminate a stream in a fixed, mapped output label such as `vout`.
    pub fn output<F>(&mut self, stream: Stream, filters: F, name: &str) -> OutputLabel
    where
        F: IntoIterator<Item = String>,
    {
        let kind = stream.kind;
        self.push([Pad::from(stream)], filters, vec![name.to_string()], kind);
        OutputLabel {
            name: name.to_string(),
            kind,
        }
    }

    fn push<I, F>(&mut self, inputs: I, filters: F, outputs: Vec<String>, kind: StreamKind)
    where
        I: IntoIterator<Item = Pad>,
        F: IntoIterator<Item = String>,
    {
        let inputs = inputs.into_iter().map(|p| p.label()).collect();
        let mut filters: Vec<String> = filters.into_iter().collect();
        if filters.is_empty() {
            filters.push(passthrough(kind).to_string());
        }
        self.statements.push(Statement {
            inputs,
            filters,
            outputs,
        });
    }

    pub fn finish(self) -> FilterProgram {
        FilterProgram {
            statements: self.statements,
        }
    }
}

fn passthrough(kind: StreamKind) -> &'static str {
    match kind {
        StreamKind::Video => "null",
        StreamKind::Audio => "anull",
    }
}

/// A mapped output of the program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLabel {
    pub name: String,
    pub kind: StreamKind,
}

impl OutputLabel {
    /// Argument for `-map`.
    pub fn map_arg(&self) -> String {
        format!("[{}]", self.name)
    }
}

/// An ordered list of filter statements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterProgram {
    pub statements: Vec<Statement>,
}

impl FilterProgram {
    /// The program text passed to `-filter_complex`.
    pub fn text(&self) -> String {
        self.statements
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(";")
    }

    pub fn lint(&self, input_count: usize) -> Result<LintReport, LintError> {
        lint_program(&self.text(), input_count)
    }

    /// Number of filters with the given name across all statements.
    pub fn count_filter(&self, name: &str) -> usize {
        self.statements
            .iter()
            .flat_map(|s| s.filters.iter())
            .filter(|f| filter_name(f) == name)
            .count()
    }
}

fn filter_name(filter: &str) -> &str {
    filter.split('=').next().unwrap_or(filter)
}

// ---------------------------------------------------------------------------
// Linting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LintError {
    #[error("unbalanced quote in filter program")]
    UnbalancedQuote,

    #[error("statement {statement}: unbalanced or unescaped bracket")]
    UnbalancedBracket { statement: usize },

    #[error("statement {statement}: no filter")]
    EmptyStatement { statement: usize },

    #[error("statement {statement}: label [{label}] is consumed before it is produced")]
    Unproduced { label: String, statement: usize },

    #[error("label [{label}] is consumed more than once")]
    ConsumedTwice { label: String },

    #[error("label [{label}] is produced more than once")]
    DuplicateLabel { label: String },

    #[error("input [{label}] refers past the {input_count} declared inputs")]
    InputOutOfRange { label: String, input_count: usize },
}

/// Result of a successful lint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintReport {
    pub statements: usize,
    /// Produced labels nobody consumes, in production order.
    pub dangling: Vec<String>,
}

/// Statically check a filter program.
///
/// Every consumed label must have exactly one earlier producer, no label
/// may be consumed twice, produced labels must be unique and input
/// references must name a declared input.
pub fn lint_program(text: &str, input_count: usize) -> Result<LintReport, LintError> {
    let statements = split_statements(text)?;

    let mut produced: Vec<String> = Vec::new();
    let mut producer_seen: HashSet<String> = HashSet::new();
    let mut consumed: HashSet<String> = HashSet::new();

    for (index, raw) in statements.iter().enumerate() {
        let parsed = parse_statement(raw, index)?;

        for label in parsed.inputs {
            if let Some(input) = input_index(&label) {
                if input >= input_count {
                    return Err(LintError::InputOutOfRange { label, input_count });
                }
                continue;
            }
            if !producer_seen.contains(&label) {
                return Err(LintError::Unproduced {
                    label,
                    statement: index,
                });
            }
            if !consumed.insert(label.clone()) {
                return Err(LintError::ConsumedTwice { label });
            }
        }

        for label in parsed.outputs {
            if !producer_seen.insert(label.clone()) {
                return Err(LintError::DuplicateLabel { label });
            }
            produced.push(label);
        }
    }

    Ok(LintReport {
        statements: statements.len(),
        dangling: produced
            .into_iter()
            .filter(|label| !consumed.contains(label))
            .collect(),
    })
}

struct ParsedStatement {
    inputs: Vec<String>,
    outputs: Vec<String>,
}

/// Split on `;` outside quotes and escapes, checking quote balance.
///
/// Inside single quotes every character up to the closing quote is literal,
/// backslashes included.
fn split_statements(text: &str) -> Result<Vec<String>, LintError> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' if !in_quote => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '\'' => {
                in_quote = !in_quote;
                current.push(c);
            }
            ';' if !in_quote => statements.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    if in_quote {
        return Err(LintError::UnbalancedQuote);
    }
    statements.push(current);
    Ok(statements)
}

fn parse_statement(raw: &str, index: usize) -> Result<ParsedStatement, LintError> {
    let bracket = || LintError::UnbalancedBracket { statement: index };
    let mut rest = raw.trim();

    let mut inputs = Vec::new();
    while let Some(after) = rest.strip_prefix('[') {
        let end = after.find(']').ok_or_else(bracket)?;
        inputs.push(after[..end].to_string());
        rest = after[end + 1..].trim_start();
    }

    let mut outputs = Vec::new();
    while let Some(before) = rest.strip_suffix(']') {
        let start = before.rfind('[').ok_or_else(bracket)?;
        // An escaped bracket belongs to the filter body.
        if before[..start].ends_with('\\') {
            break;
        }
        outputs.push(before[start + 1..].to_string());
        rest = before[..start].trim_end();
    }
    outputs.reverse();

    if rest.is_empty() {
        return Err(LintError::EmptyStatement { statement: index });
    }

    // The body may only contain brackets that are escaped or quoted.
    let mut in_quote = false;
    let mut chars = rest.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' if !in_quote => {
                chars.next();
            }
            '\'' => in_quote = !in_quote,
            '[' | ']' if !in_quote => return Err(bracket()),
            _ => {}
        }
    }

    Ok(ParsedStatement { inputs, outputs })
}

/// Parse `N`, `N:v`, `N:a` or `N:v:0` input references.
fn input_index(label: &str) -> Option<usize> {
    let head = label.split(':').next()?;
    if head.is_empty() || !head.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    head.parse().ok()
}

/// Mapped labels that are not dangling outputs of the linted program.
pub fn unmapped_outputs<'a>(report: &LintReport, mapped: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    mapped
        .into_iter()
        .filter(|name| !report.dangling.iter().any(|d| d == name))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_labels_are_unique() {
        let mut arena = LabelArena::new();
        let a = arena.alloc("v");
        let b = arena.alloc("v");
        let c = arena.alloc("norm");
        assert_ne!(a, b);
        assert_eq!(c, "norm2");
        assert_eq!(arena.len(), 3);
    }

    #[test]
    fn test_builder_emits_linted_program() {
        let mut g = GraphBuilder::new();
        let scaled = g.chain(
            [Pad::input(0, StreamKind::Video)],
            ["scale=1080:1920".to_string()],
            StreamKind::Video,
            "v",
        );
        let canvas = g.source(
            ["color=c=0x000000FF:s=1080x1920:d=5".to_string()],
            StreamKind::Video,
            "canvas",
        );
        let joined = g.chain(
            [Pad::from(canvas), Pad::from(scaled)],
            ["overlay=0:0".to_string()],
            StreamKind::Video,
            "v",
        );
        let out = g.output(joined, ["format=yuv420p".to_string()], "vout");
        let program = g.finish();

        assert_eq!(
            program.text(),
            "[0:v]scale=1080:1920[v0];color=c=0x000000FF:s=1080x1920:d=5[canvas1];[canvas1][v0]overlay=0:0[v2];[v2]format=yuv420p[vout]"
        );
        assert_eq!(out.map_arg(), "[vout]");
        let report = program.lint(1).unwrap();
        assert_eq!(report.dangling, vec!["vout".to_string()]);
        assert_eq!(program.count_filter("overlay"), 1);
    }

    #[test]
    fn test_split_produces_distinct_streams() {
        let mut g = GraphBuilder::new();
        let parts = g.split(
            [Pad::input(0, StreamKind::Audio)],
            ["asplit=2".to_string()],
            StreamKind::Audio,
            "a",
            2,
        );
        assert_eq!(parts.len(), 2);
        assert_ne!(parts[0].label(), parts[1].label());
        assert_eq!(g.finish().text(), "[0:a]asplit=2[a0][a1]");
    }

    #[test]
    fn test_lint_rejects_unproduced_label() {
        let err = lint_program("[x]null[y]", 1).unwrap_err();
        assert!(matches!(err, LintError::Unproduced { ref label, .. } if label == "x"));
    }

    #[test]
    fn test_lint_rejects_double_consumption() {
        let err = lint_program("[0:v]null[a];[a]null[b];[a]null[c]", 1).unwrap_err();
        assert_eq!(err, LintError::ConsumedTwice { label: "a".into() });
    }

    #[test]
    fn test_lint_rejects_duplicate_producer() {
        let err = lint_program("[0:v]null[a];[1:v]null[a]", 2).unwrap_err();
        assert_eq!(err, LintError::DuplicateLabel { label: "a".into() });
    }

    #[test]
    fn test_lint_rejects_out_of_range_input() {
        let err = lint_program("[3:a]anull[a]", 2).unwrap_err();
        assert!(matches!(err, LintError::InputOutOfRange { input_count: 2, .. }));
    }

    #[test]
    fn test_lint_reports_dangling_outputs() {
        let report = lint_program("[0:v]split[a][b];[a]null[vout]", 1).unwrap();
        assert_eq!(report.dangling, vec!["b".to_string(), "vout".to_string()]);
        assert_eq!(unmapped_outputs(&report, ["vout", "aout"]), vec!["aout".to_string()]);
    }

    #[test]
    fn test_lint_detects_unescaped_text() {
        // A bare apostrophe inside drawtext text leaves a quote open.
        let err = lint_program("[0:v]drawtext=text='it's'[v]", 1).unwrap_err();
        assert_eq!(err, LintError::UnbalancedQuote);

        // An unescaped bracket outside quotes breaks label parsing.
        let err = lint_program("[0:v]drawtext=text=a[b]c[v]", 1).unwrap_err();
        assert!(matches!(err, LintError::UnbalancedBracket { .. }));
    }

    #[test]
    fn test_lint_accepts_escaped_text() {
        let text = "[0:v]drawtext=text='It'\\''s \\[1\\]\\: go\\; now\\,':fontsize=40[v]";
        let report = lint_program(text, 1).unwrap();
        assert_eq!(report.dangling, vec!["v".to_string()]);
    }

    #[test]
    fn test_lint_quoted_backslash_is_literal() {
        let report = lint_program("[0:v]drawtext=text='C\\:\\\\'[v]", 1).unwrap();
        assert_eq!(report.dangling, vec!["v".to_string()]);

        // A single trailing backslash inside quotes still closes the quote.
        let report = lint_program("[0:v]drawtext=text='C\\:\\'[v]", 1).unwrap();
        assert_eq!(report.statements, 1);
    }

    #[test]
    fn test_lint_quoted_semicolons_do_not_split() {
        let report = lint_program("[0:v]drawtext=text='a;b':enable='between(t,0,5)'[v]", 1).unwrap();
        assert_eq!(report.statements, 1);
    }

    #[test]
    fn test_empty_chain_is_a_passthrough() {
        let mut g = GraphBuilder::new();
        let v = g.chain([Pad::input(0, StreamKind::Video)], Vec::new(), StreamKind::Video, "v");
        g.output(v, Vec::new(), "vout");
        let program = g.finish();
        assert_eq!(program.text(), "[0:v]null[v0];[v0]null[vout]");

        let mut g = GraphBuilder::new();
        let a = g.chain([Pad::input(0, StreamKind::Audio)], Vec::new(), StreamKind::Audio, "a");
        g.output(a, Vec::new(), "aout");
        assert_eq!(g.finish().text(), "[0:a]anull[a0];[a0]anull[aout]");
    }
}
