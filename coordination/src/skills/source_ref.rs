//! Source references, code elements, and symbol-catalog parsing.
//!
//! A `SourceRef` may only carry `validated = true` after passing through the
//! `validator` module or a direct file/line existence proof — every
//! downstream consumer depends on that invariant holding.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Broad kind of a referenced symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolType {
    Class,
    Function,
    Method,
    Variable,
    Import,
    Unknown,
}

impl SymbolType {
    /// Infer a type from capitalization, matching the catalog parser's rule:
    /// `Symbol` (leading uppercase) is a class, otherwise a function.
    pub fn infer_from_name(name: &str) -> Self {
        match name.chars().next() {
            Some(c) if c.is_uppercase() => Self::Class,
            Some(_) => Self::Function,
            None => Self::Unknown,
        }
    }
}

impl std::fmt::Display for SymbolType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Class => "class",
            Self::Function => "function",
            Self::Method => "method",
            Self::Variable => "variable",
            Self::Import => "import",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// A claimed-or-verified location of a symbol in source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub symbol_name: String,
    pub symbol_type: SymbolType,
    pub file_path: String,
    pub line_number: u32,
    pub end_line: Option<u32>,
    pub signature: Option<String>,
    pub docstring: Option<String>,
    pub validated: bool,
}

impl SourceRef {
    pub fn new(symbol_name: impl Into<String>, file_path: impl Into<String>, line_number: u32) -> Self {
        let symbol_name = symbol_name.into();
        let symbol_type = SymbolType::infer_from_name(&symbol_name);
        Self {
            symbol_name,
            symbol_type,
            file_path: file_path.into(),
            line_number,
            end_line: None,
            signature: None,
            docstring: None,
            validated: false,
        }
    }

    pub fn with_type(mut self, symbol_type: SymbolType) -> Self {
        self.symbol_type = symbol_type;
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    /// Mark as validated. Callers outside `validator`/`ddr` should not call
    /// this directly — it exists so those two modules can finalize a ref.
    pub fn mark_validated(mut self) -> Self {
        self.validated = true;
        self
    }

    pub fn citation_key(&self) -> String {
        format!("{}:{}", self.file_path, self.line_number)
    }
}

/// A `SourceRef` plus the extracted text of the symbol's own definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeElement {
    pub source_ref: SourceRef,
    pub content: String,
    pub context: Option<String>,
}

impl CodeElement {
    pub fn is_valid(&self) -> bool {
        self.source_ref.validated
    }
}

/// One row parsed out of a textual symbol catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolCatalogEntry {
    pub symbol: String,
    pub symbol_type: SymbolType,
    pub file: String,
    pub line: u32,
    pub url: Option<String>,
}

/// `symbol (lowercased) -> entries`. Many entries may share a name.
#[derive(Debug, Clone, Default)]
pub struct SymbolCatalog {
    pub index: HashMap<String, Vec<SymbolCatalogEntry>>,
}

impl SymbolCatalog {
    pub fn len(&self) -> usize {
        self.index.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn lookup(&self, symbol: &str) -> &[SymbolCatalogEntry] {
        self.index
            .get(&symbol.to_lowercase())
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    fn insert(&mut self, entry: SymbolCatalogEntry) {
        self.index
            .entry(entry.symbol.to_lowercase())
            .or_default()
            .push(entry);
    }

    /// Parse a textual symbol catalog. Three interleaved formats are
    /// recognized in one pass; malformed lines are skipped silently.
    ///
    /// 1. Hyperlink: `` [`Symbol`](URL) ``, where a `/blob/`-bearing URL has
    ///    its commit segment stripped.
    /// 2. File heading `### \`path\`` followed by `- Line N: \`Symbol\` (type)`.
    /// 3. Table rows `| Symbol | Type | Line | Signature |` under a file-path
    ///    section header.
    pub fn parse(text: &str) -> Self {
        let mut catalog = Self::default();
        let mut current_file: Option<String> = None;

        for line in text.lines() {
            let trimmed = line.trim();

            if let Some(heading) = trimmed.strip_prefix("### ") {
                let path = heading.trim().trim_matches('`');
                if !path.is_empty() {
                    current_file = Some(path.to_string());
                }
                continue;
            }

            if let Some(entry) = parse_hyperlink_line(trimmed) {
                catalog.insert(entry);
                continue;
            }

            if let Some(file) = &current_file {
                if let Some(entry) = parse_line_heading(trimmed, file) {
                    catalog.insert(entry);
                    continue;
                }
                if let Some(entry) = parse_table_row(trimmed, file) {
                    catalog.insert(entry);
                    continue;
                }
            }
        }

        catalog
    }
}

/// Split a GitHub-style blob URL into `(file_path, line)`, dropping the
/// commit segment immediately after `/blob/`. Left pluggable per the spec's
/// open question about non-GitHub hosts: callers needing a different host
/// convention should implement their own splitter and bypass this one.
pub fn split_blob_url(url: &str) -> Option<(String, Option<u32>)> {
    let idx = url.find("/blob/")?;
    let remainder = &url[idx + "/blob/".len()..];
    // remainder is "<commit>/path/to/file.ext[#Ldddd]"
    let mut parts = remainder.splitn(2, '/');
    let _commit = parts.next()?;
    let rest = parts.next()?;
    let (path, anchor) = match rest.split_once('#') {
        Some((p, a)) => (p, Some(a)),
        None => (rest, None),
    };
    let line = anchor.and_then(|a| a.strip_prefix('L')).and_then(|n| n.parse().ok());
    Some((path.to_string(), line))
}

fn parse_hyperlink_line(line: &str) -> Option<SymbolCatalogEntry> {
    // `[`Symbol`](URL)`
    let start = line.find("[`")?;
    let name_start = start + 2;
    let name_end = line[name_start..].find('`')? + name_start;
    let symbol = &line[name_start..name_end];

    let url_start = line[name_end..].find("](")? + name_end + 2;
    let url_end = line[url_start..].find(')')? + url_start;
    let url = &line[url_start..url_end];

    if !url.contains("/blob/") {
        return None;
    }
    let (file, line_no) = split_blob_url(url)?;
    Some(SymbolCatalogEntry {
        symbol_type: SymbolType::infer_from_name(symbol),
        symbol: symbol.to_string(),
        file,
        line: line_no.unwrap_or(0),
        url: Some(url.to_string()),
    })
}

fn parse_line_heading(line: &str, file: &str) -> Option<SymbolCatalogEntry> {
    // `- Line N: `Symbol` (type)`
    let rest = line.strip_prefix("- Line ")?;
    let (num, rest) = rest.split_once(':')?;
    let line_no: u32 = num.trim().parse().ok()?;

    let rest = rest.trim();
    let name_start = rest.find('`')? + 1;
    let name_end = rest[name_start..].find('`')? + name_start;
    let symbol = &rest[name_start..name_end];

    let symbol_type = rest[name_end..]
        .find('(')
        .and_then(|open| {
            let close = rest[name_end..].find(')')?;
            Some(rest[name_end + open + 1..name_end + close].trim())
        })
        .map(parse_type_word)
        .unwrap_or_else(|| SymbolType::infer_from_name(symbol));

    Some(SymbolCatalogEntry {
        symbol: symbol.to_string(),
        symbol_type,
        file: file.to_string(),
        line: line_no,
        url: None,
    })
}

fn parse_table_row(line: &str, file: &str) -> Option<SymbolCatalogEntry> {
    if !line.starts_with('|') {
        return None;
    }
    let cells: Vec<&str> = line
        .trim_matches('|')
        .split('|')
        .map(|c| c.trim())
        .collect();
    if cells.len() < 3 {
        return None;
    }
    // Skip markdown separator rows like `| --- | --- | --- |`
    if cells.iter().all(|c| c.chars().all(|ch| ch == '-' || ch == ':')) {
        return None;
    }
    let symbol = cells[0].trim_matches('`');
    if symbol.is_empty() || symbol.eq_ignore_ascii_case("symbol") {
        return None;
    }
    let symbol_type = parse_type_word(cells[1]);
    let line_no: u32 = cells[2].parse().ok()?;

    Some(SymbolCatalogEntry {
        symbol: symbol.to_string(),
        symbol_type,
        file: file.to_string(),
        line: line_no,
        url: None,
    })
}

fn parse_type_word(word: &str) -> SymbolType {
    match word.to_lowercase().as_str() {
        "class" => SymbolType::Class,
        "function" | "fn" => SymbolType::Function,
        "method" => SymbolType::Method,
        "variable" | "var" => SymbolType::Variable,
        "import" => SymbolType::Import,
        _ => SymbolType::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hyperlink_entries() {
        let text = "See [`StateGraph`](https://github.com/org/repo/blob/abc123/src/state.py#L50) for details.";
        let catalog = SymbolCatalog::parse(text);
        let entries = catalog.lookup("StateGraph");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].file, "src/state.py");
        assert_eq!(entries[0].line, 50);
        assert_eq!(entries[0].symbol_type, SymbolType::Class);
    }

    #[test]
    fn parses_file_heading_and_line_entries() {
        let text = "### `src/state.py`\n- Line 50: `StateGraph` (class)\n- Line 80: `build_graph` (function)\n";
        let catalog = SymbolCatalog::parse(text);
        assert_eq!(catalog.lookup("StateGraph")[0].line, 50);
        assert_eq!(catalog.lookup("build_graph")[0].file, "src/state.py");
    }

    #[test]
    fn parses_table_rows() {
        let text = "### `src/state.py`\n| Symbol | Type | Line | Signature |\n| --- | --- | --- | --- |\n| `StateGraph` | class | 50 | `class StateGraph:` |\n";
        let catalog = SymbolCatalog::parse(text);
        assert_eq!(catalog.lookup("StateGraph")[0].line, 50);
    }

    #[test]
    fn skips_malformed_lines_silently() {
        let text = "this is just prose\n### not/a/real/heading extra junk\n- Line abc: broken\n";
        let catalog = SymbolCatalog::parse(text);
        assert!(catalog.is_empty());
    }

    #[test]
    fn split_blob_url_strips_commit_segment() {
        let (path, line) = split_blob_url("https://github.com/org/repo/blob/deadbeef/a/b.py#L12").unwrap();
        assert_eq!(path, "a/b.py");
        assert_eq!(line, Some(12));
    }

    #[test]
    fn symbol_type_inferred_from_case() {
        assert_eq!(SymbolType::infer_from_name("StateGraph"), SymbolType::Class);
        assert_eq!(SymbolType::infer_from_name("build_graph"), SymbolType::Function);
    }
}
