//! Citation System — stamps backtick-quoted symbol mentions with verifiable
//! `file:line` citations, and re-parses already-cited content to check those
//! citations still resolve to real files.

use std::collections::HashMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::source_ref::SourceRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationFormat {
    Inline,
    Markdown,
    Github,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationConfig {
    pub format: CitationFormat,
    pub github_base: Option<String>,
    pub include_line_range: bool,
}

impl Default for CitationConfig {
    fn default() -> Self {
        Self {
            format: CitationFormat::Markdown,
            github_base: None,
            include_line_range: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationResult {
    pub original_content: String,
    pub cited_content: String,
    pub citations_added: usize,
    pub uncited_symbols: Vec<String>,
    pub citation_map: HashMap<String, String>,
}

impl CitationResult {
    pub fn all_cited(&self) -> bool {
        self.uncited_symbols.is_empty()
    }
}

static SYMBOL_MENTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)`").unwrap());
static MARKDOWN_CITATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[`([^`]+)`\]\(([^)]+)\)").unwrap());
static INLINE_CITATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`\s*\(([^)]+)\)").unwrap());

/// Registers validated `SourceRef`s by lowercase symbol name (and, for
/// dotted names, by the final segment too), then stamps citations onto
/// backtick-quoted mentions found in prose.
pub struct CitationSystem {
    config: CitationConfig,
    refs_by_symbol: HashMap<String, SourceRef>,
}

impl CitationSystem {
    pub fn new(config: CitationConfig) -> Self {
        Self {
            config,
            refs_by_symbol: HashMap::new(),
        }
    }

    pub fn register_refs(&mut self, refs: &[SourceRef]) {
        for r in refs {
            let key = r.symbol_name.to_lowercase();
            self.refs_by_symbol.entry(key).or_insert_with(|| r.clone());
            if let Some(last) = r.symbol_name.rsplit('.').next() {
                if last != r.symbol_name {
                    self.refs_by_symbol.insert(last.to_lowercase(), r.clone());
                }
            }
        }
    }

    /// Find every `` `Symbol` `` mention and either cite it (if a ref is
    /// registered) or record it as uncited. Replacement is applied
    /// right-to-left so earlier match spans stay valid as later ones are
    /// spliced in.
    pub fn add_citations(&mut self, content: &str, refs: &[SourceRef]) -> CitationResult {
        if !refs.is_empty() {
            self.register_refs(refs);
        }

        let mut cited_content = content.to_string();
        let mut citations_added = 0;
        let mut uncited_symbols = Vec::new();
        let mut citation_map = HashMap::new();

        let matches: Vec<_> = SYMBOL_MENTION.captures_iter(content).collect();
        for cap in matches.into_iter().rev() {
            let whole = cap.get(0).unwrap();
            let symbol = cap.get(1).unwrap().as_str().to_string();
            let symbol_lower = symbol.to_lowercase();

            if let Some(r) = self.refs_by_symbol.get(&symbol_lower) {
                let citation = self.format_citation(&symbol, r);
                citation_map.insert(symbol.clone(), citation.clone());
                cited_content.replace_range(whole.start()..whole.end(), &citation);
                citations_added += 1;
            } else if !uncited_symbols.contains(&symbol) {
                uncited_symbols.push(symbol);
            }
        }
        uncited_symbols.reverse();

        CitationResult {
            original_content: content.to_string(),
            cited_content,
            citations_added,
            uncited_symbols,
            citation_map,
        }
    }

    fn format_citation(&self, symbol: &str, r: &SourceRef) -> String {
        match self.config.format {
            CitationFormat::Inline => format!("`{symbol}` ({})", r.citation_key()),
            CitationFormat::Github if self.config.github_base.is_some() => {
                let base = self.config.github_base.as_deref().unwrap();
                let mut url = format!("{}/{}#L{}", base.trim_end_matches('/'), r.file_path, r.line_number);
                if self.config.include_line_range {
                    if let Some(end) = r.end_line {
                        url.push_str(&format!("-L{end}"));
                    }
                }
                format!("[`{symbol}`]({url})")
            }
            _ => format!("[`{symbol}`]({}#L{})", r.file_path, r.line_number),
        }
    }

    pub fn get_uncited_report(&self, result: &CitationResult) -> String {
        if result.uncited_symbols.is_empty() {
            return "All symbols have citations.".to_string();
        }
        let mut lines = vec![
            "Uncited Symbols (Potential Hallucinations):".to_string(),
            "=".repeat(40),
        ];
        for symbol in &result.uncited_symbols {
            lines.push(format!("  - `{symbol}`: No source reference found"));
        }
        lines.push(String::new());
        lines.push(format!("Total: {} uncited symbols", result.uncited_symbols.len()));
        lines.push("Action: Verify these symbols exist in source code".to_string());
        lines.join("\n")
    }
}

pub fn add_citations(content: &str, refs: &[SourceRef], github_base: Option<&str>) -> CitationResult {
    let config = CitationConfig {
        format: if github_base.is_some() {
            CitationFormat::Github
        } else {
            CitationFormat::Markdown
        },
        github_base: github_base.map(|s| s.to_string()),
        include_line_range: false,
    };
    CitationSystem::new(config).add_citations(content, refs)
}

/// Re-parse already-cited content back into `(symbol, citation)` pairs,
/// covering both the markdown-link and inline-parenthetical forms.
pub fn extract_cited_symbols(content: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for cap in MARKDOWN_CITATION.captures_iter(content) {
        pairs.push((cap[1].to_string(), cap[2].to_string()));
    }
    for cap in INLINE_CITATION.captures_iter(content) {
        pairs.push((cap[1].to_string(), cap[2].to_string()));
    }
    pairs
}

/// Verify each extracted citation's file segment exists under `repo_root`.
/// Without a repo root, falls back to a format-only sanity check.
pub fn verify_citations(content: &str, repo_root: Option<&Path>) -> HashMap<String, bool> {
    let mut results = HashMap::new();
    for (symbol, citation) in extract_cited_symbols(content) {
        let file_path = if let Some((before, _)) = citation.split_once("#L") {
            before.to_string()
        } else if let Some((before, _)) = citation.split_once(':') {
            before.to_string()
        } else {
            citation.clone()
        };

        let valid = match repo_root {
            Some(root) => root.join(&file_path).exists(),
            None => !file_path.is_empty() && (file_path.ends_with(".py") || file_path.contains('.')),
        };

        results.insert(format!("{symbol}@{citation}"), valid);
    }
    results
}
