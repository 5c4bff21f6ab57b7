//! Claim Extractor — scans generated text and embedded code blocks for
//! verifiable factual claims, emitting a typed, de-duplicated list.
//!
//! Implemented as a const pattern table matched in a single pass, following
//! the style already used for diff safety-pattern scanning
//! (`verifier::safety_scan::PATTERNS`).

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimType {
    Symbol,
    Behavior,
    Api,
    Pattern,
    Citation,
    CodeBlock,
    Import,
    Docstring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub text: String,
    pub claim_type: ClaimType,
    pub severity: Severity,
    pub symbol_mentioned: Option<String>,
    pub expected_type: Option<String>,
    pub file_cited: Option<String>,
    pub line_cited: Option<u32>,
    pub parameters: Vec<String>,
    pub return_type: Option<String>,
    pub behavior_verb: Option<String>,
    pub context: String,
}

impl Claim {
    fn dedup_key(&self) -> String {
        if let (Some(file), Some(line)) = (&self.file_cited, self.line_cited) {
            format!("cite:{file}:{line}")
        } else if let Some(symbol) = &self.symbol_mentioned {
            format!("sym:{symbol}")
        } else {
            format!("text:{}", self.text)
        }
    }
}

fn context_around(content: &str, start: usize, end: usize) -> String {
    let lo = start.saturating_sub(50);
    let hi = (end + 50).min(content.len());
    // Guard against splitting multi-byte UTF-8 boundaries.
    let lo = floor_char_boundary(content, lo);
    let hi = ceil_char_boundary(content, hi);
    content[lo..hi].to_string()
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

static RE_CLASS: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([A-Z][A-Za-z0-9_]*)`").unwrap());
static RE_FUNCTION_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`([a-z_][a-z0-9_]*)\(\)`").unwrap());
static RE_THE_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"the `([A-Za-z_][A-Za-z0-9_]*)` class").unwrap());
static RE_CITATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([\w./-]+\.(?:py|ts|tsx|js|jsx|rs|go)):(\d+)").unwrap()
});
static RE_METHOD_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`([A-Za-z_][A-Za-z0-9_]*)\.([a-z_][A-Za-z0-9_]*)\(\)`").unwrap());
static RE_PARAMETER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"the `([A-Za-z_][A-Za-z0-9_]*)` (?:parameter|argument)").unwrap());
static RE_FROM_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"from ([\w.]+) import ([\w, ]+)").unwrap());
static RE_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^import ([\w.]+)(?: as (\w+))?").unwrap());
static RE_RETURNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`([A-Za-z_][A-Za-z0-9_]*)` returns ([\w\[\], ]+)").unwrap());
static RE_ACCEPTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"`([A-Za-z_][A-Za-z0-9_]*)` (?:accepts|takes) (?:an? )?([\w]+) parameter").unwrap()
});
static RE_CREATES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"`([A-Za-z_][A-Za-z0-9_]*)` (?:creates|builds|generates) ([\w ]+)").unwrap()
});
static RE_CODE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?ms)```python\n(.*?)```").unwrap());
static RE_CODE_DEF: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*(?:class|def)\s+(\w+)").unwrap());
static RE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"the (factory|singleton|observer|decorator|adapter|strategy|builder|proxy|facade|composite) pattern").unwrap()
});

/// Scans content and emits ordered, de-duplicated claims.
pub struct ClaimExtractor {
    pub extract_behaviors: bool,
}

impl Default for ClaimExtractor {
    fn default() -> Self {
        Self {
            extract_behaviors: true,
        }
    }
}

impl ClaimExtractor {
    pub fn extract(&self, content: &str) -> Vec<Claim> {
        let mut claims = Vec::new();
        let mut seen = HashSet::new();

        let mut push = |claim: Claim, seen: &mut HashSet<String>, claims: &mut Vec<Claim>| {
            let key = claim.dedup_key();
            if seen.insert(key) {
                claims.push(claim);
            }
        };

        for m in RE_CLASS.captures_iter(content) {
            let whole = m.get(0).unwrap();
            let name = m.get(1).unwrap().as_str().to_string();
            push(
                Claim {
                    text: whole.as_str().to_string(),
                    claim_type: ClaimType::Symbol,
                    severity: Severity::Critical,
                    symbol_mentioned: Some(name),
                    expected_type: Some("class".to_string()),
                    file_cited: None,
                    line_cited: None,
                    parameters: vec![],
                    return_type: None,
                    behavior_verb: None,
                    context: context_around(content, whole.start(), whole.end()),
                },
                &mut seen,
                &mut claims,
            );
        }

        for m in RE_FUNCTION_CALL.captures_iter(content) {
            let whole = m.get(0).unwrap();
            let name = m.get(1).unwrap().as_str().to_string();
            push(
                Claim {
                    text: whole.as_str().to_string(),
                    claim_type: ClaimType::Symbol,
                    severity: Severity::Critical,
                    symbol_mentioned: Some(name),
                    expected_type: Some("function".to_string()),
                    file_cited: None,
                    line_cited: None,
                    parameters: vec![],
                    return_type: None,
                    behavior_verb: None,
                    context: context_around(content, whole.start(), whole.end()),
                },
                &mut seen,
                &mut claims,
            );
        }

        for m in RE_THE_CLASS.captures_iter(content) {
            let whole = m.get(0).unwrap();
            let name = m.get(1).unwrap().as_str().to_string();
            push(
                Claim {
                    text: whole.as_str().to_string(),
                    claim_type: ClaimType::Symbol,
                    severity: Severity::Critical,
                    symbol_mentioned: Some(name),
                    expected_type: Some("class".to_string()),
                    file_cited: None,
                    line_cited: None,
                    parameters: vec![],
                    return_type: None,
                    behavior_verb: None,
                    context: context_around(content, whole.start(), whole.end()),
                },
                &mut seen,
                &mut claims,
            );
        }

        for m in RE_CITATION.captures_iter(content) {
            let whole = m.get(0).unwrap();
            let file = m.get(1).unwrap().as_str().to_string();
            let line: u32 = m.get(2).unwrap().as_str().parse().unwrap_or(0);
            push(
                Claim {
                    text: whole.as_str().to_string(),
                    claim_type: ClaimType::Citation,
                    severity: Severity::Critical,
                    symbol_mentioned: None,
                    expected_type: None,
                    file_cited: Some(file),
                    line_cited: Some(line),
                    parameters: vec![],
                    return_type: None,
                    behavior_verb: None,
                    context: context_around(content, whole.start(), whole.end()),
                },
                &mut seen,
                &mut claims,
            );
        }

        for m in RE_METHOD_CALL.captures_iter(content) {
            let whole = m.get(0).unwrap();
            let obj = m.get(1).unwrap().as_str();
            let method = m.get(2).unwrap().as_str();
            push(
                Claim {
                    text: whole.as_str().to_string(),
                    claim_type: ClaimType::Api,
                    severity: Severity::Critical,
                    symbol_mentioned: Some(format!("{obj}.{method}")),
                    expected_type: Some("method".to_string()),
                    file_cited: None,
                    line_cited: None,
                    parameters: vec![],
                    return_type: None,
                    behavior_verb: None,
                    context: context_around(content, whole.start(), whole.end()),
                },
                &mut seen,
                &mut claims,
            );
        }

        for m in RE_PARAMETER.captures_iter(content) {
            let whole = m.get(0).unwrap();
            let name = m.get(1).unwrap().as_str().to_string();
            push(
                Claim {
                    text: whole.as_str().to_string(),
                    claim_type: ClaimType::Api,
                    severity: Severity::High,
                    symbol_mentioned: Some(name),
                    expected_type: Some("parameter".to_string()),
                    file_cited: None,
                    line_cited: None,
                    parameters: vec![],
                    return_type: None,
                    behavior_verb: None,
                    context: context_around(content, whole.start(), whole.end()),
                },
                &mut seen,
                &mut claims,
            );
        }

        for m in RE_FROM_IMPORT.captures_iter(content) {
            let whole = m.get(0).unwrap();
            let module = m.get(1).unwrap().as_str();
            let names = m.get(2).unwrap().as_str();
            for name in names.split(',').map(|n| n.trim()).filter(|n| !n.is_empty()) {
                push(
                    Claim {
                        text: whole.as_str().to_string(),
                        claim_type: ClaimType::Import,
                        severity: Severity::Critical,
                        symbol_mentioned: Some(name.to_string()),
                        expected_type: Some("import".to_string()),
                        file_cited: None,
                        line_cited: None,
                        parameters: vec![],
                        return_type: None,
                        behavior_verb: None,
                        context: format!("from {module} import {names}"),
                    },
                    &mut seen,
                    &mut claims,
                );
            }
        }

        for m in RE_IMPORT.captures_iter(content) {
            let whole = m.get(0).unwrap();
            let module = m.get(1).unwrap().as_str().to_string();
            push(
                Claim {
                    text: whole.as_str().to_string(),
                    claim_type: ClaimType::Import,
                    severity: Severity::High,
                    symbol_mentioned: Some(module),
                    expected_type: Some("import".to_string()),
                    file_cited: None,
                    line_cited: None,
                    parameters: vec![],
                    return_type: None,
                    behavior_verb: None,
                    context: context_around(content, whole.start(), whole.end()),
                },
                &mut seen,
                &mut claims,
            );
        }

        if self.extract_behaviors {
            for m in RE_RETURNS.captures_iter(content) {
                let whole = m.get(0).unwrap();
                let name = m.get(1).unwrap().as_str().to_string();
                let ret = m.get(2).unwrap().as_str().trim().to_string();
                push(
                    Claim {
                        text: whole.as_str().to_string(),
                        claim_type: ClaimType::Behavior,
                        severity: Severity::High,
                        symbol_mentioned: Some(name),
                        expected_type: None,
                        file_cited: None,
                        line_cited: None,
                        parameters: vec![],
                        return_type: Some(ret),
                        behavior_verb: Some("returns".to_string()),
                        context: context_around(content, whole.start(), whole.end()),
                    },
                    &mut seen,
                    &mut claims,
                );
            }

            for m in RE_ACCEPTS.captures_iter(content) {
                let whole = m.get(0).unwrap();
                let name = m.get(1).unwrap().as_str().to_string();
                let param_type = m.get(2).unwrap().as_str().to_string();
                push(
                    Claim {
                        text: whole.as_str().to_string(),
                        claim_type: ClaimType::Behavior,
                        severity: Severity::High,
                        symbol_mentioned: Some(name),
                        expected_type: None,
                        file_cited: None,
                        line_cited: None,
                        parameters: vec![param_type],
                        return_type: None,
                        behavior_verb: Some("accepts".to_string()),
                        context: context_around(content, whole.start(), whole.end()),
                    },
                    &mut seen,
                    &mut claims,
                );
            }

            for m in RE_CREATES.captures_iter(content) {
                let whole = m.get(0).unwrap();
                let name = m.get(1).unwrap().as_str().to_string();
                push(
                    Claim {
                        text: whole.as_str().to_string(),
                        claim_type: ClaimType::Behavior,
                        severity: Severity::Medium,
                        symbol_mentioned: Some(name),
                        expected_type: None,
                        file_cited: None,
                        line_cited: None,
                        parameters: vec![],
                        return_type: None,
                        behavior_verb: Some("creates".to_string()),
                        context: context_around(content, whole.start(), whole.end()),
                    },
                    &mut seen,
                    &mut claims,
                );
            }
        }

        for block in RE_CODE_BLOCK.captures_iter(content) {
            let code = block.get(1).unwrap().as_str();
            for def in RE_CODE_DEF.captures_iter(code) {
                let name = def.get(1).unwrap().as_str();
                if name == "__init__" {
                    continue;
                }
                push(
                    Claim {
                        text: def.get(0).unwrap().as_str().to_string(),
                        claim_type: ClaimType::CodeBlock,
                        severity: Severity::Medium,
                        symbol_mentioned: Some(name.to_string()),
                        expected_type: None,
                        file_cited: None,
                        line_cited: None,
                        parameters: vec![],
                        return_type: None,
                        behavior_verb: None,
                        context: code.chars().take(100).collect(),
                    },
                    &mut seen,
                    &mut claims,
                );
            }
        }

        for m in RE_PATTERN.captures_iter(content) {
            let whole = m.get(0).unwrap();
            push(
                Claim {
                    text: whole.as_str().to_string(),
                    claim_type: ClaimType::Pattern,
                    severity: Severity::Low,
                    symbol_mentioned: None,
                    expected_type: None,
                    file_cited: None,
                    line_cited: None,
                    parameters: vec![],
                    return_type: None,
                    behavior_verb: None,
                    context: context_around(content, whole.start(), whole.end()),
                },
                &mut seen,
                &mut claims,
            );
        }

        claims
    }
}
