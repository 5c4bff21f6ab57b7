//! Direct Dependency Retriever — free-text query to a ranked, *validated*
//! list of `CodeElement`s. Never returns an element whose `source_ref` isn't
//! `validated`.

use super::error::DdrError;
use super::hall_metric::HallMetric;
use super::source_ref::{CodeElement, SourceRef, SymbolCatalog};
use super::validator::Validator;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DdrResult {
    pub elements: Vec<CodeElement>,
    pub validated_count: u64,
    pub rejected_count: u64,
    pub hallucination_rate: f64,
    pub success: bool,
}

pub struct Ddr<'a> {
    catalog: &'a SymbolCatalog,
    repo_root: Option<std::path::PathBuf>,
    hall_metric: &'a HallMetric,
}

impl<'a> Ddr<'a> {
    pub fn new(catalog: &'a SymbolCatalog, hall_metric: &'a HallMetric) -> Self {
        Self {
            catalog,
            repo_root: None,
            hall_metric,
        }
    }

    pub fn with_repo_root(mut self, repo_root: impl Into<std::path::PathBuf>) -> Self {
        self.repo_root = Some(repo_root.into());
        self
    }

    /// Search the catalog into three priority buckets, then validate until
    /// `max_results` validated elements are found or candidates run out.
    pub fn retrieve(
        &self,
        query: &str,
        max_results: usize,
        fail_on_exceed: bool,
    ) -> Result<DdrResult, DdrError> {
        if self.catalog.is_empty() {
            return Err(DdrError::EmptyCatalog);
        }

        let candidates = self.search(query, max_results * 2);

        let validator = self
            .repo_root
            .as_ref()
            .map(|root| Validator::new(root.clone()));

        let mut elements = Vec::new();
        let mut validated_count: u64 = 0;
        let mut rejected_count: u64 = 0;

        for candidate in candidates {
            if validated_count as usize >= max_results {
                break;
            }
            let source_ref = SourceRef::new(&candidate.symbol, &candidate.file, candidate.line)
                .with_type(candidate.symbol_type);

            let validated = if let Some(validator) = &validator {
                validator.validate_ref(source_ref.clone())
            } else if !candidate.file.is_empty() && candidate.line > 0 {
                // No repo configured: accept on catalog provenance alone —
                // a non-zero line and non-empty file path is traceable.
                Some(source_ref.clone().mark_validated())
            } else {
                None
            };

            match validated {
                Some(validated_ref) => {
                    validated_count += 1;
                    elements.push(CodeElement {
                        content: validated_ref
                            .signature
                            .clone()
                            .unwrap_or_else(|| candidate.symbol.clone()),
                        context: None,
                        source_ref: validated_ref,
                    });
                }
                None => rejected_count += 1,
            }
        }

        self.hall_metric.record_and_check(
            validated_count,
            rejected_count,
            "ddr_retrieve",
            Some(query),
            fail_on_exceed,
        )?;

        let hallucination_rate = if validated_count + rejected_count == 0 {
            0.0
        } else {
            rejected_count as f64 / (validated_count + rejected_count) as f64
        };

        Ok(DdrResult {
            success: validated_count > 0 && hallucination_rate < 0.02,
            elements,
            validated_count,
            rejected_count,
            hallucination_rate,
        })
    }

    fn search(&self, query: &str, over_fetch: usize) -> Vec<super::source_ref::SymbolCatalogEntry> {
        let query_lower = query.to_lowercase();
        let mut exact = Vec::new();
        let mut substring = Vec::new();
        let mut word_match = Vec::new();

        let words: Vec<&str> = query_lower.split_whitespace().filter(|w| w.len() > 2).collect();

        for entries in self.catalog.index.values() {
            for entry in entries {
                let name_lower = entry.symbol.to_lowercase();
                if name_lower == query_lower {
                    exact.push(entry.clone());
                } else if name_lower.contains(&query_lower) {
                    substring.push(entry.clone());
                } else if words.iter().any(|w| name_lower.contains(w)) {
                    word_match.push(entry.clone());
                }
            }
        }

        exact.extend(substring);
        exact.extend(word_match);
        exact.truncate(over_fetch);
        exact
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::source_ref::SymbolType;

    fn catalog_with_one_entry() -> SymbolCatalog {
        SymbolCatalog::parse("### `src/state.py`\n- Line 50: `StateGraph` (class)\n")
    }

    #[test]
    fn exact_match_returns_validated_element() {
        let catalog = catalog_with_one_entry();
        let metric = HallMetric::new(0.5);
        let ddr = Ddr::new(&catalog, &metric);
        let result = ddr.retrieve("StateGraph", 5, false).unwrap();
        assert_eq!(result.validated_count, 1);
        assert_eq!(result.rejected_count, 0);
        assert!(result.success);
        assert_eq!(result.elements[0].source_ref.line_number, 50);
        assert!(result.elements[0].source_ref.validated);
        assert_eq!(result.elements[0].source_ref.symbol_type, SymbolType::Class);
    }

    #[test]
    fn empty_catalog_errors() {
        let catalog = SymbolCatalog::default();
        let metric = HallMetric::default();
        let ddr = Ddr::new(&catalog, &metric);
        assert!(matches!(
            ddr.retrieve("anything", 1, false),
            Err(DdrError::EmptyCatalog)
        ));
    }

    #[test]
    fn no_match_yields_zero_results() {
        let catalog = catalog_with_one_entry();
        let metric = HallMetric::default();
        let ddr = Ddr::new(&catalog, &metric);
        let result = ddr.retrieve("NoSuchSymbolAtAll", 5, false).unwrap();
        assert_eq!(result.validated_count, 0);
        assert!(!result.success);
    }

    #[test]
    fn stops_once_max_results_validated() {
        let text = "### `a.py`\n- Line 1: `thing_one` (function)\n- Line 2: `thing_two` (function)\n- Line 3: `thing_three` (function)\n";
        let catalog = SymbolCatalog::parse(text);
        let metric = HallMetric::default();
        let ddr = Ddr::new(&catalog, &metric);
        let result = ddr.retrieve("thing", 2, false).unwrap();
        assert_eq!(result.validated_count, 2);
    }
}
