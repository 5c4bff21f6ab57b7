//! Claim Auditor — verifies extracted claims through a cascade of
//! strategies and aggregates the result into a pass/fail verdict.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::extractor::{Claim, ClaimType, Severity};
use crate::skills::ddr::Ddr;
use crate::skills::error::AuditError;
use crate::skills::hall_metric::HallMetric;
use crate::skills::source_ref::{SourceRef, SymbolCatalog};
use crate::skills::validator::{ValidationSource, Validator};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimVerification {
    pub claim: Claim,
    pub verified: bool,
    pub confidence: f64,
    pub sources_confirmed: Vec<ValidationSource>,
    pub rejection_reason: Option<String>,
    pub actual_line: Option<u32>,
    pub actual_type: Option<String>,
    pub discrepancies: Vec<String>,
}

impl ClaimVerification {
    pub fn is_high_confidence(&self) -> bool {
        self.sources_confirmed.len() >= 2
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditResult {
    pub passed: bool,
    pub total_claims: usize,
    pub verified_claims: usize,
    pub unverified_claims: usize,
    pub hallucination_rate: f64,
    pub critical_unverified: usize,
    pub high_unverified: usize,
    pub medium_unverified: usize,
    pub low_unverified: usize,
    pub multi_source_confirmed: usize,
    pub high_confidence_count: usize,
    pub verifications: Vec<ClaimVerification>,
}

/// `strict` requires zero unverified claims; otherwise the lenient
/// hallucination-rate threshold gates the verdict.
pub struct ClaimAuditor<'a> {
    pub repo_root: Option<std::path::PathBuf>,
    pub catalog: Option<&'a SymbolCatalog>,
    pub strict: bool,
    pub threshold: f64,
    pub hall_metric: &'a HallMetric,
}

impl<'a> ClaimAuditor<'a> {
    pub fn new(hall_metric: &'a HallMetric) -> Self {
        Self {
            repo_root: None,
            catalog: None,
            strict: false,
            threshold: 0.02,
            hall_metric,
        }
    }

    pub fn with_repo_root(mut self, root: impl Into<std::path::PathBuf>) -> Self {
        self.repo_root = Some(root.into());
        self
    }

    pub fn with_catalog(mut self, catalog: &'a SymbolCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn audit(
        &self,
        claims: &[Claim],
        provided_refs: &[SourceRef],
        fail_on_hall_m_exceed: bool,
    ) -> Result<AuditResult, AuditError> {
        if claims.is_empty() {
            return Err(AuditError::NoClaims);
        }

        let mut verifications = Vec::with_capacity(claims.len());
        for claim in claims {
            verifications.push(self.verify_claim(claim, provided_refs));
        }

        let verified_claims = verifications.iter().filter(|v| v.verified).count();
        let unverified_claims = verifications.len() - verified_claims;
        let hallucination_rate = unverified_claims as f64 / verifications.len() as f64;

        let mut critical_unverified = 0;
        let mut high_unverified = 0;
        let mut medium_unverified = 0;
        let mut low_unverified = 0;
        for v in verifications.iter().filter(|v| !v.verified) {
            match v.claim.severity {
                Severity::Critical => critical_unverified += 1,
                Severity::High => high_unverified += 1,
                Severity::Medium => medium_unverified += 1,
                Severity::Low => low_unverified += 1,
            }
        }

        let multi_source_confirmed = verifications.iter().filter(|v| v.sources_confirmed.len() >= 2).count();
        let high_confidence_count = verifications.iter().filter(|v| v.is_high_confidence()).count();

        let passed = if self.strict {
            critical_unverified == 0 && unverified_claims == 0
        } else {
            hallucination_rate < self.threshold
        };

        self.hall_metric.record_and_check(
            verified_claims as u64,
            unverified_claims as u64,
            "claim_audit",
            Some(&format!("content:{}chars", claims.len())),
            fail_on_hall_m_exceed,
        )?;

        Ok(AuditResult {
            passed,
            total_claims: verifications.len(),
            verified_claims,
            unverified_claims,
            hallucination_rate,
            critical_unverified,
            high_unverified,
            medium_unverified,
            low_unverified,
            multi_source_confirmed,
            high_confidence_count,
            verifications,
        })
    }

    fn verify_claim(&self, claim: &Claim, provided_refs: &[SourceRef]) -> ClaimVerification {
        // 1. Provided refs.
        if let Some(hit) = self.match_provided_ref(claim, provided_refs) {
            return ClaimVerification {
                claim: claim.clone(),
                verified: true,
                confidence: 0.95,
                sources_confirmed: vec![],
                rejection_reason: None,
                actual_line: Some(hit.line_number),
                actual_type: Some(hit.symbol_type.to_string()),
                discrepancies: vec![],
            };
        }

        // 2. Multi-source validator, if we know file+line and have a repo.
        if let (Some(root), Some(symbol)) = (&self.repo_root, &claim.symbol_mentioned) {
            if let Some(line) = claim.line_cited.or_else(|| self.line_for_symbol(claim, provided_refs)) {
                let file = claim
                    .file_cited
                    .clone()
                    .unwrap_or_else(|| symbol.clone());
                let validator = Validator::new(root.clone());
                let result = validator.validate_symbol(symbol, &file, line, None);
                if result.is_valid {
                    return ClaimVerification {
                        claim: claim.clone(),
                        verified: true,
                        confidence: result.confidence,
                        sources_confirmed: result.sources_confirmed,
                        rejection_reason: None,
                        actual_line: result.actual_line,
                        actual_type: result.symbol_kind.map(|t| t.to_string()),
                        discrepancies: result
                            .discrepancies
                            .iter()
                            .map(|d| format!("{}: expected {}, actual {}", d.field, d.expected, d.actual))
                            .collect(),
                    };
                }
            }
        }

        // 3. DDR lookup against the catalog.
        if let (Some(catalog), Some(symbol)) = (self.catalog, &claim.symbol_mentioned) {
            let hall_metric = HallMetric::new(1.0); // scratch metric, not the shared one
            let mut ddr = Ddr::new(catalog, &hall_metric);
            if let Some(root) = &self.repo_root {
                ddr = ddr.with_repo_root(root.clone());
            }
            if let Ok(result) = ddr.retrieve(symbol, 1, false) {
                if let Some(element) = result.elements.first() {
                    return ClaimVerification {
                        claim: claim.clone(),
                        verified: true,
                        confidence: 0.7,
                        sources_confirmed: vec![],
                        rejection_reason: None,
                        actual_line: Some(element.source_ref.line_number),
                        actual_type: Some(element.source_ref.symbol_type.to_string()),
                        discrepancies: vec![],
                    };
                }
            }
        }

        // 4. Direct citation check: does the file exist and does the line fit?
        if let (Some(file), Some(line)) = (&claim.file_cited, claim.line_cited) {
            if let Some(root) = &self.repo_root {
                let full = root.join(file);
                if let Ok(contents) = std::fs::read_to_string(&full) {
                    let line_count = contents.lines().count() as u32;
                    if line <= line_count {
                        return ClaimVerification {
                            claim: claim.clone(),
                            verified: true,
                            confidence: 0.8,
                            sources_confirmed: vec![],
                            rejection_reason: None,
                            actual_line: Some(line),
                            actual_type: None,
                            discrepancies: vec![],
                        };
                    }
                }
            }
        }

        // 5. Category-specific fallback.
        match claim.claim_type {
            ClaimType::Pattern => ClaimVerification {
                claim: claim.clone(),
                verified: false,
                confidence: 0.3,
                sources_confirmed: vec![],
                rejection_reason: Some("design-pattern mention is inconclusive".to_string()),
                actual_line: None,
                actual_type: None,
                discrepancies: vec![],
            },
            ClaimType::Behavior => ClaimVerification {
                claim: claim.clone(),
                verified: false,
                confidence: 0.0,
                sources_confirmed: vec![],
                rejection_reason: Some(format!(
                    "behavior claim about {:?} could not be grounded in source",
                    claim.symbol_mentioned
                )),
                actual_line: None,
                actual_type: None,
                discrepancies: vec![],
            },
            _ => ClaimVerification {
                claim: claim.clone(),
                verified: false,
                confidence: 0.0,
                sources_confirmed: vec![],
                rejection_reason: Some("no evidence source confirmed this claim".to_string()),
                actual_line: None,
                actual_type: None,
                discrepancies: vec![],
            },
        }
    }

    fn match_provided_ref<'b>(&self, claim: &Claim, refs: &'b [SourceRef]) -> Option<&'b SourceRef> {
        refs.iter().find(|r| {
            let symbol_match = claim
                .symbol_mentioned
                .as_ref()
                .map(|s| {
                    let s = s.to_lowercase();
                    let name = r.symbol_name.to_lowercase();
                    name.contains(&s) || s.contains(&name)
                })
                .unwrap_or(false);
            let citation_match = match (&claim.file_cited, claim.line_cited) {
                (Some(file), Some(line)) => {
                    paths_match(file, &r.file_path)
                        && (line as i64 - r.line_number as i64).abs() <= 3
                }
                _ => false,
            };
            symbol_match || citation_match
        })
    }

    fn line_for_symbol(&self, claim: &Claim, refs: &[SourceRef]) -> Option<u32> {
        let symbol = claim.symbol_mentioned.as_ref()?;
        refs.iter()
            .find(|r| r.symbol_name.eq_ignore_ascii_case(symbol))
            .map(|r| r.line_number)
    }
}

fn paths_match(a: &str, b: &str) -> bool {
    Path::new(a).file_name() == Path::new(b).file_name() || a == b
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::claims::extractor::ClaimExtractor;

    #[test]
    fn strict_audit_passes_with_grounded_claim() {
        let extractor = ClaimExtractor::default();
        let claims = extractor.extract(
            "Use `StateGraph` defined at langgraph/graph/state.py:50 to build flows.",
        );
        let refs = vec![SourceRef::new("StateGraph", "langgraph/graph/state.py", 50)
            .with_type(crate::skills::source_ref::SymbolType::Class)
            .mark_validated()];
        let metric = HallMetric::new(1.0);
        let auditor = ClaimAuditor::new(&metric).strict(true);
        let result = auditor.audit(&claims, &refs, false).unwrap();
        assert!(result.passed, "{result:?}");
        assert_eq!(result.unverified_claims, 0);
        assert_eq!(result.hallucination_rate, 0.0);
    }

    #[test]
    fn hallucinated_symbol_fails_strict_audit() {
        let extractor = ClaimExtractor::default();
        let claims = extractor.extract(
            "Use `WormholeGraph` to teleport state. Import from `langgraph.nonexistent`.",
        );
        let metric = HallMetric::new(1.0);
        let auditor = ClaimAuditor::new(&metric).strict(true);
        let result = auditor.audit(&claims, &[], false).unwrap();
        assert!(!result.passed);
        assert!(result.critical_unverified >= 1);
        assert!(result.hallucination_rate >= 0.5);
    }

    #[test]
    fn lenient_mode_passes_under_threshold() {
        let extractor = ClaimExtractor::default();
        let claims = extractor.extract("`StateGraph` is used. `unknown_thing()` also appears.");
        let refs = vec![SourceRef::new("StateGraph", "a.py", 1).mark_validated()];
        let metric = HallMetric::new(1.0);
        let auditor = ClaimAuditor::new(&metric).strict(false);
        let mut auditor = auditor;
        auditor.threshold = 0.6;
        let result = auditor.audit(&claims, &refs, false).unwrap();
        assert!(result.passed);
    }
}
