pub mod auditor;
pub mod extractor;

pub use auditor::{AuditResult, ClaimAuditor, ClaimVerification};
pub use extractor::{Claim, ClaimExtractor, ClaimType, Severity};
