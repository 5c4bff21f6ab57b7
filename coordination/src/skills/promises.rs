//! Completion Promises — a predicate set with AND/OR semantics, evaluated
//! against whatever result type a Ralph Wiggum iteration produces.

use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};

/// Trust tier a promise's check result should be weighed at. Reused from the
/// source-evidence trust hierarchy rather than duplicated: `HardContent` is
/// the strongest guarantee a promise can make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromiseTrust {
    HardContent,
    VerifiedSoft,
    Unverified,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromiseResult {
    pub name: String,
    pub passed: bool,
    pub required: bool,
    pub reason: Option<String>,
}

/// One named predicate over a result value. `check` is boxed so a
/// `PromiseSet` can hold a heterogeneous mix of closures.
pub struct CompletionPromise<T> {
    pub name: String,
    pub description: String,
    pub trust_level: PromiseTrust,
    pub required: bool,
    pub error_message: String,
    check: Box<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T> CompletionPromise<T> {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        check: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Self {
        let name = name.into();
        Self {
            error_message: format!("promise '{name}' was not satisfied"),
            name,
            description: description.into(),
            trust_level: PromiseTrust::Unverified,
            required: true,
            check: Box::new(check),
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn trust(mut self, trust_level: PromiseTrust) -> Self {
        self.trust_level = trust_level;
        self
    }

    pub fn error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = message.into();
        self
    }

    /// Runs `check`, catching a panic inside it and counting it as failure.
    fn evaluate(&self, value: &T) -> PromiseResult {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (self.check)(value)));
        match outcome {
            Ok(passed) => PromiseResult {
                name: self.name.clone(),
                passed,
                required: self.required,
                reason: if passed {
                    None
                } else {
                    Some(self.error_message.clone())
                },
            },
            Err(panic_payload) => {
                let reason = panic_payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic_payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "promise check panicked".to_string());
                PromiseResult {
                    name: self.name.clone(),
                    passed: false,
                    required: self.required,
                    reason: Some(reason),
                }
            }
        }
    }
}

/// A named collection of promises plus an AND/OR combination rule.
pub struct PromiseSet<T> {
    pub promises: Vec<CompletionPromise<T>>,
    pub require_all: bool,
}

impl<T> PromiseSet<T> {
    pub fn all(promises: Vec<CompletionPromise<T>>) -> Self {
        Self {
            promises,
            require_all: true,
        }
    }

    pub fn any(promises: Vec<CompletionPromise<T>>) -> Self {
        Self {
            promises,
            require_all: false,
        }
    }

    /// Evaluate every promise against `value` and combine per `require_all`.
    pub fn evaluate(&self, value: &T) -> (bool, Vec<PromiseResult>) {
        let results: Vec<PromiseResult> = self.promises.iter().map(|p| p.evaluate(value)).collect();

        let passed = if self.require_all {
            let required: Vec<&PromiseResult> = results.iter().filter(|r| r.required).collect();
            required.is_empty() || required.iter().all(|r| r.passed)
        } else {
            results.iter().any(|r| r.passed)
        };

        (passed, results)
    }
}

/// The standard skill-generation completion set described in the pipeline's
/// design notes: enough skills produced, source-grounded, at least one
/// sandbox-verified.
pub struct SkillGenerationOutcome {
    pub skills_created: usize,
    pub any_citation_resolves: bool,
    pub any_sandbox_verified: bool,
}

pub fn standard_skill_promises(min_skills: usize) -> PromiseSet<SkillGenerationOutcome> {
    PromiseSet::all(vec![
        CompletionPromise::new(
            "min_skills_created",
            format!("at least {min_skills} skills created"),
            move |o: &SkillGenerationOutcome| o.skills_created >= min_skills,
        )
        .trust(PromiseTrust::HardContent),
        CompletionPromise::new(
            "source_grounded",
            "at least one citation resolves to an existing file",
            |o: &SkillGenerationOutcome| o.any_citation_resolves,
        )
        .trust(PromiseTrust::VerifiedSoft),
        CompletionPromise::new(
            "sandbox_verified",
            "at least one skill passed sandbox verification",
            |o: &SkillGenerationOutcome| o.any_sandbox_verified,
        )
        .trust(PromiseTrust::VerifiedSoft),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_semantics_require_every_required_promise() {
        let set: PromiseSet<i32> = PromiseSet::all(vec![
            CompletionPromise::new("positive", "n > 0", |n: &i32| *n > 0),
            CompletionPromise::new("even", "n is even", |n: &i32| n % 2 == 0),
        ]);
        let (passed, results) = set.evaluate(&3);
        assert!(!passed);
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn and_semantics_filters_to_required_before_checking() {
        let set: PromiseSet<i32> = PromiseSet::all(vec![
            CompletionPromise::new("positive", "n > 0", |n: &i32| *n > 0),
            CompletionPromise::new("even", "n is even", |n: &i32| n % 2 == 0).required(false),
        ]);
        let (passed, _) = set.evaluate(&3);
        assert!(passed, "odd positive number should pass since 'even' isn't required");
    }

    #[test]
    fn or_semantics_pass_on_any_match_across_full_list() {
        let set: PromiseSet<i32> = PromiseSet::any(vec![
            CompletionPromise::new("negative", "n < 0", |n: &i32| *n < 0),
            CompletionPromise::new("even", "n is even", |n: &i32| n % 2 == 0),
        ]);
        let (passed, _) = set.evaluate(&4);
        assert!(passed);
    }

    #[test]
    fn panicking_check_counts_as_failure_not_crash() {
        let set: PromiseSet<i32> = PromiseSet::all(vec![CompletionPromise::new(
            "always_panics",
            "deliberately panics",
            |_: &i32| panic!("boom"),
        )]);
        let (passed, results) = set.evaluate(&1);
        assert!(!passed);
        assert!(results[0].reason.as_deref().unwrap().contains("boom"));
    }

    #[test]
    fn empty_required_set_after_filter_passes_vacuously() {
        let set: PromiseSet<i32> = PromiseSet::all(vec![
            CompletionPromise::new("never", "always false", |_: &i32| false).required(false),
        ]);
        let (passed, _) = set.evaluate(&1);
        assert!(passed);
    }

    #[test]
    fn standard_skill_promises_pass_with_sufficient_output() {
        let set = standard_skill_promises(2);
        let outcome = SkillGenerationOutcome {
            skills_created: 3,
            any_citation_resolves: true,
            any_sandbox_verified: true,
        };
        let (passed, _) = set.evaluate(&outcome);
        assert!(passed);
    }
}
