use std::fmt;

/// The result of matching one requirement (or a group of them) against an
/// offer.
///
/// Outcomes form a tree mirroring the evaluation stages that produced them,
/// so a failed round explains exactly which demand the offer could not cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationOutcome {
    passed: bool,
    source: String,
    reason: String,
    children: Vec<EvaluationOutcome>,
}

impl EvaluationOutcome {
    pub fn pass<R: Into<String>>(source: &str, reason: R) -> Self {
        Self {
            passed: true,
            source: source.to_string(),
            reason: reason.into(),
            children: Vec::new(),
        }
    }

    pub fn fail<R: Into<String>>(source: &str, reason: R) -> Self {
        Self {
            passed: false,
            source: source.to_string(),
            reason: reason.into(),
            children: Vec::new(),
        }
    }

    /// Group child outcomes under this one. The parent's own pass flag is
    /// demoted if any child failed.
    pub fn with_children(mut self, children: Vec<EvaluationOutcome>) -> Self {
        self.passed = self.passed && children.iter().all(|c| c.passed);
        self.children = children;
        self
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn children(&self) -> &[EvaluationOutcome] {
        &self.children
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let verdict = if self.passed { "PASS" } else { "FAIL" };
        writeln!(
            f,
            "{:indent$}{verdict}({}): {}",
            "",
            self.source,
            self.reason,
            indent = depth * 2
        )?;
        for child in &self.children {
            child.fmt_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for EvaluationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_failure_demotes_parent() {
        let parent = EvaluationOutcome::pass("pod-0", "all tasks matched").with_children(vec![
            EvaluationOutcome::pass("Resource[cpus]", "consumed"),
            EvaluationOutcome::fail("Resource[mem]", "insufficient"),
        ]);
        assert!(!parent.passed());
    }

    #[test]
    fn all_passing_children_keep_parent_passing() {
        let parent = EvaluationOutcome::pass("pod-0", "ok")
            .with_children(vec![EvaluationOutcome::pass("Resource[cpus]", "consumed")]);
        assert!(parent.passed());
    }

    #[test]
    fn display_renders_indented_tree() {
        let outcome = EvaluationOutcome::fail("pod-0", "offer rejected").with_children(vec![
            EvaluationOutcome::fail("Resource[mem]", "insufficient")
                .with_children(vec![EvaluationOutcome::pass("detail", "nested")]),
        ]);
        let rendered = outcome.to_string();
        assert!(rendered.starts_with("FAIL(pod-0): offer rejected\n"));
        assert!(rendered.contains("\n  FAIL(Resource[mem]): insufficient\n"));
        assert!(rendered.contains("\n    PASS(detail): nested\n"));
    }
}
