use std::sync::Arc;

/// Ordered per-step invocation counts, one entry per paced step.
///
/// Immutable once built; clones share the same backing slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepPlan {
    steps: Arc<[usize]>,
}

impl StepPlan {
    pub fn new(steps: Vec<usize>) -> Self {
        Self {
            steps: steps.into(),
        }
    }

    /// A plan that fires `count` invocations in one step.
    pub fn single(count: usize) -> Self {
        Self::new(vec![count])
    }

    /// `steps` steps of `count` invocations each.
    pub fn uniform(count: usize, steps: usize) -> Self {
        Self::new(vec![count; steps])
    }

    /// Builds a plan from signed counts.
    ///
    /// # Panics
    /// Panics if any count is negative.
    pub fn from_signed(counts: &[i64]) -> Self {
        let steps = counts
            .iter()
            .enumerate()
            .map(|(step, &count)| {
                assert!(
                    count >= 0,
                    "step {} has negative invocation count {}",
                    step,
                    count
                );
                count as usize
            })
            .collect();
        Self::new(steps)
    }

    pub fn steps(&self) -> &[usize] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Total invocations across all steps.
    pub fn total(&self) -> usize {
        self.steps.iter().sum()
    }

    /// Global sequence number of the first invocation in `step`.
    pub fn offset(&self, step: usize) -> usize {
        self.steps.iter().take(step).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.steps.iter().copied()
    }
}

impl From<Vec<usize>> for StepPlan {
    fn from(steps: Vec<usize>) -> Self {
        Self::new(steps)
    }
}

impl From<&[usize]> for StepPlan {
    fn from(steps: &[usize]) -> Self {
        Self::new(steps.to_vec())
    }
}
