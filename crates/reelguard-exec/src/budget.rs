//! Externally owned per-frame execution budget.

use std::cell::Cell;

/// Default step quota per frame.
///
/// One step is charged per AST node evaluated and per spring integration
/// step. The default sits well above the heaviest legitimate frame the
/// test compositions produce while still stopping a runaway loop quickly.
pub const DEFAULT_STEP_QUOTA: u64 = 2_000_000;

/// Step budget for one execution or one frame render.
///
/// The budget is owned by the caller of the executor, not hidden inside
/// the compiled unit: the render loop calls [`FrameBudget::reset`] before
/// every frame, so long animations never saturate a counter that was only
/// sized for a single frame. Steps are counted rather than wall-clock time
/// so the browser preview and the cloud worker agree on what is over
/// budget.
#[derive(Debug)]
pub struct FrameBudget {
    quota: u64,
    used: Cell<u64>,
}

impl FrameBudget {
    /// Creates a budget with an explicit step quota.
    #[must_use]
    pub const fn new(quota: u64) -> Self {
        Self {
            quota,
            used: Cell::new(0),
        }
    }

    /// Creates a budget with the default quota.
    #[must_use]
    pub const fn standard() -> Self {
        Self::new(DEFAULT_STEP_QUOTA)
    }

    /// Clears the used-step counter. Called by the render loop before each
    /// frame.
    pub fn reset(&self) {
        self.used.set(0);
    }

    /// Charges one step. Returns `false` once the quota is exhausted.
    #[must_use]
    pub fn charge(&self) -> bool {
        let used = self.used.get().saturating_add(1);
        self.used.set(used);
        used <= self.quota
    }

    /// Returns the steps consumed since the last reset.
    #[must_use]
    pub fn used(&self) -> u64 {
        self.used.get()
    }

    /// Returns the configured quota.
    #[must_use]
    pub const fn quota(&self) -> u64 {
        self.quota
    }
}

impl Default for FrameBudget {
    fn default() -> Self {
        Self::standard()
    }
}
