//! Admission policy: pure logic deciding whether a pending task may start
//! given the current active set.
//!
//! Two stacked gates apply. The lane gate compares the task's credential
//! lane against that lane's cap. The module gate serializes shared-lane
//! work per module; private-lane tasks bypass it, since a caller supplying
//! its own credential has already assumed the upstream rate-limit risk.

use std::collections::HashMap;

use studio_common::{TaskInfo, TaskModule};

use crate::config::DispatchConfig;

/// Concurrency caps evaluated by the admission loop.
#[derive(Debug, Clone)]
pub struct AdmissionPolicy {
    shared_lane_cap: usize,
    private_lane_cap: usize,
    script_cap: usize,
    storyboard_cap: usize,
    assets_cap: usize,
    system_cap: usize,
}

impl AdmissionPolicy {
    pub fn from_config(config: &DispatchConfig) -> Self {
        Self {
            shared_lane_cap: config.lanes.shared,
            private_lane_cap: config.lanes.private,
            script_cap: config.modules.script,
            storyboard_cap: config.modules.storyboard,
            assets_cap: config.modules.assets,
            system_cap: config.modules.system,
        }
    }

    fn lane_cap(&self, own_credential: bool) -> usize {
        if own_credential {
            self.private_lane_cap
        } else {
            self.shared_lane_cap
        }
    }

    fn module_cap(&self, module: TaskModule) -> usize {
        match module {
            TaskModule::Script => self.script_cap,
            TaskModule::Storyboard => self.storyboard_cap,
            TaskModule::Assets => self.assets_cap,
            TaskModule::System => self.system_cap,
        }
    }

    /// Whether a task with the given lane and module may start now.
    /// Both applicable gates must pass simultaneously.
    pub fn admits(&self, own_credential: bool, module: TaskModule, counts: &ActiveCounts) -> bool {
        if counts.lane(own_credential) >= self.lane_cap(own_credential) {
            return false;
        }
        // Module serialization only constrains the shared lane.
        if !own_credential && counts.module(module) >= self.module_cap(module) {
            return false;
        }
        true
    }

    /// Whether both lanes are at capacity; nothing further can be admitted
    /// in this pass.
    pub fn saturated(&self, counts: &ActiveCounts) -> bool {
        counts.lane(false) >= self.shared_lane_cap && counts.lane(true) >= self.private_lane_cap
    }
}

/// Snapshot of active-task counts, grown in place as a single admission
/// pass promotes tasks.
#[derive(Debug, Default)]
pub struct ActiveCounts {
    shared: usize,
    private: usize,
    per_module: HashMap<TaskModule, usize>,
}

impl ActiveCounts {
    pub fn from_active<'a>(active: impl Iterator<Item = &'a TaskInfo>) -> Self {
        let mut counts = Self::default();
        for info in active {
            counts.note_admitted(info.own_credential, info.module);
        }
        counts
    }

    pub fn note_admitted(&mut self, own_credential: bool, module: TaskModule) {
        if own_credential {
            self.private += 1;
        } else {
            self.shared += 1;
        }
        *self.per_module.entry(module).or_insert(0) += 1;
    }

    fn lane(&self, own_credential: bool) -> usize {
        if own_credential {
            self.private
        } else {
            self.shared
        }
    }

    fn module(&self, module: TaskModule) -> usize {
        self.per_module.get(&module).copied().unwrap_or(0)
    }
}
