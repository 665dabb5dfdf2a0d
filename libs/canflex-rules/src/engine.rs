//! Rule engine
//!
//! Owns the active rule set and its per-rule debounce state. Evaluation runs
//! every rule against every received frame in rule order; rules whose
//! threshold is reached are returned to the caller for playback.

use crate::debounce::{register_hit, RuleState};
use crate::frame::Frame;
use crate::matcher::matches;
use crate::observer::{FrameSink, Observer};
use crate::types::{ActionSequence, Millis, Rule};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Maximum number of rules with debounce state
pub const MAX_TRACKED_RULES: usize = 32;

/// Result of replacing the active rule set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleSetReport {
    pub total: usize,
    pub monitored: usize,
    /// Indices of rules accepted but never evaluated (over capacity)
    pub unmonitored: Vec<usize>,
}

/// A rule that reached its threshold on the current frame
#[derive(Debug, Clone)]
pub struct FiredRule {
    pub index: usize,
    pub action: ActionSequence,
}

/// Engine-wide counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub frames_evaluated: u64,
    pub matches: u64,
    pub fired: u64,
}

pub struct RuleEngine {
    rules: Vec<Rule>,
    states: Vec<RuleState>,
    capacity: usize,
    observer: Observer,
    stats: EngineStats,
}

impl RuleEngine {
    /// Engine tracking at most `capacity` rules (clamped to `1..=MAX_TRACKED_RULES`)
    pub fn new(capacity: usize) -> Self {
        Self {
            rules: Vec::new(),
            states: Vec::new(),
            capacity: capacity.clamp(1, MAX_TRACKED_RULES),
            observer: Observer::default(),
            stats: EngineStats::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Debounce state of each monitored rule
    pub fn rule_states(&self) -> &[RuleState] {
        &self.states
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    pub fn monitored_count(&self) -> usize {
        self.states.len()
    }

    /// Atomically swap in a new rule set; all debounce state starts fresh
    pub fn replace_rule_set(&mut self, rules: Vec<Rule>, now: Millis) -> RuleSetReport {
        let total = rules.len();
        let monitored = total.min(self.capacity);
        let unmonitored: Vec<usize> = (monitored..total).collect();

        if !unmonitored.is_empty() {
            warn!(
                "Rule set has {} rules, only the first {} are monitored",
                total, monitored
            );
        }

        self.rules = rules;
        self.states = vec![RuleState::new(now); monitored];
        info!("Loaded {} rules ({} monitored)", total, monitored);

        RuleSetReport {
            total,
            monitored,
            unmonitored,
        }
    }

    /// Evaluate one received frame against every monitored rule
    pub fn on_frame(&mut self, frame: &Frame, now: Millis, sink: &dyn FrameSink) -> Vec<FiredRule> {
        self.observer.observe(frame, now, sink);
        self.stats.frames_evaluated += 1;

        let mut fired = Vec::new();
        for (index, (rule, state)) in self.rules.iter().zip(self.states.iter_mut()).enumerate() {
            if !matches(frame, &rule.trigger) {
                continue;
            }
            self.stats.matches += 1;

            if register_hit(state, now, rule.trigger.threshold, rule.trigger.window_ms) {
                debug!("Rule {} fired on id {:#X}", index, frame.id().raw());
                self.stats.fired += 1;
                fired.push(FiredRule {
                    index,
                    action: rule.action.clone(),
                });
            }
        }
        fired
    }

    /// Indices of monitored rules whose trigger matches `frame`, without
    /// touching debounce state
    pub fn dry_run(&self, frame: &Frame) -> Vec<usize> {
        self.rules
            .iter()
            .take(self.states.len())
            .enumerate()
            .filter(|(_, rule)| matches(frame, &rule.trigger))
            .map(|(index, _)| index)
            .collect()
    }

    pub fn set_observation_enabled(&self, enabled: bool) {
        self.observer.set_enabled(enabled);
    }

    pub fn observation_enabled(&self) -> bool {
        self.observer.is_enabled()
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new(MAX_TRACKED_RULES)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::frame::CanId;
    use crate::observer::NullSink;
    use crate::types::{ActionStep, TriggerSpec};
    use std::sync::Arc;

    fn rule(id: u16, threshold: u32) -> Rule {
        let step = ActionStep {
            frame: Frame::from_slice(CanId::Standard(0x700 + id), &[id as u8]).unwrap(),
            repeat: 1,
            gap_ms: 0,
            hold_ms: 0,
        };
        Rule {
            trigger: TriggerSpec {
                id: CanId::Standard(id),
                pattern: [0; 8],
                mask: [0; 8],
                covered: 8,
                threshold,
                window_ms: 500,
            },
            action: Arc::from(vec![step]),
        }
    }

    fn frame(id: u16) -> Frame {
        Frame::from_slice(CanId::Standard(id), &[1, 2]).unwrap()
    }

    #[test]
    fn test_capacity_overflow_reported() {
        let mut engine = RuleEngine::default();
        let rules = (0..40).map(|i| rule(i, 1)).collect();
        let report = engine.replace_rule_set(rules, 0);

        assert_eq!(report.total, 40);
        assert_eq!(report.monitored, 32);
        assert_eq!(report.unmonitored, (32..40).collect::<Vec<_>>());

        assert!(engine.on_frame(&frame(35), 0, &NullSink).is_empty());
        assert_eq!(engine.on_frame(&frame(5), 0, &NullSink).len(), 1);
        assert!(engine.dry_run(&frame(35)).is_empty());
    }

    #[test]
    fn test_multiple_rules_fire_in_order() {
        let mut engine = RuleEngine::default();
        engine.replace_rule_set(vec![rule(0x10, 1), rule(0x20, 1), rule(0x10, 1)], 0);

        let fired = engine.on_frame(&frame(0x10), 5, &NullSink);
        let indices: Vec<usize> = fired.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 2]);
        assert_eq!(engine.stats().fired, 2);
        assert_eq!(engine.stats().frames_evaluated, 1);
    }

    #[test]
    fn test_replace_resets_debounce_state() {
        let mut engine = RuleEngine::default();
        engine.replace_rule_set(vec![rule(0x10, 2)], 0);
        assert!(engine.on_frame(&frame(0x10), 10, &NullSink).is_empty());
        assert_eq!(engine.rule_states()[0].hit_count, 1);

        engine.replace_rule_set(vec![rule(0x10, 2)], 20);
        assert_eq!(engine.rule_states()[0], RuleState::new(20));
        assert!(engine.on_frame(&frame(0x10), 30, &NullSink).is_empty());
        assert_eq!(engine.on_frame(&frame(0x10), 40, &NullSink).len(), 1);
    }

    #[test]
    fn test_dry_run_leaves_state_untouched() {
        let mut engine = RuleEngine::default();
        engine.replace_rule_set(vec![rule(0x10, 2), rule(0x11, 1)], 0);
        assert_eq!(engine.dry_run(&frame(0x10)), vec![0]);
        assert!(engine.rule_states()[0].is_idle());
        assert_eq!(engine.stats().frames_evaluated, 0);
    }

    #[test]
    fn test_capacity_clamped() {
        assert_eq!(RuleEngine::new(0).capacity(), 1);
        assert_eq!(RuleEngine::new(100).capacity(), MAX_TRACKED_RULES);
        let mut engine = RuleEngine::new(2);
        let report = engine.replace_rule_set(vec![rule(1, 1), rule(2, 1), rule(3, 1)], 0);
        assert_eq!(report.unmonitored, vec![2]);
    }

    #[test]
    fn test_empty_rule_set_evaluates_nothing() {
        let mut engine = RuleEngine::default();
        let report = engine.replace_rule_set(Vec::new(), 0);
        assert_eq!(report, RuleSetReport::default());
        assert!(engine.on_frame(&frame(1), 0, &NullSink).is_empty());
    }
}
