// Copyright (C) 2026 The Shard Authors. This program is free software: you
// can redistribute it and/or modify it under the terms of the GNU General
// Public License as published by the Free Software Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but
// WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General
// Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program. If not, see <https://www.gnu.org/licenses/>.
//

use serde::{Deserialize, Serialize};

/// A numeric gauge with `bottom <= value <= top` (spec §3 "Bounded
/// Property"). Mutators floor to integers and silently clamp to limits;
/// any value-changing mutation flips `changed`, which the outgoing diff
/// (spec §4.7) consumes and clears once sent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundedProperty {
    bottom: i64,
    top: i64,
    value: i64,
    #[serde(default)]
    changed: bool,
    /// Excluded from the outgoing property diff even when changed.
    #[serde(default)]
    no_client_diff: bool,
}

impl BoundedProperty {
    pub fn new(bottom: i64, top: i64, value: i64) -> Self {
        assert!(bottom <= top, "bottom must not exceed top");
        Self {
            bottom,
            top,
            value: value.clamp(bottom, top),
            changed: false,
            no_client_diff: false,
        }
    }

    pub fn with_no_client_diff(mut self, no_client_diff: bool) -> Self {
        self.no_client_diff = no_client_diff;
        self
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn bottom(&self) -> i64 {
        self.bottom
    }

    pub fn top(&self) -> i64 {
        self.top
    }

    pub fn changed(&self) -> bool {
        self.changed
    }

    pub fn excluded_from_diff(&self) -> bool {
        self.no_client_diff
    }

    /// Clears the changed flag once a diff containing this property has
    /// been emitted.
    pub fn clear_changed(&mut self) {
        self.changed = false;
    }

    fn clamp_and_set(&mut self, new_value: i64) {
        let clamped = new_value.clamp(self.bottom, self.top);
        if clamped != self.value {
            self.value = clamped;
            self.changed = true;
        }
    }

    pub fn set_val(&mut self, value: f64) {
        self.clamp_and_set(value.floor() as i64);
    }

    pub fn inc(&mut self, delta: f64) {
        self.clamp_and_set(self.value + delta.floor() as i64);
    }

    pub fn dec(&mut self, delta: f64) {
        self.clamp_and_set(self.value - delta.floor() as i64);
    }

    pub fn mult(&mut self, factor: f64) {
        self.clamp_and_set((self.value as f64 * factor).floor() as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_on_construction() {
        let p = BoundedProperty::new(0, 100, 150);
        assert_eq!(p.value(), 100);
    }

    #[test]
    fn inc_clamps_and_flags_changed() {
        let mut p = BoundedProperty::new(0, 10, 8);
        p.inc(5.0);
        assert_eq!(p.value(), 10);
        assert!(p.changed());
    }

    #[test]
    fn no_change_when_clamp_is_a_no_op() {
        let mut p = BoundedProperty::new(0, 10, 10);
        p.inc(5.0);
        assert_eq!(p.value(), 10);
        assert!(!p.changed(), "clamping to the same value must not mark changed");
    }

    #[test]
    fn mult_floors_result() {
        let mut p = BoundedProperty::new(0, 100, 10);
        p.mult(1.49);
        assert_eq!(p.value(), 14);
    }

    #[test]
    fn clear_changed_resets_flag() {
        let mut p = BoundedProperty::new(0, 10, 0);
        p.set_val(5.0);
        assert!(p.changed());
        p.clear_changed();
        assert!(!p.changed());
    }
}
