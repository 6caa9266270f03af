//! Trailing windows over one ticker's observations.
//!
//! Depth counts observations, including those whose value is missing. A
//! statistic is produced only once the window holds `capacity` observations.

use crate::stats::{mean, sample_std};
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct TrailingWindow {
    capacity: usize,
    values: VecDeque<Option<f64>>,
}

impl TrailingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            values: VecDeque::with_capacity(capacity + 1),
        }
    }

    pub fn push(&mut self, value: Option<f64>) {
        self.values.push_back(value);
        while self.values.len() > self.capacity {
            self.values.pop_front();
        }
    }

    /// Start over at a ticker boundary.
    pub fn reset(&mut self) {
        self.values.clear();
    }

    pub fn is_full(&self) -> bool {
        self.capacity > 0 && self.values.len() == self.capacity
    }

    fn present(&self) -> Vec<f64> {
        self.values.iter().flatten().copied().collect()
    }

    /// Sample standard deviation of the present values, full window only.
    pub fn std(&self) -> Option<f64> {
        if !self.is_full() {
            return None;
        }
        sample_std(&self.present())
    }

    /// Mean of the present values, full window only.
    pub fn mean(&self) -> Option<f64> {
        if !self.is_full() {
            return None;
        }
        mean(&self.present())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn nothing_until_full() {
        let mut w = TrailingWindow::new(3);
        w.push(Some(1.0));
        w.push(Some(2.0));
        assert_eq!(w.mean(), None);
        w.push(Some(3.0));
        assert_approx(w.mean().unwrap(), 2.0, DEFAULT_EPSILON);
    }

    #[test]
    fn oldest_value_leaves() {
        let mut w = TrailingWindow::new(2);
        for v in [1.0, 2.0, 10.0] {
            w.push(Some(v));
        }
        assert_approx(w.mean().unwrap(), 6.0, DEFAULT_EPSILON);
    }

    #[test]
    fn missing_values_count_toward_depth() {
        let mut w = TrailingWindow::new(3);
        w.push(None);
        w.push(Some(2.0));
        w.push(Some(4.0));
        assert!(w.is_full());
        assert_approx(w.mean().unwrap(), 3.0, DEFAULT_EPSILON);
        assert_approx(w.std().unwrap(), 2.0_f64.sqrt(), DEFAULT_EPSILON);
    }

    #[test]
    fn std_needs_two_present_values() {
        let mut w = TrailingWindow::new(2);
        w.push(None);
        w.push(Some(4.0));
        assert_eq!(w.std(), None);
    }

    #[test]
    fn reset_empties_the_window() {
        let mut w = TrailingWindow::new(1);
        w.push(Some(5.0));
        w.reset();
        assert!(!w.is_full());
    }
}
