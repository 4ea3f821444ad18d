// Threshold registry
// Per-tag cutoffs used to count how many observations exceeded them.
// Survives flushes; only the accumulator is reset per window
//
// Numan Thabit 2025 Nov

use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct ThresholdRegistry {
    by_tag: HashMap<String, Vec<f64>>,
}

impl ThresholdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the thresholds for `tag`. Repeated values keep their first
    /// position. An empty list unregisters the tag.
    pub fn set(&mut self, tag: &str, mut thresholds: Vec<f64>) {
        let mut seen = Vec::with_capacity(thresholds.len());
        thresholds.retain(|t| {
            let bits = t.to_bits();
            if seen.contains(&bits) {
                false
            } else {
                seen.push(bits);
                true
            }
        });
        if thresholds.is_empty() {
            self.by_tag.remove(tag);
        } else {
            self.by_tag.insert(tag.to_string(), thresholds);
        }
    }

    /// Registered thresholds in the order they were given, empty if none.
    pub fn get(&self, tag: &str) -> &[f64] {
        self.by_tag.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }
}
