//! Recently seen character names, per manuscript

use crate::graph::{fold_name, ManuscriptId};
use std::collections::{HashMap, VecDeque};

/// Bounded, recency-ordered name memory.
///
/// Names are kept least-recent first. Re-seen names move to the back with
/// their latest spelling; the front is evicted when over capacity.
/// Lives in process memory only.
#[derive(Debug, Clone)]
pub struct ContextMemory {
    capacity: usize,
    names: HashMap<ManuscriptId, VecDeque<String>>,
}

impl Default for ContextMemory {
    fn default() -> Self {
        Self::new(15)
    }
}

impl ContextMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            names: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Names for a manuscript, least recent first. Empty if never updated.
    pub fn get(&self, manuscript: &ManuscriptId) -> Vec<String> {
        self.names
            .get(manuscript)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Merge `new_names` in as the most recent entries.
    pub fn update<I, S>(&mut self, manuscript: &ManuscriptId, new_names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let queue = self.names.entry(manuscript.clone()).or_default();
        for name in new_names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            let key = fold_name(name);
            queue.retain(|existing| fold_name(existing) != key);
            queue.push_back(name.to_string());
        }
        while queue.len() > self.capacity {
            queue.pop_front();
        }
    }

    /// `current` with `new_names` merged in, without touching the store.
    pub fn merged(&self, current: &[String], new_names: &[String]) -> Vec<String> {
        let mut scratch = ContextMemory::new(self.capacity);
        let key = ManuscriptId::from("");
        scratch.update(&key, current);
        scratch.update(&key, new_names);
        scratch.get(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_manuscript_is_empty() {
        let memory = ContextMemory::default();
        assert!(memory.get(&ManuscriptId::from("nope")).is_empty());
    }

    #[test]
    fn dedupes_case_insensitively_keeping_latest_spelling() {
        let mut memory = ContextMemory::default();
        let m = ManuscriptId::from("m1");
        memory.update(&m, ["Anna", "Grandmother"]);
        memory.update(&m, ["anna"]);
        assert_eq!(memory.get(&m), vec!["Grandmother", "anna"]);
    }

    #[test]
    fn evicts_least_recent_first() {
        let mut memory = ContextMemory::new(3);
        let m = ManuscriptId::from("m1");
        memory.update(&m, ["A", "B", "C"]);
        memory.update(&m, ["A"]);
        memory.update(&m, ["D"]);
        assert_eq!(memory.get(&m), vec!["C", "A", "D"]);
    }

    #[test]
    fn default_capacity_is_fifteen() {
        let mut memory = ContextMemory::default();
        let m = ManuscriptId::from("m1");
        let names: Vec<String> = (0..20).map(|i| format!("Name{}", i)).collect();
        memory.update(&m, &names);
        let kept = memory.get(&m);
        assert_eq!(kept.len(), 15);
        assert_eq!(kept.first().map(String::as_str), Some("Name5"));
        assert_eq!(kept.last().map(String::as_str), Some("Name19"));
    }

    #[test]
    fn manuscripts_are_isolated() {
        let mut memory = ContextMemory::default();
        memory.update(&ManuscriptId::from("a"), ["Anna"]);
        assert!(memory.get(&ManuscriptId::from("b")).is_empty());
    }

    #[test]
    fn merged_does_not_store() {
        let memory = ContextMemory::new(2);
        let merged = memory.merged(&["A".to_string()], &["B".to_string(), "C".to_string()]);
        assert_eq!(merged, vec!["B", "C"]);
        assert!(memory.get(&ManuscriptId::from("")).is_empty());
    }
}
