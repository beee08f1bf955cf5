//! Canonical names for extracted entities

use crate::config::ResolverConfig;
use std::collections::{HashMap, HashSet};

const DETERMINERS: [&str; 3] = ["the ", "a ", "an "];

/// Folds raw entity names onto canonical identities.
///
/// Alias table and blacklist are data; see `ResolverConfig`.
#[derive(Debug, Clone)]
pub struct NameResolver {
    /// folded alias -> canonical
    aliases: HashMap<String, String>,
    /// (folded canonical, canonical), longest first
    canonicals: Vec<(String, String)>,
    blacklist: HashSet<String>,
}

impl Default for NameResolver {
    fn default() -> Self {
        Self::new(&ResolverConfig::default())
    }
}

impl NameResolver {
    pub fn new(config: &ResolverConfig) -> Self {
        let mut aliases = HashMap::new();
        let mut canonicals = Vec::new();
        for (canonical, surface_forms) in &config.aliases {
            let canonical = canonical.trim().to_string();
            aliases.insert(canonical.to_lowercase(), canonical.clone());
            for alias in surface_forms {
                aliases.insert(alias.trim().to_lowercase(), canonical.clone());
            }
            canonicals.push((canonical.to_lowercase(), canonical));
        }
        // Prefer the most specific canonical on substring matches
        canonicals.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        Self {
            aliases,
            canonicals,
            blacklist: config
                .blacklist
                .iter()
                .map(|b| b.trim().to_lowercase())
                .collect(),
        }
    }

    /// Canonical name for `raw`, or `None` for pronouns and generic nouns.
    pub fn resolve(&self, raw: &str) -> Option<String> {
        let name = strip_determiner(raw.trim()).trim();
        let folded = name.to_lowercase();

        if folded.is_empty() || self.blacklist.contains(&folded) {
            return None;
        }

        if let Some(canonical) = self.aliases.get(&folded) {
            return Some(canonical.clone());
        }

        if let Some((_, canonical)) = self
            .canonicals
            .iter()
            .find(|(key, _)| folded.contains(key.as_str()))
        {
            return Some(canonical.clone());
        }

        Some(name.to_string())
    }
}

fn strip_determiner(name: &str) -> &str {
    for det in DETERMINERS {
        if name.len() > det.len()
            && name.is_char_boundary(det.len())
            && name[..det.len()].eq_ignore_ascii_case(det)
        {
            return &name[det.len()..];
        }
    }
    name
}
