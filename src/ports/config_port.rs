//! Configuration access port trait.

/// Raw string lookups. Typed parsing and its error reporting live in
/// `domain::config`.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    /// Comma separated value split into trimmed, non-empty items.
    /// A missing key is an empty list.
    fn get_list(&self, section: &str, key: &str) -> Vec<String> {
        self.get_string(section, key)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapConfig(HashMap<(&'static str, &'static str), &'static str>);

    impl ConfigPort for MapConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            self.0
                .iter()
                .find(|((s, k), _)| *s == section && *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn string_lookup_is_enough_for_lists() {
        let config = MapConfig(HashMap::from([(("universe", "exclude"), " kgh ,, PKN ")]));
        assert_eq!(config.get_list("universe", "exclude"), vec!["kgh", "PKN"]);
        assert!(config.get_list("universe", "include").is_empty());
    }
}
