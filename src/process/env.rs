//! Child environment assembly.

use std::collections::BTreeMap;

/// Overlay `layers` onto `ambient`; later layers win. The result is sorted
/// by key.
pub fn build_env<'a, A, L>(ambient: A, layers: L) -> Vec<(String, String)>
where
    A: IntoIterator<Item = (String, String)>,
    L: IntoIterator<Item = &'a BTreeMap<String, String>>,
{
    let mut env: BTreeMap<String, String> = ambient.into_iter().collect();
    for layer in layers {
        for (key, value) in layer {
            env.insert(key.clone(), value.clone());
        }
    }
    env.into_iter().collect()
}

/// The supervisor's own environment, skipping entries that are not UTF-8.
pub fn ambient() -> impl Iterator<Item = (String, String)> {
    std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
}

/// `KEY=value` strings, as shown in status output.
pub fn to_pairs(env: &[(String, String)]) -> Vec<String> {
    env.iter().map(|(k, v)| format!("{}={}", k, v)).collect()
}
