use std::collections::BTreeMap;

use compact_str::CompactString;

/// Label set keyed and ordered by label name.
pub type Labels = BTreeMap<CompactString, CompactString>;

/// Build a [`Labels`] map from string pairs.
pub fn labels<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Labels
where
    K: Into<CompactString>,
    V: Into<CompactString>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Value of `key`, or the empty string when absent.
pub fn label_value<'a>(labels: &'a Labels, key: &str) -> &'a str {
    labels.get(key).map(CompactString::as_str).unwrap_or("")
}
