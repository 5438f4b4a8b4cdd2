//! `serde(with = "...")` helper for (de)serializing a [`std::collections::BTreeMap`]
//! whose key is not a `String` as a flat array of `(key, value)` pairs,
//! since `serde_json` (and most self-describing formats) can only use
//! string object keys. Used by [`crate::structure::FunctionInterpretation`]'s
//! tuple-keyed value table, the one map in this crate keyed by something
//! other than a symbol name.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub fn serialize<S, K, V>(map: &BTreeMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    K: Serialize + Ord,
    V: Serialize,
{
    let entries: Vec<(&K, &V)> = map.iter().collect();
    entries.serialize(serializer)
}

pub fn deserialize<'de, D, K, V>(deserializer: D) -> Result<BTreeMap<K, V>, D::Error>
where
    D: Deserializer<'de>,
    K: Deserialize<'de> + Ord,
    V: Deserialize<'de>,
{
    let entries = Vec::<(K, V)>::deserialize(deserializer)?;
    Ok(entries.into_iter().collect())
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Wrapper {
        #[serde(with = "super")]
        table: BTreeMap<Vec<i64>, i64>,
    }

    #[test]
    fn round_trips_through_json() {
        let mut table = BTreeMap::new();
        table.insert(vec![1, 2], 3);
        table.insert(vec![4, 5], 9);
        let wrapper = Wrapper { table };
        let json = serde_json::to_string(&wrapper).unwrap();
        let back: Wrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(wrapper, back);
    }
}
