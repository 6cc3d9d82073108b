//! Reader for the legacy `song_counts.bin` format.
//!
//! The file is a zlib stream wrapping a pickled dict:
//! `{"counts": {hash: count}, "mapping": {hash: name}}`.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::Path;

use flate2::read::ZlibDecoder;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_pickle::{DeOptions, HashableValue, Value};

/// Why a legacy file could not be turned into play counts
#[derive(Debug, thiserror::Error)]
pub enum LegacyError {
    #[error("file does not exist")]
    Missing,

    #[error("file is empty")]
    Empty,

    #[error("read failed: {0}")]
    Read(#[from] std::io::Error),

    #[error("zlib decompression failed: {0}")]
    Decompress(std::io::Error),

    #[error("unpickling failed: {0}")]
    Unpickle(#[from] serde_pickle::Error),

    #[error("top level is not a dict")]
    NotADict,

    #[error("missing 'counts' or 'mapping' keys (available: {available:?})")]
    MissingKeys { available: Vec<String> },
}

/// Load the legacy play counts keyed by display name.
///
/// Every failure is logged and yields an empty map; callers treat empty as
/// "nothing to migrate".
pub fn load_legacy_counts(path: &Path) -> BTreeMap<String, i64> {
    tracing::info!("Looking for legacy counts at {}", path.display());
    match read_legacy_counts(path) {
        Ok(counts) => {
            tracing::info!("Loaded {} named songs", counts.len());
            counts
        }
        Err(e) => {
            tracing::warn!("Could not load legacy counts from {}: {}", path.display(), e);
            BTreeMap::new()
        }
    }
}

/// Strict variant of [`load_legacy_counts`] that reports why loading failed.
pub fn read_legacy_counts(path: &Path) -> Result<BTreeMap<String, i64>, LegacyError> {
    if !path.exists() {
        return Err(LegacyError::Missing);
    }
    let compressed = std::fs::read(path)?;
    tracing::debug!("Read {} bytes", compressed.len());
    decode_legacy_counts(&compressed)
}

/// Decode an in-memory legacy payload.
pub fn decode_legacy_counts(compressed: &[u8]) -> Result<BTreeMap<String, i64>, LegacyError> {
    if compressed.is_empty() {
        return Err(LegacyError::Empty);
    }

    let mut decompressed = Vec::new();
    ZlibDecoder::new(compressed)
        .read_to_end(&mut decompressed)
        .map_err(LegacyError::Decompress)?;
    tracing::debug!("Decompressed to {} bytes", decompressed.len());

    let value = serde_pickle::value_from_slice(&decompressed, DeOptions::new())?;
    let Value::Dict(top) = value else {
        return Err(LegacyError::NotADict);
    };

    let counts = top.get(&HashableValue::String("counts".into()));
    let mapping = top.get(&HashableValue::String("mapping".into()));
    let (Some(Value::Dict(_)), Some(Value::Dict(mapping))) = (counts, mapping) else {
        return Err(LegacyError::MissingKeys {
            available: top.keys().map(key_to_string).collect(),
        });
    };

    // `Value::Dict` is sorted; read the counts again in pickle order so a
    // name shared by two hashes keeps the later entry.
    let ordered: CountsSection = serde_pickle::from_slice(&decompressed, DeOptions::new())?;
    tracing::info!("Found {} song entries", ordered.counts.0.len());

    let mut named = BTreeMap::new();
    for (hash, count) in &ordered.counts.0 {
        let Some(count) = count_value(count) else {
            tracing::warn!("Skipping {}: play count is not an integer", key_to_string(hash));
            continue;
        };
        let name = match mapping.get(hash) {
            Some(Value::String(name)) => name.clone(),
            Some(Value::Bytes(raw)) => String::from_utf8_lossy(raw).into_owned(),
            _ => unknown_name(&key_to_string(hash)),
        };
        named.insert(name, count);
    }
    Ok(named)
}

#[derive(Deserialize)]
struct CountsSection {
    counts: StreamEntries,
}

/// Dict entries in the order they appear in the pickle stream
struct StreamEntries(Vec<(HashableValue, Value)>);

impl<'de> Deserialize<'de> for StreamEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = StreamEntries;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a dict of play counts")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<StreamEntries, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry()? {
                    entries.push(entry);
                }
                Ok(StreamEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// Placeholder name for a hash with no mapping entry
pub fn unknown_name(song_hash: &str) -> String {
    let prefix: String = song_hash.chars().take(8).collect();
    format!("Unknown_{}", prefix)
}

fn count_value(value: &Value) -> Option<i64> {
    match value {
        Value::I64(n) => Some(*n),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn key_to_string(key: &HashableValue) -> String {
    match key {
        HashableValue::String(s) => s.clone(),
        HashableValue::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        other => format!("{:?}", other),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use serde::ser::{Serialize, SerializeMap, Serializer};
    use serde_pickle::SerOptions;
    use std::io::Write;

    pub(crate) fn zlib(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    /// Build a compressed legacy payload from (hash, name, count) triples.
    /// A `None` name leaves the hash out of the mapping.
    pub(crate) fn legacy_payload(entries: &[(&str, Option<&str>, i64)]) -> Vec<u8> {
        let mut counts = BTreeMap::new();
        let mut mapping = BTreeMap::new();
        for (hash, name, count) in entries {
            counts.insert(HashableValue::String(hash.to_string()), Value::I64(*count));
            if let Some(name) = name {
                mapping.insert(
                    HashableValue::String(hash.to_string()),
                    Value::String(name.to_string()),
                );
            }
        }
        let mut top = BTreeMap::new();
        top.insert(HashableValue::String("counts".into()), Value::Dict(counts));
        top.insert(HashableValue::String("mapping".into()), Value::Dict(mapping));
        let pickled = serde_pickle::value_to_vec(&Value::Dict(top), SerOptions::new()).unwrap();
        zlib(&pickled)
    }

    #[test]
    fn test_decode_merges_mapping_and_counts() {
        let payload = legacy_payload(&[
            ("h1", Some("Artist - One"), 4),
            ("h2", Some("Artist - Two"), 9),
        ]);
        let counts = decode_legacy_counts(&payload).unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts["Artist - One"], 4);
        assert_eq!(counts["Artist - Two"], 9);
    }

    #[test]
    fn test_unmapped_hash_gets_placeholder_name() {
        let payload = legacy_payload(&[("deadbeefcafe0001", None, 2)]);
        let counts = decode_legacy_counts(&payload).unwrap();
        assert_eq!(counts["Unknown_deadbeef"], 2);
    }

    #[test]
    fn test_missing_keys_lists_available() {
        let mut top = BTreeMap::new();
        top.insert(HashableValue::String("counts".into()), Value::Dict(BTreeMap::new()));
        top.insert(HashableValue::String("other".into()), Value::I64(1));
        let pickled = serde_pickle::value_to_vec(&Value::Dict(top), SerOptions::new()).unwrap();

        match decode_legacy_counts(&zlib(&pickled)) {
            Err(LegacyError::MissingKeys { available }) => {
                assert!(available.contains(&"counts".to_string()));
                assert!(available.contains(&"other".to_string()));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_bad_inputs_are_typed() {
        assert!(matches!(decode_legacy_counts(&[]), Err(LegacyError::Empty)));
        assert!(matches!(
            decode_legacy_counts(b"definitely not zlib"),
            Err(LegacyError::Decompress(_))
        ));
        assert!(matches!(
            decode_legacy_counts(&zlib(b"\x80\x03")),
            Err(LegacyError::Unpickle(_))
        ));

        let list = serde_pickle::value_to_vec(&Value::List(vec![]), SerOptions::new()).unwrap();
        assert!(matches!(decode_legacy_counts(&zlib(&list)), Err(LegacyError::NotADict)));
    }

    /// Counts dict serialised in exactly the given order
    struct InOrder<'a>(&'a [(&'a str, i64)]);

    impl Serialize for InOrder<'_> {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let mut map = serializer.serialize_map(Some(self.0.len()))?;
            for (hash, count) in self.0 {
                map.serialize_entry(hash, count)?;
            }
            map.end()
        }
    }

    #[derive(serde::Serialize)]
    struct OrderedPayload<'a> {
        counts: InOrder<'a>,
        mapping: BTreeMap<&'a str, &'a str>,
    }

    #[test]
    fn test_shared_name_keeps_later_entry_in_file_order() {
        let payload = OrderedPayload {
            counts: InOrder(&[("zz11", 5), ("aa22", 9)]),
            mapping: BTreeMap::from([("zz11", "Song"), ("aa22", "Song")]),
        };
        let pickled = serde_pickle::to_vec(&payload, SerOptions::new()).unwrap();

        let counts = decode_legacy_counts(&zlib(&pickled)).unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts["Song"], 9);

        let payload = OrderedPayload {
            counts: InOrder(&[("aa22", 9), ("zz11", 5)]),
            mapping: BTreeMap::from([("zz11", "Song"), ("aa22", "Song")]),
        };
        let pickled = serde_pickle::to_vec(&payload, SerOptions::new()).unwrap();
        assert_eq!(decode_legacy_counts(&zlib(&pickled)).unwrap()["Song"], 5);
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song_counts.bin");
        assert!(matches!(read_legacy_counts(&path), Err(LegacyError::Missing)));
        assert!(load_legacy_counts(&path).is_empty());
    }
}
