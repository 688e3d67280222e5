use crate::sb3::BlockMap;
use serde_json::Value;
use std::collections::BTreeSet;

/// Finds the block ids mentioned anywhere inside a block value.
///
/// A string counts as a reference when it is exactly a block id of the target.
/// Otherwise it is split on `,` and each segment that is a block id counts,
/// which covers compound input encodings such as `"id,extra"`.
pub struct ReferenceScanner<'a> {
    blocks: &'a BlockMap,
}

impl<'a> ReferenceScanner<'a> {
    pub fn new(blocks: &'a BlockMap) -> Self {
        Self { blocks }
    }

    pub fn scan(&self, value: &Value) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        self.collect(value, &mut found);
        found
    }

    fn collect(&self, value: &Value, found: &mut BTreeSet<String>) {
        match value {
            Value::Object(map) => {
                for v in map.values() {
                    self.collect(v, found);
                }
            }
            Value::Array(items) => {
                for v in items {
                    self.collect(v, found);
                }
            }
            Value::String(s) => {
                if self.blocks.contains_key(s) {
                    found.insert(s.clone());
                } else {
                    for segment in s.split(',') {
                        if self.blocks.contains_key(segment) {
                            found.insert(segment.to_string());
                        }
                    }
                }
            }
            Value::Null | Value::Bool(_) | Value::Number(_) => {}
        }
    }
}
