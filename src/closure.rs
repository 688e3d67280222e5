use crate::error::{BlocksError, Result};
use crate::sb3::{self, BlockMap};
use crate::scanner::ReferenceScanner;
use colored::*;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeSet;

/// The blocks implementing one custom block, rooted at its definition.
#[derive(Debug, Clone)]
pub struct Closure {
    pub blocks: BlockMap,
    pub prototype_id: String,
}

/// A custom block together with the name derived from its proc-code.
#[derive(Debug, Clone)]
pub struct CustomBlock {
    pub name: String,
    pub closure: Closure,
}

/// Custom blocks keyed by name. Inserting an existing name replaces the entry
/// but keeps its original position.
#[derive(Debug, Clone, Default)]
pub struct MyBlocks {
    entries: Vec<CustomBlock>,
}

impl MyBlocks {
    pub fn insert(&mut self, custom: CustomBlock) -> Option<CustomBlock> {
        match self.entries.iter_mut().find(|c| c.name == custom.name) {
            Some(slot) => Some(std::mem::replace(slot, custom)),
            None => {
                self.entries.push(custom);
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&CustomBlock> {
        self.entries.iter().find(|c| c.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CustomBlock> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// Serializes as `{ name: { block_id: block } }`.
impl Serialize for MyBlocks {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for custom in &self.entries {
            map.serialize_entry(&custom.name, &custom.closure.blocks)?;
        }
        map.end()
    }
}

/// Collects `root_id` and every block transitively referenced from it.
///
/// `blocks` is only read, so extracting the same root twice gives the same
/// closure. Fails when a visited block, or a block one of them is wired to
/// through `next`, `parent` or an input slot, is missing from `blocks`, and
/// when no `procedures_prototype` block is reached.
pub fn extract_closure(blocks: &BlockMap, root_id: &str) -> Result<Closure> {
    let scanner = ReferenceScanner::new(blocks);
    let mut frontier = BTreeSet::from([root_id.to_string()]);
    let mut parts = BlockMap::new();
    let mut prototype_id: Option<String> = None;

    while let Some(id) = frontier.pop_first() {
        let block = blocks
            .get(&id)
            .ok_or_else(|| BlocksError::MalformedClosure { id: id.clone() })?;
        if let Some(dangling) = sb3::block_links(block)
            .into_iter()
            .find(|link| !blocks.contains_key(*link))
        {
            return Err(BlocksError::MalformedClosure {
                id: dangling.to_string(),
            });
        }

        if sb3::is_prototype(block) {
            if let Some(previous) = &prototype_id {
                eprintln!(
                    "{}",
                    format!(
                        "Warning: Custom block {} has prototypes {} and {}, using {}",
                        root_id, previous, id, id
                    )
                    .yellow()
                );
            }
            prototype_id = Some(id.clone());
        }

        for referenced in scanner.scan(block) {
            if !parts.contains_key(&referenced) && referenced != id {
                frontier.insert(referenced);
            }
        }
        parts.insert(id, block.clone());
    }

    let prototype_id = prototype_id.ok_or_else(|| BlocksError::MissingPrototype {
        definition: root_id.to_string(),
    })?;

    Ok(Closure {
        blocks: parts,
        prototype_id,
    })
}

/// Extracts every custom block whose definition lives in `blocks`.
pub fn my_blocks(blocks: &BlockMap) -> Result<MyBlocks> {
    let mut result = MyBlocks::default();

    for (id, block) in blocks {
        if !sb3::is_definition(block) {
            continue;
        }

        let closure = extract_closure(blocks, id)?;
        let name = closure
            .blocks
            .get(&closure.prototype_id)
            .and_then(sb3::proc_name)
            .ok_or_else(|| {
                BlocksError::Format(format!(
                    "prototype block {} has no proccode",
                    closure.prototype_id
                ))
            })?
            .to_string();

        if let Some(previous) = result.insert(CustomBlock { name, closure }) {
            eprintln!(
                "{}",
                format!(
                    "Warning: Custom block name {} is defined more than once, keeping the definition at {}",
                    previous.name, id
                )
                .yellow()
            );
        }
    }

    Ok(result)
}
