use crate::closure::MyBlocks;
use crate::sb3::BlockMap;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MergeReport {
    /// Custom blocks that did not exist in the destination.
    pub added: Vec<String>,
    pub replaced: Vec<Replacement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Replacement {
    pub name: String,
    pub removed: usize,
    pub inserted: usize,
}

/// Copies every custom block in `source` into `dest_blocks`.
///
/// A destination custom block with the same name is removed completely first,
/// including blocks it may share with other custom blocks. Source blocks keep
/// their ids and overwrite any destination block with the same id.
pub fn merge_my_blocks(dest_blocks: &mut BlockMap, source: &MyBlocks, dest: &MyBlocks) -> MergeReport {
    let mut report = MergeReport::default();

    for custom in source.iter() {
        let inserted = custom.closure.blocks.len();

        match dest.get(&custom.name) {
            Some(existing) => {
                let mut removed = 0;
                for id in existing.closure.blocks.keys() {
                    if dest_blocks.shift_remove(id).is_some() {
                        removed += 1;
                    }
                }
                report.replaced.push(Replacement {
                    name: custom.name.clone(),
                    removed,
                    inserted,
                });
            }
            None => report.added.push(custom.name.clone()),
        }

        for (id, block) in &custom.closure.blocks {
            dest_blocks.insert(id.clone(), block.clone());
        }
    }

    report
}
