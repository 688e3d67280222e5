use crate::closure::{self, MyBlocks};
use crate::error::{BlocksError, Result};
use crate::merge::{self, MergeReport};
use colored::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFINITION_OPCODE: &str = "procedures_definition";
pub const PROTOTYPE_OPCODE: &str = "procedures_prototype";

/// Block id -> block, in document order.
pub type BlockMap = Map<String, Value>;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ProjectDocument {
    pub targets: Vec<Target>,
    // monitors, extensions, meta, ...
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Target {
    #[serde(rename = "isStage")]
    pub is_stage: bool,
    #[serde(default)]
    pub blocks: BlockMap,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProjectDocument {
    pub fn from_json(src: &str) -> Result<Self> {
        let document: Self = serde_json::from_str(src)?;
        let sprites = document.sprite_count();
        if sprites > 1 {
            eprintln!(
                "{}",
                format!(
                    "Warning: Project has {} sprite targets, only the last one is used",
                    sprites
                )
                .yellow()
            );
        }
        Ok(document)
    }

    pub fn to_json(&self, indent: usize) -> Result<String> {
        to_json_indented(self, indent)
    }

    /// The sprite the tool operates on: the last target that is not the stage.
    pub fn sprite_target(&self) -> Option<&Target> {
        self.targets.iter().rev().find(|t| !t.is_stage)
    }

    pub fn sprite_target_mut(&mut self) -> Option<&mut Target> {
        self.targets.iter_mut().rev().find(|t| !t.is_stage)
    }

    pub fn sprite_count(&self) -> usize {
        self.targets.iter().filter(|t| !t.is_stage).count()
    }

    pub fn blocks(&self) -> Result<&BlockMap> {
        self.sprite_target()
            .map(|t| &t.blocks)
            .ok_or(BlocksError::NoTarget)
    }

    /// Every custom block of the sprite target, keyed by proc-code name.
    pub fn my_blocks(&self) -> Result<MyBlocks> {
        closure::my_blocks(self.blocks()?)
    }

    /// Copies every custom block of `source` into this document, replacing
    /// same-named custom blocks wholesale.
    pub fn copy_my_blocks_from(&mut self, source: &ProjectDocument) -> Result<MergeReport> {
        let src_my_blocks = source.my_blocks()?;
        let dest_my_blocks = self.my_blocks()?;

        let target = self.sprite_target_mut().ok_or(BlocksError::NoTarget)?;
        Ok(merge::merge_my_blocks(
            &mut target.blocks,
            &src_my_blocks,
            &dest_my_blocks,
        ))
    }
}

/// Pretty-prints with `indent` spaces per level.
pub fn to_json_indented<T: Serialize + ?Sized>(value: &T, indent: usize) -> Result<String> {
    let indent = " ".repeat(indent);
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut ser)?;
    String::from_utf8(out).map_err(|e| BlocksError::Format(e.to_string()))
}

/// `None` for top-level primitives, which are stored as arrays.
pub fn opcode(block: &Value) -> Option<&str> {
    block.get("opcode").and_then(Value::as_str)
}

pub fn is_definition(block: &Value) -> bool {
    opcode(block) == Some(DEFINITION_OPCODE)
}

pub fn is_prototype(block: &Value) -> bool {
    opcode(block) == Some(PROTOTYPE_OPCODE)
}

/// Ids a normal block is wired to: `next`, `parent`, and the block slots of its
/// inputs (`[shadow, "id", ...]`). Nested arrays inside inputs are literals.
pub fn block_links(block: &Value) -> Vec<&str> {
    let mut links: Vec<&str> = ["next", "parent"]
        .iter()
        .filter_map(|key| block.get(*key).and_then(Value::as_str))
        .collect();
    if let Some(inputs) = block.get("inputs").and_then(Value::as_object) {
        for input in inputs.values().filter_map(Value::as_array) {
            links.extend(input.iter().skip(1).filter_map(Value::as_str));
        }
    }
    links
}

/// First whitespace-delimited token of `mutation.proccode`.
pub fn proc_name(prototype: &Value) -> Option<&str> {
    prototype
        .get("mutation")?
        .get("proccode")?
        .as_str()?
        .split_whitespace()
        .next()
}
