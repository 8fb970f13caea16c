use indexmap::IndexMap;
use rand::Rng;
use tracing::{info, warn};

use crate::project::Target;
use crate::project::block::{Block, BlockEntry, BlockId};

/// Characters block ids are drawn from.
const SOUP: &[u8] = b"!#%()*+,-./:;=?@[]^_`{|}~ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

const UID_LENGTH: usize = 20;

/// A fresh 20-character block id not yet used in `blocks`.
pub fn fresh_uid(blocks: &IndexMap<BlockId, BlockEntry>) -> BlockId {
    let mut rng = rand::rng();
    loop {
        let id: String = (0..UID_LENGTH)
            .map(|_| SOUP[rng.random_range(0..SOUP.len())] as char)
            .collect();
        if !blocks.contains_key(&id) {
            return id;
        }
    }
}

/// First opcode, across all targets in order, that belongs to `extension`.
pub fn find_extension_opcode<'a>(targets: &'a [Target], extension: &str) -> Option<&'a str> {
    let prefix = format!("{extension}_");
    targets.iter().find_map(|target| {
        target
            .iter_blocks()
            .find(|(_, block)| block.opcode.starts_with(&prefix))
            .map(|(_, block)| block.opcode.as_str())
    })
}

/// Invisible top-level block that keeps an extension loaded.
pub fn placeholder(opcode: &str) -> Block {
    let mut block = Block::new(opcode);
    block.shadow = true;
    block.top_level = true;
    block
}

/// Keep every extension the original blocks still use by planting one
/// placeholder block per extension in `main`. Returns `(kept, dropped)`.
pub fn preserve_extensions(
    source: &[Target],
    extensions: &[String],
    main: &mut Target,
) -> (Vec<String>, Vec<String>) {
    let mut kept = Vec::new();
    let mut dropped = Vec::new();
    for extension in extensions {
        match find_extension_opcode(source, extension) {
            Some(opcode) => {
                info!(extension = %extension, opcode, "keeping extension as dependency");
                let id = fresh_uid(&main.blocks);
                main.blocks.insert(id, BlockEntry::Block(placeholder(opcode)));
                kept.push(extension.clone());
            }
            None => {
                warn!(extension = %extension, "no block uses this extension, dropping it");
                dropped.push(extension.clone());
            }
        }
    }
    (kept, dropped)
}
