use crate::config::LayoutConfig;
use crate::project::block::Block;

/// Column-major grid cursor. One cursor per target, so identical input
/// order gives identical positions.
#[derive(Debug, Clone)]
pub struct LayoutCursor {
    config: LayoutConfig,
    row: usize,
    column: usize,
}

impl LayoutCursor {
    pub fn new(config: LayoutConfig) -> Self {
        LayoutCursor {
            config,
            row: 0,
            column: 0,
        }
    }

    /// Next grid slot as `(x, y)`.
    pub fn advance(&mut self) -> (f64, f64) {
        if self.row + 1 > self.config.rows.max(1) {
            self.row = 0;
            self.column += 1;
        }
        let slot = (
            self.column as f64 * self.config.x_offset,
            self.row as f64 * self.config.y_offset,
        );
        self.row += 1;
        slot
    }

    /// Move `block` to the next slot. Blocks without a position stay
    /// unpositioned and do not consume a slot.
    pub fn place(&mut self, block: &mut Block) {
        if block.x.is_none() {
            return;
        }
        let (x, y) = self.advance();
        block.x = Some(x);
        block.y = Some(y);
    }
}
