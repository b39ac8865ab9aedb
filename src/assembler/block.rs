//! Block Tracker — indentation interpreted as a stack of open
//! structured blocks (`while`, `range`, `if`).

/// The kind of a structured block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    While,
    Range,
    If,
}

impl BlockKind {
    /// Bytes emitted when this block's closer is reached.
    pub fn close_bytes(self) -> u32 {
        match self {
            BlockKind::While => 4,
            BlockKind::Range => 8,
            BlockKind::If => 0,
        }
    }

    pub fn is_loop(self) -> bool {
        matches!(self, BlockKind::While | BlockKind::Range)
    }
}

/// A currently-open structured block.
#[derive(Debug, Clone)]
pub struct BlockFrame {
    pub kind: BlockKind,
    pub indent: usize,
    pub start_label: String,
    pub end_label: String,
    /// `range` only: the iterator register.
    pub iter_reg: Option<u8>,
    /// `range` only: the additive step (defaults to 1).
    pub step: i64,
}

/// The stack of open blocks, owned by whichever pass is running.
/// Pass 1 and pass 2 each own an independent `BlockStack`, but both
/// must reach the same sequence of pushes/pops for a given source, so
/// that auto-label ids and addresses line up (see
/// [`super::pass1`]/[`super::pass2`]).
#[derive(Debug, Default)]
pub struct BlockStack {
    frames: Vec<BlockFrame>,
    next_id: u32,
}

impl BlockStack {
    pub fn new() -> BlockStack {
        BlockStack::default()
    }

    /// Pop every frame whose opener indent is `>= indent`, in
    /// last-in-first-out order. The caller is responsible for
    /// charging each popped frame's `close_bytes` to the running pc
    /// and for recording its end label at the resulting address.
    pub fn pop_closed(&mut self, indent: usize) -> Vec<BlockFrame> {
        let mut closed = Vec::new();
        while let Some(top) = self.frames.last() {
            if top.indent >= indent {
                closed.push(self.frames.pop().unwrap());
            } else {
                break;
            }
        }
        closed
    }

    /// Pop every remaining frame, as if a sentinel line at column 0
    /// had appeared at end of input.
    pub fn finish(&mut self) -> Vec<BlockFrame> {
        self.pop_closed(0)
    }

    /// Allocate a fresh auto-label id and push a new frame, returning
    /// it so the caller can record its start label's address.
    pub fn open(
        &mut self,
        kind: BlockKind,
        indent: usize,
        iter_reg: Option<u8>,
        step: i64,
    ) -> BlockFrame {
        let id = self.next_id;
        self.next_id += 1;
        let frame = BlockFrame {
            kind,
            indent,
            start_label: format!("_B_START_{id}"),
            end_label: format!("_B_END_{id}"),
            iter_reg,
            step,
        };
        self.frames.push(frame.clone());
        frame
    }

    /// The nearest enclosing loop frame (`while` or `range`), innermost
    /// first — the target of `.`/`..`. An `if` frame never qualifies.
    pub fn nearest_loop(&self) -> Option<&BlockFrame> {
        self.frames.iter().rev().find(|f| f.kind.is_loop())
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_frames_whose_indent_is_at_or_above_the_closer() {
        let mut stack = BlockStack::new();
        stack.open(BlockKind::While, 0, None, 1);
        stack.open(BlockKind::If, 2, None, 1);
        let closed = stack.pop_closed(2);
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].kind, BlockKind::If);
        assert!(!stack.is_empty());
        let closed = stack.pop_closed(0);
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].kind, BlockKind::While);
        assert!(stack.is_empty());
    }

    #[test]
    fn finish_closes_in_reverse_open_order() {
        let mut stack = BlockStack::new();
        stack.open(BlockKind::While, 0, None, 1);
        stack.open(BlockKind::Range, 2, Some(4), 1);
        stack.open(BlockKind::If, 4, None, 1);
        let closed = stack.finish();
        assert_eq!(
            closed.iter().map(|f| f.kind).collect::<Vec<_>>(),
            vec![BlockKind::If, BlockKind::Range, BlockKind::While]
        );
    }

    #[test]
    fn nearest_loop_skips_if_frames() {
        let mut stack = BlockStack::new();
        stack.open(BlockKind::While, 0, None, 1);
        stack.open(BlockKind::If, 2, None, 1);
        assert_eq!(stack.nearest_loop().unwrap().kind, BlockKind::While);
    }

    #[test]
    fn auto_label_ids_are_monotonic() {
        let mut stack = BlockStack::new();
        let a = stack.open(BlockKind::While, 0, None, 1);
        let b = stack.open(BlockKind::If, 1, None, 1);
        assert_eq!(a.start_label, "_B_START_0");
        assert_eq!(b.start_label, "_B_START_1");
    }
}
