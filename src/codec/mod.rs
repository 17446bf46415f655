//! Sudoku byte codec.
//!
//! The codec disguises a byte stream as a sequence of Sudoku puzzle hints.
//! Each plaintext byte is replaced on the wire by a 4-byte "clue set" that
//! uniquely identifies one of the 288 valid 4x4 grids; which grid stands for
//! which byte value is a secret permutation derived from the shared key.
//! Random padding bytes from a fixed pool are sprinkled in and silently
//! discarded by the decoder.

mod grid;
mod stream;
mod table;

pub use grid::{enumerate_grids, hint_pos, hint_val, pack_hint, Grid, GRID_CELLS, GRID_COUNT};
pub use stream::{CodecReader, CodecWriter, Direction, SLIDE_LIMIT};
pub use table::{canonical_key, HintTuple, Table, HINT_MASK, PADDING_POOL_SIZE};
