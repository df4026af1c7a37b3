//! Sentinel-terminated chunk streams
//!
//! `BreakablePlane::break_at` emits pieces as a flat token stream of grid point
//! indices:
//!
//! ```text
//! 12 13 27 26 LOOP_END PIECE_END  4 5 9 LOOP_END 5 6 9 LOOP_END PIECE_END  STREAM_END
//! ```
//!
//! A piece is one or more loops. The last piece before `STREAM_END` is the
//! terminal piece, which is never dropped as degenerate.

/// Closes a polygon loop
pub const LOOP_END: i32 = -1;
/// Closes a piece
pub const PIECE_END: i32 = -2;
/// Terminates the stream
pub const STREAM_END: i32 = -3;

/// Encoded fracture pieces
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkStream {
    tokens: Vec<i32>,
    finished: bool,
}

impl Default for ChunkStream {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkStream {
    pub fn new() -> Self {
        Self {
            tokens: Vec::new(),
            finished: false,
        }
    }

    /// Append a piece; loops shorter than three vertices are skipped
    pub fn push_piece(&mut self, loops: &[Vec<u32>]) {
        debug_assert!(!self.finished, "push after finish");
        let mut wrote = false;
        for l in loops.iter().filter(|l| l.len() >= 3) {
            self.tokens.extend(l.iter().map(|&i| i as i32));
            self.tokens.push(LOOP_END);
            wrote = true;
        }
        if wrote {
            self.tokens.push(PIECE_END);
        }
    }

    /// Write the terminating sentinel
    pub fn finish(mut self) -> Self {
        if !self.finished {
            self.tokens.push(STREAM_END);
            self.finished = true;
        }
        self
    }

    pub fn tokens(&self) -> &[i32] {
        &self.tokens
    }

    pub fn cursor(&self) -> ChunkCursor<'_> {
        ChunkCursor {
            tokens: &self.tokens,
            pos: 0,
        }
    }

    pub fn piece_count(&self) -> usize {
        self.tokens.iter().filter(|&&t| t == PIECE_END).count()
    }
}

/// One decoded piece
#[derive(Debug, Clone, PartialEq)]
pub struct Piece {
    pub loops: Vec<Vec<u32>>,
    /// Last piece of the stream (the remainder)
    pub terminal: bool,
}

/// Reads pieces off a chunk stream one at a time
#[derive(Debug, Clone)]
pub struct ChunkCursor<'a> {
    tokens: &'a [i32],
    pos: usize,
}

impl<'a> ChunkCursor<'a> {
    /// Wrap raw tokens (for streams produced elsewhere)
    pub fn from_tokens(tokens: &'a [i32]) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.tokens.get(self.pos), None | Some(&STREAM_END))
    }

    /// Decode the next piece, or `None` at `STREAM_END`
    pub fn next_piece(&mut self) -> Option<Piece> {
        if self.is_finished() {
            return None;
        }
        let mut loops = Vec::new();
        let mut current = Vec::new();
        while let Some(&token) = self.tokens.get(self.pos) {
            self.pos += 1;
            match token {
                LOOP_END => loops.push(std::mem::take(&mut current)),
                PIECE_END => break,
                STREAM_END => {
                    self.pos -= 1;
                    break;
                }
                i => current.push(i as u32),
            }
        }
        Some(Piece {
            loops,
            terminal: self.is_finished(),
        })
    }
}

impl Iterator for ChunkCursor<'_> {
    type Item = Piece;

    fn next(&mut self) -> Option<Piece> {
        self.next_piece()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_layout() {
        let mut stream = ChunkStream::new();
        stream.push_piece(&[vec![0, 1, 2]]);
        stream.push_piece(&[vec![3, 4, 5, 6], vec![1, 2]]);
        let stream = stream.finish();
        assert_eq!(
            stream.tokens(),
            &[0, 1, 2, LOOP_END, PIECE_END, 3, 4, 5, 6, LOOP_END, PIECE_END, STREAM_END]
        );
        assert_eq!(stream.piece_count(), 2);
    }

    #[test]
    fn test_cursor_marks_terminal_piece() {
        let mut stream = ChunkStream::new();
        stream.push_piece(&[vec![0, 1, 2]]);
        stream.push_piece(&[vec![2, 3, 4], vec![4, 5, 6]]);
        let stream = stream.finish();

        let mut cursor = stream.cursor();
        let first = cursor.next_piece().unwrap();
        assert!(!first.terminal);
        let last = cursor.next_piece().unwrap();
        assert!(last.terminal);
        assert_eq!(last.loops.len(), 2);
        assert!(cursor.next_piece().is_none());
    }
}
