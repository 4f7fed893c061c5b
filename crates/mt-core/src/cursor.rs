/// Slot coordinate currently being filled, one index per output dimension.
///
/// The writer owns the cursor and moves it between filler invocations;
/// fillers only ever see it through a shared borrow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotCursor {
    indices: Vec<usize>,
}

impl SlotCursor {
    /// Cursor of the given rank, positioned at the origin.
    pub fn new(rank: usize) -> Self {
        Self {
            indices: vec![0; rank],
        }
    }

    pub fn rank(&self) -> usize {
        self.indices.len()
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Index along dimension `dim`, or `None` if the cursor has no such dimension.
    pub fn get(&self, dim: usize) -> Option<usize> {
        self.indices.get(dim).copied()
    }

    /// Primary (first) dimension. A rank-0 cursor reads as slot 0.
    pub fn primary(&self) -> usize {
        self.get(0).unwrap_or(0)
    }

    pub fn reset(&mut self) {
        self.indices.iter_mut().for_each(|i| *i = 0);
    }

    /// Advance to the next coordinate inside `shape` in row-major order
    /// (last dimension fastest). Returns `false` and resets to the origin
    /// once every coordinate has been visited. A `shape` of a different
    /// rank leaves the cursor where it is and returns `false`.
    pub fn advance(&mut self, shape: &[usize]) -> bool {
        if shape.len() != self.indices.len() {
            return false;
        }
        for (index, &extent) in self.indices.iter_mut().zip(shape).rev() {
            *index += 1;
            if *index < extent {
                return true;
            }
            *index = 0;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_at_origin() {
        let cursor = SlotCursor::new(2);
        assert_eq!(cursor.indices(), &[0, 0]);
        assert_eq!(cursor.rank(), 2);
        assert_eq!(cursor.get(2), None);
    }

    #[test]
    fn test_advance_one_dim() {
        let mut cursor = SlotCursor::new(1);
        let mut seen = vec![cursor.primary()];
        while cursor.advance(&[4]) {
            seen.push(cursor.primary());
        }
        assert_eq!(seen, vec![0, 1, 2, 3]);
        assert_eq!(cursor.primary(), 0, "wraps back to origin");
    }

    #[test]
    fn test_advance_row_major() {
        let mut cursor = SlotCursor::new(2);
        let mut seen = vec![cursor.indices().to_vec()];
        while cursor.advance(&[2, 3]) {
            seen.push(cursor.indices().to_vec());
        }
        assert_eq!(
            seen,
            vec![
                vec![0, 0],
                vec![0, 1],
                vec![0, 2],
                vec![1, 0],
                vec![1, 1],
                vec![1, 2],
            ]
        );
    }

    #[test]
    fn test_rank_zero_primary() {
        let mut cursor = SlotCursor::new(0);
        assert_eq!(cursor.primary(), 0);
        assert!(!cursor.advance(&[]));
    }

    #[test]
    fn test_advance_with_wrong_rank_stops() {
        let mut cursor = SlotCursor::new(2);
        cursor.advance(&[2, 2]);
        assert!(!cursor.advance(&[4]));
        assert!(!cursor.advance(&[4, 4, 4]));
        assert_eq!(cursor.indices(), &[0, 1]);
    }

    #[test]
    fn test_reset() {
        let mut cursor = SlotCursor::new(2);
        cursor.advance(&[3, 3]);
        cursor.advance(&[3, 3]);
        cursor.reset();
        assert_eq!(cursor.indices(), &[0, 0]);
    }
}
