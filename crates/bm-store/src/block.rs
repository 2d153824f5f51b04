use std::fmt;

/// Position of a tile in a matrix's block grid.
///
/// Used as the grouping key between the partial-product and aggregation
/// stages. Range checks against a concrete grid belong to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId {
    row: usize,
    column: usize,
}

impl BlockId {
    pub fn new(row: usize, column: usize) -> Self {
        BlockId { row, column }
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn column(&self) -> usize {
        self.column
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.column)
    }
}

impl From<(usize, usize)> for BlockId {
    fn from((row, column): (usize, usize)) -> Self {
        BlockId::new(row, column)
    }
}

/// Scalar range covered by a block, end-exclusive.
///
/// Travels with a `BlockId` during enumeration. The multiply kernel never
/// reads it; it describes where the block sits in the logical matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPosition {
    pub start_row: usize,
    pub end_row: usize,
    pub start_column: usize,
    pub end_column: usize,
}

impl BlockPosition {
    /// Number of logical (unpadded) rows covered.
    pub fn height(&self) -> usize {
        self.end_row - self.start_row
    }

    /// Number of logical (unpadded) columns covered.
    pub fn width(&self) -> usize {
        self.end_column - self.start_column
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_equality_and_hash() {
        let mut groups: HashMap<BlockId, u32> = HashMap::new();
        *groups.entry(BlockId::new(1, 2)).or_default() += 1;
        *groups.entry(BlockId::from((1, 2))).or_default() += 1;
        *groups.entry(BlockId::new(2, 1)).or_default() += 1;
        assert_eq!(groups[&BlockId::new(1, 2)], 2);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(BlockId::new(3, 0).to_string(), "(3, 0)");
    }

    #[test]
    fn test_position_extent() {
        let p = BlockPosition {
            start_row: 4,
            end_row: 6,
            start_column: 0,
            end_column: 4,
        };
        assert_eq!(p.height(), 2);
        assert_eq!(p.width(), 4);
    }
}
