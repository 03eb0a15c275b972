use super::layout::Axis;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Where focus goes after a directional move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusTarget {
    Cell(usize),
    /// The move leaves the grid; the enclosing view decides.
    Parent(Direction),
}

/// Neighbour of `index` in `direction`, or `None` when the move crosses the
/// grid's edge.  Never wraps between rows.
pub fn neighbour(axis: Axis, count: usize, index: usize, direction: Direction) -> Option<usize> {
    if index >= count {
        return None;
    }
    match axis {
        Axis::Horizontal => match direction {
            Direction::Left => index.checked_sub(1),
            Direction::Right => (index + 1 < count).then_some(index + 1),
            Direction::Up | Direction::Down => None,
        },
        Axis::Vertical { span } => {
            let span = span.max(1);
            let column = index % span;
            match direction {
                Direction::Left => (column > 0).then(|| index - 1),
                Direction::Right => (column + 1 < span && index + 1 < count).then_some(index + 1),
                Direction::Up => index.checked_sub(span),
                Direction::Down => {
                    let last_row = (count - 1) / span;
                    if index / span == last_row {
                        None
                    } else {
                        // a short last row pulls focus onto its final item
                        Some((index + span).min(count - 1))
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRID: Axis = Axis::Vertical { span: 4 };

    #[test]
    fn test_row_boundary_hands_off() {
        assert_eq!(neighbour(GRID, 100, 3, Direction::Right), None);
        assert_eq!(neighbour(GRID, 100, 4, Direction::Left), None);
        assert_eq!(neighbour(GRID, 100, 2, Direction::Right), Some(3));
        assert_eq!(neighbour(GRID, 100, 1, Direction::Up), None);
    }

    #[test]
    fn test_vertical_moves_by_span() {
        assert_eq!(neighbour(GRID, 100, 5, Direction::Down), Some(9));
        assert_eq!(neighbour(GRID, 100, 9, Direction::Up), Some(5));
        assert_eq!(neighbour(GRID, 100, 97, Direction::Down), None);
    }

    #[test]
    fn test_short_last_row_clamps() {
        // 10 items: rows [0..4) [4..8) [8..10)
        assert_eq!(neighbour(GRID, 10, 7, Direction::Down), Some(9));
        assert_eq!(neighbour(GRID, 10, 9, Direction::Right), None);
    }

    #[test]
    fn test_horizontal_list() {
        let list = Axis::Horizontal;
        assert_eq!(neighbour(list, 5, 0, Direction::Left), None);
        assert_eq!(neighbour(list, 5, 4, Direction::Right), None);
        assert_eq!(neighbour(list, 5, 2, Direction::Right), Some(3));
        assert_eq!(neighbour(list, 5, 2, Direction::Down), None);
    }

    #[test]
    fn test_out_of_range_index() {
        assert_eq!(neighbour(GRID, 4, 9, Direction::Left), None);
        assert_eq!(neighbour(GRID, 0, 0, Direction::Down), None);
    }
}
