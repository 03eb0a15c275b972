/// Direction cells flow in.  A vertical grid stacks rows of `span` cells; a
/// horizontal list is a single row that scrolls sideways.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Vertical { span: usize },
    Horizontal,
}

/// Static geometry of a grid, in terminal cells.
///
/// "Main" is the scrolling axis (rows for a vertical grid, columns for a
/// horizontal list); "cross" is the other one.
#[derive(Debug, Clone, PartialEq)]
pub struct GridLayout {
    pub axis: Axis,
    /// Extent of a line along the main axis unless the data source overrides it.
    pub estimated_extent: u32,
    /// Gap between consecutive lines.
    pub spacing: u32,
    /// Gap between cells of one row (vertical grids only).
    pub cross_spacing: u32,
    /// Lines kept alive beyond each viewport edge.
    pub prefetch_lines: usize,
    pub padding_leading: u32,
    pub padding_trailing: u32,
}

impl GridLayout {
    pub fn vertical(span: usize) -> Self {
        Self {
            axis: Axis::Vertical { span: span.max(1) },
            estimated_extent: 8,
            spacing: 1,
            cross_spacing: 2,
            prefetch_lines: 1,
            padding_leading: 0,
            padding_trailing: 0,
        }
    }

    pub fn horizontal() -> Self {
        Self {
            axis: Axis::Horizontal,
            estimated_extent: 24,
            spacing: 2,
            cross_spacing: 0,
            prefetch_lines: 2,
            padding_leading: 0,
            padding_trailing: 0,
        }
    }

    pub fn span(&self) -> usize {
        match self.axis {
            Axis::Vertical { span } => span,
            Axis::Horizontal => 1,
        }
    }

    pub fn line_of(&self, index: usize) -> usize {
        index / self.span()
    }

    /// Number of lines needed for `count` items.
    pub fn line_count(&self, count: usize) -> usize {
        count.div_ceil(self.span())
    }

    /// Indices on `line`, clipped to `count`.
    pub fn indices_of(&self, line: usize, count: usize) -> std::ops::Range<usize> {
        let start = (line * self.span()).min(count);
        let end = ((line + 1) * self.span()).min(count);
        start..end
    }

    /// Prefetch margin along the main axis.
    pub fn margin(&self) -> u32 {
        self.prefetch_lines as u32 * (self.estimated_extent + self.spacing)
    }

    /// Offset and extent of column `column` across a cross extent of `cross`.
    pub fn cross_frame(&self, column: usize, cross: u32) -> (u32, u32) {
        let span = self.span() as u32;
        if span <= 1 {
            return (0, cross);
        }
        let gaps = self.cross_spacing * (span - 1);
        let width = cross.saturating_sub(gaps) / span;
        (column as u32 * (width + self.cross_spacing), width)
    }
}

/// Prefix-sum cache of line offsets along the main axis.
///
/// `offsets[i]` is the leading edge of line `i`; `offsets[len]` is the
/// leading edge a line appended at the end would get.
#[derive(Debug, Clone, Default)]
pub struct LineLayout {
    offsets: Vec<u32>,
    extents: Vec<u32>,
    spacing: u32,
    padding_trailing: u32,
}

impl LineLayout {
    pub fn new(layout: &GridLayout) -> Self {
        Self {
            offsets: vec![layout.padding_leading],
            extents: Vec::new(),
            spacing: layout.spacing,
            padding_trailing: layout.padding_trailing,
        }
    }

    pub fn len(&self) -> usize {
        self.extents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extents.is_empty()
    }

    /// Drop every line from `line` onwards.
    pub fn truncate(&mut self, line: usize) {
        if line < self.extents.len() {
            self.extents.truncate(line);
            self.offsets.truncate(line + 1);
        }
    }

    pub fn push(&mut self, extent: u32) {
        let leading = self.offsets[self.offsets.len() - 1];
        self.extents.push(extent);
        self.offsets.push(leading + extent + self.spacing);
    }

    pub fn leading(&self, line: usize) -> u32 {
        self.offsets[line.min(self.extents.len())]
    }

    pub fn extent(&self, line: usize) -> u32 {
        self.extents.get(line).copied().unwrap_or(0)
    }

    pub fn trailing(&self, line: usize) -> u32 {
        self.leading(line) + self.extent(line)
    }

    /// Leading edge of the line after `line` (includes the spacing gap).
    pub fn next_leading(&self, line: usize) -> u32 {
        self.offsets[(line + 1).min(self.extents.len())]
    }

    /// Total content extent including padding.
    pub fn total_extent(&self) -> u32 {
        match self.extents.len() {
            0 => self.offsets[0] + self.padding_trailing,
            n => self.offsets[n] - self.spacing + self.padding_trailing,
        }
    }

    /// Last line whose leading edge is at or before `offset`.
    pub fn line_at(&self, offset: u32) -> Option<usize> {
        if self.extents.is_empty() {
            return None;
        }
        let after = self.offsets[..self.extents.len()].partition_point(|&o| o <= offset);
        Some(after.saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn built(extents: &[u32]) -> LineLayout {
        let mut layout = GridLayout::vertical(4);
        layout.padding_leading = 1;
        layout.padding_trailing = 2;
        let mut lines = LineLayout::new(&layout);
        for &e in extents {
            lines.push(e);
        }
        lines
    }

    #[test]
    fn test_prefix_offsets() {
        let lines = built(&[8, 4, 8]);
        assert_eq!(lines.leading(0), 1);
        assert_eq!(lines.leading(1), 10);
        assert_eq!(lines.trailing(1), 14);
        assert_eq!(lines.next_leading(1), 15);
        assert_eq!(lines.total_extent(), 1 + 8 + 1 + 4 + 1 + 8 + 2);
    }

    #[test]
    fn test_line_at_binary_search() {
        let lines = built(&[8, 4, 8]);
        assert_eq!(lines.line_at(0), Some(0));
        assert_eq!(lines.line_at(9), Some(0));
        assert_eq!(lines.line_at(10), Some(1));
        assert_eq!(lines.line_at(500), Some(2));
        assert_eq!(built(&[]).line_at(0), None);
    }

    #[test]
    fn test_truncate_then_extend() {
        let mut lines = built(&[8, 8, 8]);
        lines.truncate(2);
        lines.push(3);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines.extent(2), 3);
        assert_eq!(lines.leading(2), 19);
    }

    #[test]
    fn test_row_geometry() {
        let layout = GridLayout::vertical(4);
        assert_eq!(layout.line_count(9), 3);
        assert_eq!(layout.indices_of(2, 9), 8..9);
        assert_eq!(layout.line_of(7), 1);
        // 4 columns, 3 gaps of 2 over 46 cells → 10 wide
        assert_eq!(layout.cross_frame(3, 46), (36, 10));
        assert_eq!(GridLayout::horizontal().cross_frame(0, 30), (0, 30));
    }
}
