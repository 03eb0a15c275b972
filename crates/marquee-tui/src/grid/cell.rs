use super::pool::ReusePool;

/// A reusable view bound to one item index at a time.
pub trait GridCell {
    /// Pool key; cells only get reused for cells with the same identifier.
    fn reuse_identifier(&self) -> &'static str;

    fn index(&self) -> Option<usize>;
    fn set_index(&mut self, index: Option<usize>);

    /// Called when a pooled cell is handed out again; must drop the old binding.
    fn prepare_for_reuse(&mut self) {}

    /// Called when the cell leaves the window and enters the pool.
    fn cache_for_reuse(&mut self) {}

    /// Abort in-flight work such as image loads.
    fn cancel_pending(&mut self) {}
}

pub trait GridDataSource {
    type Cell: GridCell;

    fn item_count(&self) -> usize;

    /// Produce a bound cell for `index`, usually via `pool.dequeue(..)`.
    /// Returning `None` leaves the slot empty.
    fn cell_for_row(&mut self, pool: &mut ReusePool<Self::Cell>, index: usize) -> Option<Self::Cell>;

    /// Main-axis extent override for `line`.
    fn extent_for_line(&self, _line: usize) -> Option<u32> {
        None
    }

    fn on_item_selected(&mut self, _index: usize) {}

    fn clear_data(&mut self) {}
}
