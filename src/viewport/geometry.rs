//! Grid Geometry
//!
//! Column and row layout of the virtualized grid. Cells are square and every
//! column has the same width:
//!
//! ```text
//! columns      = max(1, floor(width / min_column_width))
//! column_width = floor(width / columns)
//! row_height   = column_width
//! rows         = ceil(total / columns)
//! index        = row * columns + column
//! image_size   = column_width - 2 * gap
//! ```
//!
//! Scrolling is vertical only; the grid never scrolls horizontally.

use std::ops::Range;

use crate::config::GridConfig;

/// Resolved layout of the grid for one container size and item count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridGeometry {
    pub columns: usize,
    pub column_width: u32,
    pub row_height: u32,
    pub rows: usize,
    /// Item count the rows were derived from.
    pub total: usize,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Side of the image inside a cell once the gap is removed.
    pub image_size: u32,
}

/// Container size in layout units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContainerSize {
    pub width: u32,
    pub height: u32,
}

impl ContainerSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A container that has not been measured yet (or collapsed) renders nothing.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Geometry for `size` and `total` items, or `None` for an empty container.
pub fn compute_geometry(size: ContainerSize, grid: &GridConfig, total: usize) -> Option<GridGeometry> {
    if size.is_empty() {
        return None;
    }
    let min_width = grid.min_column_width.max(1);
    let columns = (size.width / min_width).max(1);
    let column_width = size.width / columns;
    let columns = columns as usize;
    Some(GridGeometry {
        columns,
        column_width,
        row_height: column_width,
        rows: total.div_ceil(columns),
        total,
        viewport_width: size.width,
        viewport_height: size.height,
        image_size: column_width.saturating_sub(grid.gap.saturating_mul(2)),
    })
}

impl GridGeometry {
    /// Height of every row stacked.
    pub fn content_height(&self) -> u64 {
        self.rows as u64 * u64::from(self.row_height)
    }

    /// Largest valid scroll offset.
    pub fn max_scroll(&self) -> u64 {
        self.content_height()
            .saturating_sub(u64::from(self.viewport_height))
    }

    /// `(row, column)` of `index`.
    pub fn cell_of(&self, index: usize) -> (usize, usize) {
        (index / self.columns, index % self.columns)
    }

    /// Item indices whose rows intersect the viewport grown by `overscan` on
    /// both edges.
    pub fn visible_range(&self, scroll: u64, overscan: u32) -> Range<usize> {
        if self.total == 0 || self.row_height == 0 {
            return 0..0;
        }
        let row_height = u64::from(self.row_height);
        let top = scroll.saturating_sub(u64::from(overscan));
        let bottom = scroll + u64::from(self.viewport_height) + u64::from(overscan);
        let first_row = (top / row_height) as usize;
        if first_row >= self.rows {
            return 0..0;
        }
        let last_row = (((bottom - 1) / row_height) as usize).min(self.rows - 1);
        let start = first_row * self.columns;
        let end = ((last_row + 1) * self.columns).min(self.total);
        start..end
    }

    /// Distance from the row of `index` to the viewport; zero when any part
    /// of the row is on screen.
    pub fn distance_to_viewport(&self, index: usize, scroll: u64) -> u64 {
        let row_height = u64::from(self.row_height);
        let (row, _) = self.cell_of(index);
        let row_top = row as u64 * row_height;
        let row_bottom = row_top + row_height;
        let view_bottom = scroll + u64::from(self.viewport_height);
        if row_bottom <= scroll {
            scroll - row_bottom
        } else if row_top >= view_bottom {
            row_top - view_bottom
        } else {
            0
        }
    }
}
