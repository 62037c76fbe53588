//! Table detection from page geometry.
//!
//! Two strategies are used, in order:
//!
//! 1. **Lattice**: ruling lines that touch each other are clustered, and each
//!    cluster defines a grid of cells. Spans are assigned to the cell their
//!    anchor point falls into. Bulletins draw full cell borders, so this is
//!    the normal path.
//! 2. **Stream**: when a page has no grid at all, columns are inferred from
//!    text alignment (Camelot-style stream mode).
//!
//! Within a cell, visual lines are listed bottom-up and joined with `\n`;
//! [`crate::text::join_cell`] restores reading order. Spans inside a line are
//! left-to-right. Rows come out top-to-bottom and fully blank rows are dropped.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::model::{RawRow, RawTable};

use super::layout::{PageGeometry, Ruling, TextSpan};

/// Table detector configuration.
#[derive(Debug, Clone)]
pub struct TableDetectorConfig {
    /// Distance (points) within which two rulings count as touching
    pub snap_tolerance: f32,
    /// Grid lines closer than this (points) are merged into one
    pub min_cell_size: f32,
    /// Fall back to alignment-based detection on pages without rulings
    pub stream_fallback: bool,
    /// Minimum number of rows to consider as table (stream mode)
    pub min_rows: usize,
    /// Minimum number of columns to consider as table (stream mode)
    pub min_columns: usize,
    /// Maximum number of columns (above this, likely word-level splitting)
    pub max_columns: usize,
    /// Y tolerance for grouping spans into lines (fraction of font size)
    pub y_tolerance_factor: f32,
    /// Minimum column alignment ratio (0.0-1.0)
    pub min_alignment_ratio: f32,
    /// Minimum gap between columns (points)
    pub min_column_gap: f32,
}

impl Default for TableDetectorConfig {
    fn default() -> Self {
        Self {
            snap_tolerance: 2.0,
            min_cell_size: 4.0,
            stream_fallback: true,
            min_rows: 2,
            min_columns: 2,
            max_columns: 16,
            y_tolerance_factor: 0.4,
            min_alignment_ratio: 0.3,
            min_column_gap: 15.0,
        }
    }
}

/// Cell boundaries of one ruled table.
#[derive(Debug, Clone, PartialEq)]
struct Grid {
    /// Column boundaries, left to right
    xs: Vec<f32>,
    /// Row boundaries, top to bottom (descending PDF y)
    ys: Vec<f32>,
}

impl Grid {
    fn column_at(&self, x: f32) -> Option<usize> {
        self.xs.windows(2).position(|w| x >= w[0] && x < w[1])
    }

    fn row_at(&self, y: f32) -> Option<usize> {
        self.ys.windows(2).position(|w| y <= w[0] && y > w[1])
    }

    fn top(&self) -> f32 {
        self.ys.first().copied().unwrap_or(0.0)
    }

    fn left(&self) -> f32 {
        self.xs.first().copied().unwrap_or(0.0)
    }
}

/// A row of text spans grouped by baseline (stream mode).
#[derive(Debug, Clone)]
struct SpanRow {
    y: f32,
    spans: Vec<TextSpan>,
}

/// Detects tables on a page.
#[derive(Debug, Clone, Default)]
pub struct TableDetector {
    config: TableDetectorConfig,
}

impl TableDetector {
    /// Create a new table detector with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new table detector with custom configuration.
    pub fn with_config(config: TableDetectorConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    pub fn config(&self) -> &TableDetectorConfig {
        &self.config
    }

    /// Detect tables, ordered top-to-bottom.
    pub fn detect(&self, geometry: &PageGeometry) -> Vec<RawTable> {
        let grids = self.find_grids(&geometry.rulings);
        log::debug!(
            "TableDetector: {} rulings formed {} grids",
            geometry.rulings.len(),
            grids.len()
        );

        if grids.is_empty() {
            if self.config.stream_fallback {
                return self.detect_stream(&geometry.spans);
            }
            return Vec::new();
        }

        grids
            .iter()
            .map(|grid| self.fill_grid(grid, &geometry.spans))
            .filter(|table| !table.is_empty())
            .collect()
    }

    // -----------------------------------------------------------------------
    // Lattice mode
    // -----------------------------------------------------------------------

    fn find_grids(&self, rulings: &[Ruling]) -> Vec<Grid> {
        let mut sets = DisjointSet::new(rulings.len());
        for i in 0..rulings.len() {
            for j in (i + 1)..rulings.len() {
                if rulings[i].touches(&rulings[j], self.config.snap_tolerance) {
                    sets.union(i, j);
                }
            }
        }

        let mut components: BTreeMap<usize, Vec<Ruling>> = BTreeMap::new();
        for (i, ruling) in rulings.iter().enumerate() {
            components.entry(sets.find(i)).or_default().push(*ruling);
        }

        let mut grids: Vec<Grid> = components
            .into_values()
            .filter_map(|component| self.grid_from(&component))
            .collect();

        grids.sort_by(|a, b| {
            b.top()
                .total_cmp(&a.top())
                .then(a.left().total_cmp(&b.left()))
        });
        grids
    }

    fn grid_from(&self, rulings: &[Ruling]) -> Option<Grid> {
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for ruling in rulings {
            match *ruling {
                Ruling::Horizontal { y, .. } => ys.push(y),
                Ruling::Vertical { x, .. } => xs.push(x),
            }
        }

        let xs = snap_positions(xs, self.config.min_cell_size);
        let mut ys = snap_positions(ys, self.config.min_cell_size);
        ys.reverse();

        (xs.len() >= 2 && ys.len() >= 2).then_some(Grid { xs, ys })
    }

    fn fill_grid(&self, grid: &Grid, spans: &[TextSpan]) -> RawTable {
        let columns = grid.xs.len() - 1;
        let rows = grid.ys.len() - 1;
        let mut cells: Vec<Vec<Vec<&TextSpan>>> = vec![vec![Vec::new(); columns]; rows];

        for span in spans {
            let (x, y) = span.anchor();
            if let (Some(row), Some(column)) = (grid.row_at(y), grid.column_at(x)) {
                cells[row][column].push(span);
            }
        }

        let mut table = RawTable::new();
        for row in cells {
            let raw = RawRow::new(row.into_iter().map(|c| self.cell_text(c)).collect());
            if !raw.is_blank() {
                table.add_row(raw);
            }
        }
        table.column_widths = Some(grid.xs.windows(2).map(|w| w[1] - w[0]).collect());
        table
    }

    /// Lines top-down, joined with `\n`; spans left-to-right within a line.
    fn cell_text(&self, mut spans: Vec<&TextSpan>) -> String {
        spans.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

        let mut lines: Vec<(f32, Vec<&TextSpan>)> = Vec::new();
        for span in spans {
            let tolerance = span.font_size * self.config.y_tolerance_factor;
            match lines.last_mut() {
                Some((y, line)) if (span.y - *y).abs() <= tolerance => line.push(span),
                _ => lines.push((span.y, vec![span])),
            }
        }

        lines
            .into_iter()
            .map(|(_, mut line)| {
                line.sort_by(|a, b| a.x.total_cmp(&b.x));
                line.iter()
                    .map(|s| s.text.trim())
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    // -----------------------------------------------------------------------
    // Stream mode
    // -----------------------------------------------------------------------

    fn detect_stream(&self, spans: &[TextSpan]) -> Vec<RawTable> {
        if spans.len() < self.config.min_rows * self.config.min_columns {
            log::debug!("TableDetector: not enough spans ({})", spans.len());
            return Vec::new();
        }

        let rows = self.group_into_rows(spans);
        if rows.len() < self.config.min_rows {
            return Vec::new();
        }

        let columns = self.detect_columns(&rows);
        if columns.len() < self.config.min_columns {
            log::debug!("TableDetector: not enough columns ({})", columns.len());
            return Vec::new();
        }

        let mut tables = Vec::new();
        for (start, end) in self.find_table_regions(&rows, &columns) {
            let region = &rows[start..=end];
            let region_columns = self.detect_columns(region);

            if region_columns.len() < self.config.min_columns {
                continue;
            }
            if region_columns.len() > self.config.max_columns {
                log::debug!(
                    "TableDetector: skipping region, too many columns ({} > {})",
                    region_columns.len(),
                    self.config.max_columns
                );
                continue;
            }

            let table = self.region_to_table(region, &region_columns);
            if !table.is_empty() {
                tables.push(table);
            }
        }

        log::debug!("TableDetector: stream mode found {} tables", tables.len());
        tables
    }

    /// Group spans into rows by Y position, top-to-bottom.
    fn group_into_rows(&self, spans: &[TextSpan]) -> Vec<SpanRow> {
        let mut sorted = spans.to_vec();
        sorted.sort_by(|a, b| match b.y.total_cmp(&a.y) {
            Ordering::Equal => a.x.total_cmp(&b.x),
            other => other,
        });

        let mut rows: Vec<SpanRow> = Vec::new();
        let mut current: Vec<TextSpan> = Vec::new();
        let mut current_y: Option<f32> = None;

        for span in sorted {
            let tolerance = span.font_size * self.config.y_tolerance_factor;
            match current_y {
                Some(y) if (span.y - y).abs() <= tolerance => current.push(span),
                _ => {
                    if !current.is_empty() {
                        rows.push(SpanRow::from_spans(std::mem::take(&mut current)));
                    }
                    current_y = Some(span.y);
                    current.push(span);
                }
            }
        }
        if !current.is_empty() {
            rows.push(SpanRow::from_spans(current));
        }

        rows
    }

    /// Column left edges shared by enough rows.
    fn detect_columns(&self, rows: &[SpanRow]) -> Vec<f32> {
        let multi_span_rows: Vec<&SpanRow> = rows.iter().filter(|r| r.spans.len() >= 2).collect();

        // Few multi-span rows: count every span instead of once per row.
        let (counted, per_row): (Vec<&SpanRow>, bool) =
            if multi_span_rows.len() < self.config.min_rows {
                (rows.iter().collect(), false)
            } else {
                (multi_span_rows, true)
            };

        if counted.is_empty() {
            return Vec::new();
        }

        let bucket_size = 5.0;
        let mut edge_counts: HashMap<i32, usize> = HashMap::new();
        for row in &counted {
            let buckets = row.spans.iter().map(|s| (s.x / bucket_size).round() as i32);
            if per_row {
                for bucket in buckets.collect::<HashSet<_>>() {
                    *edge_counts.entry(bucket).or_insert(0) += 1;
                }
            } else {
                for bucket in buckets {
                    *edge_counts.entry(bucket).or_insert(0) += 1;
                }
            }
        }

        let min_occurrences =
            ((counted.len() as f32 * self.config.min_alignment_ratio) as usize).max(2);

        let mut edges: Vec<f32> = edge_counts
            .iter()
            .filter(|(_, count)| **count >= min_occurrences)
            .map(|(bucket, _)| *bucket as f32 * bucket_size)
            .collect();
        edges.sort_by(f32::total_cmp);

        let mut merged: Vec<f32> = Vec::new();
        for edge in edges {
            match merged.last() {
                Some(&last) if edge - last < self.config.min_column_gap => {}
                _ => merged.push(edge),
            }
        }
        merged
    }

    /// Contiguous row ranges with consistent column alignment.
    fn find_table_regions(&self, rows: &[SpanRow], columns: &[f32]) -> Vec<(usize, usize)> {
        let mut regions = Vec::new();
        let mut start: Option<usize> = None;

        for (i, row) in rows.iter().enumerate() {
            if alignment_score(row, columns) >= self.config.min_alignment_ratio {
                start.get_or_insert(i);
            } else if let Some(s) = start.take() {
                if i - s >= self.config.min_rows {
                    regions.push((s, i - 1));
                }
            }
        }
        if let Some(s) = start {
            if rows.len() - s >= self.config.min_rows {
                regions.push((s, rows.len() - 1));
            }
        }

        regions
    }

    fn region_to_table(&self, rows: &[SpanRow], columns: &[f32]) -> RawTable {
        let right_x = rows
            .iter()
            .flat_map(|r| r.spans.iter())
            .map(TextSpan::right)
            .fold(f32::MIN, f32::max);

        let mut table = RawTable::new();
        for row in rows {
            let mut contents: Vec<Vec<&str>> = vec![Vec::new(); columns.len()];
            for span in &row.spans {
                let column = find_column_for_span(span.x, columns, right_x);
                contents[column].push(span.text.trim());
            }
            let raw = RawRow::new(contents.into_iter().map(|c| c.join(" ")).collect());
            if !raw.is_blank() {
                table.add_row(raw);
            }
        }

        let widths = (0..columns.len())
            .map(|i| columns.get(i + 1).copied().unwrap_or(right_x) - columns[i])
            .collect();
        table.column_widths = Some(widths);
        table
    }
}

impl SpanRow {
    fn from_spans(spans: Vec<TextSpan>) -> Self {
        let y = spans.iter().map(|s| s.y).sum::<f32>() / spans.len() as f32;
        Self { y, spans }
    }
}

/// Share of a row's spans starting on a known column edge.
fn alignment_score(row: &SpanRow, columns: &[f32]) -> f32 {
    if row.spans.is_empty() || columns.is_empty() {
        return 0.0;
    }

    let tolerance = 5.0;
    let aligned = row
        .spans
        .iter()
        .filter(|span| columns.iter().any(|col| (span.x - col).abs() <= tolerance))
        .count();

    aligned as f32 / row.spans.len() as f32
}

/// Column index for a span's left edge; nearest column if none contains it.
fn find_column_for_span(span_x: f32, columns: &[f32], right_x: f32) -> usize {
    // Spans may start slightly before the column edge.
    let slack = 10.0;
    for (i, &start) in columns.iter().enumerate() {
        let end = columns.get(i + 1).copied().unwrap_or(right_x + 100.0);
        if span_x >= start - slack && span_x < end - slack {
            return i;
        }
    }

    columns
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (span_x - **a).abs().total_cmp(&(span_x - **b).abs()))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Sort and merge positions closer than `tolerance` into their mean.
fn snap_positions(mut positions: Vec<f32>, tolerance: f32) -> Vec<f32> {
    positions.sort_by(f32::total_cmp);

    let mut clusters: Vec<Vec<f32>> = Vec::new();
    for p in positions {
        match clusters.last_mut() {
            Some(cluster) if cluster.last().is_some_and(|&last| p - last <= tolerance) => {
                cluster.push(p)
            }
            _ => clusters.push(vec![p]),
        }
    }

    clusters
        .into_iter()
        .map(|c| c.iter().sum::<f32>() / c.len() as f32)
        .collect()
}

/// Union-find over ruling indices.
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(text: &str, x: f32, y: f32) -> TextSpan {
        TextSpan::new(text, x, y, 10.0)
    }

    fn h(y: f32, x0: f32, x1: f32) -> Ruling {
        Ruling::Horizontal { y, x0, x1 }
    }

    fn v(x: f32, y0: f32, y1: f32) -> Ruling {
        Ruling::Vertical { x, y0, y1 }
    }

    /// Two columns (100..200, 200..300), rows 700..680, 680..640, 640..620.
    fn grid_rulings() -> Vec<Ruling> {
        vec![
            h(700.0, 100.0, 300.0),
            h(680.0, 100.0, 300.0),
            h(640.0, 100.0, 300.0),
            h(620.0, 100.0, 300.0),
            v(100.0, 620.0, 700.0),
            v(200.0, 620.0, 700.0),
            v(300.0, 620.0, 700.0),
        ]
    }

    #[test]
    fn test_lattice_grid_cells() {
        let geometry = PageGeometry {
            spans: vec![
                span("A", 110.0, 685.0),
                span("B", 210.0, 685.0),
                span("top", 110.0, 665.0),
                span("bottom", 110.0, 650.0),
                span("x", 210.0, 660.0),
                span("outside", 400.0, 660.0),
            ],
            rulings: grid_rulings(),
        };

        let tables = TableDetector::new().detect(&geometry);
        assert_eq!(tables.len(), 1);

        let table = &tables[0];
        // The empty third row is dropped.
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows[0].cells, vec!["A", "B"]);
        assert_eq!(table.rows[1].cells, vec!["top\nbottom", "x"]);
        assert_eq!(table.column_widths, Some(vec![100.0, 100.0]));
    }

    #[test]
    fn test_lattice_same_line_spans_left_to_right() {
        let geometry = PageGeometry {
            spans: vec![span("second", 150.0, 685.0), span("first", 110.0, 686.0)],
            rulings: grid_rulings(),
        };
        let tables = TableDetector::new().detect(&geometry);
        assert_eq!(tables[0].rows[0].cells[0], "first second");
    }

    #[test]
    fn test_lattice_tables_ordered_top_to_bottom() {
        let lower = vec![
            h(300.0, 100.0, 200.0),
            h(280.0, 100.0, 200.0),
            v(100.0, 280.0, 300.0),
            v(200.0, 280.0, 300.0),
        ];
        let mut rulings = lower;
        rulings.extend(grid_rulings());

        let geometry = PageGeometry {
            spans: vec![span("low", 110.0, 285.0), span("high", 110.0, 685.0)],
            rulings,
        };
        let tables = TableDetector::new().detect(&geometry);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].rows[0].cells[0], "high");
        assert_eq!(tables[1].rows[0].cells, vec!["low"]);
    }

    #[test]
    fn test_duplicate_rulings_are_snapped() {
        let mut rulings = grid_rulings();
        rulings.push(h(700.6, 100.0, 300.0));
        rulings.push(v(200.4, 620.0, 700.0));

        let geometry = PageGeometry {
            spans: vec![span("A", 110.0, 685.0), span("B", 210.0, 685.0)],
            rulings,
        };
        let tables = TableDetector::new().detect(&geometry);
        assert_eq!(tables[0].column_count(), 2);
    }

    #[test]
    fn test_empty_grid_yields_no_table() {
        let geometry = PageGeometry {
            spans: Vec::new(),
            rulings: grid_rulings(),
        };
        assert!(TableDetector::new().detect(&geometry).is_empty());
    }

    #[test]
    fn test_stream_fallback() {
        let geometry = PageGeometry {
            spans: vec![
                span("Name", 10.0, 100.0),
                span("Age", 60.0, 100.0),
                span("Alice", 10.0, 85.0),
                span("30", 60.0, 85.0),
                span("Bob", 10.0, 70.0),
                span("25", 60.0, 70.0),
            ],
            rulings: Vec::new(),
        };

        let tables = TableDetector::new().detect(&geometry);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].row_count(), 3);
        assert_eq!(tables[0].rows[0].cells, vec!["Name", "Age"]);
        assert_eq!(tables[0].rows[2].cells, vec!["Bob", "25"]);
    }

    #[test]
    fn test_stream_fallback_disabled() {
        let config = TableDetectorConfig {
            stream_fallback: false,
            ..Default::default()
        };
        let geometry = PageGeometry {
            spans: vec![
                span("a", 10.0, 100.0),
                span("b", 60.0, 100.0),
                span("c", 10.0, 85.0),
                span("d", 60.0, 85.0),
            ],
            rulings: Vec::new(),
        };
        assert!(TableDetector::with_config(config).detect(&geometry).is_empty());
    }

    #[test]
    fn test_no_table_single_column() {
        let geometry = PageGeometry {
            spans: vec![
                span("Line 1", 10.0, 100.0),
                span("Line 2", 10.0, 85.0),
                span("Line 3", 10.0, 70.0),
            ],
            rulings: Vec::new(),
        };
        assert!(TableDetector::new().detect(&geometry).is_empty());
    }

    #[test]
    fn test_snap_positions() {
        assert_eq!(snap_positions(vec![10.0, 300.0, 11.0, 200.0], 4.0), vec![10.5, 200.0, 300.0]);
    }

    #[test]
    fn test_find_column_for_span() {
        let columns = [10.0, 60.0];
        assert_eq!(find_column_for_span(10.0, &columns, 100.0), 0);
        assert_eq!(find_column_for_span(60.0, &columns, 100.0), 1);
    }
}
