//! Document assembly: pages of raw tables in, records out.
//!
//! [`Records`] is a pull-based iterator. Each call to `next` does at most one
//! page's worth of table detection plus the joining of that page's rows. The
//! header is the first row of the first non-empty table in page order and is
//! set exactly once; every later row, including first rows of later tables,
//! is data.

use std::collections::VecDeque;
use std::iter::FusedIterator;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{Error, Result, RowLocation};
use crate::model::{RawRow, Record, Recordset, Schema};
use crate::parser::PageSource;
use crate::schema::{build_record, join_row};

/// What to do with a row whose width differs from the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum RowPolicy {
    /// Stop with [`Error::Structural`]
    #[default]
    FailFast,
    /// Log a warning, count the row and continue
    SkipWithWarning,
}

/// Options for record assembly.
#[derive(Debug, Clone, Default)]
pub struct AssembleOptions {
    /// Structural error handling
    pub row_policy: RowPolicy,

    /// Drop later rows identical to the header (pages that repeat it)
    pub skip_repeated_headers: bool,
}

impl AssembleOptions {
    /// Create new assemble options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the structural error policy.
    pub fn with_row_policy(mut self, policy: RowPolicy) -> Self {
        self.row_policy = policy;
        self
    }

    /// Skip malformed rows instead of failing.
    pub fn skip_bad_rows(self) -> Self {
        self.with_row_policy(RowPolicy::SkipWithWarning)
    }

    /// Enable or disable dropping of repeated header rows.
    pub fn with_skip_repeated_headers(mut self, skip: bool) -> Self {
        self.skip_repeated_headers = skip;
        self
    }
}

/// Counters collected while assembling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionStats {
    /// Pages visited
    pub pages: usize,
    /// Non-empty tables seen
    pub tables: usize,
    /// Rows seen, header included
    pub rows: usize,
    /// Records emitted
    pub records: usize,
    /// Pages that failed analysis and contributed nothing
    pub page_errors: usize,
    /// Rows dropped under [`RowPolicy::SkipWithWarning`]
    pub skipped_rows: usize,
    /// Rows dropped as repeated headers
    pub repeated_headers: usize,
}

/// Progress notification after each page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageProgress {
    /// Page just processed
    pub page: u32,
    /// Pages processed so far
    pub done: usize,
    /// Pages to visit in total
    pub total: usize,
}

type ProgressFn = Box<dyn FnMut(PageProgress)>;

/// Lazy, single-pass record iterator over a [`PageSource`].
///
/// The source is owned and released when the iterator is dropped, whether
/// or not it was fully consumed. After an error the iterator is exhausted.
pub struct Records<S: PageSource> {
    source: S,
    options: AssembleOptions,
    pages: std::vec::IntoIter<u32>,
    total_pages: usize,
    pending: VecDeque<(RowLocation, RawRow)>,
    header: Option<Vec<String>>,
    schema: Option<Arc<Schema>>,
    stats: ExtractionStats,
    progress: Option<ProgressFn>,
    finished: bool,
}

/// Assemble records from a page source.
pub fn assemble<S: PageSource>(source: S, options: AssembleOptions) -> Records<S> {
    Records::new(source, options)
}

impl<S: PageSource> Records<S> {
    /// Create an iterator; no page is read until the first `next`.
    pub fn new(source: S, options: AssembleOptions) -> Self {
        let pages = source.page_numbers();
        Self {
            total_pages: pages.len(),
            pages: pages.into_iter(),
            source,
            options,
            pending: VecDeque::new(),
            header: None,
            schema: None,
            stats: ExtractionStats::default(),
            progress: None,
            finished: false,
        }
    }

    /// Call `f` after every page.
    pub fn with_progress<F>(mut self, f: F) -> Self
    where
        F: FnMut(PageProgress) + 'static,
    {
        self.progress = Some(Box::new(f));
        self
    }

    /// The joined header cells, once established.
    pub fn header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }

    /// The record schema, once established.
    pub fn schema(&self) -> Option<&Arc<Schema>> {
        self.schema.as_ref()
    }

    /// Counters so far.
    pub fn stats(&self) -> &ExtractionStats {
        &self.stats
    }

    /// Number of pages this iterator will visit.
    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    /// Drain into a [`Recordset`], stopping at the first fatal error.
    ///
    /// A document without any table yields an empty recordset.
    pub fn collect_recordset(mut self) -> Result<(Recordset, ExtractionStats)> {
        let mut records = Vec::new();
        for record in self.by_ref() {
            records.push(record?);
        }

        let recordset = match self.schema.take() {
            Some(schema) => Recordset::from_built(schema, records),
            None => Recordset::empty(),
        };
        Ok((recordset, self.stats))
    }

    fn load_next_page(&mut self) -> Option<Result<()>> {
        let number = self.pages.next()?;
        self.stats.pages += 1;

        let outcome = match self.source.load_page(number) {
            Ok(page) => {
                for (t, table) in page.tables.into_iter().enumerate() {
                    if table.is_empty() {
                        continue;
                    }
                    self.stats.tables += 1;
                    for (r, row) in table.rows.into_iter().enumerate() {
                        let location = RowLocation {
                            page: number,
                            table: t,
                            row: r,
                        };
                        self.pending.push_back((location, row));
                    }
                }
                Ok(())
            }
            Err(e) if !e.is_fatal() => {
                log::warn!("Skipping page {}: {}", number, e);
                self.stats.page_errors += 1;
                Ok(())
            }
            Err(e) => Err(e),
        };

        if let Some(progress) = self.progress.as_mut() {
            progress(PageProgress {
                page: number,
                done: self.stats.pages,
                total: self.total_pages,
            });
        }

        Some(outcome)
    }

    fn process_row(&mut self, location: RowLocation, raw: RawRow) -> Result<Option<Record>> {
        self.stats.rows += 1;
        let values = join_row(&raw);

        let Some(schema) = self.schema.as_ref() else {
            let schema = Schema::from_header_cells(&values);
            log::info!("Header at {}: {} columns", location, schema.len());
            self.schema = Some(Arc::new(schema));
            self.header = Some(values);
            return Ok(None);
        };

        if self.options.skip_repeated_headers && self.header.as_ref() == Some(&values) {
            log::debug!("Dropping repeated header at {}", location);
            self.stats.repeated_headers += 1;
            return Ok(None);
        }

        match build_record(schema, values, location) {
            Ok(record) => {
                self.stats.records += 1;
                Ok(Some(record))
            }
            Err(e @ Error::Structural { .. })
                if self.options.row_policy == RowPolicy::SkipWithWarning =>
            {
                log::warn!("Skipping malformed row: {}", e);
                self.stats.skipped_rows += 1;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        self.pending.clear();
        log::info!(
            "Assembled {} records from {} pages ({} page errors, {} skipped rows)",
            self.stats.records,
            self.stats.pages,
            self.stats.page_errors,
            self.stats.skipped_rows
        );
    }
}

impl<S: PageSource> Iterator for Records<S> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            if let Some((location, raw)) = self.pending.pop_front() {
                match self.process_row(location, raw) {
                    Ok(Some(record)) => return Some(Ok(record)),
                    Ok(None) => continue,
                    Err(e) => {
                        self.finish();
                        return Some(Err(e));
                    }
                }
            }

            match self.load_next_page() {
                Some(Ok(())) => {}
                Some(Err(e)) => {
                    self.finish();
                    return Some(Err(e));
                }
                None => self.finish(),
            }
        }
        None
    }
}

impl<S: PageSource> FusedIterator for Records<S> {}
