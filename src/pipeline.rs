//! Run orchestration: fetch, extract, enrich, export, archive.

use std::io::Write;

use chrono::NaiveDate;
use serde::Serialize;

use crate::assemble::{assemble, ExtractionStats};
use crate::config::Config;
use crate::enrich::{enrich_records_with_progress, Geocoder, GoogleGeocoder};
use crate::error::{Error, Result};
use crate::model::Recordset;
use crate::parser::PdfDocument;
use crate::source::{DocumentSource, HttpSource};
use crate::store::{
    read_parquet, upload_outputs, write_atomic, Archive, LocalArchive, ParquetWriter,
    RecordWriter, S3Archive, XlsxWriter,
};

/// Pipeline stages, reported through [`ProgressEvent::Stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    ReadingCache,
    Parsing,
    Enriching,
    Writing,
    Archiving,
}

/// Progress notifications for front ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A stage started
    Stage(Stage),
    /// A page was analyzed
    Page { done: usize, total: usize },
    /// An address was geocoded
    Geocoded { done: usize, total: usize },
}

/// What a run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub pages: usize,
    pub tables: usize,
    pub records: usize,
    pub page_errors: usize,
    pub skipped_rows: usize,
    pub enrichment_failures: usize,
    /// Records came from an existing columnar file
    pub reused_cache: bool,
    /// Archive keys written
    pub archived: Vec<String>,
}

impl RunSummary {
    fn absorb(&mut self, stats: &ExtractionStats) {
        self.pages = stats.pages;
        self.tables = stats.tables;
        self.records = stats.records;
        self.page_errors = stats.page_errors;
        self.skipped_rows = stats.skipped_rows;
    }
}

/// Records and summary of a finished run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub recordset: Recordset,
    pub summary: RunSummary,
}

type ProgressFn<'a> = Box<dyn FnMut(ProgressEvent) + 'a>;

/// A configured run. Collaborators default to the real services and can be
/// replaced, e.g. with a [`crate::source::FileSource`].
pub struct Pipeline<'a> {
    config: Config,
    source: Box<dyn DocumentSource + 'a>,
    geocoder: Option<Box<dyn Geocoder + 'a>>,
    archive: Option<Box<dyn Archive + 'a>>,
    progress: Option<ProgressFn<'a>>,
    date: NaiveDate,
}

impl<'a> Pipeline<'a> {
    /// Validate `config` and wire up the default collaborators.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let source = HttpSource::new()?.with_proxy(config.proxy.clone());
        let geocoder: Option<Box<dyn Geocoder + 'a>> =
            match (config.enrich, config.geocoding.api_key.as_deref()) {
                (true, Some(key)) => Some(Box::new(GoogleGeocoder::new(key)?)),
                _ => None,
            };
        let archive: Option<Box<dyn Archive + 'a>> =
            match (&config.archive.s3, &config.archive.root) {
                (Some(s3), _) => Some(Box::new(S3Archive::new(s3)?) as Box<dyn Archive + 'a>),
                (None, Some(root)) => Some(Box::new(LocalArchive::new(root)) as Box<dyn Archive + 'a>),
                (None, None) => None,
            };

        Ok(Self {
            config,
            source: Box::new(source),
            geocoder,
            archive,
            progress: None,
            date: chrono::Local::now().date_naive(),
        })
    }

    /// Replace the document source.
    pub fn with_source(mut self, source: impl DocumentSource + 'a) -> Self {
        self.source = Box::new(source);
        self
    }

    /// Replace the geocoder.
    pub fn with_geocoder(mut self, geocoder: impl Geocoder + 'a) -> Self {
        self.geocoder = Some(Box::new(geocoder));
        self
    }

    /// Replace the archive.
    pub fn with_archive(mut self, archive: impl Archive + 'a) -> Self {
        self.archive = Some(Box::new(archive));
        self
    }

    /// Receive progress events.
    pub fn with_progress(mut self, progress: impl FnMut(ProgressEvent) + 'a) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Date used for backup archive keys.
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    /// The run configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Execute the run.
    pub fn run(mut self) -> Result<RunOutput> {
        let mut summary = RunSummary::default();
        let columnar_path = self.config.columnar_path();

        let recordset = if !self.config.force_download && columnar_path.exists() {
            self.emit(ProgressEvent::Stage(Stage::ReadingCache));
            let recordset = read_parquet(&columnar_path)?;
            summary.reused_cache = true;
            summary.records = recordset.len();
            recordset
        } else {
            let (recordset, pdf) = self.extract(&mut summary)?;
            let recordset = self.enrich(recordset, &mut summary)?;
            // The previous bulletin is replaced only once its successor parsed.
            self.emit(ProgressEvent::Stage(Stage::Writing));
            write_atomic(&self.config.pdf_path(), |out| Ok(out.write_all(&pdf)?))?;
            ParquetWriter.write(&recordset, &columnar_path)?;
            recordset
        };

        if self.config.save_spreadsheet {
            self.emit(ProgressEvent::Stage(Stage::Writing));
            XlsxWriter.write(&recordset, &self.config.spreadsheet_path())?;
        }

        if self.config.upload {
            self.emit(ProgressEvent::Stage(Stage::Archiving));
            let archive = self
                .archive
                .as_deref()
                .ok_or_else(|| Error::Config("upload requested but no archive".to_string()))?;
            summary.archived = upload_outputs(
                archive,
                &self.config.existing_outputs(),
                self.config.archive.prefix.as_deref(),
                self.date,
            )?;
        }

        log::info!(
            "Run finished: {} records, {} pages, {} page errors, {} skipped rows, {} geocoding misses{}",
            summary.records,
            summary.pages,
            summary.page_errors,
            summary.skipped_rows,
            summary.enrichment_failures,
            if summary.reused_cache { " (cached)" } else { "" }
        );

        Ok(RunOutput { recordset, summary })
    }

    /// Fetch and parse; returns the records with the fetched bytes.
    fn extract(&mut self, summary: &mut RunSummary) -> Result<(Recordset, Vec<u8>)> {
        self.emit(ProgressEvent::Stage(Stage::Fetching));
        let bytes = self.source.fetch(&self.config.source_url)?;

        self.emit(ProgressEvent::Stage(Stage::Parsing));
        let document = PdfDocument::open_with_options(&bytes, self.config.parse.clone())?;
        let mut records = assemble(document, self.config.assemble.clone());
        let total = records.total_pages();

        let mut collected = Vec::new();
        let mut pages_seen = 0;
        loop {
            let next = records.next();
            let done = records.stats().pages;
            if done != pages_seen {
                pages_seen = done;
                self.emit(ProgressEvent::Page { done, total });
            }
            match next {
                Some(record) => collected.push(record?),
                None => break,
            }
        }

        summary.absorb(records.stats());
        let recordset = match records.schema() {
            Some(schema) => Recordset::from_built(schema.clone(), collected),
            None => Recordset::empty(),
        };
        Ok((recordset, bytes))
    }

    fn enrich(&mut self, recordset: Recordset, summary: &mut RunSummary) -> Result<Recordset> {
        if !self.config.enrich {
            return Ok(recordset);
        }
        self.emit(ProgressEvent::Stage(Stage::Enriching));

        let Some(geocoder) = self.geocoder.as_deref() else {
            return Err(Error::Config("enrichment requested but no geocoder".to_string()));
        };
        let progress = &mut self.progress;
        let enriched = enrich_records_with_progress(
            recordset,
            geocoder,
            &self.config.geocoding,
            |done, total| {
                if let Some(progress) = progress.as_mut() {
                    progress(ProgressEvent::Geocoded { done, total });
                }
            },
        )?;

        summary.enrichment_failures = enriched.failures;
        Ok(enriched.recordset)
    }

    fn emit(&mut self, event: ProgressEvent) {
        if let Some(progress) = self.progress.as_mut() {
            progress(event);
        }
    }
}
