//! DPD "Marketed" extract tables
//!
//! Six headerless comma-separated tables, each shipped as a ZIP archive with
//! one `.txt`/`.csv` member (or as a plain file). Cells are trimmed and short
//! rows are padded so every row has the full column set.

use async_trait::async_trait;
use std::io::{Cursor, Read};
use std::time::Duration;
use tracing::{info, warn};

use crate::infrastructure::config::ExtractConfig;
use crate::infrastructure::http_client::MonographHttpClient;
use crate::infrastructure::parsing_error::{ParsingError, ParsingResult};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const UTF8_BOM: &str = "\u{feff}";

/// One of the six extract tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractTable {
    Drug,
    Form,
    Route,
    Ingred,
    Comp,
    Schedule,
}

impl ExtractTable {
    pub const ALL: [Self; 6] = [
        Self::Drug,
        Self::Form,
        Self::Route,
        Self::Ingred,
        Self::Comp,
        Self::Schedule,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Drug => "drug",
            Self::Form => "form",
            Self::Route => "route",
            Self::Ingred => "ingred",
            Self::Comp => "comp",
            Self::Schedule => "schedule",
        }
    }

    /// Published column layout; the files carry no header row
    #[must_use]
    pub const fn columns(self) -> &'static [&'static str] {
        match self {
            Self::Drug => &[
                "DRUG_CODE",
                "PRODUCT_CATEGORIZATION",
                "CLASS",
                "DRUG_IDENTIFICATION_NUMBER",
                "BRAND_NAME",
                "DESCRIPTOR",
                "PEDIATRIC_FLAG",
                "ACCESSION_NUMBER",
                "NUMBER_OF_AIS",
                "LAST_UPDATE_DATE",
                "AI_GROUP_NO",
                "CLASS_F",
                "BRAND_NAME_F",
                "DESCRIPTOR_F",
            ],
            Self::Form => &["DRUG_CODE", "PHARM_FORM_CODE", "PHARMACEUTICAL_FORM", "PHARMACEUTICAL_FORM_F"],
            Self::Route => &[
                "DRUG_CODE",
                "ROUTE_OF_ADMINISTRATION_CODE",
                "ROUTE_OF_ADMINISTRATION",
                "ROUTE_OF_ADMINISTRATION_F",
            ],
            Self::Ingred => &[
                "DRUG_CODE",
                "ACTIVE_INGREDIENT_CODE",
                "INGREDIENT",
                "INGREDIENT_SUPPLIED_IND",
                "STRENGTH",
                "STRENGTH_UNIT",
                "STRENGTH_TYPE",
                "DOSAGE_VALUE",
                "BASE",
                "DOSAGE_UNIT",
                "NOTES",
                "INGREDIENT_F",
                "STRENGTH_UNIT_F",
                "STRENGTH_TYPE_F",
                "DOSAGE_UNIT_F",
            ],
            Self::Comp => &[
                "DRUG_CODE",
                "MFR_CODE",
                "COMPANY_CODE",
                "COMPANY_NAME",
                "COMPANY_TYPE",
                "ADDRESS_MAILING_FLAG",
                "ADDRESS_BILLING_FLAG",
                "ADDRESS_NOTIFICATION_FLAG",
                "ADDRESS_OTHER",
                "SUITE_NUMBER",
                "STREET_NAME",
                "CITY_NAME",
                "PROVINCE",
                "COUNTRY",
                "POSTAL_CODE",
                "POST_OFFICE_BOX",
                "PROVINCE_F",
                "COUNTRY_F",
            ],
            Self::Schedule => &["DRUG_CODE", "SCHEDULE", "SCHEDULE_F"],
        }
    }

    fn column_index(self, column: &str) -> Option<usize> {
        self.columns().iter().position(|c| *c == column)
    }
}

/// Parsed rows of one table, padded to the table's column count
#[derive(Debug, Clone)]
pub struct ExtractTableData {
    table: ExtractTable,
    rows: Vec<Vec<String>>,
}

impl ExtractTableData {
    /// Parse headerless CSV text. Malformed records are skipped with a warning.
    #[must_use]
    pub fn parse(table: ExtractTable, text: &str) -> Self {
        let width = table.columns().len();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut rows = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    let err = ParsingError::MalformedRecord {
                        table: table.name().to_string(),
                        line: e.position().map_or(index as u64 + 1, |p| p.line()),
                        message: e.to_string(),
                    };
                    warn!("Skipping record: {}", err);
                    continue;
                }
            };
            if record.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            let mut row: Vec<String> = record.iter().take(width).map(|cell| cell.trim().to_string()).collect();
            row.resize(width, String::new());
            rows.push(row);
        }

        Self { table, rows }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = ExtractRow<'_>> {
        self.rows.iter().map(move |cells| ExtractRow {
            table: self.table,
            cells,
        })
    }
}

/// Borrowed row with by-name column access
#[derive(Debug, Clone, Copy)]
pub struct ExtractRow<'a> {
    table: ExtractTable,
    cells: &'a [String],
}

impl<'a> ExtractRow<'a> {
    /// Trimmed cell value; empty for an unknown column
    #[must_use]
    pub fn get(&self, column: &str) -> &'a str {
        self.table
            .column_index(column)
            .and_then(|i| self.cells.get(i))
            .map_or("", String::as_str)
    }
}

/// All six tables of one extract
#[derive(Debug, Clone)]
pub struct ExtractTables {
    pub drug: ExtractTableData,
    pub form: ExtractTableData,
    pub route: ExtractTableData,
    pub ingred: ExtractTableData,
    pub comp: ExtractTableData,
    pub schedule: ExtractTableData,
}

/// UTF-8 first, Latin-1 otherwise. Latin-1 maps every byte, so this is total.
#[must_use]
pub fn decode_text(bytes: &[u8]) -> String {
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().copied().map(char::from).collect(),
    };
    match text.strip_prefix(UTF8_BOM) {
        Some(stripped) => stripped.to_string(),
        None => text,
    }
}

/// Extract the first `.txt`/`.csv` member of a ZIP, or decode plain text
pub fn unpack_table(table: ExtractTable, bytes: &[u8]) -> ParsingResult<String> {
    if !bytes.starts_with(ZIP_MAGIC) {
        return Ok(decode_text(bytes));
    }

    let archive_error = |e: &dyn std::fmt::Display| ParsingError::ArchiveReadFailed {
        source_name: table.name().to_string(),
        message: e.to_string(),
    };

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| archive_error(&e))?;
    for index in 0..archive.len() {
        let mut member = archive.by_index(index).map_err(|e| archive_error(&e))?;
        let name = member.name().to_ascii_lowercase();
        if !(name.ends_with(".txt") || name.ends_with(".csv")) {
            continue;
        }
        let mut raw = Vec::new();
        member.read_to_end(&mut raw).map_err(|e| archive_error(&e))?;
        return Ok(decode_text(&raw));
    }

    Err(ParsingError::ArchiveMemberMissing {
        source_name: table.name().to_string(),
    })
}

/// Raw bytes (archive or text) for one table
#[async_trait]
pub trait ExtractSource: Send + Sync {
    async fn load(&self, table: ExtractTable) -> ParsingResult<Vec<u8>>;
}

/// Table locations from config: `http(s)://` URLs or local paths
pub struct ConfiguredExtractSource {
    client: MonographHttpClient,
    config: ExtractConfig,
}

impl ConfiguredExtractSource {
    pub const fn new(client: MonographHttpClient, config: ExtractConfig) -> Self {
        Self { client, config }
    }

    fn location(&self, table: ExtractTable) -> Option<&str> {
        let location = match table {
            ExtractTable::Drug => &self.config.drug,
            ExtractTable::Form => &self.config.form,
            ExtractTable::Route => &self.config.route,
            ExtractTable::Ingred => &self.config.ingred,
            ExtractTable::Comp => &self.config.comp,
            ExtractTable::Schedule => &self.config.schedule,
        };
        location.as_deref().map(str::trim).filter(|l| !l.is_empty())
    }
}

#[async_trait]
impl ExtractSource for ConfiguredExtractSource {
    async fn load(&self, table: ExtractTable) -> ParsingResult<Vec<u8>> {
        let location = self.location(table).ok_or_else(|| {
            ParsingError::configuration(
                &format!("extract.{}", table.name()),
                format!("no source configured for table '{}'", table.name()),
            )
        })?;

        if location.starts_with("http://") || location.starts_with("https://") {
            let timeout = Duration::from_secs(self.config.download_timeout_secs);
            self.client
                .download(location, timeout)
                .await
                .map_err(|e| ParsingError::source_unavailable(table.name(), e))
        } else {
            tokio::fs::read(location)
                .await
                .map_err(|e| ParsingError::source_unavailable(table.name(), format!("{location}: {e}")))
        }
    }
}

async fn load_table(source: &dyn ExtractSource, table: ExtractTable) -> ParsingResult<ExtractTableData> {
    let bytes = source.load(table).await?;
    let text = unpack_table(table, &bytes)?;
    let data = ExtractTableData::parse(table, &text);
    info!("Loaded {} table with {} rows", table.name(), data.len());
    Ok(data)
}

/// Load, unpack and parse all six tables. Any unreadable table fails the run.
pub async fn read_tables(source: &dyn ExtractSource) -> ParsingResult<ExtractTables> {
    let extract = ExtractTables {
        drug: load_table(source, ExtractTable::Drug).await?,
        form: load_table(source, ExtractTable::Form).await?,
        route: load_table(source, ExtractTable::Route).await?,
        ingred: load_table(source, ExtractTable::Ingred).await?,
        comp: load_table(source, ExtractTable::Comp).await?,
        schedule: load_table(source, ExtractTable::Schedule).await?,
    };

    if extract.drug.is_empty() {
        return Err(ParsingError::RequiredFieldMissing {
            field: "DRUG_CODE".to_string(),
            table: ExtractTable::Drug.name().to_string(),
        });
    }
    Ok(extract)
}
