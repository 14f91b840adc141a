//! Catalog ingestion from the DPD extract
//!
//! Collapse the one-to-many tables to one value per drug code, left-join
//! them onto the drug table, keep human oral solid doses, and upsert.

use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::product::CatalogProduct;
use crate::domain::repositories::CatalogStore;
use crate::domain::value_objects::ProductIdentifier;
use crate::infrastructure::config::{ExtractConfig, dpd};
use crate::infrastructure::dpd_extract::{ExtractRow, ExtractSource, ExtractTableData, ExtractTables, read_tables};
use crate::infrastructure::parsing_error::{ParsingError, ParsingResult};

const VALUE_SEPARATOR: &str = "; ";
pub const MARKETED_STATUS: &str = "Marketed";

/// Sorted, de-duplicated, non-empty values per drug code, joined with "; "
pub fn collapse<F>(table: &ExtractTableData, value: F) -> HashMap<String, String>
where
    F: Fn(&ExtractRow<'_>) -> String,
{
    let mut grouped: HashMap<String, BTreeSet<String>> = HashMap::new();
    for row in table.rows() {
        let code = row.get("DRUG_CODE");
        if code.is_empty() {
            continue;
        }
        let values = grouped.entry(code.to_string()).or_default();
        let value = value(&row);
        let value = value.trim();
        if !value.is_empty() {
            values.insert(value.to_string());
        }
    }

    grouped
        .into_iter()
        .map(|(code, values)| (code, values.into_iter().collect::<Vec<_>>().join(VALUE_SEPARATOR)))
        .collect()
}

/// Human, oral, tablet/capsule/softgel
#[derive(Debug, Clone)]
pub struct ExtractFilter {
    category_keyword: String,
    route_keyword: String,
    dosage_form: Regex,
}

impl ExtractFilter {
    pub fn from_config(config: &ExtractConfig) -> ParsingResult<Self> {
        let dosage_form = RegexBuilder::new(&config.dosage_form_pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| ParsingError::invalid_pattern("extract.dosage_form_pattern", &config.dosage_form_pattern, e))?;
        Ok(Self {
            category_keyword: config.category_keyword.to_lowercase(),
            route_keyword: config.route_keyword.to_lowercase(),
            dosage_form,
        })
    }

    /// The category keyword may appear in the categorization or the class column
    #[must_use]
    pub fn accepts(&self, categorization: &str, class: &str, route: &str, dosage_form: &str) -> bool {
        let in_category = categorization.to_lowercase().contains(&self.category_keyword)
            || class.to_lowercase().contains(&self.category_keyword);
        in_category && route.to_lowercase().contains(&self.route_keyword) && self.dosage_form.is_match(dosage_form)
    }
}

/// Builds catalog rows from parsed extract tables
#[derive(Debug, Clone)]
pub struct CatalogBuilder {
    filter: ExtractFilter,
    product_info_base: String,
}

impl CatalogBuilder {
    pub fn from_config(config: &ExtractConfig) -> ParsingResult<Self> {
        Ok(Self {
            filter: ExtractFilter::from_config(config)?,
            product_info_base: config.product_info_base.trim_end_matches('/').to_string(),
        })
    }

    fn product_info_url(&self, drug_code: &str) -> String {
        format!(
            "{}/{}?lang=eng&code={}",
            self.product_info_base,
            dpd::PRODUCT_INFO_PATH,
            drug_code
        )
    }

    pub fn build(&self, tables: &ExtractTables) -> Vec<CatalogProduct> {
        let forms = collapse(&tables.form, |row| row.get("PHARMACEUTICAL_FORM").to_string());
        let routes = collapse(&tables.route, |row| row.get("ROUTE_OF_ADMINISTRATION").to_string());
        let ingredients = collapse(&tables.ingred, |row| row.get("INGREDIENT").to_string());
        let strengths = collapse(&tables.ingred, |row| {
            format!("{} {}", row.get("STRENGTH"), row.get("STRENGTH_UNIT")).trim().to_string()
        });
        let companies = collapse(&tables.comp, |row| row.get("COMPANY_NAME").to_string());
        let schedules = collapse(&tables.schedule, |row| row.get("SCHEDULE").to_string());

        let joined = |map: &HashMap<String, String>, code: &str| map.get(code).cloned().unwrap_or_default();

        let mut seen_codes = HashSet::new();
        let mut products = Vec::new();
        for drug in tables.drug.rows() {
            let code = drug.get("DRUG_CODE");
            if code.is_empty() || !seen_codes.insert(code) {
                continue;
            }

            let dosage_form = joined(&forms, code);
            let route = joined(&routes, code);
            if !self
                .filter
                .accepts(drug.get("PRODUCT_CATEGORIZATION"), drug.get("CLASS"), &route, &dosage_form)
            {
                continue;
            }

            let din = match drug.get("DRUG_IDENTIFICATION_NUMBER") {
                "" => code,
                din => din,
            };

            products.push(CatalogProduct {
                din: ProductIdentifier::new(din),
                drug_code: code.to_string(),
                brand_name: drug.get("BRAND_NAME").to_string(),
                dosage_form,
                route,
                strength: joined(&strengths, code),
                active_ingredient: joined(&ingredients, code),
                manufacturer: joined(&companies, code),
                schedule: joined(&schedules, code),
                class: drug.get("CLASS").to_string(),
                status: MARKETED_STATUS.to_string(),
                product_info_url: self.product_info_url(code),
            });
        }

        if products.is_empty() {
            warn!("Extract filter kept no products out of {} drug rows", tables.drug.len());
        }
        products
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestionSummary {
    pub drug_rows: usize,
    pub products: usize,
    pub written: u64,
}

pub struct IngestionService {
    source: Arc<dyn ExtractSource>,
    store: Arc<dyn CatalogStore>,
    builder: CatalogBuilder,
}

impl IngestionService {
    pub fn new(source: Arc<dyn ExtractSource>, store: Arc<dyn CatalogStore>, config: &ExtractConfig) -> Result<Self> {
        let builder = CatalogBuilder::from_config(config).context("Invalid extract filter configuration")?;
        Ok(Self {
            source,
            store,
            builder,
        })
    }

    /// Read all tables, build the catalog and upsert product columns
    pub async fn ingest(&self) -> Result<IngestionSummary> {
        info!("▶ Loading DPD extract tables");
        let tables = read_tables(self.source.as_ref())
            .await
            .context("Failed to read DPD extract")?;

        let products = self.builder.build(&tables);
        info!("▶ Upserting {} catalog products", products.len());
        let written = self.store.upsert_products(&products).await?;

        Ok(IngestionSummary {
            drug_rows: tables.drug.len(),
            products: products.len(),
            written,
        })
    }
}
