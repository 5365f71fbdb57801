//! HTML extraction for listing and detail pages.
//!
//! Parsing is best-effort throughout: a field whose structural location is
//! absent becomes `None`, a block without a project id is skipped with a
//! warning, and a page that doesn't look like a listing at all yields an
//! empty batch, which the paginator treats as normal termination.

use crate::domain::{DetailFields, DocumentLink, ProjectListing};
use crate::utils::error::{Result, ScrapeError};
use crate::utils::text::{absolutize, clean_text, extract_project_id, normalize_date};
use scraper::{ElementRef, Html, Selector};
use url::Url;

fn sel(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ScrapeError::Selector {
        selector: css.to_string(),
        reason: e.to_string(),
    })
}

/// Compiled selector set for the target site's listing layout, with
/// alternatives for the layout variants the site has shipped.
struct ListingSelectors {
    container: Selector,
    item: Selector,
    alternatives: Vec<Selector>,
    project_link: Selector,
    title_link: Selector,
    country: Selector,
    sector: Selector,
    status: Selector,
    approval_date: Selector,
    project_type: Selector,
}

impl ListingSelectors {
    fn new() -> Result<Self> {
        Ok(Self {
            container: sel(".view-content")?,
            item: sel(".views-row")?,
            alternatives: vec![
                sel(".project-item")?,
                sel(".project-row")?,
                sel("article.project")?,
                sel(".search-result")?,
                sel("tr.project")?,
                sel(".item-list li")?,
            ],
            project_link: sel(r#"a[href*="/projects/"]"#)?,
            title_link: sel(".views-field-title a, .project-title a, h3 a, h4 a")?,
            country: sel(".views-field-field-countries, .country, .field-country")?,
            sector: sel(".views-field-field-sectors, .sector, .field-sector")?,
            status: sel(".views-field-field-status, .status, .field-status")?,
            approval_date: sel(".views-field-field-approval-date, .date, .approval-date")?,
            project_type: sel(".views-field-field-type, .type, .project-type")?,
        })
    }
}

struct DetailSelectors {
    title: Selector,
    description: Selector,
    status: Selector,
    country: Selector,
    sector: Selector,
    approval_date: Selector,
    financing: Selector,
    borrower: Selector,
    agency: Selector,
    themes: Selector,
    theme_items: Selector,
    documents: Selector,
    info_table: Selector,
    table_row: Selector,
    table_cell: Selector,
}

impl DetailSelectors {
    fn new() -> Result<Self> {
        Ok(Self {
            title: sel("h1.page-title, .project-title h1, article h1, h1")?,
            description: sel(".field-body, .project-description, .description, .summary")?,
            status: sel(".field-status, .project-status")?,
            country: sel(".field-country, .field-countries")?,
            sector: sel(".field-sector, .field-sectors")?,
            approval_date: sel(".field-approval-date, .approval-date")?,
            financing: sel(".field-financing, .financing-amount")?,
            borrower: sel(".field-borrower")?,
            agency: sel(".field-executing-agency, .field-implementing-agency")?,
            themes: sel(".field-themes")?,
            theme_items: sel("li, .item, span")?,
            documents: sel(".field-documents a, .documents-list a, .project-documents a")?,
            info_table: sel(".project-info table, .details-table, table.project-details")?,
            table_row: sel("tr")?,
            table_cell: sel("td, th")?,
        })
    }
}

fn element_text(element: ElementRef<'_>) -> Option<String> {
    clean_text(&element.text().collect::<String>())
}

fn select_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope.select(selector).next().and_then(element_text)
}

pub struct Extractor {
    base_url: Url,
    listing: ListingSelectors,
    detail: DetailSelectors,
}

impl Extractor {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| ScrapeError::InvalidConfigValue {
            field: "base_url".to_string(),
            value: base_url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            base_url,
            listing: ListingSelectors::new()?,
            detail: DetailSelectors::new()?,
        })
    }

    /// Parse a listing page into project records. Returns an empty batch
    /// for pages with no recognizable project blocks.
    pub fn parse_listing(&self, html: &str) -> Vec<ProjectListing> {
        let document = Html::parse_document(html);
        let items = self.find_project_items(&document);

        let mut records = Vec::new();
        for item in &items {
            if let Some(record) = self.parse_project_item(*item) {
                records.push(record);
            }
        }
        tracing::debug!(
            blocks = items.len(),
            records = records.len(),
            "parsed listing page"
        );
        records
    }

    fn find_project_items<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        if let Some(container) = document.select(&self.listing.container).next() {
            let items: Vec<_> = container.select(&self.listing.item).collect();
            if !items.is_empty() {
                return items;
            }
        }

        for alternative in &self.listing.alternatives {
            let items: Vec<_> = document.select(alternative).collect();
            if !items.is_empty() {
                return items;
            }
        }

        // Last resort: treat each project link's parent as a block.
        document
            .select(&self.listing.project_link)
            .filter_map(|link| link.parent().and_then(ElementRef::wrap))
            .collect()
    }

    fn parse_project_item(&self, item: ElementRef<'_>) -> Option<ProjectListing> {
        let title_link = item
            .select(&self.listing.title_link)
            .next()
            .or_else(|| item.select(&self.listing.project_link).next())?;

        let href = title_link.value().attr("href").unwrap_or("");
        let detail_url = absolutize(&self.base_url, href);

        let Some(project_id) = detail_url.as_deref().and_then(extract_project_id) else {
            tracing::warn!(href, "skipping listing block without a project id");
            return None;
        };
        let Some(title) = element_text(title_link) else {
            tracing::debug!(%project_id, "skipping listing block without a title");
            return None;
        };

        let mut record = ProjectListing::new(project_id, title);
        record.detail_url = detail_url;
        record.country = select_text(item, &self.listing.country);
        record.sector = select_text(item, &self.listing.sector);
        record.status = select_text(item, &self.listing.status);
        record.approval_date = select_text(item, &self.listing.approval_date)
            .as_deref()
            .and_then(normalize_date);
        record.project_type = select_text(item, &self.listing.project_type);
        Some(record)
    }

    /// Parse a detail page, best-effort per field.
    pub fn parse_detail(&self, html: &str) -> DetailFields {
        let document = Html::parse_document(html);
        let root = document.root_element();

        let mut fields = DetailFields {
            title: select_text(root, &self.detail.title),
            country: select_text(root, &self.detail.country),
            sector: select_text(root, &self.detail.sector),
            status: select_text(root, &self.detail.status),
            approval_date: select_text(root, &self.detail.approval_date)
                .as_deref()
                .and_then(normalize_date),
            description: select_text(root, &self.detail.description),
            financing_amount: select_text(root, &self.detail.financing),
            borrower: select_text(root, &self.detail.borrower),
            implementing_agency: select_text(root, &self.detail.agency),
            themes: self.parse_themes(root),
            documents: self.parse_documents(root),
            ..Default::default()
        };
        self.apply_info_tables(root, &mut fields);
        fields
    }

    fn parse_themes(&self, root: ElementRef<'_>) -> Vec<String> {
        let mut themes = Vec::new();
        for block in root.select(&self.detail.themes) {
            let items: Vec<_> = block.select(&self.detail.theme_items).collect();
            if items.is_empty() {
                if let Some(text) = element_text(block) {
                    if !themes.contains(&text) {
                        themes.push(text);
                    }
                }
            } else {
                for item in items {
                    if let Some(text) = element_text(item) {
                        if !themes.contains(&text) {
                            themes.push(text);
                        }
                    }
                }
            }
        }
        themes
    }

    fn parse_documents(&self, root: ElementRef<'_>) -> Vec<DocumentLink> {
        root.select(&self.detail.documents)
            .filter_map(|link| {
                let url = absolutize(&self.base_url, link.value().attr("href").unwrap_or(""))?;
                let title = element_text(link).unwrap_or_else(|| "Document".to_string());
                Some(DocumentLink { title, url })
            })
            .collect()
    }

    /// Many detail pages carry a key/value project-info table; use it to
    /// fill whatever the labeled blocks didn't provide.
    fn apply_info_tables(&self, root: ElementRef<'_>, fields: &mut DetailFields) {
        for table in root.select(&self.detail.info_table) {
            for row in table.select(&self.detail.table_row) {
                let cells: Vec<_> = row.select(&self.detail.table_cell).collect();
                if cells.len() < 2 {
                    continue;
                }
                let Some(label) = element_text(cells[0]) else {
                    continue;
                };
                let Some(value) = element_text(cells[1]) else {
                    continue;
                };
                assign_table_value(fields, &label.to_lowercase(), value);
            }
        }
    }
}

fn assign_table_value(fields: &mut DetailFields, label: &str, value: String) {
    let slot = if label.contains("project name") {
        &mut fields.title
    } else if label.contains("status") {
        &mut fields.status
    } else if label.contains("country") {
        &mut fields.country
    } else if label.contains("sector") {
        &mut fields.sector
    } else if label.contains("approval date") {
        fields.approval_date.get_or_insert_with(|| {
            normalize_date(&value).unwrap_or_else(|| value.clone())
        });
        return;
    } else if label.contains("total project cost")
        || label.contains("financing")
        || label.contains("amount")
    {
        &mut fields.financing_amount
    } else if label.contains("borrower") {
        &mut fields.borrower
    } else if label.contains("executing agency") || label.contains("implementing agency") {
        &mut fields.implementing_agency
    } else {
        return;
    };
    if slot.is_none() {
        *slot = Some(value);
    }
}
