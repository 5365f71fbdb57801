//! Record shapes produced by the pipeline.
//!
//! `ProjectListing` is what a listing page yields per project block;
//! `ProjectDetail` is the enriched record handed to the caller. Absent data
//! is always `None` or an empty list, never a placeholder string.

use serde::{Deserialize, Serialize};

/// One project as it appears on a listing page.
///
/// `project_id` is the stable external identifier (e.g. "55220-001") and the
/// only required field; it is what the orchestrator deduplicates on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectListing {
    pub project_id: String,
    pub title: String,
    pub detail_url: Option<String>,
    pub country: Option<String>,
    pub sector: Option<String>,
    pub status: Option<String>,
    pub approval_date: Option<String>,
    pub project_type: Option<String>,
}

impl ProjectListing {
    pub fn new(project_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            title: title.into(),
            detail_url: None,
            country: None,
            sector: None,
            status: None,
            approval_date: None,
            project_type: None,
        }
    }
}

/// A document attached to a project detail page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentLink {
    pub title: String,
    pub url: String,
}

/// A listing record enriched with detail-page fields.
///
/// Every detail field is optional; a record whose detail fetch failed is
/// still a valid `ProjectDetail` carrying only its listing fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub listing: ProjectListing,
    pub description: Option<String>,
    pub financing_amount: Option<String>,
    pub borrower: Option<String>,
    pub implementing_agency: Option<String>,
    pub themes: Vec<String>,
    pub documents: Vec<DocumentLink>,
}

impl From<ProjectListing> for ProjectDetail {
    fn from(listing: ProjectListing) -> Self {
        Self {
            listing,
            description: None,
            financing_amount: None,
            borrower: None,
            implementing_agency: None,
            themes: Vec::new(),
            documents: Vec::new(),
        }
    }
}

/// Partial output of detail-page parsing.
///
/// Fields are merged into an existing record with [`DetailFields::apply`],
/// which only ever fills gaps: a value already populated from the listing
/// page is never overwritten.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailFields {
    pub title: Option<String>,
    pub country: Option<String>,
    pub sector: Option<String>,
    pub status: Option<String>,
    pub approval_date: Option<String>,
    pub project_type: Option<String>,
    pub description: Option<String>,
    pub financing_amount: Option<String>,
    pub borrower: Option<String>,
    pub implementing_agency: Option<String>,
    pub themes: Vec<String>,
    pub documents: Vec<DocumentLink>,
}

fn fill(slot: &mut Option<String>, value: Option<String>) {
    if slot.is_none() {
        *slot = value;
    }
}

impl DetailFields {
    /// Merge these fields into `record`, filling only absent values.
    pub fn apply(self, record: &mut ProjectDetail) {
        fill(&mut record.listing.country, self.country);
        fill(&mut record.listing.sector, self.sector);
        fill(&mut record.listing.status, self.status);
        fill(&mut record.listing.approval_date, self.approval_date);
        fill(&mut record.listing.project_type, self.project_type);
        fill(&mut record.description, self.description);
        fill(&mut record.financing_amount, self.financing_amount);
        fill(&mut record.borrower, self.borrower);
        fill(&mut record.implementing_agency, self.implementing_agency);
        if record.themes.is_empty() {
            record.themes = self.themes;
        }
        if record.documents.is_empty() {
            record.documents = self.documents;
        }
    }

    /// Build a standalone record, for detail pages reached without a listing
    /// (single-project scrapes).
    pub fn into_detail(self, project_id: &str, detail_url: &str) -> ProjectDetail {
        let title = self.title.clone().unwrap_or_else(|| "Unknown Project".to_string());
        let mut listing = ProjectListing::new(project_id, title);
        listing.detail_url = Some(detail_url.to_string());
        let mut record = ProjectDetail::from(listing);
        self.apply(&mut record);
        record
    }
}
