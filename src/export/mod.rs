//! Output-file writing. A thin collaborator: the core guarantees stable
//! field presence/absence, this module only serializes it.

use crate::domain::ProjectDetail;
use crate::utils::error::Result;
use clap::ValueEnum;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Csv,
}

const CSV_HEADER: &[&str] = &[
    "project_id",
    "title",
    "detail_url",
    "country",
    "sector",
    "status",
    "approval_date",
    "project_type",
    "description",
    "financing_amount",
    "borrower",
    "implementing_agency",
    "themes",
    "documents",
];

pub fn write_records(path: &Path, records: &[ProjectDetail], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => write_json(path, records),
        OutputFormat::Csv => write_csv(path, records),
    }
}

fn write_json(path: &Path, records: &[ProjectDetail]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

fn write_csv(path: &Path, records: &[ProjectDetail]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(CSV_HEADER)?;

    for record in records {
        let listing = &record.listing;
        let themes = record.themes.join("; ");
        let documents = record
            .documents
            .iter()
            .map(|doc| format!("{} <{}>", doc.title, doc.url))
            .collect::<Vec<_>>()
            .join("; ");

        writer.write_record([
            listing.project_id.as_str(),
            listing.title.as_str(),
            listing.detail_url.as_deref().unwrap_or(""),
            listing.country.as_deref().unwrap_or(""),
            listing.sector.as_deref().unwrap_or(""),
            listing.status.as_deref().unwrap_or(""),
            listing.approval_date.as_deref().unwrap_or(""),
            listing.project_type.as_deref().unwrap_or(""),
            record.description.as_deref().unwrap_or(""),
            record.financing_amount.as_deref().unwrap_or(""),
            record.borrower.as_deref().unwrap_or(""),
            record.implementing_agency.as_deref().unwrap_or(""),
            themes.as_str(),
            documents.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DocumentLink, ProjectListing};
    use tempfile::TempDir;

    fn sample_records() -> Vec<ProjectDetail> {
        let mut listing = ProjectListing::new("55220-001", "Rural Roads Improvement");
        listing.country = Some("India".to_string());
        listing.detail_url = Some("https://www.adb.org/projects/55220-001".to_string());
        let mut record = ProjectDetail::from(listing);
        record.themes = vec!["Climate change".to_string(), "Governance".to_string()];
        record.documents = vec![DocumentLink {
            title: "PDS".to_string(),
            url: "https://www.adb.org/docs/1".to_string(),
        }];

        let bare = ProjectDetail::from(ProjectListing::new("54100-002", "Solar Power"));
        vec![record, bare]
    }

    #[test]
    fn json_export_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("projects.json");
        write_records(&path, &sample_records(), OutputFormat::Json).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<ProjectDetail> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].listing.project_id, "55220-001");
        assert_eq!(parsed[0].themes.len(), 2);
        assert_eq!(parsed[1].description, None);
    }

    #[test]
    fn csv_export_flattens_sequences() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("projects.csv");
        write_records(&path, &sample_records(), OutputFormat::Csv).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("project_id,title,detail_url"));
        assert!(lines[1].contains("Climate change; Governance"));
        assert!(lines[1].contains("PDS <https://www.adb.org/docs/1>"));
        assert!(lines[2].starts_with("54100-002,Solar Power,,"));
    }

    #[test]
    fn empty_record_set_still_writes_a_csv_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.csv");
        write_records(&path, &[], OutputFormat::Csv).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 1);
    }
}
