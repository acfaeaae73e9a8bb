//! Record commands over the gateway.

use anyhow::{Context, Result};

use crate::{
    models::{upload::UploadRecord, wire_date},
    services::gateway::RecordGateway,
};

/// Creates a record carrying only `name` and today's date; the server
/// assigns the id.
pub async fn create(gateway: &dyn RecordGateway, name: &str) -> Result<String> {
    let record = UploadRecord {
        original_name: Some(name.to_string()),
        uploaded_at: Some(chrono::Local::now().date_naive()),
        ..UploadRecord::default()
    };
    let id = gateway
        .create(&record)
        .await
        .with_context(|| format!("creating upload {name}"))?;
    println!("created {id}");
    Ok(id)
}

pub async fn list(gateway: &dyn RecordGateway) -> Result<()> {
    let records = gateway.list().await.context("listing uploads")?;
    if records.is_empty() {
        println!("no uploads");
    }
    for record in &records {
        println!("{}", describe(record));
    }
    Ok(())
}

pub async fn get(gateway: &dyn RecordGateway, id: &str) -> Result<()> {
    let record = gateway
        .get(id)
        .await
        .with_context(|| format!("fetching upload {id}"))?;
    println!("{}", describe(&record));
    Ok(())
}

pub async fn delete(gateway: &dyn RecordGateway, id: &str) -> Result<()> {
    gateway
        .delete(id)
        .await
        .with_context(|| format!("deleting upload {id}"))?;
    println!("deleted {id}");
    Ok(())
}

/// Changes the display name; everything else is sent back as fetched.
pub async fn rename(gateway: &dyn RecordGateway, id: &str, name: &str) -> Result<UploadRecord> {
    let mut record = gateway
        .get(id)
        .await
        .with_context(|| format!("fetching upload {id}"))?;
    record.original_name = Some(name.to_string());
    let updated = gateway
        .update(&record)
        .await
        .with_context(|| format!("renaming upload {id}"))?;
    println!("{}", describe(&updated));
    Ok(updated)
}

/// One-line summary of a record.
pub fn describe(record: &UploadRecord) -> String {
    let date = |d: Option<chrono::NaiveDate>| {
        d.map(wire_date::to_wire).unwrap_or_else(|| "-".into())
    };
    let status = if record.is_finalized() {
        format!("complete {}", date(record.completed_at))
    } else {
        "incomplete".to_string()
    };
    format!(
        "{}  {}  {} bytes  uploaded {}  {}  md5 {}",
        record.id(),
        record.original_name.as_deref().unwrap_or("-"),
        record.total_size.unwrap_or(0),
        date(record.uploaded_at),
        status,
        record.md5sum.as_deref().unwrap_or("-")
    )
}
