//! Download → extract → import glue for one page.
//!
//! The datastore delivers each bulk-read result as a zip archive holding
//! `Table-<name>.csv`. This module pulls the archive into a scratch
//! directory, extracts that one member, and hands the CSV to the
//! analytics bulk import endpoint. The scratch directory is dropped when
//! the transfer returns, success or not.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::clients::{Analytics, Datastore};
use crate::constants::archive_csv_member;
use crate::error::{Result, SyncError};
use crate::files;
use crate::models::SyncJob;

/// Transfer one read page to the analytics platform.
///
/// `page_index` is the 0-based position in `job.queries`; the caller has
/// already verified the page holds a download URL.
#[instrument(skip(datastore, analytics, job), fields(table = %job.table_name))]
pub async fn transfer_page(
    datastore: &dyn Datastore,
    analytics: &dyn Analytics,
    job: &SyncJob,
    page_index: usize,
    callback_url: &str,
) -> Result<String> {
    let query = &job.queries[page_index];
    let scratch = files::scoped_dir(&format!("{}_{}", job.table_name, query.page))?;

    let archive_path = scratch.path().join("result.zip");
    datastore
        .download_result(&query.download_url, &archive_path)
        .await?;

    let member = archive_csv_member(&job.table_name);
    let csv_path = extract_member(&archive_path, &member, scratch.path().to_path_buf()).await?;

    let import_job_id = analytics
        .import_csv(
            &job.org_id,
            &job.workspace_id,
            &job.view_id,
            &csv_path,
            callback_url,
        )
        .await?;

    debug!(page = query.page, import_job_id = %import_job_id, "page handed to bulk import");
    Ok(format!(
        "Successfully initiated bulk write job for page - {}",
        query.page
    ))
}

/// Extract a single named member from a zip archive into `dest_dir`.
///
/// Zip reading is synchronous, so the work runs on the blocking pool.
async fn extract_member(archive_path: &Path, member: &str, dest_dir: PathBuf) -> Result<PathBuf> {
    let archive_path = archive_path.to_path_buf();
    let member = member.to_string();
    tokio::task::spawn_blocking(move || extract_member_blocking(&archive_path, &member, &dest_dir))
        .await
        .map_err(|e| SyncError::internal(format!("archive extraction task failed: {e}")))?
}

fn extract_member_blocking(archive_path: &Path, member: &str, dest_dir: &Path) -> Result<PathBuf> {
    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut entry = archive.by_name(member).map_err(|_| {
        SyncError::internal(format!("result archive is missing expected member '{member}'"))
    })?;

    let out_path = dest_dir.join(member);
    let mut out = File::create(&out_path)?;
    io::copy(&mut entry, &mut out)?;
    Ok(out_path)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use zip::write::SimpleFileOptions;

    use super::*;

    fn write_archive(path: &Path, member: &str, content: &str) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file(member, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
        writer.finish().unwrap();
    }

    #[tokio::test]
    async fn test_extract_member_pulls_named_csv() {
        let scratch = files::scoped_dir("extract_test").unwrap();
        let archive_path = scratch.path().join("result.zip");
        write_archive(&archive_path, "Table-Orders.csv", "ROWID,NAME\n1,widget\n");

        let csv_path = extract_member(&archive_path, "Table-Orders.csv", scratch.path().into())
            .await
            .unwrap();
        let content = std::fs::read_to_string(csv_path).unwrap();
        assert_eq!(content, "ROWID,NAME\n1,widget\n");
    }

    #[tokio::test]
    async fn test_extract_member_missing_entry_fails() {
        let scratch = files::scoped_dir("extract_missing").unwrap();
        let archive_path = scratch.path().join("result.zip");
        write_archive(&archive_path, "other.csv", "x\n");

        let err = extract_member(&archive_path, "Table-Orders.csv", scratch.path().into())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Table-Orders.csv"));
    }
}
