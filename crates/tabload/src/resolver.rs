//! Source resolution: turns a [`SourceSpec`] into a concrete row reader.
//!
//! Remote sources are fetched whole (single attempt, no retry) and wrapped
//! in-memory. Legacy xls sources are converted to xlsx through the external
//! converter before the spreadsheet reader ever sees them; remote xls bodies
//! are persisted to a temporary file first because the converter needs a
//! path, not a stream. Temporary artifacts are left for the surrounding
//! process to clean up.

use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};

use calamine::{Data, Range, Reader as WorkbookReader, Xlsx, XlsxError};
use tracing::{debug, info};

use crate::config::{SourceFormat, SourceSpec};
use crate::error::{LoadError, Result};
use crate::reader::delimited::DelimitedReader;
use crate::reader::sheet::SheetReader;
use crate::reader::RowReader;

/// Resolve a source into a fresh reader positioned at its first row.
///
/// Each call starts a new pass from the true beginning of the source; a
/// consumed reader is never rewound.
pub async fn resolve(spec: &SourceSpec) -> Result<Box<dyn RowReader + Send>> {
    if spec.is_remote() {
        resolve_remote(spec).await
    } else {
        resolve_local(spec, Path::new(&spec.location)).await
    }
}

async fn resolve_remote(spec: &SourceSpec) -> Result<Box<dyn RowReader + Send>> {
    let body = fetch(&spec.location).await?;
    debug!("fetched {} bytes from {}", body.len(), spec.location);

    match spec.format {
        SourceFormat::Text | SourceFormat::Csv => delimited(Cursor::new(body), spec),
        SourceFormat::Xlsx => {
            let workbook = Xlsx::new(Cursor::new(body))?;
            sheet(workbook, spec)
        }
        SourceFormat::Xls => {
            // The converter reads files, not streams.
            let path = persist_temp(&body)?;
            info!("saved remote xls to {}", path.display());
            resolve_xls(spec, &path).await
        }
    }
}

async fn resolve_local(spec: &SourceSpec, path: &Path) -> Result<Box<dyn RowReader + Send>> {
    match spec.format {
        SourceFormat::Text | SourceFormat::Csv => {
            let file = File::open(path).map_err(|e| {
                LoadError::SourceAccess(format!("cannot open {}: {}", path.display(), e))
            })?;
            delimited(file, spec)
        }
        SourceFormat::Xlsx => sheet(open_xlsx(path)?, spec),
        SourceFormat::Xls => resolve_xls(spec, path).await,
    }
}

/// Convert a local xls file and re-resolve the produced xlsx sibling.
async fn resolve_xls(spec: &SourceSpec, path: &Path) -> Result<Box<dyn RowReader + Send>> {
    let converted = convert_xls(path).await?;
    sheet(open_xlsx(&converted)?, spec)
}

async fn fetch(url: &str) -> Result<Vec<u8>> {
    let response = reqwest::get(url)
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| LoadError::fetch(url, e.to_string()))?;
    let body = response
        .bytes()
        .await
        .map_err(|e| LoadError::fetch(url, e.to_string()))?;
    Ok(body.to_vec())
}

fn delimited<R>(input: R, spec: &SourceSpec) -> Result<Box<dyn RowReader + Send>>
where
    R: Read + Send + 'static,
{
    let reader = DelimitedReader::new(input, spec.format.separator(), spec.quote, spec.skip)?;
    Ok(Box::new(reader))
}

fn sheet<RS>(mut workbook: Xlsx<RS>, spec: &SourceSpec) -> Result<Box<dyn RowReader + Send>>
where
    RS: Read + Seek,
{
    let range = sheet_range(&mut workbook, spec.sheet.as_deref())?;
    Ok(Box::new(SheetReader::new(
        range,
        &spec.rows,
        &spec.cols,
        spec.skip,
    )))
}

fn open_xlsx(path: &Path) -> Result<Xlsx<std::io::BufReader<File>>> {
    calamine::open_workbook::<Xlsx<_>, _>(path).map_err(|e| match e {
        XlsxError::Io(io) => {
            LoadError::SourceAccess(format!("cannot open {}: {}", path.display(), io))
        }
        other => LoadError::Workbook(other),
    })
}

fn sheet_range<RS>(workbook: &mut Xlsx<RS>, sheet: Option<&str>) -> Result<Range<Data>>
where
    RS: Read + Seek,
{
    let name = match sheet {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| LoadError::SourceAccess("workbook has no sheets".to_string()))?,
    };
    Ok(workbook.worksheet_range(&name)?)
}

fn persist_temp(body: &[u8]) -> Result<PathBuf> {
    let mut file = tempfile::Builder::new()
        .prefix("tabload-")
        .suffix(".xls")
        .tempfile()?;
    file.write_all(body)?;
    let (_, path) = file
        .keep()
        .map_err(|e| LoadError::Io(e.error))?;
    Ok(path)
}

/// Run the external converter, producing a sibling `.xlsx`.
///
/// Available only on Linux; elsewhere xls sources fail fast.
async fn convert_xls(path: &Path) -> Result<PathBuf> {
    if !cfg!(target_os = "linux") {
        return Err(LoadError::Conversion(
            "xls sources require the libreoffice converter, which is only available on linux"
                .to_string(),
        ));
    }

    let out_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let status = tokio::process::Command::new("libreoffice")
        .args(["--headless", "--convert-to", "xlsx", "--outdir"])
        .arg(out_dir)
        .arg(path)
        .status()
        .await
        .map_err(|e| LoadError::Conversion(format!("failed to run libreoffice: {}", e)))?;
    if !status.success() {
        return Err(LoadError::Conversion(format!(
            "libreoffice exited with {} converting {}",
            status,
            path.display()
        )));
    }

    let converted = path.with_extension("xlsx");
    if !converted.exists() {
        return Err(LoadError::Conversion(format!(
            "converter did not produce {}",
            converted.display()
        )));
    }
    info!("converted {} to {}", path.display(), converted.display());
    Ok(converted)
}
