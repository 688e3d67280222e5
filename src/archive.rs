use crate::config::OutputConfig;
use crate::error::{BlocksError, Result};
use crate::sb3::ProjectDocument;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const INNER_ARCHIVE_NAME: &str = "scratch.sb3";
pub const PROJECT_JSON_NAME: &str = "project.json";

/// Reads `project.json` out of the `scratch.sb3` archive nested in `path`.
pub fn load_project_document(path: &Path) -> Result<ProjectDocument> {
    let mut outer = ZipArchive::new(BufReader::new(File::open(path)?))?;
    let mut inner = ZipArchive::new(Cursor::new(read_entry(&mut outer, INNER_ARCHIVE_NAME)?))?;
    let json = read_entry(&mut inner, PROJECT_JSON_NAME)?;
    let json = String::from_utf8(json)
        .map_err(|e| BlocksError::Format(format!("{} is not UTF-8: {}", PROJECT_JSON_NAME, e)))?;
    ProjectDocument::from_json(&json)
}

/// Writes `document` into a copy of the archive at `path` and returns the
/// copy's location, `<dir>/<prefix><file name>`. Every other entry of both
/// archives is carried over untouched. The copy is assembled in a temporary
/// file next to `path` and renamed into place, so `path` itself is never
/// modified and an existing copy from an earlier run is replaced atomically.
pub fn save_project_document(
    path: &Path,
    document: &ProjectDocument,
    output: &OutputConfig,
) -> Result<PathBuf> {
    let new_path = sibling_path(path, &output.prefix)?;

    let mut outer = ZipArchive::new(BufReader::new(File::open(path)?))?;
    let mut inner = ZipArchive::new(Cursor::new(read_entry(&mut outer, INNER_ARCHIVE_NAME)?))?;

    let mut inner_out = ZipWriter::new(Cursor::new(Vec::new()));
    inner_out.set_comment(String::from_utf8_lossy(inner.comment()).into_owned());
    copy_all_except(&mut inner, &mut inner_out, PROJECT_JSON_NAME)?;
    inner_out.start_file(
        PROJECT_JSON_NAME,
        FileOptions::default().compression_method(CompressionMethod::Deflated),
    )?;
    inner_out.write_all(document.to_json(output.indent)?.as_bytes())?;
    let inner_bytes = inner_out.finish()?.into_inner();

    let dir = match new_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut tmp = NamedTempFile::new_in(&dir)?;
    {
        let mut outer_out = ZipWriter::new(tmp.as_file_mut());
        outer_out.set_comment(String::from_utf8_lossy(outer.comment()).into_owned());
        copy_all_except(&mut outer, &mut outer_out, INNER_ARCHIVE_NAME)?;
        outer_out.start_file(
            INNER_ARCHIVE_NAME,
            FileOptions::default().compression_method(CompressionMethod::Stored),
        )?;
        outer_out.write_all(&inner_bytes)?;
        outer_out.finish()?;
    }
    tmp.persist(&new_path).map_err(|e| BlocksError::Io(e.error))?;

    Ok(new_path)
}

/// `dir/name` -> `dir/<prefix>name`.
pub fn sibling_path(path: &Path, prefix: &str) -> Result<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| BlocksError::Format(format!("{} is not a file path", path.display())))?;
    Ok(path.with_file_name(format!("{}{}", prefix, name.to_string_lossy())))
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>> {
    let mut entry = archive.by_name(name).map_err(|e| match e {
        ZipError::FileNotFound => BlocksError::Format(format!("archive has no {} entry", name)),
        other => other.into(),
    })?;
    let mut buf = Vec::new();
    entry.read_to_end(&mut buf)?;
    Ok(buf)
}

fn copy_all_except<R: Read + Seek, W: Write + Seek>(
    archive: &mut ZipArchive<R>,
    out: &mut ZipWriter<W>,
    skip: &str,
) -> Result<()> {
    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i)?;
        if entry.name() == skip {
            continue;
        }
        out.raw_copy_file(entry)?;
    }
    Ok(())
}
