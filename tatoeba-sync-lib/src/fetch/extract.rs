use crate::Result;
use crate::store::path_utils::{retire_existing, temp_path};
use ohno::{IntoAppError, bail};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};
use tar::{Archive, EntryType};

const LOG_TARGET: &str = "   extract";

/// Unpack the regular files of the tar archive at `archive` into `out_dir`.
///
/// Every member path is checked before anything is written, and a single unsafe path rejects the
/// whole archive. Members are written under temporary names and only replace existing files, which
/// are kept as their previous version, once the whole archive has been read. The archive is
/// deleted once every member is in place.
pub fn extract(archive: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
    log::info!(target: LOG_TARGET, "Extracting '{}'", archive.display());

    validate_members(archive)?;

    let mut written = Vec::new();
    if let Err(e) = unpack(archive, out_dir, &mut written) {
        for target in &written {
            let _ = fs::remove_file(temp_path(target));
        }
        return Err(e);
    }

    for target in &written {
        let temp = temp_path(target);
        let _ = retire_existing(target)?;
        fs::rename(&temp, target).into_app_err_with(|| format!("unable to rename '{}' to '{}'", temp.display(), target.display()))?;
        log::debug!(target: LOG_TARGET, "Extracted '{}'", target.display());
    }

    fs::remove_file(archive).into_app_err_with(|| format!("unable to remove '{}'", archive.display()))?;
    Ok(written)
}

/// Write every regular member next to its final path, recording each target in `written`.
fn unpack(archive: &Path, out_dir: &Path, written: &mut Vec<PathBuf>) -> Result<()> {
    let mut tar = open(archive)?;
    for entry in tar
        .entries()
        .into_app_err_with(|| format!("unable to read archive '{}'", archive.display()))?
    {
        let mut entry = entry.into_app_err_with(|| format!("unable to read archive '{}'", archive.display()))?;
        let member = entry
            .path()
            .into_app_err_with(|| format!("unreadable member path in '{}'", archive.display()))?
            .into_owned();

        if entry.header().entry_type() != EntryType::Regular {
            log::debug!(target: LOG_TARGET, "Skipping '{}', not a regular file", member.display());
            continue;
        }

        let target = out_dir.join(&member);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).into_app_err_with(|| format!("unable to create directory '{}'", parent.display()))?;
        }
        written.push(target.clone());
        write_member(&mut entry, &temp_path(&target))?;
    }

    Ok(())
}

fn open(archive: &Path) -> Result<Archive<BufReader<File>>> {
    let file = File::open(archive).into_app_err_with(|| format!("unable to open '{}'", archive.display()))?;
    Ok(Archive::new(BufReader::new(file)))
}

fn validate_members(archive: &Path) -> Result<()> {
    let mut tar = open(archive)?;
    for entry in tar
        .entries()
        .into_app_err_with(|| format!("unable to read archive '{}'", archive.display()))?
    {
        let entry = entry.into_app_err_with(|| format!("unable to read archive '{}'", archive.display()))?;
        let member = entry
            .path()
            .into_app_err_with(|| format!("unreadable member path in '{}'", archive.display()))?;

        if !is_safe_member(&member) {
            bail!("archive '{}' contains unsafe member path '{}'", archive.display(), member.display());
        }
    }

    Ok(())
}

/// Whether `member` stays inside the directory it is extracted to.
fn is_safe_member(member: &Path) -> bool {
    member.components().all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
        && member.components().any(|component| matches!(component, Component::Normal(_)))
}

fn write_member(entry: &mut impl Read, target: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(target).into_app_err_with(|| format!("unable to create '{}'", target.display()))?);
    let _ = io::copy(entry, &mut writer).into_app_err_with(|| format!("unable to extract '{}'", target.display()))?;
    writer.flush().into_app_err_with(|| format!("unable to flush '{}'", target.display()))
}
