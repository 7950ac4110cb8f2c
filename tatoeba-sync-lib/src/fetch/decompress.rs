use crate::Result;
use crate::store::path_utils::{retire_existing, temp_path};
use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use ohno::{IntoAppError, bail};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

const LOG_TARGET: &str = "decompress";

/// Compression formats recognized by their file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Bzip2,
    Gzip,
    Zstd,
}

impl Codec {
    /// The codec implied by the last extension of `path`, if any.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "bz2" => Some(Self::Bzip2),
            "gz" => Some(Self::Gzip),
            "zst" => Some(Self::Zstd),
            _ => None,
        }
    }

    fn decoder(self, input: BufReader<File>) -> io::Result<Box<dyn Read>> {
        Ok(match self {
            Self::Bzip2 => Box::new(BzDecoder::new(input)),
            Self::Gzip => Box::new(GzDecoder::new(input)),
            Self::Zstd => Box::new(zstd::Decoder::with_buffer(input)?),
        })
    }
}

/// Decompress `path` next to itself, dropping the compression extension.
///
/// The output is written under a temporary name first; an existing output is then kept as the
/// previous version and replaced. The compressed file is deleted once the output is in place.
pub fn decompress(path: &Path) -> Result<PathBuf> {
    let Some(codec) = Codec::from_path(path) else {
        bail!("'{}' does not have a known compression extension", path.display());
    };

    let output = path.with_extension("");
    let temp = temp_path(&output);

    log::info!(target: LOG_TARGET, "Decompressing '{}'", path.display());

    if let Err(e) = write_decompressed(codec, path, &temp) {
        let _ = fs::remove_file(&temp);
        return Err(e);
    }

    let _ = retire_existing(&output)?;
    fs::rename(&temp, &output).into_app_err_with(|| format!("unable to rename '{}' to '{}'", temp.display(), output.display()))?;
    fs::remove_file(path).into_app_err_with(|| format!("unable to remove '{}'", path.display()))?;

    log::debug!(target: LOG_TARGET, "Decompressed '{}' to '{}'", path.display(), output.display());
    Ok(output)
}

fn write_decompressed(codec: Codec, input: &Path, output: &Path) -> Result<()> {
    let file = File::open(input).into_app_err_with(|| format!("unable to open '{}'", input.display()))?;
    let mut decoder = codec
        .decoder(BufReader::new(file))
        .into_app_err_with(|| format!("unable to create {codec:?} decoder for '{}'", input.display()))?;

    let mut writer =
        BufWriter::new(File::create(output).into_app_err_with(|| format!("unable to create '{}'", output.display()))?);

    let _ = io::copy(&mut decoder, &mut writer).into_app_err_with(|| format!("unable to decompress '{}'", input.display()))?;
    writer.flush().into_app_err_with(|| format!("unable to flush '{}'", output.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bzip2::Compression;
    use bzip2::write::BzEncoder;
    use flate2::write::GzEncoder;

    fn bz2(data: &[u8]) -> Vec<u8> {
        let mut encoder = BzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_codec_from_path() {
        assert_eq!(Codec::from_path(Path::new("links.tar.bz2")), Some(Codec::Bzip2));
        assert_eq!(Codec::from_path(Path::new("x.csv.gz")), Some(Codec::Gzip));
        assert_eq!(Codec::from_path(Path::new("x.csv.zst")), Some(Codec::Zstd));
        assert_eq!(Codec::from_path(Path::new("x.csv")), None);
        assert_eq!(Codec::from_path(Path::new("x")), None);
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_bzip2_replaces_output_and_keeps_previous() {
        let dir = tempfile::tempdir().unwrap();
        let compressed = dir.path().join("eng_tags.tsv.bz2");
        fs::write(&compressed, bz2(b"1\tnew\n")).unwrap();
        fs::write(dir.path().join("eng_tags.tsv"), "1\told\n").unwrap();

        let output = decompress(&compressed).unwrap();

        assert_eq!(output, dir.path().join("eng_tags.tsv"));
        assert_eq!(fs::read_to_string(&output).unwrap(), "1\tnew\n");
        assert_eq!(fs::read_to_string(dir.path().join("eng_tags_old.tsv")).unwrap(), "1\told\n");
        assert!(!compressed.exists());
        assert!(!dir.path().join("eng_tags.tsv.tmp").exists());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_gzip_and_zstd() {
        let dir = tempfile::tempdir().unwrap();

        let gz = dir.path().join("a.csv.gz");
        let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"gz data").unwrap();
        fs::write(&gz, encoder.finish().unwrap()).unwrap();
        assert_eq!(fs::read(decompress(&gz).unwrap()).unwrap(), b"gz data");

        let zst = dir.path().join("b.csv.zst");
        fs::write(&zst, zstd::encode_all(&b"zstd data"[..], 0).unwrap()).unwrap();
        assert_eq!(fs::read(decompress(&zst).unwrap()).unwrap(), b"zstd data");
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_corrupt_input_leaves_existing_output_alone() {
        let dir = tempfile::tempdir().unwrap();
        let compressed = dir.path().join("links.tar.bz2");
        fs::write(&compressed, b"not bzip2 at all").unwrap();
        fs::write(dir.path().join("links.tar"), "previous").unwrap();

        assert!(decompress(&compressed).is_err());
        assert_eq!(fs::read_to_string(dir.path().join("links.tar")).unwrap(), "previous");
        assert!(!dir.path().join("links.tar.tmp").exists());
        assert!(!dir.path().join("links_old.tar").exists());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_unknown_extension_fails() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("links.csv");
        fs::write(&plain, "1\t2\n").unwrap();
        assert!(decompress(&plain).is_err());
        assert!(plain.exists());
    }
}
