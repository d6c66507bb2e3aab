use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

use crate::config::defs::{FASTA_EXTS, FASTQ_EXTS, GZIP_EXT};

pub fn is_gzipped(path: &Path) -> io::Result<bool> {
    let mut file = File::open(path)?;
    let mut buffer = [0u8; 2];
    match file.read_exact(&mut buffer) {
        Ok(()) => Ok(buffer == [0x1F, 0x8B]), // Gzip magic bytes
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Strips the sequence-format and compression extensions from a file name,
/// yielding the sample base name: `barcode01.fastq.gz` -> `barcode01`.
/// Unknown extensions are left in place.
pub fn sample_base(path: &Path) -> String {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    for exts in [&[GZIP_EXT][..], FASTQ_EXTS, FASTA_EXTS] {
        for ext in exts {
            let dotted = format!(".{}", ext);
            if let Some(stripped) = name.strip_suffix(&dotted) {
                name = stripped.to_string();
            }
        }
    }
    name
}

/// Builds an output path from an input file's base name:
/// `<parent>/<prefix><sep><base><sep><suffix>`. Prefix and suffix are both
/// optional; the suffix carries its own extension.
pub fn file_path_manipulator(
    path: &Path,
    parent: Option<&Path>,
    prefix: Option<&str>,
    suffix: Option<&str>,
    separator: &str,
) -> PathBuf {
    let mut name = sample_base(path);
    if let Some(prefix) = prefix {
        name = format!("{}{}{}", prefix, separator, name);
    }
    if let Some(suffix) = suffix {
        name = format!("{}{}{}", name, separator, suffix);
    }
    match parent {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

/// Lists the FASTQ files (optionally gzip-compressed) in a directory,
/// sorted by file name so repeat runs see the same order.
pub fn fastq_files_in_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)
        .map_err(|e| anyhow!("Cannot read input directory {}: {}", dir.display(), e))?
    {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let inner = name.strip_suffix(&format!(".{}", GZIP_EXT)).unwrap_or(&name);
        if FASTQ_EXTS.iter().any(|ext| inner.ends_with(&format!(".{}", ext))) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Recreates a stage output directory from scratch, dropping anything a
/// previous run left behind.
pub fn fresh_dir(dir: &Path) -> io::Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)
}

/// Errors unless `path` exists and has non-zero length.
pub fn ensure_nonempty_file(path: &Path) -> Result<()> {
    let meta = fs::metadata(path)
        .map_err(|e| anyhow!("Expected output {} was not produced: {}", path.display(), e))?;
    if meta.len() == 0 {
        return Err(anyhow!("Output {} is empty", path.display()));
    }
    Ok(())
}

pub fn write_fastq_record<W: Write>(
    writer: &mut W,
    id: &str,
    desc: Option<&str>,
    seq: &[u8],
    qual: &[u8],
) -> io::Result<()> {
    if let Some(desc) = desc {
        writeln!(writer, "@{} {}", id, desc)?;
    } else {
        writeln!(writer, "@{}", id)?;
    }
    writer.write_all(seq)?;
    writeln!(writer)?;
    writeln!(writer, "+")?;
    writer.write_all(qual)?;
    writeln!(writer)?;
    Ok(())
}

pub fn write_fasta_record<W: Write>(
    writer: &mut W,
    id: &str,
    desc: Option<&str>,
    seq: &[u8],
) -> io::Result<()> {
    if let Some(desc) = desc {
        writeln!(writer, ">{} {}", id, desc)?;
    } else {
        writeln!(writer, ">{}", id)?;
    }
    writer.write_all(seq)?;
    writeln!(writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    #[test]
    fn test_sample_base() {
        assert_eq!(sample_base(Path::new("raw/barcode01.fastq.gz")), "barcode01");
        assert_eq!(sample_base(Path::new("B.fq")), "B");
        assert_eq!(sample_base(Path::new("sample.fasta")), "sample");
        assert_eq!(sample_base(Path::new("plain.txt")), "plain.txt");
    }

    #[test]
    fn test_file_path_manipulator() {
        let out = file_path_manipulator(
            Path::new("A.fastq.gz"),
            Some(Path::new("1_quality_filtered")),
            None,
            Some("filtered.fastq"),
            "_",
        );
        assert_eq!(out, PathBuf::from("1_quality_filtered/A_filtered.fastq"));

        let bare = file_path_manipulator(Path::new("A.fastq"), None, None, None, "_");
        assert_eq!(bare, PathBuf::from("A"));
    }

    #[test]
    fn test_is_gzipped() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let gz_path = dir.path().join("x.fastq.gz");
        let mut encoder = GzEncoder::new(File::create(&gz_path)?, Compression::default());
        encoder.write_all(b"@r1\nACGT\n+\nIIII\n")?;
        encoder.finish()?;
        assert!(is_gzipped(&gz_path)?);

        let plain_path = dir.path().join("x.fastq");
        fs::write(&plain_path, "@r1\nACGT\n+\nIIII\n")?;
        assert!(!is_gzipped(&plain_path)?);
        Ok(())
    }

    #[test]
    fn test_fastq_files_in_dir_sorted_and_filtered() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("b.fastq.gz"), "")?;
        fs::write(dir.path().join("a.fq.gz"), "")?;
        fs::write(dir.path().join("c.fastq"), "")?;
        fs::write(dir.path().join("notes.txt"), "")?;

        let files = fastq_files_in_dir(dir.path())?;
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.fq.gz", "b.fastq.gz", "c.fastq"]);
        Ok(())
    }

    #[test]
    fn test_fresh_dir_drops_stale_artifacts() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let stage_dir = dir.path().join("1_quality_filtered");
        fs::create_dir_all(&stage_dir)?;
        fs::write(stage_dir.join("stale.fastq"), "old")?;

        fresh_dir(&stage_dir)?;
        assert!(stage_dir.exists());
        assert_eq!(fs::read_dir(&stage_dir)?.count(), 0);
        Ok(())
    }

    #[test]
    fn test_ensure_nonempty_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("out.fasta");
        assert!(ensure_nonempty_file(&path).is_err());
        fs::write(&path, "")?;
        assert!(ensure_nonempty_file(&path).is_err());
        fs::write(&path, ">a\nACGT\n")?;
        assert!(ensure_nonempty_file(&path).is_ok());
        Ok(())
    }
}
