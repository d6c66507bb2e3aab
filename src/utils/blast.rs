// BLAST-related file functions and structures
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Result};

/// Single BLAST m8 line
#[derive(Debug, Clone)]
pub struct M8Record {
    pub qname: String,
    pub tname: String,
    pub pident: f64,
    pub alen: u64,
    pub mismatch: u64,
    pub gapopen: u64,
    pub qstart: u64,
    pub qend: u64,
    pub tstart: u64,
    pub tend: u64,
    pub evalue: f64,
    pub bitscore: f64,
}

impl M8Record {
    pub fn parse_line(line: &str) -> Result<Self> {
        let mut fields = line.split('\t');
        macro_rules! next {
            () => {
                fields.next().ok_or_else(|| anyhow!("missing field"))?
            };
        }
        Ok(Self {
            qname: next!().to_string(),
            tname: next!().to_string(),
            pident: next!().parse()?,
            alen: next!().parse()?,
            mismatch: next!().parse()?,
            gapopen: next!().parse()?,
            qstart: next!().parse()?,
            qend: next!().parse()?,
            tstart: next!().parse()?,
            tend: next!().parse()?,
            evalue: next!().parse()?,
            bitscore: next!().parse()?,
        })
    }
}

/// Loads a tabular search result, one record per non-empty line.
pub fn read_m8_table(path: &Path) -> Result<Vec<M8Record>> {
    let text = fs::read_to_string(path)
        .map_err(|e| anyhow!("Cannot read {}: {}", path.display(), e))?;
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(M8Record::parse_line)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const LINE: &str = "A_1_size=4\tAB12345.1\t97.500\t240\t6\t0\t1\t240\t12\t251\t1e-120\t430";

    #[test]
    fn test_parse_m8_line() {
        let rec = M8Record::parse_line(LINE).unwrap();
        assert_eq!(rec.qname, "A_1_size=4");
        assert_eq!(rec.tname, "AB12345.1");
        assert_eq!(rec.pident, 97.5);
        assert_eq!(rec.alen, 240);
        assert_eq!(rec.mismatch, 6);
        assert_eq!(rec.evalue, 1e-120);
        assert_eq!(rec.bitscore, 430.0);
    }

    #[test]
    fn test_parse_m8_line_too_short() {
        assert!(M8Record::parse_line("onlyone\ttwo").is_err());
    }

    #[test]
    fn test_read_m8_table_skips_blank_lines() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("hits.tsv");
        fs::write(&path, format!("{}\n\n{}\n", LINE, LINE))?;
        let records = read_m8_table(&path)?;
        assert_eq!(records.len(), 2);
        Ok(())
    }
}
