use std::fs;
use std::path::Path;

use anyhow::Result;
use seq_io::fastq::Record;

use nanotu::utils::fastx::{
    concatenate_fasta, fasta_record_count, fastq_reader, rename_fasta_records,
    rewrite_header_separators, write_synthetic_fastq_gz,
};
use nanotu::utils::file::{fastq_files_in_dir, file_path_manipulator, fresh_dir, sample_base};
use nanotu::utils::sequence::reverse_complement;

/// The stage-to-stage naming convention, traced from one raw input file.
#[test]
fn stage_output_names_derive_from_the_raw_base_name() {
    let raw = Path::new("raw_data/A.fastq.gz");
    let name = sample_base(raw);
    assert_eq!(name, "A");

    let filtered = file_path_manipulator(raw, Some(Path::new("1_quality_filtered")), None, Some("filtered.fastq"), "_");
    assert_eq!(filtered, Path::new("1_quality_filtered/A_filtered.fastq"));

    let trimmed = file_path_manipulator(Path::new(&name), Some(Path::new("2_primer_trimmed")), None, Some("trimmed.fastq"), "_");
    assert_eq!(trimmed, Path::new("2_primer_trimmed/A_trimmed.fastq"));

    let fasta = file_path_manipulator(Path::new(&name), Some(Path::new("3_fasta")), None, Some("fasta"), ".");
    assert_eq!(fasta, Path::new("3_fasta/A.fasta"));

    let renamed = file_path_manipulator(Path::new(&name), Some(Path::new("4_renamed")), None, Some("renamed.fasta"), "_");
    assert_eq!(renamed, Path::new("4_renamed/A_renamed.fasta"));
}

/// Two samples through the native renaming and combination stages: the
/// first record of sample A becomes `A;1`, per-sample counts are
/// preserved, and the combined file holds the sum.
#[test]
fn rename_then_combine_preserves_counts_and_provenance() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let a_in = dir.path().join("A.fasta");
    let b_in = dir.path().join("B.fasta");
    fs::write(&a_in, ">r1 orig\nACGTACGT\n>r2\nTTTTAAAA\n")?;
    fs::write(&b_in, ">x\nGGGGCCCC\n>y\nATATATAT\n>z\nCGCGCGCG\n")?;

    let renamed_dir = dir.path().join("4_renamed");
    fresh_dir(&renamed_dir)?;
    let a_out = renamed_dir.join("A_renamed.fasta");
    let b_out = renamed_dir.join("B_renamed.fasta");

    assert_eq!(rename_fasta_records(&a_in, &a_out, "A")?, 2);
    assert_eq!(rename_fasta_records(&b_in, &b_out, "B")?, 3);

    let a_text = fs::read_to_string(&a_out)?;
    assert!(a_text.starts_with(">A;1\nACGTACGT\n"));

    let combined = dir.path().join("combined.fasta");
    let total = concatenate_fasta(&[&a_out, &b_out], &combined)?;
    assert_eq!(total, 5);
    assert_eq!(fasta_record_count(&combined)?, 5);

    let text = fs::read_to_string(&combined)?;
    let headers: Vec<&str> = text.lines().filter(|l| l.starts_with('>')).collect();
    assert_eq!(headers, vec![">A;1", ">A;2", ">B;1", ">B;2", ">B;3"]);
    Ok(())
}

/// Centroid identifiers lose their `;` separators before the table
/// generator ever sees them.
#[test]
fn otu_extraction_rewrites_separators_only_in_headers() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let nonchimeras = dir.path().join("nonchimeras.fasta");
    fs::write(&nonchimeras, ">A;1;size=10\nACGTACGT\n>B;3;size=2\nTTGGTTGG\n")?;

    let otus = dir.path().join("otus.fasta");
    assert_eq!(rewrite_header_separators(&nonchimeras, &otus)?, 2);

    let text = fs::read_to_string(&otus)?;
    assert!(!text.lines().any(|l| l.starts_with('>') && l.contains(';')));
    assert!(text.contains(">A_1_size=10\nACGTACGT\n"));
    Ok(())
}

/// Re-running a native stage on unchanged input yields byte-identical
/// output.
#[test]
fn native_stages_are_idempotent() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("A.fasta");
    fs::write(&input, ">r1\nACGT\n>r2\nTTAA\n")?;

    let out_dir = dir.path().join("4_renamed");
    fresh_dir(&out_dir)?;
    let output = out_dir.join("A_renamed.fasta");
    rename_fasta_records(&input, &output, "A")?;
    let first = fs::read(&output)?;

    fresh_dir(&out_dir)?;
    rename_fasta_records(&input, &output, "A")?;
    let second = fs::read(&output)?;
    assert_eq!(first, second);
    Ok(())
}

/// Synthetic raw inputs look like the real thing: gzip-compressed FASTQ,
/// fixed read length, qualities inside the Phred+33 range, discovered in
/// sorted order.
#[test]
fn synthetic_samples_are_discovered_and_parse() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let raw_dir = dir.path().join("raw_data");
    fresh_dir(&raw_dir)?;
    write_synthetic_fastq_gz(&raw_dir.join("B.fastq.gz"), 10, 200, 35.0, 3.0)?;
    write_synthetic_fastq_gz(&raw_dir.join("A.fastq.gz"), 10, 200, 35.0, 3.0)?;

    let files = fastq_files_in_dir(&raw_dir)?;
    let names: Vec<String> = files.iter().map(|p| sample_base(p)).collect();
    assert_eq!(names, vec!["A", "B"]);

    for file in &files {
        let mut reader = fastq_reader(file)?;
        let mut count = 0;
        while let Some(result) = reader.next() {
            let record = result?;
            assert_eq!(record.seq().len(), 200);
            assert!(record.qual().iter().all(|&q| (33..=73).contains(&q)));
            count += 1;
        }
        assert_eq!(count, 10);
    }
    Ok(())
}

/// The linked adapter handed to the trimmer pairs the forward primer with
/// the reverse-complemented reverse primer.
#[test]
fn linked_adapter_uses_reverse_complemented_reverse_primer() -> Result<()> {
    let fwd = "AGAGTTTGATCCTGGCTCAG";
    let rev = "CGGTTACCTTGTTACGACTT";
    let linked = format!("{}...{}", fwd, reverse_complement(rev)?);
    assert_eq!(linked, "AGAGTTTGATCCTGGCTCAG...AAGTCGTAACAAGGTAACCG");

    // Applying the complement twice restores the configured primer.
    assert_eq!(reverse_complement(&reverse_complement(rev)?)?, rev);
    Ok(())
}
