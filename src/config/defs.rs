use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use lazy_static::lazy_static;
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::cli::Arguments;

// External software
pub const GZIP_EXT: &str = "gz";
pub const CHOPPER_TAG: &str = "chopper";
pub const CUTADAPT_TAG: &str = "cutadapt";
pub const SEQKIT_TAG: &str = "seqkit";
pub const VSEARCH_TAG: &str = "vsearch";
pub const MAKEBLASTDB_TAG: &str = "makeblastdb";
pub const BLASTN_TAG: &str = "blastn";

lazy_static! {
    pub static ref TOOL_VERSIONS: HashMap<&'static str, f32> = {
        let mut m = HashMap::new();
        m.insert(CHOPPER_TAG, 0.7);
        m.insert(CUTADAPT_TAG, 4.0);
        m.insert(SEQKIT_TAG, 2.10);
        m.insert(VSEARCH_TAG, 2.21);
        m.insert(MAKEBLASTDB_TAG, 2.12);
        m.insert(BLASTN_TAG, 2.12);
        m
    };
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeqkitSubcommand {
    Fq2fa,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VsearchSubcommand {
    DerepFulllength,
    ClusterSize,
    UchimeDenovo,
    UsearchGlobal,
}

// Filesystem contract: fixed input locations and the numbered stage
// directories, all relative to the working directory.
pub const RAW_INPUT_DIR: &str = "raw_data";
pub const REFERENCE_DB: &str = "database/reference_db.fasta";

pub const FILTERED_DIR: &str = "1_quality_filtered";
pub const TRIMMED_DIR: &str = "2_primer_trimmed";
pub const FASTA_DIR: &str = "3_fasta";
pub const RENAMED_DIR: &str = "4_renamed";
pub const CLUSTERED_DIR: &str = "5_clustered";
pub const OTU_DIR: &str = "6_otus";
pub const BLASTDB_DIR: &str = "7_blastdb";

// Static Filenames
pub const COMBINED_FASTA: &str = "combined.fasta";
pub const DEREP_FASTA: &str = "derep.fasta";
pub const CENTROIDS_FASTA: &str = "centroids.fasta";
pub const NONCHIMERAS_FASTA: &str = "nonchimeras.fasta";
pub const CHIMERAS_FASTA: &str = "chimeras.fasta";
pub const OTUS_FASTA: &str = "otus.fasta";
pub const BLASTDB_NAME: &str = "reference_db";
pub const OTU_TABLE: &str = "otu_table.tsv";
pub const TAXONOMY_TABLE: &str = "taxonomy_assignments.tsv";

// Static Parameters
pub const BLAST_MAX_TARGET_SEQS: usize = 5;

pub const FASTA_EXTS: &[&'static str] = &["fasta", "fa", "fna"];
pub const FASTQ_EXTS: &[&'static str] = &["fastq", "fq"];

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{tool} failed: {error}")]
    ToolExecution { tool: String, error: String },

    #[error("I/O error: {0}")]
    IOError(String),

    #[error("No usable input at {0}")]
    EmptyStageInput(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub struct RunConfig {
    pub cwd: PathBuf,
    pub args: Arguments,
    pub worker_slots: usize,
    pub maximal_semaphore: Arc<Semaphore>,
}
