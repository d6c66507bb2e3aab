use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "nanotu",
    version,
    about = "Long-read amplicon OTU clustering and taxonomy assignment pipeline",
    long_about = "Turns gzip-compressed long-read amplicon FASTQ files from raw_data/ into an \
OTU abundance table and a taxonomic assignment report by chaining quality \
filtering, primer trimming, format conversion, read renaming, clustering and \
a reference database search."
)]
pub struct Arguments {
    #[arg(short = 'q', long = "quality", default_value_t = 10, help = "Minimum mean read quality for the filter stage")]
    pub quality: u8,

    #[arg(short = 'l', long = "min-length", default_value_t = 180, help = "Minimum read length for the filter stage")]
    pub min_length: usize,

    #[arg(short = 'L', long = "max-length", default_value_t = 320, help = "Maximum read length for the filter stage")]
    pub max_length: usize,

    #[arg(long = "primer-fwd", default_value = "AGAGTTTGATCCTGGCTCAG", help = "Forward primer sequence (5'-3')")]
    pub primer_fwd: String,

    #[arg(long = "primer-rev", default_value = "CGGTTACCTTGTTACGACTT", help = "Reverse primer sequence (5'-3'); reverse-complemented before trimming")]
    pub primer_rev: String,

    #[arg(long = "cutadapt-error", default_value_t = 0.2)]
    pub cutadapt_error: f64,

    #[arg(long = "cutadapt-minlen", default_value_t = 150)]
    pub cutadapt_minlen: usize,

    #[arg(long = "cutadapt-maxlen", default_value_t = 200)]
    pub cutadapt_maxlen: usize,

    #[arg(long = "vsearch-id", default_value_t = 0.95, help = "Pairwise identity threshold for clustering and table generation")]
    pub vsearch_id: f64,

    #[arg(long = "blast-evalue", default_value_t = 0.001)]
    pub blast_evalue: f64,

    #[arg(long = "blast-identity", default_value_t = 90, help = "Minimum percent identity for reported hits")]
    pub blast_identity: usize,

    #[arg(long = "blast-qcov", default_value_t = 90, help = "Minimum query coverage per HSP for reported hits")]
    pub blast_qcov: usize,

    #[arg(short = 't', long = "threads", default_value_t = 4)]
    pub threads: usize,

    #[arg(short = 'v', long = "verbose", action)]
    pub verbose: bool,
}
