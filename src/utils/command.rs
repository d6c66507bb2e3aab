/// Functions and structs for building external tool command lines

use anyhow::{anyhow, Result};
use log::{debug, info, warn};

use crate::config::defs::{
    RunConfig, BLASTN_TAG, CHOPPER_TAG, CUTADAPT_TAG, MAKEBLASTDB_TAG, SEQKIT_TAG, TOOL_VERSIONS,
    VSEARCH_TAG,
};
use crate::utils::streams::{read_child_output_to_vec, spawn_tool, ChildStream};

/// Spawns `tool <flag>` and pulls a version token out of the first output
/// line. Which stream and whitespace field the token lives in varies per
/// tool.
async fn version_probe(
    tool: &'static str,
    flag: &str,
    stream: ChildStream,
    field: usize,
) -> Result<String> {
    let mut child = spawn_tool(tool, &[flag.to_string()])?;
    let lines = read_child_output_to_vec(&mut child, stream).await?;
    let _ = child.wait().await;

    let first_line = lines
        .first()
        .ok_or_else(|| anyhow!("No output from {} {}", tool, flag))?;
    let version = first_line
        .split_whitespace()
        .nth(field)
        .ok_or_else(|| anyhow!("Invalid {} {} output: {}", tool, flag, first_line))?
        .to_string();
    if version.is_empty() {
        return Err(anyhow!("Empty version number in {} {} output: {}", tool, flag, first_line));
    }
    Ok(version)
}

pub mod chopper {
    use super::*;
    use crate::cli::Arguments;

    pub async fn chopper_presence_check() -> Result<String> {
        // "chopper 0.9.0"
        version_probe(CHOPPER_TAG, "--version", ChildStream::Stdout, 1).await
    }

    pub fn arg_generator(args: &Arguments) -> Vec<String> {
        vec![
            "-q".to_string(),
            args.quality.to_string(),
            "--minlength".to_string(),
            args.min_length.to_string(),
            "--maxlength".to_string(),
            args.max_length.to_string(),
        ]
    }
}

pub mod cutadapt {
    use super::*;
    use std::path::PathBuf;
    use crate::cli::Arguments;

    pub struct CutadaptConfig {
        /// `<fwd>...<revcomp(rev)>` linked adapter expression.
        pub linked_adapter: String,
        pub input: PathBuf,
        pub output: PathBuf,
    }

    pub async fn cutadapt_presence_check() -> Result<String> {
        // Bare version number on stdout
        version_probe(CUTADAPT_TAG, "--version", ChildStream::Stdout, 0).await
    }

    pub fn arg_generator(args: &Arguments, config: &CutadaptConfig) -> Vec<String> {
        vec![
            "-g".to_string(),
            config.linked_adapter.clone(),
            "-e".to_string(),
            args.cutadapt_error.to_string(),
            "-m".to_string(),
            args.cutadapt_minlen.to_string(),
            "-M".to_string(),
            args.cutadapt_maxlen.to_string(),
            "--discard-untrimmed".to_string(),
            "-o".to_string(),
            config.output.to_string_lossy().to_string(),
            config.input.to_string_lossy().to_string(),
        ]
    }
}

pub mod seqkit {
    use super::*;
    use std::path::PathBuf;
    use crate::config::defs::SeqkitSubcommand;

    pub struct SeqkitConfig {
        pub subcommand: SeqkitSubcommand,
        pub input: PathBuf,
        pub output: PathBuf,
    }

    pub async fn seqkit_presence_check() -> Result<String> {
        // "seqkit v2.10.0"
        version_probe(SEQKIT_TAG, "version", ChildStream::Stdout, 1).await
    }

    pub fn arg_generator(config: &SeqkitConfig) -> Vec<String> {
        match config.subcommand {
            SeqkitSubcommand::Fq2fa => vec![
                "fq2fa".to_string(),
                config.input.to_string_lossy().to_string(),
                "-o".to_string(),
                config.output.to_string_lossy().to_string(),
            ],
        }
    }
}

pub mod vsearch {
    use super::*;
    use std::path::PathBuf;
    use crate::cli::Arguments;
    use crate::config::defs::VsearchSubcommand;

    pub struct VsearchConfig {
        pub subcommand: VsearchSubcommand,
        pub input: PathBuf,
        pub output: PathBuf,
        /// Second output of the chimera split (the chimeric records).
        pub secondary_output: Option<PathBuf>,
        /// Search database for the table-generation mapping.
        pub db: Option<PathBuf>,
    }

    pub async fn vsearch_presence_check() -> Result<String> {
        // vsearch reports its version on stderr: "vsearch v2.28.1_linux_x86_64, ..."
        version_probe(VSEARCH_TAG, "--version", ChildStream::Stderr, 1).await
    }

    pub fn arg_generator(args: &Arguments, config: &VsearchConfig) -> Result<Vec<String>> {
        let input = config.input.to_string_lossy().to_string();
        let output = config.output.to_string_lossy().to_string();
        let cmd = match config.subcommand {
            VsearchSubcommand::DerepFulllength => vec![
                "--derep_fulllength".to_string(),
                input,
                "--output".to_string(),
                output,
                "--sizeout".to_string(),
            ],
            VsearchSubcommand::ClusterSize => vec![
                "--cluster_size".to_string(),
                input,
                "--id".to_string(),
                args.vsearch_id.to_string(),
                "--centroids".to_string(),
                output,
                "--sizein".to_string(),
                "--sizeout".to_string(),
            ],
            VsearchSubcommand::UchimeDenovo => {
                let chimeras = config
                    .secondary_output
                    .as_ref()
                    .ok_or_else(|| anyhow!("Chimera detection needs a chimeras output path"))?;
                vec![
                    "--uchime_denovo".to_string(),
                    input,
                    "--nonchimeras".to_string(),
                    output,
                    "--chimeras".to_string(),
                    chimeras.to_string_lossy().to_string(),
                    "--sizein".to_string(),
                ]
            }
            VsearchSubcommand::UsearchGlobal => {
                let db = config
                    .db
                    .as_ref()
                    .ok_or_else(|| anyhow!("Global search needs a database path"))?;
                vec![
                    "--usearch_global".to_string(),
                    input,
                    "--db".to_string(),
                    db.to_string_lossy().to_string(),
                    "--id".to_string(),
                    args.vsearch_id.to_string(),
                    "--otutabout".to_string(),
                    output,
                    "--threads".to_string(),
                    args.threads.to_string(),
                ]
            }
        };
        Ok(cmd)
    }
}

pub mod blast {
    use super::*;
    use std::path::PathBuf;
    use crate::cli::Arguments;
    use crate::config::defs::BLAST_MAX_TARGET_SEQS;

    pub struct MakeBlastDbConfig {
        pub input: PathBuf,
        pub db_prefix: PathBuf,
    }

    pub struct BlastnConfig {
        pub query: PathBuf,
        pub db_prefix: PathBuf,
        pub output: PathBuf,
    }

    pub async fn makeblastdb_presence_check() -> Result<String> {
        // "makeblastdb: 2.16.0+"
        version_probe(MAKEBLASTDB_TAG, "-version", ChildStream::Stdout, 1).await
    }

    pub async fn blastn_presence_check() -> Result<String> {
        // "blastn: 2.16.0+"
        version_probe(BLASTN_TAG, "-version", ChildStream::Stdout, 1).await
    }

    pub fn makeblastdb_arg_generator(config: &MakeBlastDbConfig) -> Vec<String> {
        vec![
            "-in".to_string(),
            config.input.to_string_lossy().to_string(),
            "-dbtype".to_string(),
            "nucl".to_string(),
            "-out".to_string(),
            config.db_prefix.to_string_lossy().to_string(),
        ]
    }

    pub fn blastn_arg_generator(args: &Arguments, config: &BlastnConfig) -> Vec<String> {
        vec![
            "-query".to_string(),
            config.query.to_string_lossy().to_string(),
            "-db".to_string(),
            config.db_prefix.to_string_lossy().to_string(),
            "-out".to_string(),
            config.output.to_string_lossy().to_string(),
            "-outfmt".to_string(),
            "6".to_string(),
            "-evalue".to_string(),
            args.blast_evalue.to_string(),
            "-perc_identity".to_string(),
            args.blast_identity.to_string(),
            "-qcov_hsp_perc".to_string(),
            args.blast_qcov.to_string(),
            "-num_threads".to_string(),
            args.threads.to_string(),
            "-strand".to_string(),
            "both".to_string(),
            "-dust".to_string(),
            "yes".to_string(),
            "-max_target_seqs".to_string(),
            BLAST_MAX_TARGET_SEQS.to_string(),
        ]
    }
}

/// Per-stage tool configuration passed alongside the run-wide arguments.
pub enum ToolConfig {
    Cutadapt(cutadapt::CutadaptConfig),
    Seqkit(seqkit::SeqkitConfig),
    Vsearch(vsearch::VsearchConfig),
    MakeBlastDb(blast::MakeBlastDbConfig),
    Blastn(blast::BlastnConfig),
}

pub fn generate_cli(
    tool: &str,
    config: &RunConfig,
    tool_config: Option<&ToolConfig>,
) -> Result<Vec<String>> {
    let cmd = match (tool, tool_config) {
        (CHOPPER_TAG, None) => chopper::arg_generator(&config.args),
        (CUTADAPT_TAG, Some(ToolConfig::Cutadapt(c))) => cutadapt::arg_generator(&config.args, c),
        (SEQKIT_TAG, Some(ToolConfig::Seqkit(c))) => seqkit::arg_generator(c),
        (VSEARCH_TAG, Some(ToolConfig::Vsearch(c))) => vsearch::arg_generator(&config.args, c)?,
        (MAKEBLASTDB_TAG, Some(ToolConfig::MakeBlastDb(c))) => blast::makeblastdb_arg_generator(c),
        (BLASTN_TAG, Some(ToolConfig::Blastn(c))) => blast::blastn_arg_generator(&config.args, c),
        _ => return Err(anyhow!("Unknown tool or missing tool config: {}", tool)),
    };

    Ok(cmd)
}

pub async fn check_version(tool: &str) -> Result<String> {
    let version = match tool {
        CHOPPER_TAG => chopper::chopper_presence_check().await,
        CUTADAPT_TAG => cutadapt::cutadapt_presence_check().await,
        SEQKIT_TAG => seqkit::seqkit_presence_check().await,
        VSEARCH_TAG => vsearch::vsearch_presence_check().await,
        MAKEBLASTDB_TAG => blast::makeblastdb_presence_check().await,
        BLASTN_TAG => blast::blastn_presence_check().await,
        _ => return Err(anyhow!("Unknown tool: {}", tool)),
    };
    Ok(version?)
}

/// Collapses a version string like "2.28.1_linux" or "2.16.0+" to a
/// comparable major.minor float.
fn parse_major_minor(version: &str) -> Option<f32> {
    let trimmed = version.trim_start_matches(|c: char| !c.is_ascii_digit());
    let mut parts = trimmed.split('.');
    let major: u32 = parts.next()?.parse().ok()?;
    let minor: u32 = parts
        .next()
        .map(|p| p.chars().take_while(|c| c.is_ascii_digit()).collect::<String>())
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(0);
    Some(major as f32 + minor as f32 / 100.0)
}

/// Verifies every external collaborator answers its version flag before
/// the first stage runs, warning when a tool predates the supported
/// baseline.
pub async fn check_versions(tools: Vec<&str>) -> Result<()> {
    for tool in tools {
        let version = check_version(tool).await?;
        if let Some(minimum) = TOOL_VERSIONS.get(tool) {
            match parse_major_minor(&version) {
                Some(found) if found < *minimum => {
                    warn!("{} {} is older than the supported {:.2}", tool, version, minimum)
                }
                None => debug!("Could not parse {} version output: {}", tool, version),
                _ => {}
            }
        }
        info!("Found {} {}", tool, version);
    }
    Ok(())
}
