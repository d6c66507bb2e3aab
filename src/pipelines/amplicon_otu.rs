use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use futures::future::try_join_all;
use log::{debug, info};
use tokio::task::JoinHandle;

use crate::config::defs::{
    PipelineError, RunConfig, SeqkitSubcommand, VsearchSubcommand, BLASTDB_DIR, BLASTDB_NAME,
    BLASTN_TAG, CENTROIDS_FASTA, CHIMERAS_FASTA, CHOPPER_TAG, CLUSTERED_DIR, COMBINED_FASTA,
    CUTADAPT_TAG, DEREP_FASTA, FASTA_DIR, FILTERED_DIR, MAKEBLASTDB_TAG, NONCHIMERAS_FASTA,
    OTUS_FASTA, OTU_DIR, OTU_TABLE, RAW_INPUT_DIR, REFERENCE_DB, RENAMED_DIR, SEQKIT_TAG,
    TAXONOMY_TABLE, TRIMMED_DIR, VSEARCH_TAG,
};
use crate::utils::blast::read_m8_table;
use crate::utils::command::blast::{BlastnConfig, MakeBlastDbConfig};
use crate::utils::command::cutadapt::CutadaptConfig;
use crate::utils::command::seqkit::SeqkitConfig;
use crate::utils::command::vsearch::VsearchConfig;
use crate::utils::command::{check_versions, generate_cli, ToolConfig};
use crate::utils::fastx::{concatenate_fasta, rename_fasta_records, rewrite_header_separators};
use crate::utils::file::{
    ensure_nonempty_file, fastq_files_in_dir, file_path_manipulator, fresh_dir, sample_base,
};
use crate::utils::sequence::reverse_complement;
use crate::utils::streams::{run_tool, run_tool_streamed};

/// One sample's artifact from the most recent stage. `name` is the raw
/// file's base name and never changes; `path` advances stage by stage.
#[derive(Debug, Clone)]
pub struct Sample {
    pub name: String,
    pub path: PathBuf,
}

fn io_err(e: impl std::fmt::Display) -> PipelineError {
    PipelineError::IOError(e.to_string())
}

fn tool_err(tool: &str, e: impl std::fmt::Display) -> PipelineError {
    PipelineError::ToolExecution {
        tool: tool.to_string(),
        error: e.to_string(),
    }
}

/// Collects per-file task results, surfacing the first failure under the
/// stage's tool tag. A stage only completes once every task has finished.
async fn join_stage_tasks(
    tool: &str,
    tasks: Vec<JoinHandle<anyhow::Result<Sample>>>,
) -> Result<Vec<Sample>, PipelineError> {
    let joined = try_join_all(tasks)
        .await
        .map_err(|e| PipelineError::Other(e.into()))?;
    joined
        .into_iter()
        .collect::<anyhow::Result<Vec<Sample>>>()
        .map_err(|e| tool_err(tool, e))
}

/// Quality/length-filters every raw read file. Each input is decompressed
/// and streamed through the external filter; one filtered FASTQ per input.
async fn quality_filter(
    config: Arc<RunConfig>,
    raw_files: Vec<PathBuf>,
    out_dir: PathBuf,
) -> Result<Vec<Sample>, PipelineError> {
    fresh_dir(&out_dir).map_err(io_err)?;
    info!("Quality filtering {} sample file(s)", raw_files.len());

    let chopper_args = generate_cli(CHOPPER_TAG, &config, None)?;

    let mut tasks = Vec::new();
    for raw in raw_files {
        let name = sample_base(&raw);
        let out_path = file_path_manipulator(&raw, Some(&out_dir), None, Some("filtered.fastq"), "_");
        let args = chopper_args.clone();
        let semaphore = config.maximal_semaphore.clone();
        tasks.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await?;
            debug!("Filtering {}", raw.display());
            run_tool_streamed(CHOPPER_TAG, &args, &raw, &out_path)
                .await
                .map_err(|e| anyhow!("{}: {}", raw.display(), e))?;
            Ok(Sample { name, path: out_path })
        }));
    }
    join_stage_tasks(CHOPPER_TAG, tasks).await
}

/// Trims the primer pair off every filtered file. The reverse primer is
/// reverse-complemented once per run and linked to the forward primer;
/// reads without the primer pair are discarded.
async fn primer_trim(
    config: Arc<RunConfig>,
    samples: Vec<Sample>,
    out_dir: PathBuf,
) -> Result<Vec<Sample>, PipelineError> {
    fresh_dir(&out_dir).map_err(io_err)?;

    let rev_rc = reverse_complement(&config.args.primer_rev)
        .map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;
    let linked_adapter = format!("{}...{}", config.args.primer_fwd, rev_rc);
    info!("Trimming primers with linked adapter {}", linked_adapter);

    let mut tasks = Vec::new();
    for sample in samples {
        let out_path =
            file_path_manipulator(Path::new(&sample.name), Some(&out_dir), None, Some("trimmed.fastq"), "_");
        let tool_config = ToolConfig::Cutadapt(CutadaptConfig {
            linked_adapter: linked_adapter.clone(),
            input: sample.path.clone(),
            output: out_path.clone(),
        });
        let args = generate_cli(CUTADAPT_TAG, &config, Some(&tool_config))?;
        let semaphore = config.maximal_semaphore.clone();
        tasks.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await?;
            debug!("Trimming {}", sample.path.display());
            run_tool(CUTADAPT_TAG, &args)
                .await
                .map_err(|e| anyhow!("{}: {}", sample.path.display(), e))?;
            Ok(Sample { name: sample.name, path: out_path })
        }));
    }
    join_stage_tasks(CUTADAPT_TAG, tasks).await
}

/// Converts each trimmed FASTQ to FASTA, one-to-one.
async fn convert_to_fasta(
    config: Arc<RunConfig>,
    samples: Vec<Sample>,
    out_dir: PathBuf,
) -> Result<Vec<Sample>, PipelineError> {
    fresh_dir(&out_dir).map_err(io_err)?;
    info!("Converting {} file(s) to FASTA", samples.len());

    let mut tasks = Vec::new();
    for sample in samples {
        let out_path =
            file_path_manipulator(Path::new(&sample.name), Some(&out_dir), None, Some("fasta"), ".");
        let tool_config = ToolConfig::Seqkit(SeqkitConfig {
            subcommand: SeqkitSubcommand::Fq2fa,
            input: sample.path.clone(),
            output: out_path.clone(),
        });
        let args = generate_cli(SEQKIT_TAG, &config, Some(&tool_config))?;
        let semaphore = config.maximal_semaphore.clone();
        tasks.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await?;
            run_tool(SEQKIT_TAG, &args)
                .await
                .map_err(|e| anyhow!("{}: {}", sample.path.display(), e))?;
            Ok(Sample { name: sample.name, path: out_path })
        }));
    }
    join_stage_tasks(SEQKIT_TAG, tasks).await
}

/// Rewrites every header to `<sample>;<n>` so sample provenance survives
/// the cross-sample combination that follows.
async fn rename_reads(
    samples: Vec<Sample>,
    out_dir: PathBuf,
) -> Result<Vec<Sample>, PipelineError> {
    fresh_dir(&out_dir).map_err(io_err)?;
    info!("Renaming reads to <sample>;<index>");

    let renamed = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<Sample>> {
        let mut renamed = Vec::with_capacity(samples.len());
        for sample in samples {
            let out_path = file_path_manipulator(
                Path::new(&sample.name),
                Some(&out_dir),
                None,
                Some("renamed.fasta"),
                "_",
            );
            let count = rename_fasta_records(&sample.path, &out_path, &sample.name)?;
            debug!("{}: renamed {} read(s)", sample.name, count);
            renamed.push(Sample { name: sample.name, path: out_path });
        }
        Ok(renamed)
    })
    .await
    .map_err(|e| PipelineError::Other(e.into()))??;

    Ok(renamed)
}

/// Combines all samples, then dereplicates, clusters at the configured
/// identity, and splits chimeric from non-chimeric centroids, strictly in
/// sequence. Returns the combined file and the non-chimeric centroids.
async fn combine_and_cluster(
    config: Arc<RunConfig>,
    samples: &[Sample],
    out_dir: PathBuf,
) -> Result<(PathBuf, PathBuf), PipelineError> {
    fresh_dir(&out_dir).map_err(io_err)?;

    let combined = out_dir.join(COMBINED_FASTA);
    let inputs: Vec<PathBuf> = samples.iter().map(|s| s.path.clone()).collect();
    let combined_clone = combined.clone();
    let total = tokio::task::spawn_blocking(move || concatenate_fasta(&inputs, &combined_clone))
        .await
        .map_err(|e| PipelineError::Other(e.into()))??;
    if total == 0 {
        return Err(PipelineError::EmptyStageInput(combined.display().to_string()));
    }
    info!("Combined {} read(s) from {} sample(s)", total, samples.len());

    let derep = out_dir.join(DEREP_FASTA);
    let derep_config = ToolConfig::Vsearch(VsearchConfig {
        subcommand: VsearchSubcommand::DerepFulllength,
        input: combined.clone(),
        output: derep.clone(),
        secondary_output: None,
        db: None,
    });
    run_tool(VSEARCH_TAG, &generate_cli(VSEARCH_TAG, &config, Some(&derep_config))?)
        .await
        .map_err(|e| tool_err(VSEARCH_TAG, e))?;
    ensure_nonempty_file(&derep).map_err(|e| tool_err(VSEARCH_TAG, e))?;

    let centroids = out_dir.join(CENTROIDS_FASTA);
    let cluster_config = ToolConfig::Vsearch(VsearchConfig {
        subcommand: VsearchSubcommand::ClusterSize,
        input: derep,
        output: centroids.clone(),
        secondary_output: None,
        db: None,
    });
    run_tool(VSEARCH_TAG, &generate_cli(VSEARCH_TAG, &config, Some(&cluster_config))?)
        .await
        .map_err(|e| tool_err(VSEARCH_TAG, e))?;
    ensure_nonempty_file(&centroids).map_err(|e| tool_err(VSEARCH_TAG, e))?;

    let nonchimeras = out_dir.join(NONCHIMERAS_FASTA);
    let uchime_config = ToolConfig::Vsearch(VsearchConfig {
        subcommand: VsearchSubcommand::UchimeDenovo,
        input: centroids,
        output: nonchimeras.clone(),
        secondary_output: Some(out_dir.join(CHIMERAS_FASTA)),
        db: None,
    });
    run_tool(VSEARCH_TAG, &generate_cli(VSEARCH_TAG, &config, Some(&uchime_config))?)
        .await
        .map_err(|e| tool_err(VSEARCH_TAG, e))?;
    ensure_nonempty_file(&nonchimeras).map_err(|e| tool_err(VSEARCH_TAG, e))?;

    Ok((combined, nonchimeras))
}

/// Rewrites `;` to `_` in the non-chimeric centroid headers; the table
/// generator reserves `;` for its own annotations.
async fn extract_otus(nonchimeras: PathBuf, out_dir: PathBuf) -> Result<PathBuf, PipelineError> {
    fresh_dir(&out_dir).map_err(io_err)?;

    let otus = out_dir.join(OTUS_FASTA);
    let otus_clone = otus.clone();
    let count =
        tokio::task::spawn_blocking(move || rewrite_header_separators(&nonchimeras, &otus_clone))
            .await
            .map_err(|e| PipelineError::Other(e.into()))??;
    if count == 0 {
        return Err(PipelineError::EmptyStageInput(otus.display().to_string()));
    }
    info!("Retained {} OTU centroid(s)", count);
    Ok(otus)
}

/// Maps the full pre-dereplication read population back onto the OTU
/// centroids, producing the sample-by-cluster abundance table.
async fn generate_otu_table(
    config: Arc<RunConfig>,
    combined: PathBuf,
    otus: PathBuf,
) -> Result<PathBuf, PipelineError> {
    let table = config.cwd.join(OTU_TABLE);
    info!("Generating OTU table at {}", table.display());

    let search_config = ToolConfig::Vsearch(VsearchConfig {
        subcommand: VsearchSubcommand::UsearchGlobal,
        input: combined,
        output: table.clone(),
        secondary_output: None,
        db: Some(otus),
    });
    run_tool(VSEARCH_TAG, &generate_cli(VSEARCH_TAG, &config, Some(&search_config))?)
        .await
        .map_err(|e| tool_err(VSEARCH_TAG, e))?;
    fs::metadata(&table).map_err(|e| tool_err(VSEARCH_TAG, e))?;
    Ok(table)
}

/// Builds the search database from the reference collection and searches
/// every OTU centroid against it.
async fn assign_taxonomy(config: Arc<RunConfig>, otus: PathBuf) -> Result<PathBuf, PipelineError> {
    let reference = config.cwd.join(REFERENCE_DB);
    if !reference.exists() {
        return Err(PipelineError::InvalidConfig(format!(
            "Reference database not found at {}",
            reference.display()
        )));
    }

    let db_dir = config.cwd.join(BLASTDB_DIR);
    fresh_dir(&db_dir).map_err(io_err)?;
    let db_prefix = db_dir.join(BLASTDB_NAME);

    let makedb_config = ToolConfig::MakeBlastDb(MakeBlastDbConfig {
        input: reference,
        db_prefix: db_prefix.clone(),
    });
    run_tool(MAKEBLASTDB_TAG, &generate_cli(MAKEBLASTDB_TAG, &config, Some(&makedb_config))?)
        .await
        .map_err(|e| tool_err(MAKEBLASTDB_TAG, e))?;

    let table = config.cwd.join(TAXONOMY_TABLE);
    let blastn_config = ToolConfig::Blastn(BlastnConfig {
        query: otus,
        db_prefix,
        output: table.clone(),
    });
    run_tool(BLASTN_TAG, &generate_cli(BLASTN_TAG, &config, Some(&blastn_config))?)
        .await
        .map_err(|e| tool_err(BLASTN_TAG, e))?;

    let records = read_m8_table(&table).map_err(|e| tool_err(BLASTN_TAG, e))?;
    let queries: HashSet<&str> = records.iter().map(|r| r.qname.as_str()).collect();
    info!(
        "Taxonomy search produced {} hit(s) across {} OTU(s)",
        records.len(),
        queries.len()
    );
    Ok(table)
}

/// Run function for the amplicon OTU pipeline: eight stages in strict
/// sequence, each stage's output directory feeding the next stage.
///
/// # Arguments
///
/// * `config` - RunConfig struct from main.
///
/// # Returns
/// Result<(), PipelineError>
pub async fn run(config: Arc<RunConfig>) -> Result<(), PipelineError> {
    check_versions(vec![
        CHOPPER_TAG,
        CUTADAPT_TAG,
        SEQKIT_TAG,
        VSEARCH_TAG,
        MAKEBLASTDB_TAG,
        BLASTN_TAG,
    ])
    .await?;

    // Both primers must stay within the unambiguous alphabet; reported
    // before any stage runs.
    for primer in [&config.args.primer_fwd, &config.args.primer_rev] {
        reverse_complement(primer).map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;
    }

    let input_dir = config.cwd.join(RAW_INPUT_DIR);
    let raw_files = fastq_files_in_dir(&input_dir)?;
    if raw_files.is_empty() {
        return Err(PipelineError::EmptyStageInput(input_dir.display().to_string()));
    }
    info!("Discovered {} sample file(s) in {}", raw_files.len(), input_dir.display());

    let filtered = quality_filter(config.clone(), raw_files, config.cwd.join(FILTERED_DIR)).await?;
    let trimmed = primer_trim(config.clone(), filtered, config.cwd.join(TRIMMED_DIR)).await?;
    let converted = convert_to_fasta(config.clone(), trimmed, config.cwd.join(FASTA_DIR)).await?;
    let renamed = rename_reads(converted, config.cwd.join(RENAMED_DIR)).await?;

    let (combined, nonchimeras) =
        combine_and_cluster(config.clone(), &renamed, config.cwd.join(CLUSTERED_DIR)).await?;
    let otus = extract_otus(nonchimeras, config.cwd.join(OTU_DIR)).await?;

    let otu_table = generate_otu_table(config.clone(), combined, otus.clone()).await?;
    let taxonomy_table = assign_taxonomy(config.clone(), otus).await?;

    info!("OTU table: {}", otu_table.display());
    info!("Taxonomy assignments: {}", taxonomy_table.display());
    Ok(())
}
