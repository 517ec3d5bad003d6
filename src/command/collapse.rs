use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use anyhow::Result;
use clap::Args;
use log::info;

use crate::collapse;
use crate::collapse::consensus::ExternalConsensus;
use crate::collapse::stats::ConsensusStats;
use crate::collapse::validate::wanted_junctions;
use crate::collapse::CollapseConfig;
use crate::collapse::ConsensusCaller;
use crate::collapse::EvidenceSet;
use crate::collapse::ValidationThresholds;
use crate::fileformat::bam;
use crate::fileformat::export;
use crate::fileformat::BamReadSource;
use crate::fileformat::CellList;
use crate::fileformat::GeneModel;
use crate::fileformat::IntervalIndex;
use crate::fileformat::JunctionIndex;
use crate::fileformat::TagNames;
use crate::model::IsoformCluster;
use crate::runtime::Error;
use crate::utils::check_consensus_tools;
use crate::utils::ConsensusTools;

pub const DEFAULT_PATH_TEMP: &str = "temp";
pub const DEFAULT_PREFIX: &str = "CollapseModel";

#[derive(Args)]
pub struct CollapseCMD {
    #[arg(short = 'i', value_parser)]
    /// Long read BAM file, tagged with cell, UMI, gene and isoform
    pub path_in: PathBuf,

    #[arg(short = 'o', value_parser)]
    /// Output directory
    pub path_out: PathBuf,

    #[arg(long = "refflat", value_parser)]
    /// Reference gene model in refFlat format
    pub path_refflat: PathBuf,

    #[arg(long = "cells", value_parser)]
    /// Cell barcode whitelist, one barcode per line
    pub path_cells: PathBuf,

    #[arg(long = "cage", value_parser)]
    /// CAGE peaks (.bed)
    pub path_cage: Option<PathBuf>,

    #[arg(long = "polya", value_parser)]
    /// PolyA sites (.bed)
    pub path_polya: Option<PathBuf>,

    #[arg(long = "short", value_parser)]
    /// Short read BAM file for junction validation
    pub path_short: Option<PathBuf>,

    #[arg(long = "delta", value_parser, default_value = "2")]
    /// Allowed shift of an exon boundary, in bases
    pub delta: i64,

    #[arg(long = "min-evidence", value_parser, default_value = "2")]
    /// Molecules needed to keep a novel isoform
    pub min_evidence: usize,

    #[arg(long = "rnmin", value_parser, default_value = "3")]
    /// Reads needed to keep a molecule
    pub rnmin: u32,

    #[arg(long = "cage-co", value_parser, default_value = "50")]
    /// CAGE validation cutoff, in bases
    pub cage_co: i64,

    #[arg(long = "polya-co", value_parser, default_value = "50")]
    /// PolyA validation cutoff, in bases
    pub polya_co: i64,

    #[arg(long = "junc-co", value_parser, default_value = "1")]
    /// Junction validation cutoff, in short reads
    pub junc_co: u32,

    #[arg(long = "prefix", value_parser, default_value = DEFAULT_PREFIX)]
    /// Prefix of output files
    pub prefix: String,

    #[arg(long = "cell-tag", default_value = bam::DEFAULT_CELL_TAG)]
    pub cell_tag: String,

    #[arg(long = "umi-tag", default_value = bam::DEFAULT_UMI_TAG)]
    pub umi_tag: String,

    #[arg(long = "gene-tag", default_value = bam::DEFAULT_GENE_TAG)]
    pub gene_tag: String,

    #[arg(long = "isoform-tag", default_value = bam::DEFAULT_ISOFORM_TAG)]
    pub isoform_tag: String,

    #[arg(long = "rn-tag", default_value = bam::DEFAULT_READ_COUNT_TAG)]
    pub read_count_tag: String,

    #[arg(long = "no-consensus")]
    /// Do not call consensus sequences, even if poa, racon and minimap2 are available
    pub no_consensus: bool,

    #[arg(long = "consensus-min-support", value_parser, default_value = "2")]
    /// Molecules needed to call a consensus for an isoform
    pub consensus_min_support: usize,

    #[arg(long = "consensus-max-sequences", value_parser, default_value = "100")]
    /// Maximum number of molecules used for one consensus
    pub consensus_max_sequences: usize,

    #[arg(long = "poa-matrix", value_parser)]
    /// Scoring matrix for poa. A nucleotide matrix is used if not given
    pub path_poa_matrix: Option<PathBuf>,

    #[arg(long = "keep-temp")]
    /// Keep the intermediate consensus files
    pub keep_temp: bool,

    // Temp file directory
    #[arg(short = 't', value_parser= clap::value_parser!(PathBuf), default_value = DEFAULT_PATH_TEMP)]
    pub path_tmp: PathBuf,

    //Thread settings
    #[arg(short = '@', value_parser = clap::value_parser!(usize), default_value = "20")]
    pub num_threads: usize,
}
impl CollapseCMD {
    /// Run the commandline option
    pub fn try_execute(&mut self) -> Result<()> {
        let capabilities = Capabilities::detect(
            self.path_cage.as_deref(),
            self.path_polya.as_deref(),
            self.path_short.as_deref(),
            !self.no_consensus,
        );

        Collapse::run(&CollapseParams {
            path_in: self.path_in.clone(),
            path_out: self.path_out.clone(),
            path_refflat: self.path_refflat.clone(),
            path_cells: self.path_cells.clone(),
            path_cage: self.path_cage.clone(),
            path_polya: self.path_polya.clone(),
            path_short: self.path_short.clone(),
            path_tmp: self.path_tmp.clone(),
            path_poa_matrix: self.path_poa_matrix.clone(),
            prefix: self.prefix.clone(),
            tags: TagNames {
                cell: self.cell_tag.clone(),
                umi: self.umi_tag.clone(),
                gene: self.gene_tag.clone(),
                isoform: self.isoform_tag.clone(),
                read_count: self.read_count_tag.clone(),
            },
            config: CollapseConfig {
                delta: self.delta,
                min_evidence: self.min_evidence,
                rnmin: self.rnmin,
                thresholds: ValidationThresholds {
                    cage_co: self.cage_co,
                    polya_co: self.polya_co,
                    junc_co: self.junc_co,
                },
            },
            consensus_min_support: self.consensus_min_support,
            consensus_max_sequences: self.consensus_max_sequences,
            keep_temp: self.keep_temp,
            num_threads: self.num_threads.max(1),
            capabilities,
        })?;

        log::info!("Collapse has finished succesfully");
        Ok(())
    }
}

///////////////////////////////
/// Optional stages that can run, decided once at startup
#[derive(Clone, Debug, Default)]
pub struct Capabilities {
    /// CAGE, polyA and short read files are all present
    pub validation: bool,
    pub consensus: Option<ConsensusTools>,
}
impl Capabilities {
    pub fn detect(
        cage: Option<&Path>,
        polya: Option<&Path>,
        short: Option<&Path>,
        want_consensus: bool,
    ) -> Capabilities {
        let present = |p: Option<&Path>| p.map(|p| p.exists()).unwrap_or(false);
        let validation = present(cage) && present(polya) && present(short);
        if validation {
            info!("Perform validation using provided CAGE bed, polyA bed and short read bam files");
        } else {
            info!("Won't perform validation (please provide CAGE bed, polyA bed and short read bam files)");
        }

        let consensus = if want_consensus {
            check_consensus_tools()
        } else {
            None
        };
        Capabilities {
            validation,
            consensus,
        }
    }
}

pub struct CollapseParams {
    pub path_in: PathBuf,
    pub path_out: PathBuf,
    pub path_refflat: PathBuf,
    pub path_cells: PathBuf,
    pub path_cage: Option<PathBuf>,
    pub path_polya: Option<PathBuf>,
    pub path_short: Option<PathBuf>,
    pub path_tmp: PathBuf,
    pub path_poa_matrix: Option<PathBuf>,
    pub prefix: String,
    pub tags: TagNames,
    pub config: CollapseConfig,
    pub consensus_min_support: usize,
    pub consensus_max_sequences: usize,
    pub keep_temp: bool,
    pub num_threads: usize,
    pub capabilities: Capabilities,
}

///////////////////////////////
/// Paths of all output files of one run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputPaths {
    pub table: PathBuf,
    pub refflat: PathBuf,
    pub refflat_validated: PathBuf,
    pub gff: PathBuf,
    pub gff_validated: PathBuf,
    pub fasta: PathBuf,
    pub stats: PathBuf,
}
impl OutputPaths {
    /// <outdir>/<prefix>.d<DELTA>.rn<RNMIN>.e<MINEVIDENCE> followed by the file suffix
    pub fn new(path_out: &Path, prefix: &str, config: &CollapseConfig) -> OutputPaths {
        let base = format!(
            "{}.d{}.rn{}.e{}",
            prefix, config.delta, config.rnmin, config.min_evidence
        );
        let file = |suffix: &str| path_out.join(format!("{}{}", base, suffix));
        OutputPaths {
            table: file(".txt"),
            refflat: file(".refflat.txt"),
            refflat_validated: file(".final.refflat.txt"),
            gff: file(".gff"),
            gff_validated: file(".final.gff"),
            fasta: file(".fas"),
            stats: file(".stats.txt"),
        }
    }
}

fn check_readable(path: &Path) -> Result<()> {
    if !path.is_file() {
        bail!(Error::file_not_found(path));
    }
    Ok(())
}

pub struct Collapse {}
impl Collapse {
    /// Run the algorithm
    pub fn run(params: &CollapseParams) -> Result<()> {
        check_readable(&params.path_refflat)?;
        check_readable(&params.path_in)?;
        check_readable(&params.path_cells)?;

        let cells = CellList::from_file(&params.path_cells)?;
        info!("Cells detected: {}", cells.len());

        let model = GeneModel::load(&params.path_refflat)?;

        let keep_sequence = params.capabilities.consensus.is_some();
        let mut source = BamReadSource::from_path(
            &params.path_in,
            params.tags.clone(),
            keep_sequence,
            params.num_threads,
        )?;
        let mut result = collapse::collapse_reads(&mut source, &cells, &model, &params.config)?;
        result.stats.source = source.stats().clone();

        let mut result = if params.capabilities.validation {
            let evidence = Collapse::load_evidence(params, &result.clusters)?;
            collapse::validate_clusters(result, Some(&evidence), &params.config.thresholds)
        } else {
            collapse::validate_clusters(result, None, &params.config.thresholds)
        };

        fs::create_dir_all(&params.path_out)?;
        let paths = OutputPaths::new(&params.path_out, &params.prefix, &params.config);

        info!("Exporting isoforms to {}", paths.table.display());
        export::write_isoform_table(&paths.table, &result.clusters)?;
        export::write_refflat(&paths.refflat, &result.clusters, false)?;
        let n_validated = export::write_refflat(&paths.refflat_validated, &result.clusters, true)?;
        export::write_gff(&paths.gff, &result.clusters, false)?;
        export::write_gff(&paths.gff_validated, &result.clusters, true)?;
        info!(
            "Exported {} isoforms, {} fully validated",
            result.clusters.len(),
            n_validated
        );

        if let Some(tools) = &params.capabilities.consensus {
            info!("Exporting all isoforms consensus sequence to {}", paths.fasta.display());
            let engine = ExternalConsensus::new(
                tools.clone(),
                params.path_poa_matrix.clone(),
                &params.path_tmp,
            )?;
            let caller = ConsensusCaller {
                engine: Arc::new(engine),
                num_threads: params.num_threads,
                min_support: params.consensus_min_support,
                max_sequences: params.consensus_max_sequences,
                path_tmp: params.path_tmp.join("consensus"),
                keep_files: params.keep_temp,
            };
            let outcome = caller.run(&result.clusters, &result.molecules)?;
            export::write_consensus_fasta(&paths.fasta, &result.clusters, &outcome.sequences)?;
            result.stats.consensus = Some(ConsensusStats {
                sequences: outcome.sequences.len(),
                failed: outcome.failed.len(),
                skipped: outcome.skipped,
            });
        } else {
            info!("Consensus calling skipped");
        }

        result.stats.log_summary();
        result.stats.write_report(&paths.stats)?;
        Ok(())
    }

    ///////////////////////////////
    /// CAGE and polyA intervals, plus short read support of the junctions of the isoforms found
    fn load_evidence(
        params: &CollapseParams,
        clusters: &[IsoformCluster],
    ) -> Result<EvidenceSet> {
        let (Some(path_cage), Some(path_polya), Some(path_short)) =
            (&params.path_cage, &params.path_polya, &params.path_short)
        else {
            bail!("Validation requested without all evidence files");
        };

        let cage = IntervalIndex::from_file(path_cage)?;
        info!("Loaded {} CAGE peaks", cage.len());
        let polya = IntervalIndex::from_file(path_polya)?;
        info!("Loaded {} polyA sites", polya.len());

        let wanted = wanted_junctions(clusters);
        let junctions = JunctionIndex::from_bam(path_short, &wanted, params.num_threads)?;

        Ok(EvidenceSet {
            cage,
            polya,
            junctions,
        })
    }
}
