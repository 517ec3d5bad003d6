pub mod classify;
pub mod cluster;
pub mod consensus;
pub mod filter;
pub mod molecule;
pub mod stats;
pub mod validate;

use log::info;

pub use classify::Classifier;
pub use cluster::IsoformClusterer;
pub use consensus::ConsensusCaller;
pub use consensus::ConsensusEngine;
pub use filter::EvidenceFilter;
pub use molecule::MoleculeBuilder;
pub use stats::CollapseStats;
pub use validate::EvidenceSet;
pub use validate::ValidationThresholds;
pub use validate::Validator;

use crate::fileformat::CellList;
use crate::fileformat::GeneModel;
use crate::model::IsoformCluster;
use crate::model::Molecule;
use crate::model::ReadRecord;

///////////////////////////////
/// Algorithmic settings of a run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollapseConfig {
    /// Largest allowed shift of an exon boundary, in bases
    pub delta: i64,
    /// Molecules a novel isoform needs to be kept
    pub min_evidence: usize,
    /// Reads a molecule needs to be kept
    pub rnmin: u32,
    pub thresholds: ValidationThresholds,
}
impl Default for CollapseConfig {
    fn default() -> Self {
        CollapseConfig {
            delta: 2,
            min_evidence: 2,
            rnmin: 3,
            thresholds: ValidationThresholds::default(),
        }
    }
}

pub struct CollapseResult {
    pub molecules: Vec<Molecule>,
    /// Surviving clusters; members index into `molecules`
    pub clusters: Vec<IsoformCluster>,
    pub stats: CollapseStats,
}

///////////////////////////////
/// Molecules, clusters, evidence filter and classification over a stream of reads.
/// Read errors abort the run, rejected reads are only counted
pub fn collapse_reads<I>(
    reads: I,
    cells: &CellList,
    model: &GeneModel,
    config: &CollapseConfig,
) -> anyhow::Result<CollapseResult>
where
    I: IntoIterator<Item = anyhow::Result<ReadRecord>>,
{
    let mut builder = MoleculeBuilder::new(cells, config.rnmin);
    let mut num_reads: u64 = 0;
    for read in reads {
        builder.add(read?);
        num_reads += 1;
        if num_reads % 1_000_000 == 0 {
            info!(
                "Processed {} reads, {} rejected",
                num_reads,
                builder.stats().reads_rejected_cell + builder.stats().reads_malformed
            );
        }
    }
    let (molecules, molecule_stats) = builder.finish();
    info!(
        "Built {} molecules from {} reads ({} below {} reads)",
        molecule_stats.molecules_built,
        molecule_stats.reads_seen,
        molecule_stats.molecules_dropped,
        config.rnmin
    );

    let (clusters, cluster_stats) = IsoformClusterer::new(config.delta).cluster(model, &molecules);
    info!("Formed {} isoform clusters", cluster_stats.clusters_formed);

    let (clusters, filter_stats) =
        EvidenceFilter::new(config.min_evidence, config.delta).apply(model, clusters);
    info!(
        "Kept {} isoforms, {} dropped with fewer than {} molecules",
        filter_stats.clusters_kept, filter_stats.clusters_dropped, config.min_evidence
    );

    let (clusters, classify_stats) = Classifier::new(config.delta).classify(model, clusters);
    info!(
        "Classified {} known and {} novel isoforms",
        classify_stats.known, classify_stats.novel
    );

    Ok(CollapseResult {
        molecules,
        clusters,
        stats: CollapseStats {
            molecules: molecule_stats,
            clusters: cluster_stats,
            filter: filter_stats,
            classify: classify_stats,
            ..Default::default()
        },
    })
}

///////////////////////////////
/// Validate when evidence is available, otherwise mark everything as not validated
pub fn validate_clusters(
    mut result: CollapseResult,
    evidence: Option<&EvidenceSet>,
    thresholds: &ValidationThresholds,
) -> CollapseResult {
    let (clusters, stats) = match evidence {
        Some(evidence) => Validator::new(evidence, thresholds.clone()).validate(result.clusters),
        None => {
            info!("Validation skipped, isoforms are reported as not validated");
            Validator::skip(result.clusters)
        }
    };
    result.clusters = clusters;
    result.stats.validation = stats;
    result
}
