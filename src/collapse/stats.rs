use std::path::Path;

use anyhow::Context;
use csv::WriterBuilder;
use log::info;

use super::classify::ClassifyStats;
use super::cluster::ClusterStats;
use super::filter::FilterStats;
use super::molecule::MoleculeStats;
use super::validate::ValidationStats;
use crate::fileformat::bam::SourceStats;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConsensusStats {
    pub sequences: usize,
    pub failed: usize,
    pub skipped: usize,
}

///////////////////////////////
/// Counters of every stage of a run
#[derive(Clone, Debug, Default)]
pub struct CollapseStats {
    pub source: SourceStats,
    pub molecules: MoleculeStats,
    pub clusters: ClusterStats,
    pub filter: FilterStats,
    pub classify: ClassifyStats,
    pub validation: ValidationStats,
    pub consensus: Option<ConsensusStats>,
}
impl CollapseStats {
    /// Flattened (name, value) pairs, in report order
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let mut out = vec![
            ("bam_records", self.source.records.to_string()),
            ("bam_records_filtered", self.source.filtered.to_string()),
            ("bam_records_malformed", self.source.malformed.to_string()),
            ("reads_seen", self.molecules.reads_seen.to_string()),
            ("reads_rejected_cell", self.molecules.reads_rejected_cell.to_string()),
            ("reads_malformed", self.molecules.reads_malformed.to_string()),
            ("molecule_keys", self.molecules.keys_seen.to_string()),
            ("molecules_built", self.molecules.molecules_built.to_string()),
            ("molecules_dropped_rnmin", self.molecules.molecules_dropped.to_string()),
            ("genes", self.clusters.genes.to_string()),
            ("clusters_formed", self.clusters.clusters_formed.to_string()),
            ("clusters_reference_seeded", self.clusters.clusters_reference.to_string()),
            ("clusters_novel", self.clusters.clusters_novel.to_string()),
            ("clusters_dropped_evidence", self.filter.clusters_dropped.to_string()),
            ("clusters_kept", self.filter.clusters_kept.to_string()),
            ("isoforms_known", self.classify.known.to_string()),
            ("isoforms_novel", self.classify.novel.to_string()),
            ("isoforms_novel_splice_site", self.classify.novel_new_splice_site.to_string()),
            ("isoforms_novel_terminus", self.classify.novel_altered_terminus.to_string()),
            ("validation_activated", self.validation.activated.to_string()),
            ("isoforms_fully_validated", self.validation.fully_validated.to_string()),
            ("isoforms_not_fully_validated", self.validation.not_fully_validated.to_string()),
            ("isoforms_not_validated", self.validation.not_validated.to_string()),
            ("tss_valid", self.validation.tss_valid.to_string()),
            ("tes_valid", self.validation.tes_valid.to_string()),
            ("junctions_total", self.validation.junctions_total.to_string()),
            ("junctions_valid", self.validation.junctions_valid.to_string()),
        ];
        if let Some(c) = &self.consensus {
            out.push(("consensus_sequences", c.sequences.to_string()));
            out.push(("consensus_failed", c.failed.to_string()));
            out.push(("consensus_skipped", c.skipped.to_string()));
        }
        out
    }

    ///////////////////////////////
    /// Two-column tab separated report
    pub fn write_report(&self, path: &Path) -> anyhow::Result<()> {
        let mut writer = WriterBuilder::new()
            .delimiter(b'\t')
            .from_path(path)
            .with_context(|| format!("Could not create {}", path.display()))?;
        writer.write_record(["statistic", "value"])?;
        for (name, value) in self.entries() {
            writer.write_record([name, value.as_str()])?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn log_summary(&self) {
        info!(
            "Molecules: {} built from {} reads, {} dropped below RNMIN",
            self.molecules.molecules_built,
            self.molecules.reads_seen,
            self.molecules.molecules_dropped
        );
        info!(
            "Clusters: {} formed, {} dropped for insufficient evidence, {} known, {} novel",
            self.clusters.clusters_formed,
            self.filter.clusters_dropped,
            self.classify.known,
            self.classify.novel
        );
        if self.validation.activated {
            info!(
                "Validation: {} fully validated, {} not fully validated",
                self.validation.fully_validated, self.validation.not_fully_validated
            );
        } else {
            info!(
                "Validation: skipped, {} isoforms not validated",
                self.validation.not_validated
            );
        }
        if let Some(c) = &self.consensus {
            info!(
                "Consensus: {} sequences, {} failed, {} skipped",
                c.sequences, c.failed, c.skipped
            );
        }
    }
}
