use std::collections::HashSet;

use log::info;

use crate::fileformat::IntervalIndex;
use crate::fileformat::JunctionIndex;
use crate::model::introns;
use crate::model::IsoformCluster;
use crate::model::Junction;
use crate::model::ValidationFlags;
use crate::model::ValidationStatus;

///////////////////////////////
/// Independent evidence, loaded once and only read afterwards
pub struct EvidenceSet {
    pub cage: IntervalIndex,
    pub polya: IntervalIndex,
    pub junctions: JunctionIndex,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationThresholds {
    pub cage_co: i64,
    pub polya_co: i64,
    pub junc_co: u32,
}
impl Default for ValidationThresholds {
    fn default() -> Self {
        ValidationThresholds {
            cage_co: 50,
            polya_co: 50,
            junc_co: 1,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub activated: bool,
    pub fully_validated: usize,
    pub not_fully_validated: usize,
    pub not_validated: usize,
    pub tss_valid: usize,
    pub tes_valid: usize,
    pub junctions_total: usize,
    pub junctions_valid: usize,
}

/// Every intron of every cluster, as needed to scan short reads
pub fn wanted_junctions(clusters: &[IsoformCluster]) -> HashSet<Junction> {
    clusters
        .iter()
        .flat_map(|c| introns(&c.exons).map(|(d, a)| Junction::new(&c.chrom, d, a)))
        .collect()
}

pub struct Validator<'a> {
    evidence: &'a EvidenceSet,
    thresholds: ValidationThresholds,
}
impl<'a> Validator<'a> {
    pub fn new(evidence: &'a EvidenceSet, thresholds: ValidationThresholds) -> Validator<'a> {
        Validator {
            evidence,
            thresholds,
        }
    }

    pub fn validate_one(&self, cluster: &IsoformCluster) -> ValidationFlags {
        let tss_valid = self.evidence.cage.within(
            &cluster.chrom,
            cluster.strand,
            cluster.five_prime(),
            self.thresholds.cage_co,
        );
        let tes_valid = self.evidence.polya.within(
            &cluster.chrom,
            cluster.strand,
            cluster.three_prime(),
            self.thresholds.polya_co,
        );
        let junctions_valid = introns(&cluster.exons)
            .map(|(d, a)| {
                self.evidence.junctions.count(&Junction::new(&cluster.chrom, d, a))
                    >= self.thresholds.junc_co
            })
            .collect();
        ValidationFlags {
            tss_valid,
            tes_valid,
            junctions_valid,
        }
    }

    ///////////////////////////////
    /// Annotate all clusters with evidence flags
    pub fn validate(
        &self,
        mut clusters: Vec<IsoformCluster>,
    ) -> (Vec<IsoformCluster>, ValidationStats) {
        let mut stats = ValidationStats {
            activated: true,
            ..Default::default()
        };
        for c in clusters.iter_mut() {
            let flags = self.validate_one(c);
            stats.tss_valid += flags.tss_valid as usize;
            stats.tes_valid += flags.tes_valid as usize;
            stats.junctions_total += flags.junctions_valid.len();
            stats.junctions_valid += flags.junctions_valid.iter().filter(|&&v| v).count();
            if flags.fully_validated() {
                stats.fully_validated += 1;
            } else {
                stats.not_fully_validated += 1;
            }
            c.validation = ValidationStatus::Validated(flags);
        }
        info!(
            "Validated {} isoforms: {} fully validated, TSS {}, TES {}, junctions {}/{}",
            clusters.len(),
            stats.fully_validated,
            stats.tss_valid,
            stats.tes_valid,
            stats.junctions_valid,
            stats.junctions_total
        );
        (clusters, stats)
    }

    ///////////////////////////////
    /// Used when any evidence source is missing.
    /// Clusters are marked as not validated, never as invalid
    pub fn skip(mut clusters: Vec<IsoformCluster>) -> (Vec<IsoformCluster>, ValidationStats) {
        for c in clusters.iter_mut() {
            c.validation = ValidationStatus::NotValidated;
        }
        let stats = ValidationStats {
            not_validated: clusters.len(),
            ..Default::default()
        };
        (clusters, stats)
    }
}
