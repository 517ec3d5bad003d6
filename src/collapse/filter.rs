use crate::fileformat::GeneModel;
use crate::model::IsoformCluster;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub clusters_kept: usize,
    pub clusters_dropped: usize,
}

///////////////////////////////
/// Drops novel clusters with too few molecules. Clusters matching a reference
/// transcript are always kept, whatever their support
pub struct EvidenceFilter {
    min_evidence: usize,
    delta: i64,
}
impl EvidenceFilter {
    pub fn new(min_evidence: usize, delta: i64) -> EvidenceFilter {
        EvidenceFilter {
            min_evidence,
            delta,
        }
    }

    pub fn is_reference_matched(&self, model: &GeneModel, cluster: &IsoformCluster) -> bool {
        model
            .lookup_transcript(&cluster.gene, &cluster.chrom, &cluster.exons, self.delta)
            .is_some()
    }

    pub fn apply(
        &self,
        model: &GeneModel,
        clusters: Vec<IsoformCluster>,
    ) -> (Vec<IsoformCluster>, FilterStats) {
        let mut stats = FilterStats::default();
        let kept: Vec<IsoformCluster> = clusters
            .into_iter()
            .filter(|c| {
                let keep = self.is_reference_matched(model, c) || c.support() >= self.min_evidence;
                if !keep {
                    stats.clusters_dropped += 1;
                }
                keep
            })
            .collect();
        stats.clusters_kept = kept.len();
        (kept, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fileformat::Transcript;
    use crate::model::Exon;
    use crate::model::Strand;
    use crate::model::ValidationStatus;

    fn cluster(id: &str, exons: &[(i64, i64)], support: usize) -> IsoformCluster {
        IsoformCluster {
            id: id.to_string(),
            gene: "G1".to_string(),
            chrom: "1".to_string(),
            strand: Strand::Forward,
            exons: exons.iter().map(|&(s, e)| Exon::new(s, e)).collect(),
            seed_transcript: None,
            members: (0..support).collect(),
            nb_reads: 3 * support as u64,
            tagged_reads: 3 * support as i64,
            class: None,
            validation: ValidationStatus::NotValidated,
        }
    }

    #[test]
    fn novel_clusters_need_min_evidence() {
        let model = GeneModel::default();
        let filter = EvidenceFilter::new(2, 2);
        let (kept, stats) = filter.apply(
            &model,
            vec![
                cluster("a", &[(100, 200)], 1),
                cluster("b", &[(300, 400)], 2),
                cluster("c", &[(500, 600)], 5),
            ],
        );
        let ids: Vec<&str> = kept.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(stats.clusters_dropped, 1);
        assert_eq!(stats.clusters_kept, 2);
    }

    #[test]
    fn reference_clusters_are_never_dropped() {
        let model = GeneModel::from_transcripts(vec![Transcript {
            gene: "G1".to_string(),
            id: "T1".to_string(),
            chrom: "1".to_string(),
            strand: Strand::Forward,
            cds_start: 100,
            cds_end: 400,
            exons: vec![Exon::new(100, 200), Exon::new(300, 400)],
        }]);
        let filter = EvidenceFilter::new(2, 2);
        let (kept, stats) = filter.apply(
            &model,
            vec![
                cluster("T1", &[(100, 200), (300, 400)], 1),
                cluster("G1.novel1", &[(100, 250), (300, 400)], 1),
            ],
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "T1");
        assert_eq!(stats.clusters_dropped, 1);

        //Same gene name and structure, other chromosome: no reference protection
        let mut elsewhere = cluster("G1.novel2", &[(100, 200), (300, 400)], 1);
        elsewhere.chrom = "chrY".to_string();
        assert!(!filter.is_reference_matched(&model, &elsewhere));
        let (kept, _) = filter.apply(&model, vec![elsewhere]);
        assert!(kept.is_empty());
    }
}
