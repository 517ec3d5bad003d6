use std::collections::BTreeMap;

use log::debug;

use crate::fileformat::GeneModel;
use crate::model::matches_strict;
use crate::model::normalize_chrom;
use crate::model::IsoformCluster;
use crate::model::Molecule;
use crate::model::ValidationStatus;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClusterStats {
    pub genes: usize,
    pub clusters_formed: usize,
    pub clusters_reference: usize,
    pub clusters_novel: usize,
}

///////////////////////////////
/// Greedy clustering of molecules into isoforms, one gene at a time. Each gene starts
/// with its reference transcripts as seed clusters; unmatched molecules found novel ones
pub struct IsoformClusterer {
    delta: i64,
}
impl IsoformClusterer {
    pub fn new(delta: i64) -> IsoformClusterer {
        IsoformClusterer { delta }
    }

    ///////////////////////////////
    /// Cluster all molecules. Molecules are visited in a canonical order, so the result
    /// does not depend on the order of the input slice
    pub fn cluster(
        &self,
        model: &GeneModel,
        molecules: &[Molecule],
    ) -> (Vec<IsoformCluster>, ClusterStats) {
        //Canonical order: gene, chromosome, structure, then cell and UMI
        let mut by_gene: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, m) in molecules.iter().enumerate() {
            by_gene.entry(m.key.gene.as_str()).or_default().push(i);
        }

        let mut stats = ClusterStats {
            genes: by_gene.len(),
            ..Default::default()
        };
        let mut clusters = Vec::new();
        for (gene, mut order) in by_gene {
            order.sort_by(|&a, &b| {
                let (a, b) = (&molecules[a], &molecules[b]);
                (&a.chrom, &a.exons, &a.key.cell, &a.key.umi)
                    .cmp(&(&b.chrom, &b.exons, &b.key.cell, &b.key.umi))
            });
            let gene_clusters = self.cluster_gene(model, gene, molecules, &order);
            for c in &gene_clusters {
                if c.seed_transcript.is_some() {
                    stats.clusters_reference += 1;
                } else {
                    stats.clusters_novel += 1;
                }
            }
            clusters.extend(gene_clusters);
        }
        stats.clusters_formed = clusters.len();

        debug!(
            "Formed {} clusters ({} reference, {} novel) over {} genes",
            stats.clusters_formed, stats.clusters_reference, stats.clusters_novel, stats.genes
        );
        (clusters, stats)
    }

    fn cluster_gene(
        &self,
        model: &GeneModel,
        gene: &str,
        molecules: &[Molecule],
        order: &[usize],
    ) -> Vec<IsoformCluster> {
        let gene_strand = model.strand_for_gene(gene);

        //Seeds, one per reference transcript
        let mut seeds: Vec<IsoformCluster> = model
            .transcripts_for_gene(gene)
            .iter()
            .map(|t| IsoformCluster {
                id: t.id.clone(),
                gene: gene.to_string(),
                chrom: t.chrom.clone(),
                strand: t.strand,
                exons: t.exons.clone(),
                seed_transcript: Some(t.id.clone()),
                members: Vec::new(),
                nb_reads: 0,
                tagged_reads: 0,
                class: None,
                validation: ValidationStatus::NotValidated,
            })
            .collect();
        let mut novel: Vec<IsoformCluster> = Vec::new();

        for &idx in order {
            let m = &molecules[idx];

            let seed = model
                .lookup_transcript(gene, &m.chrom, &m.exons, self.delta)
                .and_then(|t| {
                    seeds.iter().position(|s| {
                        s.seed_transcript.as_deref() == Some(t.id.as_str())
                            && normalize_chrom(&s.chrom) == normalize_chrom(&m.chrom)
                    })
                });
            if let Some(pos) = seed {
                attach(&mut seeds[pos], idx, m);
                continue;
            }

            let existing = novel.iter_mut().find(|c| {
                c.chrom == m.chrom && matches_strict(&c.exons, &m.exons, self.delta)
            });
            match existing {
                Some(cluster) => attach(cluster, idx, m),
                None => {
                    let mut cluster = IsoformCluster {
                        id: format!("{}.novel{}", gene, novel.len() + 1),
                        gene: gene.to_string(),
                        chrom: m.chrom.clone(),
                        strand: gene_strand.unwrap_or(m.strand),
                        exons: m.exons.clone(),
                        seed_transcript: None,
                        members: Vec::new(),
                        nb_reads: 0,
                        tagged_reads: 0,
                        class: None,
                        validation: ValidationStatus::NotValidated,
                    };
                    attach(&mut cluster, idx, m);
                    novel.push(cluster);
                }
            }
        }

        //Reference transcripts without any molecule are not part of the output
        seeds.retain(|s| !s.members.is_empty());
        seeds.extend(novel);
        seeds
    }
}

/// The representative is left untouched
fn attach(cluster: &mut IsoformCluster, idx: usize, m: &Molecule) {
    cluster.members.push(idx);
    cluster.nb_reads += m.nb_reads as u64;
    cluster.tagged_reads += m.tagged_reads;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fileformat::Transcript;
    use crate::model::Exon;
    use crate::model::MoleculeKey;
    use crate::model::Strand;

    fn molecule(cell: &str, umi: &str, gene: &str, exons: &[(i64, i64)]) -> Molecule {
        Molecule {
            key: MoleculeKey::new(cell, umi, gene),
            chrom: "1".to_string(),
            strand: Strand::Forward,
            exons: exons.iter().map(|&(s, e)| Exon::new(s, e)).collect(),
            isoform: "undef".to_string(),
            nb_reads: 3,
            tagged_reads: 3,
            sequence: None,
        }
    }

    fn member_keys(
        clusters: &[IsoformCluster],
        molecules: &[Molecule],
    ) -> Vec<(String, Vec<MoleculeKey>)> {
        let mut out: Vec<(String, Vec<MoleculeKey>)> = clusters
            .iter()
            .map(|c| {
                let mut keys: Vec<MoleculeKey> =
                    c.members.iter().map(|&i| molecules[i].key.clone()).collect();
                keys.sort();
                (c.id.clone(), keys)
            })
            .collect();
        out.sort();
        out
    }

    #[test]
    fn delta_is_the_largest_allowed_shift() {
        let model = GeneModel::default();
        let clusterer = IsoformClusterer::new(2);

        let molecules = vec![
            molecule("C1", "U1", "G1", &[(100, 200), (300, 400)]),
            molecule("C1", "U2", "G1", &[(102, 202), (302, 402)]),
        ];
        let (clusters, _) = clusterer.cluster(&model, &molecules);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].support(), 2);

        let molecules = vec![
            molecule("C1", "U1", "G1", &[(100, 200), (300, 400)]),
            molecule("C1", "U2", "G1", &[(100, 200), (300, 403)]),
        ];
        let (clusters, stats) = clusterer.cluster(&model, &molecules);
        assert_eq!(clusters.len(), 2);
        assert_eq!(stats.clusters_novel, 2);
    }

    #[test]
    fn representative_does_not_drift() {
        let model = GeneModel::default();
        let clusterer = IsoformClusterer::new(2);
        //Each molecule is within 2 of its neighbour, but the third is 4 away from the first
        let molecules = vec![
            molecule("C1", "U1", "G1", &[(100, 200)]),
            molecule("C1", "U2", "G1", &[(102, 202)]),
            molecule("C1", "U3", "G1", &[(104, 204)]),
        ];
        let (clusters, _) = clusterer.cluster(&model, &molecules);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].exons, vec![Exon::new(100, 200)]);
        assert_eq!(clusters[0].support(), 2);
        assert_eq!(clusters[1].exons, vec![Exon::new(104, 204)]);
    }

    #[test]
    fn input_order_does_not_change_clusters() {
        let model = GeneModel::default();
        let clusterer = IsoformClusterer::new(2);
        let molecules = vec![
            molecule("C1", "U1", "G1", &[(100, 200)]),
            molecule("C2", "U2", "G1", &[(102, 202)]),
            molecule("C1", "U3", "G1", &[(104, 204)]),
            molecule("C3", "U4", "G2", &[(5000, 5100), (5200, 5300)]),
            molecule("C1", "U5", "G1", &[(103, 203)]),
        ];
        let (a, _) = clusterer.cluster(&model, &molecules);

        let mut reversed = molecules.clone();
        reversed.reverse();
        let (b, _) = clusterer.cluster(&model, &reversed);

        assert_eq!(member_keys(&a, &molecules), member_keys(&b, &reversed));
        let reps_a: Vec<_> = a.iter().map(|c| (c.id.clone(), c.exons.clone())).collect();
        let reps_b: Vec<_> = b.iter().map(|c| (c.id.clone(), c.exons.clone())).collect();
        assert_eq!(reps_a, reps_b);
    }

    #[test]
    fn molecules_join_reference_seeds_first() {
        let model = GeneModel::from_transcripts(vec![
            Transcript {
                gene: "G1".to_string(),
                id: "T1".to_string(),
                chrom: "chr1".to_string(),
                strand: Strand::Reverse,
                cds_start: 100,
                cds_end: 400,
                exons: vec![Exon::new(100, 200), Exon::new(300, 400)],
            },
            Transcript {
                gene: "G1".to_string(),
                id: "T2".to_string(),
                chrom: "chr1".to_string(),
                strand: Strand::Reverse,
                cds_start: 100,
                cds_end: 600,
                exons: vec![Exon::new(100, 200), Exon::new(500, 600)],
            },
        ]);
        let clusterer = IsoformClusterer::new(2);
        let molecules = vec![
            //Truncated 5' end, still the reference junction
            molecule("C1", "U1", "G1", &[(150, 200), (300, 380)]),
            molecule("C1", "U2", "G1", &[(100, 200), (300, 400)]),
            molecule("C1", "U3", "G1", &[(100, 210), (300, 400)]),
        ];
        let (clusters, stats) = clusterer.cluster(&model, &molecules);
        assert_eq!(stats.clusters_reference, 1);
        assert_eq!(stats.clusters_novel, 1);

        let t1 = clusters.iter().find(|c| c.id == "T1").unwrap();
        assert_eq!(t1.support(), 2);
        assert_eq!(t1.exons, vec![Exon::new(100, 200), Exon::new(300, 400)]);
        assert_eq!(t1.strand, Strand::Reverse);

        let novel = clusters.iter().find(|c| c.seed_transcript.is_none()).unwrap();
        assert_eq!(novel.id, "G1.novel1");
        assert_eq!(novel.strand, Strand::Reverse);
        //Unseen reference transcripts are dropped
        assert!(clusters.iter().all(|c| c.id != "T2"));
    }
}
