use crate::fileformat::GeneModel;
use crate::fileformat::Transcript;
use crate::model::acceptors;
use crate::model::donors;
use crate::model::Exon;
use crate::model::IsoformClass;
use crate::model::IsoformCluster;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassifyStats {
    pub known: usize,
    pub novel: usize,
    pub novel_new_splice_site: usize,
    pub novel_altered_terminus: usize,
}

///////////////////////////////
/// Labels clusters as known or novel against the reference model. Every cluster gets a label
pub struct Classifier {
    delta: i64,
}
impl Classifier {
    pub fn new(delta: i64) -> Classifier {
        Classifier { delta }
    }

    pub fn classify_structure(
        &self,
        model: &GeneModel,
        gene: &str,
        chrom: &str,
        exons: &[Exon],
    ) -> IsoformClass {
        if let Some(t) = model.lookup_transcript(gene, chrom, exons, self.delta) {
            return IsoformClass::KnownIsoform(t.id.clone());
        }

        match model.closest_transcript(gene, chrom, exons, self.delta) {
            Some(t) => IsoformClass::NovelIsoform {
                closest_transcript: Some(t.id.clone()),
                has_new_splice_site: has_new_splice_site(exons, t, self.delta),
                has_altered_terminus: has_altered_terminus(exons, t, self.delta),
            },
            //Unannotated here: every junction is new and there is no terminus to compare with
            None => IsoformClass::NovelIsoform {
                closest_transcript: None,
                has_new_splice_site: exons.len() > 1,
                has_altered_terminus: false,
            },
        }
    }

    pub fn classify(
        &self,
        model: &GeneModel,
        mut clusters: Vec<IsoformCluster>,
    ) -> (Vec<IsoformCluster>, ClassifyStats) {
        let mut stats = ClassifyStats::default();
        for c in clusters.iter_mut() {
            let class = self.classify_structure(model, &c.gene, &c.chrom, &c.exons);
            match &class {
                IsoformClass::KnownIsoform(_) => stats.known += 1,
                IsoformClass::NovelIsoform {
                    has_new_splice_site,
                    has_altered_terminus,
                    ..
                } => {
                    stats.novel += 1;
                    if *has_new_splice_site {
                        stats.novel_new_splice_site += 1;
                    }
                    if *has_altered_terminus {
                        stats.novel_altered_terminus += 1;
                    }
                }
            }
            c.class = Some(class);
        }
        (clusters, stats)
    }
}

/// Any donor or acceptor not within delta of a reference donor or acceptor
fn has_new_splice_site(exons: &[Exon], t: &Transcript, delta: i64) -> bool {
    let ref_donors: Vec<i64> = donors(&t.exons).collect();
    let ref_acceptors: Vec<i64> = acceptors(&t.exons).collect();
    let known = |site: i64, sites: &[i64]| sites.iter().any(|s| (site - s).abs() <= delta);
    donors(exons).any(|d| !known(d, &ref_donors))
        || acceptors(exons).any(|a| !known(a, &ref_acceptors))
}

fn has_altered_terminus(exons: &[Exon], t: &Transcript, delta: i64) -> bool {
    match (exons.first(), exons.last()) {
        (Some(first), Some(last)) => {
            (first.start - t.start()).abs() > delta || (last.end - t.end()).abs() > delta
        }
        _ => false,
    }
}
