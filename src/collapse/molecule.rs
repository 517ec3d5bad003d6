use std::collections::HashMap;

use crate::fileformat::CellList;
use crate::model::is_well_formed;
use crate::model::Exon;
use crate::model::Molecule;
use crate::model::MoleculeKey;
use crate::model::ReadRecord;
use crate::model::Strand;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MoleculeStats {
    pub reads_seen: u64,
    pub reads_rejected_cell: u64,
    pub reads_malformed: u64,
    pub keys_seen: u64,
    pub molecules_built: u64,
    pub molecules_dropped: u64,
}

/// One distinct structure observed for a key, in order of first appearance.
/// Strand is not part of the structure: reads of one cDNA map to either strand
struct StructureVote {
    chrom: String,
    exons: Vec<Exon>,
    isoform: String,
    count: u32,
    first_strand: Strand,
    forward: u32,
    reverse: u32,
    sequence: Option<Vec<u8>>,
}
impl StructureVote {
    /// Majority strand among the reads with this structure; ties keep the first read's
    fn strand(&self) -> Strand {
        match self.forward.cmp(&self.reverse) {
            std::cmp::Ordering::Greater => Strand::Forward,
            std::cmp::Ordering::Less => Strand::Reverse,
            std::cmp::Ordering::Equal => self.first_strand,
        }
    }
}

#[derive(Default)]
struct MoleculeAccumulator {
    votes: Vec<StructureVote>,
    nb_reads: u32,
    tagged_reads: i64,
}
impl MoleculeAccumulator {
    fn add(&mut self, read: ReadRecord) {
        self.nb_reads += 1;
        self.tagged_reads += read.read_count;

        let idx = match self
            .votes
            .iter()
            .position(|v| v.exons == read.exons && v.chrom == read.chrom)
        {
            Some(idx) => idx,
            None => {
                self.votes.push(StructureVote {
                    chrom: read.chrom,
                    exons: read.exons,
                    isoform: read.isoform,
                    count: 0,
                    first_strand: read.strand,
                    forward: 0,
                    reverse: 0,
                    sequence: read.sequence,
                });
                self.votes.len() - 1
            }
        };
        let vote = &mut self.votes[idx];
        vote.count += 1;
        match read.strand {
            Strand::Forward => vote.forward += 1,
            Strand::Reverse => vote.reverse += 1,
            Strand::Unknown => {}
        }
    }

    /// Most frequent structure; on ties, the one seen first
    fn winner(self) -> Option<StructureVote> {
        let mut best: Option<StructureVote> = None;
        for v in self.votes {
            let better = match &best {
                None => true,
                Some(b) => v.count > b.count,
            };
            if better {
                best = Some(v);
            }
        }
        best
    }
}

///////////////////////////////
/// Online aggregation of reads into molecules, keyed by (cell, UMI, gene).
/// Memory is bounded by the number of distinct keys, not reads
pub struct MoleculeBuilder<'a> {
    cells: &'a CellList,
    rnmin: u32,
    groups: HashMap<MoleculeKey, MoleculeAccumulator>,
    stats: MoleculeStats,
}
impl<'a> MoleculeBuilder<'a> {
    pub fn new(cells: &'a CellList, rnmin: u32) -> MoleculeBuilder<'a> {
        MoleculeBuilder {
            cells,
            rnmin,
            groups: HashMap::new(),
            stats: MoleculeStats::default(),
        }
    }

    /// Returns false if the read was rejected
    pub fn add(&mut self, read: ReadRecord) -> bool {
        self.stats.reads_seen += 1;

        if !self.cells.contains(&read.cell) {
            self.stats.reads_rejected_cell += 1;
            return false;
        }
        if read.umi.is_empty() || read.gene.is_empty() || !is_well_formed(&read.exons) {
            self.stats.reads_malformed += 1;
            return false;
        }

        let key = MoleculeKey::new(&read.cell, &read.umi, &read.gene);
        self.groups.entry(key).or_default().add(read);
        true
    }

    pub fn stats(&self) -> &MoleculeStats {
        &self.stats
    }

    ///////////////////////////////
    /// Emit molecules with at least RNMIN reads, sorted by gene, position, structure, cell and UMI.
    /// Reads are counted from the RN tag of each record, so a record may stand for a whole UMI
    pub fn finish(self) -> (Vec<Molecule>, MoleculeStats) {
        let mut stats = self.stats;
        stats.keys_seen = self.groups.len() as u64;

        let mut molecules = Vec::new();
        for (key, acc) in self.groups {
            if acc.tagged_reads < self.rnmin as i64 {
                stats.molecules_dropped += 1;
                continue;
            }
            let nb_reads = acc.nb_reads;
            let tagged_reads = acc.tagged_reads;
            if let Some(v) = acc.winner() {
                molecules.push(Molecule {
                    key,
                    strand: v.strand(),
                    chrom: v.chrom,
                    exons: v.exons,
                    isoform: v.isoform,
                    nb_reads,
                    tagged_reads,
                    sequence: v.sequence,
                });
            }
        }
        stats.molecules_built = molecules.len() as u64;

        molecules.sort_by(|a, b| {
            (&a.key.gene, &a.chrom, &a.exons, &a.key.cell, &a.key.umi).cmp(&(
                &b.key.gene,
                &b.chrom,
                &b.exons,
                &b.key.cell,
                &b.key.umi,
            ))
        });
        (molecules, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(cell: &str, umi: &str, gene: &str, exons: &[(i64, i64)]) -> ReadRecord {
        ReadRecord {
            name: format!("{}_{}", cell, umi),
            chrom: "1".to_string(),
            strand: Strand::Forward,
            exons: exons.iter().map(|&(s, e)| Exon::new(s, e)).collect(),
            cell: cell.to_string(),
            umi: umi.to_string(),
            gene: gene.to_string(),
            isoform: "undef".to_string(),
            read_count: 1,
            sequence: None,
        }
    }

    #[test]
    fn five_identical_reads_make_one_molecule() {
        let cells = CellList::new(["C1"]);
        let mut builder = MoleculeBuilder::new(&cells, 3);
        for _ in 0..5 {
            assert!(builder.add(read("C1", "U1", "G1", &[(100, 200), (300, 400)])));
        }
        let (molecules, stats) = builder.finish();
        assert_eq!(molecules.len(), 1);
        assert_eq!(molecules[0].nb_reads, 5);
        assert_eq!(molecules[0].exons, vec![Exon::new(100, 200), Exon::new(300, 400)]);
        assert_eq!(stats.molecules_built, 1);
        assert_eq!(stats.molecules_dropped, 0);
    }

    #[test]
    fn read_gate_is_inclusive() {
        let cells = CellList::new(["C1"]);
        let mut builder = MoleculeBuilder::new(&cells, 3);
        for _ in 0..2 {
            builder.add(read("C1", "U1", "G1", &[(100, 200)]));
        }
        for _ in 0..3 {
            builder.add(read("C1", "U2", "G1", &[(100, 200)]));
        }
        let (molecules, stats) = builder.finish();
        assert_eq!(molecules.len(), 1);
        assert_eq!(molecules[0].key.umi, "U2");
        assert_eq!(stats.molecules_dropped, 1);
        assert_eq!(stats.keys_seen, 2);
    }

    #[test]
    fn reads_outside_whitelist_are_counted() {
        let cells = CellList::new(["C1"]);
        let mut builder = MoleculeBuilder::new(&cells, 1);
        assert!(!builder.add(read("C2", "U1", "G1", &[(100, 200)])));
        assert!(!builder.add(read("C1", "U1", "G1", &[(300, 200)])));
        assert!(builder.add(read("C1", "U1", "G1", &[(100, 200)])));
        assert_eq!(builder.stats().reads_rejected_cell, 1);
        assert_eq!(builder.stats().reads_malformed, 1);
        assert_eq!(builder.stats().reads_seen, 3);
    }

    #[test]
    fn majority_structure_wins_with_first_seen_tiebreak() {
        let cells = CellList::new(["C1"]);
        let mut builder = MoleculeBuilder::new(&cells, 1);
        builder.add(read("C1", "U1", "G1", &[(100, 200), (300, 400)]));
        builder.add(read("C1", "U1", "G1", &[(90, 200), (300, 400)]));
        builder.add(read("C1", "U1", "G1", &[(90, 200), (300, 400)]));

        //Tie between two structures: the earlier one is kept
        builder.add(read("C1", "U2", "G1", &[(110, 200)]));
        builder.add(read("C1", "U2", "G1", &[(100, 200)]));

        let (molecules, _) = builder.finish();
        let by_umi = |umi: &str| molecules.iter().find(|m| m.key.umi == umi).unwrap();
        assert_eq!(by_umi("U1").exons[0], Exon::new(90, 200));
        assert_eq!(by_umi("U1").nb_reads, 3);
        assert_eq!(by_umi("U2").exons, vec![Exon::new(110, 200)]);
    }

    #[test]
    fn strand_does_not_split_the_vote() {
        let cells = CellList::new(["C1"]);
        let mut builder = MoleculeBuilder::new(&cells, 1);
        let a = [(100, 200), (300, 400)];
        let b = [(100, 200), (350, 400)];
        for strand in [Strand::Forward, Strand::Forward, Strand::Reverse, Strand::Reverse] {
            let mut r = read("C1", "U1", "G1", &a);
            r.strand = strand;
            builder.add(r);
        }
        for _ in 0..3 {
            builder.add(read("C1", "U1", "G1", &b));
        }
        let (molecules, _) = builder.finish();
        assert_eq!(molecules.len(), 1);
        assert_eq!(molecules[0].exons, vec![Exon::new(100, 200), Exon::new(300, 400)]);
        //Strand tie among the winning reads: the first one decides
        assert_eq!(molecules[0].strand, Strand::Forward);
        assert_eq!(molecules[0].nb_reads, 7);
    }

    #[test]
    fn strand_follows_the_winning_reads() {
        let cells = CellList::new(["C1"]);
        let mut builder = MoleculeBuilder::new(&cells, 1);
        for strand in [Strand::Forward, Strand::Reverse, Strand::Reverse] {
            let mut r = read("C1", "U1", "G1", &[(100, 200)]);
            r.strand = strand;
            builder.add(r);
        }
        let (molecules, _) = builder.finish();
        assert_eq!(molecules[0].strand, Strand::Reverse);
    }

    #[test]
    fn read_gate_uses_read_count_tag() {
        let cells = CellList::new(["C1"]);
        let mut builder = MoleculeBuilder::new(&cells, 3);

        //One record per UMI, carrying its read count
        let mut r = read("C1", "U1", "G1", &[(100, 200)]);
        r.read_count = 5;
        builder.add(r);
        let mut r = read("C1", "U2", "G1", &[(100, 200)]);
        r.read_count = 2;
        builder.add(r);

        let (molecules, stats) = builder.finish();
        assert_eq!(molecules.len(), 1);
        assert_eq!(molecules[0].key.umi, "U1");
        assert_eq!(molecules[0].nb_reads, 1);
        assert_eq!(molecules[0].tagged_reads, 5);
        assert_eq!(stats.molecules_dropped, 1);
    }

    #[test]
    fn same_umi_in_two_genes_is_two_molecules() {
        let cells = CellList::new(["C1"]);
        let mut builder = MoleculeBuilder::new(&cells, 1);
        builder.add(read("C1", "U1", "G1", &[(100, 200)]));
        builder.add(read("C1", "U1", "G2", &[(5000, 5200)]));
        let (molecules, _) = builder.finish();
        assert_eq!(molecules.len(), 2);
        assert_eq!(molecules[0].key.gene, "G1");
        assert_eq!(molecules[1].key.gene, "G2");
    }
}
