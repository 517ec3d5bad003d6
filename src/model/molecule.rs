use super::Exon;
use super::Strand;

///////////////////////////////
/// One long read as delivered by the alignment source, after tag extraction
#[derive(Clone, Debug)]
pub struct ReadRecord {
    pub name: String,
    pub chrom: String,
    pub strand: Strand,
    pub exons: Vec<Exon>,

    pub cell: String,
    pub umi: String,
    pub gene: String,
    pub isoform: String,
    /// Reads behind this record, from the RN tag; 1 when absent
    pub read_count: i64,

    /// Only kept when consensus calling is enabled
    pub sequence: Option<Vec<u8>>,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MoleculeKey {
    pub cell: String,
    pub umi: String,
    pub gene: String,
}
impl MoleculeKey {
    pub fn new(cell: &str, umi: &str, gene: &str) -> MoleculeKey {
        MoleculeKey {
            cell: cell.to_string(),
            umi: umi.to_string(),
            gene: gene.to_string(),
        }
    }
}

///////////////////////////////
/// Reads of one (cell, UMI, gene) merged into a single structure
#[derive(Clone, Debug)]
pub struct Molecule {
    pub key: MoleculeKey,
    pub chrom: String,
    pub strand: Strand,
    pub exons: Vec<Exon>,

    /// Provisional isoform label of the first read carrying the winning structure
    pub isoform: String,

    /// Records supporting this molecule, whatever their structure
    pub nb_reads: u32,
    /// Sum of RN tags over those records. This is the read count RNMIN applies to
    pub tagged_reads: i64,

    pub sequence: Option<Vec<u8>>,
}
impl Molecule {
    pub fn start(&self) -> i64 {
        self.exons.first().map(|e| e.start).unwrap_or(0)
    }

    pub fn end(&self) -> i64 {
        self.exons.last().map(|e| e.end).unwrap_or(0)
    }
}
