use super::Exon;
use super::Strand;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IsoformClass {
    /// Same structure as an annotated transcript
    KnownIsoform(String),

    /// No annotated transcript matches. Flags are relative to the closest one
    NovelIsoform {
        closest_transcript: Option<String>,
        has_new_splice_site: bool,
        has_altered_terminus: bool,
    },
}
impl IsoformClass {
    pub fn is_known(&self) -> bool {
        matches!(self, IsoformClass::KnownIsoform(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            IsoformClass::KnownIsoform(_) => "known",
            IsoformClass::NovelIsoform { .. } => "novel",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationFlags {
    pub tss_valid: bool,
    pub tes_valid: bool,
    /// One entry per intron, in genomic order
    pub junctions_valid: Vec<bool>,
}
impl ValidationFlags {
    pub fn all_junctions_valid(&self) -> bool {
        self.junctions_valid.iter().all(|&v| v)
    }

    pub fn fully_validated(&self) -> bool {
        self.tss_valid && self.tes_valid && self.all_junctions_valid()
    }
}

///////////////////////////////
/// Not validated is distinct from failing validation: it means no evidence was available
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum ValidationStatus {
    #[default]
    NotValidated,
    Validated(ValidationFlags),
}
impl ValidationStatus {
    pub fn fully_validated(&self) -> bool {
        match self {
            ValidationStatus::NotValidated => false,
            ValidationStatus::Validated(flags) => flags.fully_validated(),
        }
    }

    pub fn flags(&self) -> Option<&ValidationFlags> {
        match self {
            ValidationStatus::NotValidated => None,
            ValidationStatus::Validated(flags) => Some(flags),
        }
    }
}

///////////////////////////////
/// Molecules of one gene sharing an exon structure within tolerance
#[derive(Clone, Debug)]
pub struct IsoformCluster {
    pub id: String,
    pub gene: String,
    pub chrom: String,
    pub strand: Strand,

    /// Representative structure; set when the cluster is created, never reassigned
    pub exons: Vec<Exon>,

    /// Reference transcript the cluster was seeded from, if any
    pub seed_transcript: Option<String>,

    /// Indices into the molecule set the cluster was built from
    pub members: Vec<usize>,
    pub nb_reads: u64,
    pub tagged_reads: i64,

    pub class: Option<IsoformClass>,
    pub validation: ValidationStatus,
}
impl IsoformCluster {
    pub fn support(&self) -> usize {
        self.members.len()
    }

    pub fn start(&self) -> i64 {
        self.exons.first().map(|e| e.start).unwrap_or(0)
    }

    pub fn end(&self) -> i64 {
        self.exons.last().map(|e| e.end).unwrap_or(0)
    }

    /// Transcription start site: first base on the forward strand, last base on the reverse
    pub fn five_prime(&self) -> i64 {
        match self.strand {
            Strand::Reverse => self.end() - 1,
            _ => self.start(),
        }
    }

    pub fn three_prime(&self) -> i64 {
        match self.strand {
            Strand::Reverse => self.start(),
            _ => self.end() - 1,
        }
    }

    pub fn is_known(&self) -> bool {
        self.class.as_ref().map(|c| c.is_known()).unwrap_or(false)
    }
}
