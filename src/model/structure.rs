use std::fmt;

///////////////////////////////
/// One aligned or annotated exon block, 0-based half-open
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Exon {
    pub start: i64,
    pub end: i64,
}
impl Exon {
    pub fn new(start: i64, end: i64) -> Exon {
        Exon { start, end }
    }

    pub fn len(&self) -> i64 {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Exon) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Strand {
    Forward,
    Reverse,
    Unknown,
}
impl Strand {
    pub fn from_char(c: char) -> Strand {
        match c {
            '+' => Strand::Forward,
            '-' => Strand::Reverse,
            _ => Strand::Unknown,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
            Strand::Unknown => '.',
        }
    }

    /// Unknown strands are compatible with anything
    pub fn compatible(&self, other: &Strand) -> bool {
        *self == Strand::Unknown || *other == Strand::Unknown || self == other
    }
}
impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// An intron, given by the last exonic position before it (exclusive end of the
/// donor exon) and the first exonic position after it
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Junction {
    pub chrom: String,
    pub donor: i64,
    pub acceptor: i64,
}
impl Junction {
    pub fn new(chrom: &str, donor: i64, acceptor: i64) -> Junction {
        Junction {
            chrom: normalize_chrom(chrom).to_string(),
            donor,
            acceptor,
        }
    }
}

///////////////////////////////
/// Evidence files are often produced without the "chr" prefix, so compare names without it
pub fn normalize_chrom(name: &str) -> &str {
    name.strip_prefix("chr").unwrap_or(name)
}

///////////////////////////////
/// Blocks must be non-empty, sorted and non-overlapping
pub fn is_well_formed(exons: &[Exon]) -> bool {
    if exons.is_empty() {
        return false;
    }
    if exons.iter().any(|e| e.start >= e.end || e.start < 0) {
        return false;
    }
    exons.windows(2).all(|w| w[0].end <= w[1].start)
}

///////////////////////////////
/// Every boundary within delta, exon count identical
pub fn matches_strict(a: &[Exon], b: &[Exon], delta: i64) -> bool {
    a.len() == b.len()
        && a.iter().zip(b.iter()).all(|(x, y)| {
            (x.start - y.start).abs() <= delta && (x.end - y.end).abs() <= delta
        })
}

///////////////////////////////
/// Internal boundaries within delta; the outermost start and end only need the
/// terminal exons to overlap, to absorb soft-clipping and 5'/3' degradation
pub fn matches_relaxed_termini(a: &[Exon], b: &[Exon], delta: i64) -> bool {
    if a.len() != b.len() || a.is_empty() {
        return false;
    }
    let last = a.len() - 1;
    if !a[0].overlaps(&b[0]) || !a[last].overlaps(&b[last]) {
        return false;
    }
    let donors_ok = a[..last]
        .iter()
        .zip(b[..last].iter())
        .all(|(x, y)| (x.end - y.end).abs() <= delta);
    let acceptors_ok = a[1..]
        .iter()
        .zip(b[1..].iter())
        .all(|(x, y)| (x.start - y.start).abs() <= delta);
    donors_ok && acceptors_ok
}

///////////////////////////////
/// Sum of absolute boundary differences; only meaningful for equal exon counts
pub fn boundary_distance(a: &[Exon], b: &[Exon]) -> i64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x.start - y.start).abs() + (x.end - y.end).abs())
        .sum()
}

/// (donor, acceptor) pair of every intron
pub fn introns(exons: &[Exon]) -> impl Iterator<Item = (i64, i64)> + '_ {
    exons.windows(2).map(|w| (w[0].end, w[1].start))
}

pub fn donors(exons: &[Exon]) -> impl Iterator<Item = i64> + '_ {
    exons.iter().take(exons.len().saturating_sub(1)).map(|e| e.end)
}

pub fn acceptors(exons: &[Exon]) -> impl Iterator<Item = i64> + '_ {
    exons.iter().skip(1).map(|e| e.start)
}

/// "100-200,300-400"
pub fn format_structure(exons: &[Exon]) -> String {
    exons
        .iter()
        .map(|e| format!("{}-{}", e.start, e.end))
        .collect::<Vec<_>>()
        .join(",")
}
