use std::collections::HashMap;
use std::path::Path;

use log::debug;
use log::info;
use log::warn;

use super::open_text;
use crate::model::acceptors;
use crate::model::boundary_distance;
use crate::model::donors;
use crate::model::is_well_formed;
use crate::model::matches_relaxed_termini;
use crate::model::normalize_chrom;
use crate::model::Exon;
use crate::model::Strand;
use crate::runtime::Error;

///////////////////////////////
/// One annotated transcript
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transcript {
    pub gene: String,
    pub id: String,
    pub chrom: String,
    pub strand: Strand,
    pub cds_start: i64,
    pub cds_end: i64,
    pub exons: Vec<Exon>,
}
impl Transcript {
    pub fn start(&self) -> i64 {
        self.exons.first().map(|e| e.start).unwrap_or(0)
    }

    pub fn end(&self) -> i64 {
        self.exons.last().map(|e| e.end).unwrap_or(0)
    }
}

///////////////////////////////
/// Transcripts of one gene, plus a sorted index over (exon count, first donor) used to
/// narrow candidates before the full boundary comparison
#[derive(Clone, Debug, Default)]
struct GeneEntry {
    transcripts: Vec<Transcript>,
    index: Vec<(usize, i64, usize)>,
}
impl GeneEntry {
    fn rebuild_index(&mut self) {
        self.index = self
            .transcripts
            .iter()
            .enumerate()
            .map(|(i, t)| (t.exons.len(), index_key(&t.exons), i))
            .collect();
        self.index.sort();
    }
}

/// Single-exon structures have no donor; they all share one bucket
fn index_key(exons: &[Exon]) -> i64 {
    if exons.len() > 1 {
        exons[0].end
    } else {
        0
    }
}

///////////////////////////////
/// Reference catalog: gene -> transcripts -> ordered exons. Read-only once loaded
#[derive(Clone, Debug, Default)]
pub struct GeneModel {
    genes: HashMap<String, GeneEntry>,
    num_transcripts: usize,
    malformed_rows: usize,
}
impl GeneModel {
    pub fn from_transcripts<I>(transcripts: I) -> GeneModel
    where
        I: IntoIterator<Item = Transcript>,
    {
        let mut genes: HashMap<String, GeneEntry> = HashMap::new();
        let mut num_transcripts = 0;
        for t in transcripts {
            num_transcripts += 1;
            genes.entry(t.gene.clone()).or_default().transcripts.push(t);
        }
        for entry in genes.values_mut() {
            entry.transcripts.sort_by(|a, b| a.id.cmp(&b.id));
            entry.rebuild_index();
        }
        GeneModel {
            genes,
            num_transcripts,
            malformed_rows: 0,
        }
    }

    /// Load a refFlat file. Malformed rows are skipped and counted
    pub fn load(path: &Path) -> anyhow::Result<GeneModel> {
        /*
        refFlat, 0-based half-open, comma-terminated exon lists:
        geneName  name  chrom  strand  txStart  txEnd  cdsStart  cdsEnd  exonCount  exonStarts  exonEnds
        */
        let reader = open_text(path)?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .comment(Some(b'#'))
            .from_reader(reader);

        let mut transcripts = Vec::new();
        let mut malformed_rows = 0;
        for (i, result) in reader.records().enumerate() {
            let record = match result {
                Ok(record) => record,
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => {
                    malformed_rows += 1;
                    debug!("Skipping unreadable gene model row: {}", e);
                    continue;
                }
            };
            let line = record.position().map(|p| p.line() as usize).unwrap_or(i + 1);
            match parse_refflat_row(&record, line) {
                Ok(t) => transcripts.push(t),
                Err(e) => {
                    malformed_rows += 1;
                    debug!("{}", e);
                }
            }
        }

        let mut model = GeneModel::from_transcripts(transcripts);
        model.malformed_rows = malformed_rows;
        if malformed_rows > 0 {
            warn!(
                "Skipped {} malformed rows in gene model {}",
                malformed_rows,
                path.display()
            );
        }
        info!(
            "Loaded {} transcripts for {} genes from {}",
            model.num_transcripts(),
            model.num_genes(),
            path.display()
        );
        Ok(model)
    }

    pub fn num_genes(&self) -> usize {
        self.genes.len()
    }

    pub fn num_transcripts(&self) -> usize {
        self.num_transcripts
    }

    pub fn malformed_rows(&self) -> usize {
        self.malformed_rows
    }

    pub fn transcripts_for_gene(&self, gene: &str) -> &[Transcript] {
        self.genes
            .get(gene)
            .map(|e| e.transcripts.as_slice())
            .unwrap_or(&[])
    }

    pub fn strand_for_gene(&self, gene: &str) -> Option<Strand> {
        self.transcripts_for_gene(gene).first().map(|t| t.strand)
    }

    ///////////////////////////////
    /// Transcript of the gene on the same chromosome, with the same exon count and every
    /// internal boundary within tolerance; terminal boundaries only need overlapping terminal
    /// exons. On several hits, the smallest total boundary distance wins, then the smallest id
    pub fn lookup_transcript(
        &self,
        gene: &str,
        chrom: &str,
        exons: &[Exon],
        tolerance: i64,
    ) -> Option<&Transcript> {
        let entry = self.genes.get(gene)?;
        if exons.is_empty() {
            return None;
        }
        let n = exons.len();
        let key = index_key(exons);
        let from = entry
            .index
            .partition_point(|&(cnt, k, _)| (cnt, k) < (n, key - tolerance));

        let mut best: Option<(&Transcript, i64)> = None;
        for &(cnt, k, idx) in &entry.index[from..] {
            if cnt != n || k > key + tolerance {
                break;
            }
            let t = &entry.transcripts[idx];
            if normalize_chrom(&t.chrom) != normalize_chrom(chrom)
                || !matches_relaxed_termini(exons, &t.exons, tolerance)
            {
                continue;
            }
            let dist = boundary_distance(exons, &t.exons);
            let better = match best {
                None => true,
                Some((b, bd)) => dist < bd || (dist == bd && t.id < b.id),
            };
            if better {
                best = Some((t, dist));
            }
        }
        best.map(|(t, _)| t)
    }

    ///////////////////////////////
    /// Transcript on the same chromosome sharing the most splice sites with the structure;
    /// ties broken by the smallest terminal distance, then the smallest id
    pub fn closest_transcript(
        &self,
        gene: &str,
        chrom: &str,
        exons: &[Exon],
        tolerance: i64,
    ) -> Option<&Transcript> {
        let first = exons.first()?;
        let last = exons.last()?;

        let mut best: Option<(&Transcript, usize, i64)> = None;
        let on_chrom = self
            .transcripts_for_gene(gene)
            .iter()
            .filter(|t| normalize_chrom(&t.chrom) == normalize_chrom(chrom));
        for t in on_chrom {
            let shared = shared_sites(donors(exons), donors(&t.exons), tolerance)
                + shared_sites(acceptors(exons), acceptors(&t.exons), tolerance);
            let terminal = (first.start - t.start()).abs() + (last.end - t.end()).abs();
            let better = match best {
                None => true,
                Some((b, bs, bt)) => {
                    shared > bs
                        || (shared == bs && (terminal < bt || (terminal == bt && t.id < b.id)))
                }
            };
            if better {
                best = Some((t, shared, terminal));
            }
        }
        best.map(|(t, _, _)| t)
    }
}

/// Number of sites in `query` lying within tolerance of some site in `reference`
fn shared_sites<A, B>(query: A, reference: B, tolerance: i64) -> usize
where
    A: Iterator<Item = i64>,
    B: Iterator<Item = i64>,
{
    let reference: Vec<i64> = reference.collect();
    query
        .filter(|q| reference.iter().any(|r| (q - r).abs() <= tolerance))
        .count()
}

///////////////////////////////
/// Parse one refFlat row into a transcript
pub fn parse_refflat_row(record: &csv::StringRecord, line: usize) -> Result<Transcript, Error> {
    if record.len() < 11 {
        return Err(Error::malformed_model(
            line,
            format!("expected 11 columns, found {}", record.len()),
        ));
    }
    let field = |i: usize| record.get(i).unwrap_or("").trim();
    let number = |i: usize, what: &str| -> Result<i64, Error> {
        field(i)
            .parse::<i64>()
            .map_err(|_| Error::malformed_model(line, format!("{} is not a number", what)))
    };

    let gene = field(0);
    let id = field(1);
    let chrom = field(2);
    if gene.is_empty() || id.is_empty() || chrom.is_empty() {
        return Err(Error::malformed_model(line, "missing gene, transcript or chromosome"));
    }
    let strand = Strand::from_char(field(3).chars().next().unwrap_or('.'));

    let cds_start = number(6, "cdsStart")?;
    let cds_end = number(7, "cdsEnd")?;
    let exon_count = number(8, "exonCount")?;
    let starts = parse_coordinate_list(field(9))
        .ok_or_else(|| Error::malformed_model(line, "bad exonStarts"))?;
    let ends = parse_coordinate_list(field(10))
        .ok_or_else(|| Error::malformed_model(line, "bad exonEnds"))?;

    if starts.len() != ends.len() || starts.len() as i64 != exon_count {
        return Err(Error::malformed_model(
            line,
            format!(
                "exonCount {} does not match {} starts and {} ends",
                exon_count,
                starts.len(),
                ends.len()
            ),
        ));
    }

    let exons: Vec<Exon> = starts
        .iter()
        .zip(ends.iter())
        .map(|(&s, &e)| Exon::new(s, e))
        .collect();
    if !is_well_formed(&exons) {
        return Err(Error::malformed_model(line, "exons are not monotonic"));
    }

    Ok(Transcript {
        gene: gene.to_string(),
        id: id.to_string(),
        chrom: chrom.to_string(),
        strand,
        cds_start,
        cds_end,
        exons,
    })
}

fn parse_coordinate_list(s: &str) -> Option<Vec<i64>> {
    s.split(',')
        .filter(|x| !x.trim().is_empty())
        .map(|x| x.trim().parse::<i64>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn transcript(gene: &str, id: &str, exons: &[(i64, i64)]) -> Transcript {
        Transcript {
            gene: gene.to_string(),
            id: id.to_string(),
            chrom: "1".to_string(),
            strand: Strand::Forward,
            cds_start: exons[0].0,
            cds_end: exons[exons.len() - 1].1,
            exons: exons.iter().map(|&(s, e)| Exon::new(s, e)).collect(),
        }
    }

    fn exons(v: &[(i64, i64)]) -> Vec<Exon> {
        v.iter().map(|&(s, e)| Exon::new(s, e)).collect()
    }

    #[test]
    fn load_skips_malformed_rows() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "G1\tT1\tchr1\t+\t100\t400\t100\t400\t2\t100,300,\t200,400,").unwrap();
        writeln!(f, "G1\tT2\tchr1\t+\t100\t600\t100\t600\t3\t100,300,500,\t200,400,600,").unwrap();
        //Non-monotonic exons
        writeln!(f, "G2\tT3\tchr1\t-\t100\t400\t100\t400\t2\t300,100,\t400,200,").unwrap();
        //Missing columns
        writeln!(f, "G2\tT4\tchr1\t-\t100\t400").unwrap();
        //Count mismatch
        writeln!(f, "G3\tT5\tchr2\t-\t100\t400\t100\t400\t3\t100,300,\t200,400,").unwrap();
        f.flush().unwrap();

        let model = GeneModel::load(f.path()).unwrap();
        assert_eq!(model.num_transcripts(), 2);
        assert_eq!(model.num_genes(), 1);
        assert_eq!(model.malformed_rows(), 3);
        assert_eq!(model.transcripts_for_gene("G1").len(), 2);
        assert!(model.transcripts_for_gene("G2").is_empty());
        assert_eq!(model.strand_for_gene("G1"), Some(Strand::Forward));
    }

    #[test]
    fn row_errors_are_reported() {
        let rec = csv::StringRecord::from(vec![
            "G1", "T1", "1", "+", "0", "10", "0", "10", "x", "0,", "10,",
        ]);
        let err = parse_refflat_row(&rec, 4).unwrap_err();
        assert!(err.to_string().contains("row 4"));
    }

    #[test]
    fn lookup_by_approximate_structure() {
        let model = GeneModel::from_transcripts(vec![
            transcript("G1", "T1", &[(100, 200), (300, 400)]),
            transcript("G1", "T2", &[(100, 200), (350, 400)]),
            transcript("G1", "T3", &[(100, 200), (300, 400), (500, 600)]),
        ]);

        let hit = model.lookup_transcript("G1", "chr1", &exons(&[(120, 202), (298, 390)]), 2);
        assert_eq!(hit.map(|t| t.id.as_str()), Some("T1"));

        let hit = model.lookup_transcript("G1", "chr1", &exons(&[(100, 200), (349, 400)]), 2);
        assert_eq!(hit.map(|t| t.id.as_str()), Some("T2"));

        //Donor shifted by 3
        assert!(model
            .lookup_transcript("G1", "1", &exons(&[(100, 203), (300, 400)]), 2)
            .is_none());
        //Exon count differs
        assert!(model
            .lookup_transcript("G1", "1", &exons(&[(100, 400)]), 2)
            .is_none());
        assert!(model
            .lookup_transcript("G9", "1", &exons(&[(100, 200), (300, 400)]), 2)
            .is_none());
    }

    #[test]
    fn lookup_prefers_closest_then_smallest_id() {
        let model = GeneModel::from_transcripts(vec![
            transcript("G1", "TB", &[(100, 200), (300, 400)]),
            transcript("G1", "TA", &[(100, 200), (300, 400)]),
            transcript("G1", "TC", &[(100, 201), (300, 400)]),
        ]);
        let hit = model.lookup_transcript("G1", "chr1", &exons(&[(100, 200), (300, 400)]), 2);
        assert_eq!(hit.map(|t| t.id.as_str()), Some("TA"));
        let hit = model.lookup_transcript("G1", "chr1", &exons(&[(100, 201), (300, 400)]), 2);
        assert_eq!(hit.map(|t| t.id.as_str()), Some("TC"));
    }

    #[test]
    fn closest_transcript_counts_shared_sites() {
        let model = GeneModel::from_transcripts(vec![
            transcript("G1", "T1", &[(100, 200), (300, 400), (500, 600)]),
            transcript("G1", "T2", &[(100, 250), (300, 400), (700, 800)]),
        ]);
        //Skips the middle exon of T1: shares donor 200 and acceptor 500
        let hit = model.closest_transcript("G1", "1", &exons(&[(100, 200), (500, 600)]), 2);
        assert_eq!(hit.map(|t| t.id.as_str()), Some("T1"));
        assert!(model.closest_transcript("G2", "1", &exons(&[(1, 2)]), 2).is_none());
    }

    #[test]
    fn lookups_stay_on_the_chromosome() {
        let mut on_y = transcript("G1", "T1_Y", &[(100, 200), (300, 400)]);
        on_y.chrom = "chrY".to_string();
        let model = GeneModel::from_transcripts(vec![
            transcript("G1", "T1", &[(100, 200), (300, 400)]),
            on_y,
        ]);
        let structure = exons(&[(100, 200), (300, 400)]);

        let hit = model.lookup_transcript("G1", "Y", &structure, 2);
        assert_eq!(hit.map(|t| t.id.as_str()), Some("T1_Y"));
        let hit = model.closest_transcript("G1", "chr1", &structure, 2);
        assert_eq!(hit.map(|t| t.id.as_str()), Some("T1"));
        assert!(model.lookup_transcript("G1", "X", &structure, 2).is_none());
        assert!(model.closest_transcript("G1", "X", &structure, 2).is_none());
    }
}
