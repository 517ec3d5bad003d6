use std::collections::HashMap;
use std::path::Path;

use log::debug;
use log::info;

use super::open_text;
use crate::model::normalize_chrom;
use crate::model::Strand;
use crate::runtime::Error;

///////////////////////////////
/// One evidence interval (CAGE peak, polyA site), 0-based half-open
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BedInterval {
    pub chrom: String,
    pub start: i64,
    pub end: i64,
    pub name: String,
    pub score: String,
    pub strand: Strand,
}

#[derive(Clone, Debug, Default)]
struct ChromIntervals {
    /// Sorted by start
    intervals: Vec<BedInterval>,
    /// Largest end among intervals[0..=i]
    max_end: Vec<i64>,
}

///////////////////////////////
/// Read-only positional index over evidence intervals
#[derive(Clone, Debug, Default)]
pub struct IntervalIndex {
    chroms: HashMap<String, ChromIntervals>,
    len: usize,
    malformed_lines: usize,
}
impl IntervalIndex {
    pub fn from_intervals<I>(intervals: I) -> IntervalIndex
    where
        I: IntoIterator<Item = BedInterval>,
    {
        let mut chroms: HashMap<String, ChromIntervals> = HashMap::new();
        let mut len = 0;
        for iv in intervals {
            len += 1;
            chroms
                .entry(normalize_chrom(&iv.chrom).to_string())
                .or_default()
                .intervals
                .push(iv);
        }
        for c in chroms.values_mut() {
            c.intervals.sort_by_key(|iv| (iv.start, iv.end));
            let mut running = i64::MIN;
            c.max_end = c
                .intervals
                .iter()
                .map(|iv| {
                    running = running.max(iv.end);
                    running
                })
                .collect();
        }
        IntervalIndex {
            chroms,
            len,
            malformed_lines: 0,
        }
    }

    /// chrom, start, end, then optional name, score, strand
    pub fn from_file(path: &Path) -> anyhow::Result<IntervalIndex> {
        let reader = open_text(path)?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .comment(Some(b'#'))
            .from_reader(reader);

        let mut intervals = Vec::new();
        let mut malformed_lines = 0;
        for result in reader.records() {
            let record = match result {
                Ok(record) => record,
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => {
                    malformed_lines += 1;
                    debug!("Skipping unreadable BED line: {}", e);
                    continue;
                }
            };
            let first = record.get(0).unwrap_or("");
            if first.starts_with("track") || first.starts_with("browser") {
                continue;
            }
            match parse_bed_record(&record) {
                Ok(iv) => intervals.push(iv),
                Err(e) => {
                    malformed_lines += 1;
                    debug!("{}", e);
                }
            }
        }

        let mut index = IntervalIndex::from_intervals(intervals);
        index.malformed_lines = malformed_lines;
        info!(
            "Loaded {} intervals from {} ({} malformed lines skipped)",
            index.len(),
            path.display(),
            malformed_lines
        );
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn malformed_lines(&self) -> usize {
        self.malformed_lines
    }

    ///////////////////////////////
    /// Is there an interval on a compatible strand no further than `cutoff` bases from `pos`?
    pub fn within(&self, chrom: &str, strand: Strand, pos: i64, cutoff: i64) -> bool {
        let Some(c) = self.chroms.get(normalize_chrom(chrom)) else {
            return false;
        };
        let upto = c.intervals.partition_point(|iv| iv.start - cutoff <= pos);
        for j in (0..upto).rev() {
            //No interval at or before j reaches far enough right
            if c.max_end[j] - 1 + cutoff < pos {
                break;
            }
            let iv = &c.intervals[j];
            if iv.end - 1 + cutoff >= pos && iv.strand.compatible(&strand) {
                return true;
            }
        }
        false
    }
}

pub fn parse_bed_record(record: &csv::StringRecord) -> Result<BedInterval, Error> {
    let context = || record.iter().collect::<Vec<_>>().join("\t");
    if record.len() < 3 {
        return Err(Error::parse_error(
            format!("BED line '{}'", context()),
            Some("fewer than 3 columns"),
        ));
    }
    let coord = |i: usize| -> Result<i64, Error> {
        record
            .get(i)
            .unwrap_or("")
            .trim()
            .parse::<i64>()
            .map_err(|_| {
                Error::parse_error(format!("BED line '{}'", context()), Some("bad coordinate"))
            })
    };
    let start = coord(1)?;
    let end = coord(2)?;
    if end <= start {
        return Err(Error::parse_error(
            format!("BED line '{}'", context()),
            Some("end not after start"),
        ));
    }

    Ok(BedInterval {
        chrom: record.get(0).unwrap_or("").trim().to_string(),
        start,
        end,
        name: record.get(3).unwrap_or(".").to_string(),
        score: record.get(4).unwrap_or(".").to_string(),
        strand: Strand::from_char(record.get(5).and_then(|s| s.chars().next()).unwrap_or('.')),
    })
}
