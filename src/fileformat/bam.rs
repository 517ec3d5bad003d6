use std::path::Path;

use anyhow::Context;
use log::debug;
use log::info;
use rust_htslib::bam::record::Aux;
use rust_htslib::bam::record::Cigar;
use rust_htslib::bam::record::Record as BamRecord;
use rust_htslib::bam::Read;

use crate::model::Exon;
use crate::model::ReadRecord;
use crate::model::Strand;
use crate::runtime::Error;

pub const DEFAULT_CELL_TAG: &str = "BC";
pub const DEFAULT_UMI_TAG: &str = "U8";
pub const DEFAULT_GENE_TAG: &str = "IG";
pub const DEFAULT_ISOFORM_TAG: &str = "IT";
pub const DEFAULT_READ_COUNT_TAG: &str = "RN";

///////////////////////////////
/// Names of the tags carrying the read annotations
#[derive(Clone, Debug)]
pub struct TagNames {
    pub cell: String,
    pub umi: String,
    pub gene: String,
    pub isoform: String,
    pub read_count: String,
}
impl Default for TagNames {
    fn default() -> Self {
        TagNames {
            cell: DEFAULT_CELL_TAG.to_string(),
            umi: DEFAULT_UMI_TAG.to_string(),
            gene: DEFAULT_GENE_TAG.to_string(),
            isoform: DEFAULT_ISOFORM_TAG.to_string(),
            read_count: DEFAULT_READ_COUNT_TAG.to_string(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SourceStats {
    pub records: u64,
    /// Unmapped, secondary or supplementary
    pub filtered: u64,
    /// Missing tags or unusable alignment
    pub malformed: u64,
}

///////////////////////////////
/// Forward-only stream of tagged long reads from a BAM/CRAM file
pub struct BamReadSource {
    bam: rust_htslib::bam::Reader,
    record: BamRecord,
    chrom_names: Vec<String>,
    tags: TagNames,
    keep_sequence: bool,
    stats: SourceStats,
}
impl BamReadSource {
    pub fn from_path(
        path: &Path,
        tags: TagNames,
        keep_sequence: bool,
        num_threads: usize,
    ) -> anyhow::Result<BamReadSource> {
        let mut bam = rust_htslib::bam::Reader::from_path(path)
            .with_context(|| format!("Could not open alignment file {}", path.display()))?;

        //Activate multithreaded decompression
        bam.set_threads(num_threads.max(1))?;

        let chrom_names = bam
            .header()
            .target_names()
            .iter()
            .map(|n| String::from_utf8_lossy(n).to_string())
            .collect();

        info!("Reading long reads from {}", path.display());
        Ok(BamReadSource {
            bam,
            record: BamRecord::new(),
            chrom_names,
            tags,
            keep_sequence,
            stats: SourceStats::default(),
        })
    }

    pub fn stats(&self) -> &SourceStats {
        &self.stats
    }

    fn convert_record(&self) -> Result<ReadRecord, Error> {
        let record = &self.record;
        let name = String::from_utf8_lossy(record.qname()).to_string();

        let chrom = usize::try_from(record.tid())
            .ok()
            .and_then(|tid| self.chrom_names.get(tid))
            .ok_or_else(|| Error::malformed_record(&name, "no reference sequence"))?
            .clone();

        let exons = blocks_from_cigar(record.pos(), record.cigar().iter());
        if exons.is_empty() {
            return Err(Error::malformed_record(&name, "no aligned blocks"));
        }

        let tag_str = |tag: &str| {
            aux_string(record, tag)
                .ok_or_else(|| Error::malformed_record(&name, format!("missing tag {}", tag)))
        };
        let cell = tag_str(&self.tags.cell)?;
        let umi = tag_str(&self.tags.umi)?;
        let gene = tag_str(&self.tags.gene)?;
        let isoform = aux_string(record, &self.tags.isoform).unwrap_or_default();
        //A record without a usable read count stands for itself
        let read_count = aux_int(record, &self.tags.read_count)
            .filter(|&n| n > 0)
            .unwrap_or(1);

        let strand = if record.is_reverse() {
            Strand::Reverse
        } else {
            Strand::Forward
        };

        let sequence = if self.keep_sequence {
            Some(record.seq().as_bytes())
        } else {
            None
        };

        Ok(ReadRecord {
            name,
            chrom,
            strand,
            exons,
            cell,
            umi,
            gene,
            isoform,
            read_count,
            sequence,
        })
    }
}

impl Iterator for BamReadSource {
    type Item = anyhow::Result<ReadRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.bam.read(&mut self.record) {
                None => return None,
                Some(Err(e)) => return Some(Err(e.into())),
                Some(Ok(())) => {}
            }
            self.stats.records += 1;

            if self.record.is_unmapped()
                || self.record.is_secondary()
                || self.record.is_supplementary()
            {
                self.stats.filtered += 1;
                continue;
            }

            match self.convert_record() {
                Ok(read) => return Some(Ok(read)),
                Err(e) => {
                    self.stats.malformed += 1;
                    debug!("{}", e);
                }
            }
        }
    }
}

///////////////////////////////
/// Split an alignment into reference blocks. Deletions stay inside a block,
/// only skipped regions (introns) start a new one
pub fn blocks_from_cigar<'a, I>(pos: i64, cigar: I) -> Vec<Exon>
where
    I: IntoIterator<Item = &'a Cigar>,
{
    let mut blocks = Vec::new();
    let mut block_start = pos;
    let mut current = pos;

    for op in cigar {
        match op {
            Cigar::Match(len) | Cigar::Equal(len) | Cigar::Diff(len) | Cigar::Del(len) => {
                current += *len as i64;
            }
            Cigar::RefSkip(len) => {
                if current > block_start {
                    blocks.push(Exon::new(block_start, current));
                }
                current += *len as i64;
                block_start = current;
            }
            Cigar::Ins(_) | Cigar::SoftClip(_) | Cigar::HardClip(_) | Cigar::Pad(_) => {}
        }
    }
    if current > block_start {
        blocks.push(Exon::new(block_start, current));
    }
    blocks
}

pub fn aux_string(record: &BamRecord, tag: &str) -> Option<String> {
    match record.aux(tag.as_bytes()) {
        Ok(Aux::String(s)) => Some(s.to_string()),
        Ok(Aux::Char(c)) => Some((c as char).to_string()),
        _ => None,
    }
}

pub fn aux_int(record: &BamRecord, tag: &str) -> Option<i64> {
    match record.aux(tag.as_bytes()) {
        Ok(Aux::I8(v)) => Some(v as i64),
        Ok(Aux::U8(v)) => Some(v as i64),
        Ok(Aux::I16(v)) => Some(v as i64),
        Ok(Aux::U16(v)) => Some(v as i64),
        Ok(Aux::I32(v)) => Some(v as i64),
        Ok(Aux::U32(v)) => Some(v as i64),
        Ok(Aux::String(s)) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::Path;

    use rust_htslib::bam;
    use rust_htslib::bam::header::HeaderRecord;
    use rust_htslib::bam::record::Aux;
    use rust_htslib::bam::record::Cigar;
    use rust_htslib::bam::record::CigarString;

    pub const FLAG_REVERSE: u16 = 0x10;
    pub const FLAG_UNMAPPED: u16 = 0x4;
    pub const FLAG_SECONDARY: u16 = 0x100;
    pub const FLAG_SUPPLEMENTARY: u16 = 0x800;

    /// Aligned record with string tags; the read sequence is all A
    pub fn record(
        name: &str,
        tid: i32,
        pos: i64,
        cigar: &[Cigar],
        flags: u16,
        tags: &[(&str, &str)],
    ) -> bam::Record {
        let read_len: u32 = cigar
            .iter()
            .map(|op| match op {
                Cigar::Match(l) | Cigar::Ins(l) | Cigar::SoftClip(l) => *l,
                Cigar::Equal(l) | Cigar::Diff(l) => *l,
                _ => 0,
            })
            .sum();
        let seq = vec![b'A'; read_len as usize];
        let qual = vec![30u8; read_len as usize];

        let mut rec = bam::Record::new();
        rec.set(name.as_bytes(), Some(&CigarString(cigar.to_vec())), &seq, &qual);
        rec.set_tid(tid);
        rec.set_pos(pos);
        rec.set_mtid(-1);
        rec.set_mpos(-1);
        rec.set_mapq(60);
        rec.set_flags(flags);
        for (tag, value) in tags {
            rec.push_aux(tag.as_bytes(), Aux::String(*value)).unwrap();
        }
        rec
    }

    /// Two blocks of 100 around a 100 base intron
    pub fn spliced() -> Vec<Cigar> {
        vec![Cigar::Match(100), Cigar::RefSkip(100), Cigar::Match(100)]
    }

    pub fn write_bam(path: &Path, chroms: &[&str], records: &[bam::Record]) {
        let mut header = bam::Header::new();
        for chrom in chroms {
            header.push_record(
                HeaderRecord::new(b"SQ")
                    .push_tag(b"SN", chrom)
                    .push_tag(b"LN", 100000),
            );
        }
        let mut writer = bam::Writer::from_path(path, &header, bam::Format::Bam).unwrap();
        for rec in records {
            writer.write(rec).unwrap();
        }
    }
}
