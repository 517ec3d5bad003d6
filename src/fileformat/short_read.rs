use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use log::info;
use rust_htslib::bam::record::Record as BamRecord;
use rust_htslib::bam::Read;

use super::bam::blocks_from_cigar;
use crate::model::introns;
use crate::model::Junction;

///////////////////////////////
/// Short-read support of splice junctions. Only junctions asked for are counted,
/// so memory is bounded by the isoforms being validated
#[derive(Clone, Debug, Default)]
pub struct JunctionIndex {
    counts: HashMap<Junction, u32>,
}
impl JunctionIndex {
    pub fn new() -> JunctionIndex {
        JunctionIndex::default()
    }

    /// Register a spanning read for a junction
    pub fn add(&mut self, junction: Junction) {
        *self.counts.entry(junction).or_insert(0) += 1;
    }

    pub fn count(&self, junction: &Junction) -> u32 {
        self.counts.get(junction).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    ///////////////////////////////
    /// Single pass over a short-read alignment file, counting reads whose CIGAR crosses
    /// one of the wanted junctions with both donor and acceptor exact
    pub fn from_bam(
        path: &Path,
        wanted: &HashSet<Junction>,
        num_threads: usize,
    ) -> anyhow::Result<JunctionIndex> {
        let mut bam = rust_htslib::bam::Reader::from_path(path)
            .with_context(|| format!("Could not open short read file {}", path.display()))?;
        bam.set_threads(num_threads.max(1))?;

        let chrom_names: Vec<String> = bam
            .header()
            .target_names()
            .iter()
            .map(|n| String::from_utf8_lossy(n).to_string())
            .collect();

        let mut index = JunctionIndex::new();
        let mut num_reads: u64 = 0;
        let mut record = BamRecord::new();
        while let Some(r) = bam.read(&mut record) {
            r?;
            num_reads += 1;
            if num_reads % 1_000_000 == 0 {
                info!("Processed {} short reads", num_reads);
            }

            if record.is_unmapped() || record.is_secondary() {
                continue;
            }
            let Some(chrom) = usize::try_from(record.tid())
                .ok()
                .and_then(|tid| chrom_names.get(tid))
            else {
                continue;
            };

            let blocks = blocks_from_cigar(record.pos(), record.cigar().iter());
            for (donor, acceptor) in introns(&blocks) {
                let junction = Junction::new(chrom, donor, acceptor);
                if wanted.contains(&junction) {
                    index.add(junction);
                }
            }
        }

        info!(
            "Scanned {} short reads, {} of {} junctions have support",
            num_reads,
            index.len(),
            wanted.len()
        );
        Ok(index)
    }
}
