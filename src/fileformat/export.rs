use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use bio::io::fasta;
use csv::QuoteStyle;
use csv::WriterBuilder;
use itertools::Itertools;
use serde::Serialize;

use crate::model::format_structure;
use crate::model::IsoformClass;
use crate::model::IsoformCluster;
use crate::model::ValidationStatus;

fn tsv_writer(path: &Path) -> anyhow::Result<csv::Writer<File>> {
    WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(QuoteStyle::Never)
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Could not create {}", path.display()))
}

fn selected<'a>(
    clusters: &'a [IsoformCluster],
    only_validated: bool,
) -> impl Iterator<Item = &'a IsoformCluster> {
    clusters
        .iter()
        .filter(move |c| !only_validated || c.validation.fully_validated())
}

fn flag(v: bool) -> &'static str {
    if v {
        "1"
    } else {
        "0"
    }
}

#[derive(Serialize)]
struct IsoformRow<'a> {
    isoform: &'a str,
    gene: &'a str,
    chrom: &'a str,
    strand: char,
    start: i64,
    end: i64,
    nb_exons: usize,
    structure: String,
    class: &'static str,
    transcript: &'a str,
    new_splice_site: &'static str,
    altered_terminus: &'static str,
    molecules: usize,
    reads: u64,
    tagged_reads: i64,
    tss_valid: &'static str,
    tes_valid: &'static str,
    junctions_valid: String,
    fully_validated: &'static str,
}

///////////////////////////////
/// One row per isoform with structure, class, support and validation flags.
/// Flags of isoforms that were not validated are written as NA
pub fn write_isoform_table(path: &Path, clusters: &[IsoformCluster]) -> anyhow::Result<()> {
    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(QuoteStyle::Never)
        .from_path(path)
        .with_context(|| format!("Could not create {}", path.display()))?;

    for c in clusters {
        let (class, transcript, new_splice_site, altered_terminus) = match &c.class {
            Some(IsoformClass::KnownIsoform(id)) => ("known", id.as_str(), "0", "0"),
            Some(IsoformClass::NovelIsoform {
                closest_transcript,
                has_new_splice_site,
                has_altered_terminus,
            }) => (
                "novel",
                closest_transcript.as_deref().unwrap_or("."),
                flag(*has_new_splice_site),
                flag(*has_altered_terminus),
            ),
            None => ("unclassified", ".", "NA", "NA"),
        };
        let (tss_valid, tes_valid, junctions_valid, fully_validated) = match &c.validation {
            ValidationStatus::NotValidated => ("NA", "NA", "NA".to_string(), "NA"),
            ValidationStatus::Validated(flags) => (
                flag(flags.tss_valid),
                flag(flags.tes_valid),
                format!(
                    "{}/{}",
                    flags.junctions_valid.iter().filter(|&&v| v).count(),
                    flags.junctions_valid.len()
                ),
                flag(flags.fully_validated()),
            ),
        };

        writer.serialize(IsoformRow {
            isoform: &c.id,
            gene: &c.gene,
            chrom: &c.chrom,
            strand: c.strand.as_char(),
            start: c.start(),
            end: c.end(),
            nb_exons: c.exons.len(),
            structure: format_structure(&c.exons),
            class,
            transcript,
            new_splice_site,
            altered_terminus,
            molecules: c.support(),
            reads: c.nb_reads,
            tagged_reads: c.tagged_reads,
            tss_valid,
            tes_valid,
            junctions_valid,
            fully_validated,
        })?;
    }
    writer.flush()?;
    Ok(())
}

///////////////////////////////
/// refFlat rows. Isoforms carry no CDS, so cdsStart and cdsEnd are both txEnd
pub fn write_refflat(
    path: &Path,
    clusters: &[IsoformCluster],
    only_validated: bool,
) -> anyhow::Result<usize> {
    let mut writer = tsv_writer(path)?;
    let mut n = 0;
    for c in selected(clusters, only_validated) {
        let starts: String = c.exons.iter().map(|e| format!("{},", e.start)).collect();
        let ends: String = c.exons.iter().map(|e| format!("{},", e.end)).collect();
        let tx_end = c.end().to_string();
        writer.write_record([
            c.gene.as_str(),
            c.id.as_str(),
            c.chrom.as_str(),
            c.strand.as_char().to_string().as_str(),
            c.start().to_string().as_str(),
            tx_end.as_str(),
            tx_end.as_str(),
            tx_end.as_str(),
            c.exons.len().to_string().as_str(),
            starts.as_str(),
            ends.as_str(),
        ])?;
        n += 1;
    }
    writer.flush()?;
    Ok(n)
}

///////////////////////////////
/// GFF3, one transcript line followed by its exons. Coordinates are 1-based closed
pub fn write_gff(
    path: &Path,
    clusters: &[IsoformCluster],
    only_validated: bool,
) -> anyhow::Result<usize> {
    let file = File::create(path).with_context(|| format!("Could not create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "##gff-version 3")?;

    let mut n = 0;
    for c in selected(clusters, only_validated) {
        let mut attributes = vec![
            format!("ID={}", c.id),
            format!("gene_id={}", c.gene),
            format!("molecules={}", c.support()),
            format!("reads={}", c.nb_reads),
        ];
        match &c.class {
            Some(IsoformClass::KnownIsoform(id)) => {
                attributes.push("class=known".to_string());
                attributes.push(format!("transcript_id={}", id));
            }
            Some(IsoformClass::NovelIsoform {
                closest_transcript, ..
            }) => {
                attributes.push("class=novel".to_string());
                if let Some(id) = closest_transcript {
                    attributes.push(format!("closest_transcript={}", id));
                }
            }
            None => {}
        }
        if let ValidationStatus::Validated(flags) = &c.validation {
            attributes.push(format!("validated={}", flag(flags.fully_validated())));
        }

        writeln!(
            writer,
            "{}\tisocollapse\ttranscript\t{}\t{}\t.\t{}\t.\t{}",
            c.chrom,
            c.start() + 1,
            c.end(),
            c.strand.as_char(),
            attributes.iter().join(";")
        )?;
        for (i, e) in c.exons.iter().enumerate() {
            writeln!(
                writer,
                "{}\tisocollapse\texon\t{}\t{}\t.\t{}\t.\tID={}.exon{};Parent={}",
                c.chrom,
                e.start + 1,
                e.end,
                c.strand.as_char(),
                c.id,
                i + 1,
                c.id
            )?;
        }
        n += 1;
    }
    writer.flush()?;
    Ok(n)
}

///////////////////////////////
/// Consensus sequences in isoform order. Isoforms without a sequence are left out
pub fn write_consensus_fasta(
    path: &Path,
    clusters: &[IsoformCluster],
    sequences: &BTreeMap<String, Vec<u8>>,
) -> anyhow::Result<usize> {
    let mut writer = fasta::Writer::to_file(path)
        .with_context(|| format!("Could not create {}", path.display()))?;
    let mut n = 0;
    for c in clusters {
        if let Some(seq) = sequences.get(&c.id) {
            let desc = format!(
                "gene={} molecules={} structure={}",
                c.gene,
                c.support(),
                format_structure(&c.exons)
            );
            writer.write(&c.id, Some(desc.as_str()), seq)?;
            n += 1;
        }
    }
    writer.flush()?;
    Ok(n)
}
