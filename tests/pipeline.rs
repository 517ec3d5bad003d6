use isocollapse::collapse::collapse_reads;
use isocollapse::collapse::validate_clusters;
use isocollapse::collapse::CollapseConfig;
use isocollapse::collapse::EvidenceSet;
use isocollapse::fileformat::export;
use isocollapse::fileformat::BedInterval;
use isocollapse::fileformat::CellList;
use isocollapse::fileformat::GeneModel;
use isocollapse::fileformat::IntervalIndex;
use isocollapse::fileformat::JunctionIndex;
use isocollapse::fileformat::Transcript;
use isocollapse::model::Exon;
use isocollapse::model::IsoformClass;
use isocollapse::model::Junction;
use isocollapse::model::ReadRecord;
use isocollapse::model::Strand;
use isocollapse::model::ValidationStatus;

fn read(cell: &str, umi: &str, gene: &str, exons: &[(i64, i64)]) -> anyhow::Result<ReadRecord> {
    Ok(ReadRecord {
        name: format!("{}:{}", cell, umi),
        chrom: "chr1".to_string(),
        strand: Strand::Forward,
        exons: exons.iter().map(|&(s, e)| Exon::new(s, e)).collect(),
        cell: cell.to_string(),
        umi: umi.to_string(),
        gene: gene.to_string(),
        isoform: "undef".to_string(),
        read_count: 1,
        sequence: None,
    })
}

fn five_reads() -> Vec<anyhow::Result<ReadRecord>> {
    (0..5)
        .map(|_| read("C1", "U1", "G1", &[(100, 200), (300, 400)]))
        .collect()
}

fn reference() -> GeneModel {
    GeneModel::from_transcripts(vec![Transcript {
        gene: "G1".to_string(),
        id: "T1".to_string(),
        chrom: "chr1".to_string(),
        strand: Strand::Forward,
        cds_start: 100,
        cds_end: 400,
        exons: vec![Exon::new(100, 200), Exon::new(300, 400)],
    }])
}

fn bed(start: i64, end: i64) -> BedInterval {
    BedInterval {
        chrom: "1".to_string(),
        start,
        end,
        name: ".".to_string(),
        score: "0".to_string(),
        strand: Strand::Forward,
    }
}

#[test]
fn one_molecule_one_cluster() {
    let cells = CellList::new(["C1"]);
    let config = CollapseConfig {
        min_evidence: 1,
        ..Default::default()
    };
    let result = collapse_reads(five_reads(), &cells, &GeneModel::default(), &config).unwrap();

    assert_eq!(result.molecules.len(), 1);
    assert_eq!(result.molecules[0].nb_reads, 5);
    assert_eq!(result.clusters.len(), 1);
    assert_eq!(result.clusters[0].support(), 1);
    assert_eq!(result.clusters[0].nb_reads, 5);
    assert!(!result.clusters[0].is_known());
}

#[test]
fn lone_novel_cluster_is_dropped_but_counted() {
    let cells = CellList::new(["C1"]);
    let result =
        collapse_reads(five_reads(), &cells, &GeneModel::default(), &CollapseConfig::default())
            .unwrap();

    assert!(result.clusters.is_empty());
    assert_eq!(result.stats.clusters.clusters_formed, 1);
    assert_eq!(result.stats.filter.clusters_dropped, 1);
}

#[test]
fn lone_reference_cluster_is_kept_as_known() {
    let cells = CellList::new(["C1"]);
    let result =
        collapse_reads(five_reads(), &cells, &reference(), &CollapseConfig::default()).unwrap();

    assert_eq!(result.clusters.len(), 1);
    assert_eq!(
        result.clusters[0].class,
        Some(IsoformClass::KnownIsoform("T1".to_string()))
    );
}

#[test]
fn too_few_reads_make_no_molecule() {
    let cells = CellList::new(["C1"]);
    let reads = (0..2).map(|_| read("C1", "U1", "G1", &[(100, 200)]));
    let result = collapse_reads(reads, &cells, &reference(), &CollapseConfig::default()).unwrap();

    assert!(result.molecules.is_empty());
    assert!(result.clusters.is_empty());
    assert_eq!(result.stats.molecules.molecules_dropped, 1);
}

#[test]
fn unreadable_record_aborts() {
    let cells = CellList::new(["C1"]);
    let mut reads = five_reads();
    reads.push(Err(anyhow::anyhow!("truncated BAM block")));
    assert!(collapse_reads(reads, &cells, &reference(), &CollapseConfig::default()).is_err());
}

#[test]
fn without_evidence_nothing_is_validated() {
    let dir = tempfile::tempdir().unwrap();
    let cells = CellList::new(["C1"]);
    let config = CollapseConfig::default();
    let result = collapse_reads(five_reads(), &cells, &reference(), &config).unwrap();
    let result = validate_clusters(result, None, &config.thresholds);

    assert!(result
        .clusters
        .iter()
        .all(|c| c.validation == ValidationStatus::NotValidated));
    assert!(!result.stats.validation.activated);

    let path = dir.path().join("final.refflat.txt");
    assert_eq!(export::write_refflat(&path, &result.clusters, true).unwrap(), 0);
}

#[test]
fn full_evidence_validates_and_exports() {
    let dir = tempfile::tempdir().unwrap();
    let cells = CellList::new(["C1"]);
    let config = CollapseConfig::default();
    let result = collapse_reads(five_reads(), &cells, &reference(), &config).unwrap();

    let mut junctions = JunctionIndex::new();
    junctions.add(Junction::new("1", 200, 300));
    let evidence = EvidenceSet {
        cage: IntervalIndex::from_intervals([bed(120, 130)]),
        polya: IntervalIndex::from_intervals([bed(380, 390)]),
        junctions,
    };
    let result = validate_clusters(result, Some(&evidence), &config.thresholds);
    assert!(result.clusters[0].validation.fully_validated());
    assert_eq!(result.stats.validation.fully_validated, 1);

    let path = dir.path().join("final.refflat.txt");
    assert_eq!(export::write_refflat(&path, &result.clusters, true).unwrap(), 1);
    let gff = dir.path().join("final.gff");
    assert_eq!(export::write_gff(&gff, &result.clusters, true).unwrap(), 1);
}
