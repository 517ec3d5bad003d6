use std::collections::BTreeMap;
use std::fs;
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::Context;
use bio::io::fasta;
use log::debug;
use log::info;
use log::warn;

use crate::model::IsoformCluster;
use crate::model::Molecule;
use crate::runtime::Error;
use crate::utils::command_to_string;
use crate::utils::ConsensusTools;

/// Nucleotide scoring matrix for poa, used when none is given
const DEFAULT_POA_MATRIX: &str = "\
GAP-PENALTIES=8 6 2
   A  C  G  T  N
A  4 -2 -2 -2  0
C -2  4 -2 -2  0
G -2 -2  4 -2  0
T -2 -2 -2  4  0
N  0  0  0  0  0
";

///////////////////////////////
/// Input of one consensus call. The task owns its sequences
#[derive(Clone, Debug)]
pub struct ConsensusTask {
    pub cluster_id: String,
    pub sequences: Vec<(String, Vec<u8>)>,
    pub workdir: PathBuf,
}

///////////////////////////////
/// Anything able to turn the sequences of one isoform into a single consensus
pub trait ConsensusEngine: Send + Sync {
    fn call(&self, task: &ConsensusTask) -> anyhow::Result<Vec<u8>>;
}

///////////////////////////////
/// poa draft, minimap2 alignment of the reads to the draft, racon polishing
pub struct ExternalConsensus {
    tools: ConsensusTools,
    path_matrix: PathBuf,
}
impl ExternalConsensus {
    /// Writes the default scoring matrix into `path_tmp` unless one is given
    pub fn new(
        tools: ConsensusTools,
        path_matrix: Option<PathBuf>,
        path_tmp: &Path,
    ) -> anyhow::Result<ExternalConsensus> {
        let path_matrix = match path_matrix {
            Some(p) => {
                if !p.exists() {
                    anyhow::bail!(Error::file_not_found(&p));
                }
                p
            }
            None => {
                fs::create_dir_all(path_tmp)?;
                let p = path_tmp.join("poa_nuc.mat");
                fs::write(&p, DEFAULT_POA_MATRIX)
                    .with_context(|| format!("Could not write {}", p.display()))?;
                p
            }
        };
        Ok(ExternalConsensus { tools, path_matrix })
    }

    fn run_tool(
        utility: &str,
        cmd: &mut Command,
        path_stdout: Option<&Path>,
    ) -> anyhow::Result<()> {
        let cmd_str = command_to_string(cmd);
        debug!("Running {}", cmd_str);

        match path_stdout {
            Some(p) => {
                cmd.stdout(Stdio::from(File::create(p)?));
            }
            None => {
                cmd.stdout(Stdio::null());
            }
        }
        let output = cmd
            .stderr(Stdio::piped())
            .output()
            .map_err(|_| Error::utility_not_executable(utility))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            anyhow::bail!(Error::utility_execution_error(
                utility,
                cmd_str,
                Some(format!("{}: {}", output.status, stderr))
            ));
        }
        Ok(())
    }
}
impl ConsensusEngine for ExternalConsensus {
    fn call(&self, task: &ConsensusTask) -> anyhow::Result<Vec<u8>> {
        fs::create_dir_all(&task.workdir)?;
        let path_reads = task.workdir.join("reads.fa");
        let path_pir = task.workdir.join("poa.pir");
        let path_draft = task.workdir.join("draft.fa");
        let path_sam = task.workdir.join("reads_to_draft.sam");
        let path_polished = task.workdir.join("polished.fa");

        write_fasta(&path_reads, &task.sequences)?;

        ExternalConsensus::run_tool(
            "poa",
            Command::new(&self.tools.poa)
                .arg("-read_fasta")
                .arg(&path_reads)
                .arg("-pir")
                .arg(&path_pir)
                .arg("-do_global")
                .arg("-do_progressive")
                .arg("-hb")
                .arg(&self.path_matrix),
            None,
        )?;
        let draft = read_pir_consensus(&path_pir)?;
        if draft.is_empty() {
            anyhow::bail!(Error::parse_error(
                format!("{}", path_pir.display()),
                Some("poa produced an empty consensus")
            ));
        }
        write_fasta(&path_draft, &[(task.cluster_id.clone(), draft.clone())])?;

        ExternalConsensus::run_tool(
            "minimap2",
            Command::new(&self.tools.minimap2)
                .arg("-ax")
                .arg("map-ont")
                .arg(&path_draft)
                .arg(&path_reads),
            Some(&path_sam),
        )?;

        ExternalConsensus::run_tool(
            "racon",
            Command::new(&self.tools.racon)
                .arg(&path_reads)
                .arg(&path_sam)
                .arg(&path_draft),
            Some(&path_polished),
        )?;

        //racon emits nothing when no read aligned to the draft
        let polished = read_first_fasta(&path_polished)?;
        match polished {
            Some(seq) if !seq.is_empty() => Ok(seq),
            _ => Ok(draft),
        }
    }
}

fn write_fasta(path: &Path, sequences: &[(String, Vec<u8>)]) -> anyhow::Result<()> {
    let mut writer = fasta::Writer::to_file(path)
        .with_context(|| format!("Could not create {}", path.display()))?;
    for (id, seq) in sequences {
        writer.write(id, None, seq)?;
    }
    writer.flush()?;
    Ok(())
}

fn read_first_fasta(path: &Path) -> anyhow::Result<Option<Vec<u8>>> {
    let reader = fasta::Reader::from_file(path)
        .with_context(|| format!("Could not open {}", path.display()))?;
    match reader.records().next() {
        Some(record) => Ok(Some(record?.seq().to_vec())),
        None => Ok(None),
    }
}

///////////////////////////////
/// Extract the consensus row from poa's PIR alignment, dropping gap characters
pub fn read_pir_consensus(path: &Path) -> anyhow::Result<Vec<u8>> {
    let reader = BufReader::new(
        File::open(path).with_context(|| format!("Could not open {}", path.display()))?,
    );
    let mut in_consensus = false;
    let mut seq = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if let Some(header) = line.strip_prefix('>') {
            if in_consensus {
                break;
            }
            in_consensus = header.contains("CONSENS");
            continue;
        }
        //PIR description lines are free text, alignment rows carry no whitespace
        if in_consensus && !line.trim().contains(char::is_whitespace) {
            seq.extend(
                line.bytes()
                    .filter(|b| b.is_ascii_alphabetic())
                    .map(|b| b.to_ascii_uppercase()),
            );
        }
    }
    Ok(seq)
}

#[derive(Clone, Debug, Default)]
pub struct ConsensusOutcome {
    /// Keyed by cluster id
    pub sequences: BTreeMap<String, Vec<u8>>,
    pub failed: Vec<String>,
    pub skipped: usize,
}

///////////////////////////////
/// Runs one consensus task per eligible cluster on a fixed worker pool. A failing
/// task only affects its own cluster
pub struct ConsensusCaller {
    pub engine: Arc<dyn ConsensusEngine>,
    pub num_threads: usize,
    pub min_support: usize,
    pub max_sequences: usize,
    pub path_tmp: PathBuf,
    pub keep_files: bool,
}
impl ConsensusCaller {
    /// Sequences of the members of a cluster, most supported molecules first.
    /// The work directory carries the cluster's position, as sanitized ids may collide
    fn make_task(
        &self,
        index: usize,
        cluster: &IsoformCluster,
        molecules: &[Molecule],
    ) -> Option<ConsensusTask> {
        if cluster.support() < self.min_support {
            return None;
        }
        let mut members: Vec<&Molecule> = cluster
            .members
            .iter()
            .filter_map(|&i| molecules.get(i))
            .filter(|m| m.sequence.as_ref().map(|s| !s.is_empty()).unwrap_or(false))
            .collect();
        if members.len() < self.min_support {
            return None;
        }
        members.sort_by(|a, b| {
            b.tagged_reads
                .cmp(&a.tagged_reads)
                .then_with(|| a.key.cmp(&b.key))
        });
        members.truncate(self.max_sequences.max(1));

        let sequences = members
            .iter()
            .filter_map(|m| {
                m.sequence.as_ref().map(|s| {
                    (format!("{}|{}|{}", m.key.cell, m.key.umi, m.key.gene), s.clone())
                })
            })
            .collect();
        Some(ConsensusTask {
            cluster_id: cluster.id.clone(),
            sequences,
            workdir: self
                .path_tmp
                .join(format!("{}_{}", index, sanitize_for_path(&cluster.id))),
        })
    }

    pub fn run(
        &self,
        clusters: &[IsoformCluster],
        molecules: &[Molecule],
    ) -> anyhow::Result<ConsensusOutcome> {
        let mut outcome = ConsensusOutcome::default();

        let mut tasks = Vec::new();
        for (i, c) in clusters.iter().enumerate() {
            match self.make_task(i, c, molecules) {
                Some(task) => tasks.push(task),
                None => outcome.skipped += 1,
            }
        }
        info!(
            "Calling consensus for {} isoforms using {} threads ({} skipped for low support)",
            tasks.len(),
            self.num_threads,
            outcome.skipped
        );
        fs::create_dir_all(&self.path_tmp)
            .with_context(|| format!("Could not create {}", self.path_tmp.display()))?;

        let task_ids: Vec<String> = tasks.iter().map(|t| t.cluster_id.clone()).collect();
        let thread_pool = threadpool::ThreadPool::new(self.num_threads.max(1));
        let (tx, rx) = crossbeam::channel::unbounded::<(String, Result<Vec<u8>, String>)>();

        for task in tasks {
            let tx = tx.clone();
            let engine = Arc::clone(&self.engine);
            let keep_files = self.keep_files;
            thread_pool.execute(move || {
                let result = engine.call(&task).map_err(|e| format!("{:#}", e));
                if !keep_files {
                    let _ = fs::remove_dir_all(&task.workdir);
                }
                let _ = tx.send((task.cluster_id, result));
            });
        }
        drop(tx);
        thread_pool.join();

        //Results are gathered by cluster id; a panicking task never reports and counts as failed
        let mut reported: BTreeMap<String, Result<Vec<u8>, String>> = rx.iter().collect();
        for id in task_ids {
            match reported.remove(&id) {
                Some(Ok(seq)) => {
                    outcome.sequences.insert(id, seq);
                }
                Some(Err(e)) => {
                    warn!("Consensus failed for {}: {}", id, e);
                    outcome.failed.push(id);
                }
                None => {
                    warn!("Consensus task for {} did not complete", id);
                    outcome.failed.push(id);
                }
            }
        }

        info!(
            "Consensus done: {} sequences, {} failed",
            outcome.sequences.len(),
            outcome.failed.len()
        );
        Ok(outcome)
    }
}

fn sanitize_for_path(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
