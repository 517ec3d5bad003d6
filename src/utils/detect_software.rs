use std::env;
use std::path::Path;
use std::path::PathBuf;

use log::debug;
use log::info;

///////////////////////////////
/// Executables needed to call consensus sequences
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsensusTools {
    pub poa: PathBuf,
    pub racon: PathBuf,
    pub minimap2: PathBuf,
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

///////////////////////////////
/// First directory of PATH holding an executable of this name
pub fn find_executable_on_path(name: &str) -> Option<PathBuf> {
    find_executable_in(name, env::var_os("PATH")?.as_os_str())
}

pub fn find_executable_in(name: &str, search_path: &std::ffi::OsStr) -> Option<PathBuf> {
    env::split_paths(search_path)
        .map(|dir| dir.join(name))
        .find(|p| is_executable(p))
}

///////////////////////////////
/// Look for poa, racon and minimap2. Each one missing is reported
pub fn check_consensus_tools() -> Option<ConsensusTools> {
    debug!("Checking for poa, racon and minimap2");
    let poa = find_executable_on_path("poa");
    let racon = find_executable_on_path("racon");
    let minimap2 = find_executable_on_path("minimap2");

    for (name, found) in [("poa", &poa), ("racon", &racon), ("minimap2", &minimap2)] {
        match found {
            Some(p) => info!("Found {} at {}", name, p.display()),
            None => info!("Unable to find {}, please add it to your PATH", name),
        }
    }

    Some(ConsensusTools {
        poa: poa?,
        racon: racon?,
        minimap2: minimap2?,
    })
}
