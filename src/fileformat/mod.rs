pub mod bam;
pub mod bed;
pub mod cell_list_file;
pub mod export;
pub mod refflat;
pub mod short_read;

use std::fs::File;
use std::path::Path;

use anyhow::Context;
use log::debug;

pub use bam::BamReadSource;
pub use bam::TagNames;
pub use bed::BedInterval;
pub use bed::IntervalIndex;
pub use cell_list_file::CellList;
pub use refflat::GeneModel;
pub use refflat::Transcript;
pub use short_read::JunctionIndex;

///////////////////////////////
/// Open a text file, transparently decompressing it if needed
pub fn open_text(path: &Path) -> anyhow::Result<Box<dyn std::io::Read>> {
    let opened_handle =
        File::open(path).with_context(|| format!("Could not open file {}", path.display()))?;

    match niffler::get_reader(Box::new(opened_handle)) {
        Ok((reader, compression)) => {
            debug!(
                "Opened file {} with compression {:?}",
                path.display(),
                compression
            );
            Ok(reader)
        }
        //Too short to sniff a compression header, so it can only be plain text
        Err(niffler::Error::FileTooShort) => Ok(Box::new(File::open(path)?)),
        Err(e) => Err(e).with_context(|| format!("Could not open file {}", path.display())),
    }
}
