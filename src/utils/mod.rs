mod command_to_string;
mod detect_software;

pub use command_to_string::command_to_string;

pub use detect_software::check_consensus_tools;
pub use detect_software::find_executable_on_path;
pub use detect_software::ConsensusTools;
