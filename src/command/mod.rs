pub mod collapse;

pub use collapse::Capabilities;
pub use collapse::Collapse;
pub use collapse::CollapseCMD;
pub use collapse::CollapseParams;
