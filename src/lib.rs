pub mod collapse;
pub mod command;
pub mod fileformat;
pub mod model;
pub mod runtime;
pub mod utils;
