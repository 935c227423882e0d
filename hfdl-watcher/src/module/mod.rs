pub mod acquisition;
pub mod decoder;
pub mod scheduled;
pub mod selection;
