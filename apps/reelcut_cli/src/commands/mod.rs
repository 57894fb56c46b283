pub mod active;
pub mod export;
pub mod import;
pub mod info;
pub mod new;
pub mod preview;
