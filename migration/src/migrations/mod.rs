pub mod m202607140001_create_samples;
pub mod m202607140002_create_process_usages;
