pub mod process_usage;
pub mod sample;

pub use process_usage::Entity as ProcessUsage;
pub use sample::Entity as Sample;
