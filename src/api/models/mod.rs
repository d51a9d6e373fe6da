pub mod run;

pub use run::{RunConfig, RunReport, StatValue};
