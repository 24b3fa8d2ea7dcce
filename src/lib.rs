//! Event selection for simulated collider data: apply named column cuts to
//! a per-event table and track how many events of each process survive.

pub mod config;
pub mod data;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod report;

pub use config::Config;
pub use data::cut::{CmpOp, CutGroup, CutSet, Predicate, Stage};
pub use data::efficiency::{cumulative_efficiencies, efficiency, EfficiencyRecord};
pub use data::filter::{apply_cuts, cut_mask};
pub use data::model::{Column, Dataset, Mask, LABEL_COLUMN};
pub use error::{CutError, CutResult};
