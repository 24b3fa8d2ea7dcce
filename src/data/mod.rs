/// Data layer: event table, cuts, filtering and efficiencies.
///
/// Architecture:
/// ```text
///  <base>/<folder>/chunk_N.{parquet,json,csv}
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parallel chunk load + merge → Dataset
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  Dataset  │  column_name → Column, plus `label`
///   └──────────┘
///        │                         │
///        ▼                         ▼
///   ┌──────────┐           ┌──────────────┐
///   │  filter   │ CutSet    │  efficiency   │ CutGroup
///   └──────────┘           └──────────────┘
///   filtered Dataset         label → stage → fraction
/// ```

pub mod cut;
pub mod efficiency;
pub mod filter;
pub mod loader;
pub mod model;
