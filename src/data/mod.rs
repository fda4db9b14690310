/// Data layer: core types, loading, and cascading filters.
///
/// Architecture:
/// ```text
///      .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Dataset (cached per path)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ Dataset   │  Vec<Row>, get-or-null accessors
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  region → states → locality → education → sex → age
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
pub mod regions;
