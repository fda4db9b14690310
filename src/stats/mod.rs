/// Turning filtered rows into percentage distributions.
///
/// ```text
///   rows + column
///        │
///        ▼
///   ┌──────────┐
///   │  rules    │  raw answer → category / bin / discard
///   └──────────┘   (keyword tables fold text first)
///        │
///        ▼
///   ┌───────────┐
///   │ aggregate  │  count, divide, order → Distribution
///   └───────────┘
/// ```

pub mod aggregate;
pub mod rules;
pub mod text;
