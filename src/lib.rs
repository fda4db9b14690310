//! Cascading survey filters and percentage distributions.
//!
//! A [`session::Session`] ties the pieces together: a loaded
//! [`data::model::Dataset`], the page/rule [`config::PanelConfig`] and the
//! operator's [`data::filter::FilterSelection`]. Rendering a page narrows
//! the rows with [`data::filter::FilterState`] and turns each chart column
//! into a [`stats::aggregate::Distribution`].

pub mod config;
pub mod data;
pub mod error;
pub mod report;
pub mod session;
pub mod stats;
