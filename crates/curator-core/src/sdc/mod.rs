//! Structured Data on Commons claim graph and merge engine.

pub mod claim;
pub mod merge;

pub use claim::{
    DataValue, EntityIdValue, GlobeCoordinateValue, MonolingualValue, QuantityValue, Rank,
    Reference, Snak, SnakType, Statement, TimeValue,
};
pub use merge::{merge_qualifiers, merge_references, merge_statements, Qualifiers};
