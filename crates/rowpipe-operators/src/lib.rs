#![forbid(unsafe_code)]
//! rowpipe-operators: record-stream operators over `FieldList`-described rows.
//!
//! Design intent:
//! - Pure and synchronous. Every operator is an iterator adapter over
//!   `Result<Row, OpError>` items; an error item ends the stream.
//! - Field names are resolved to positions when an operator is bound to its
//!   input `FieldList`, never per row.
//! - Operators that must drain their input before producing output report
//!   `Buffering::Materializing` (to_dict, join detail side, aggregate, audit).

pub mod traits;

pub mod append;
pub mod distinct;
pub mod project;
pub mod sample;
pub mod select;

pub mod aggregate;
pub mod audit;
pub mod join;
pub mod transform;

pub use aggregate::{aggregate, aggregate_fields, Aggregate, AggregateFn, Measure};
pub use append::{append, Append};
pub use audit::{audit_fields, basic_audit, Audit, FieldAudit};
pub use distinct::{distinct, unique, Distinct, Unique};
pub use join::{inner_join, left_inner_join, to_dict, to_dict_composite, Join, JoinKeys};
pub use project::{as_records, field_filter, FieldFilter};
pub use sample::{sample, Sample, SampleMode};
pub use select::{select, select_from_set, select_records, SetSelect};
pub use transform::{
    compile_transformation, Args, FunctionRegistry, Transform, TransformEntry, TransformRule,
    Transformation,
};
pub use traits::{Buffering, OpError, Operator, RecordResult, RowResult, RowStream};
