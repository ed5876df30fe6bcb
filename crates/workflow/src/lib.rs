//! # A2E Workflow
//!
//! The workflow model: line-delimited wire frames, the typed operation
//! catalog, the assembled workflow graph with its root-seeded execution
//! order, and the per-execution path-addressable data model.

pub mod datamodel;
pub mod frames;
pub mod operation;
pub mod workflow;

pub use datamodel::DataModel;
pub use frames::{parse_frames, BeginExecution, OperationUpdate, WorkflowFrame};
pub use operation::{
    ApiCallConfig, CalcOp, CalculateConfig, CodecDirection, CompareOp, ConditionalConfig,
    ConvertTimezoneConfig, DateCalculationConfig, DateOp, EncodeDecodeConfig, Encoding,
    ExtractTextConfig, FilterCondition, FilterDataConfig, FormatTextConfig,
    GetCurrentDateTimeConfig, LoopConfig, MergeDataConfig, MergeMode, Operation, OperationKind,
    OutputShape, ReduceKind, StoreDataConfig, TextFormat, TimeFormat, TransformDataConfig,
    TransformKind, ValidateDataConfig, ValidationType, WaitConfig,
};
pub use workflow::Workflow;
