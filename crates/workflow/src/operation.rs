//! The typed operation catalog.
//!
//! On the wire an operation is `{"id": "...", "operation": {"<Kind>":
//! {...}}}`; the single-entry object maps directly onto the externally
//! tagged [`OperationKind`] enum, so parsing picks the variant by key name
//! and every kind carries its own config struct.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use a2e_core::OperationId;

/// Comparison operator used by filters and conditionals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "contains")]
    Contains,
}

/// One filter predicate: `item.field <op> value`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCondition {
    pub field: String,
    pub operator: CompareOp,
    /// Literal, or a `{"path": "/..."}` reference into the data model.
    pub value: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCallConfig {
    pub method: String,
    pub url: String,
    /// Header values may be strings, data-model references, or
    /// `{"credentialRef": {"id": ...}}` objects resolved at dispatch.
    #[serde(default)]
    pub headers: BTreeMap<String, Value>,
    #[serde(default)]
    pub body: Option<Value>,
    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout: u64,
    pub output_path: String,
}

fn default_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterDataConfig {
    pub input_path: String,
    #[serde(default)]
    pub conditions: Vec<FilterCondition>,
    pub output_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformKind {
    Map,
    Sort,
    Reduce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReduceKind {
    Count,
    First,
    Last,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformDataConfig {
    pub input_path: String,
    pub transform: TransformKind,
    /// Field to extract (map) or sort by (sort).
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub descending: bool,
    #[serde(default)]
    pub reducer: Option<ReduceKind>,
    pub output_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreDataConfig {
    pub input_path: String,
    /// Name of the backing store (external collaborator).
    pub storage: String,
    pub key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    Object,
    Array,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeDataConfig {
    pub input_paths: Vec<String>,
    #[serde(default = "default_merge_mode")]
    pub mode: MergeMode,
    /// Object keys, parallel to `input_paths`; last path segment when absent.
    #[serde(default)]
    pub keys: Option<Vec<String>>,
    pub output_path: String,
}

fn default_merge_mode() -> MergeMode {
    MergeMode::Object
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalConfig {
    pub input_path: String,
    pub operator: CompareOp,
    pub value: Value,
    #[serde(default)]
    pub if_true: Option<OperationId>,
    #[serde(default)]
    pub if_false: Option<OperationId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopConfig {
    pub input_path: String,
    /// Body of the loop: declared operations run once per element.
    pub operations: Vec<OperationId>,
    /// Required upper bound on iterations; unbounded loops do not validate.
    pub max_iterations: u64,
    pub output_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitConfig {
    /// Sleep duration in milliseconds.
    pub duration: u64,
}

/// Output format selector shared by the datetime operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeFormat {
    Iso8601,
    Timestamp,
    Custom,
}

impl Default for TimeFormat {
    fn default() -> Self {
        Self::Iso8601
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetCurrentDateTimeConfig {
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub format: TimeFormat,
    #[serde(default)]
    pub format_string: Option<String>,
    pub output_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertTimezoneConfig {
    pub input_path: String,
    #[serde(default)]
    pub from_timezone: Option<String>,
    pub to_timezone: String,
    #[serde(default)]
    pub format: TimeFormat,
    #[serde(default)]
    pub format_string: Option<String>,
    pub output_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateOp {
    Add,
    Subtract,
}

/// Date arithmetic. Months are treated as exactly 30 days and years as
/// exactly 365 days — a known imprecision inherited from the config
/// contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateCalculationConfig {
    pub input_path: String,
    pub operation: DateOp,
    #[serde(default)]
    pub years: Option<i64>,
    #[serde(default)]
    pub months: Option<i64>,
    #[serde(default)]
    pub days: Option<i64>,
    #[serde(default)]
    pub hours: Option<i64>,
    #[serde(default)]
    pub minutes: Option<i64>,
    #[serde(default)]
    pub seconds: Option<i64>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub format: TimeFormat,
    #[serde(default)]
    pub format_string: Option<String>,
    pub output_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextFormat {
    Upper,
    Lower,
    Title,
    Trim,
    Template,
    Replace,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatTextConfig {
    pub input_path: String,
    pub format: TextFormat,
    /// Template with `{path}` placeholders (format = template).
    #[serde(default)]
    pub template: Option<String>,
    /// Substring replacements (format = replace).
    #[serde(default)]
    pub replacements: Option<BTreeMap<String, String>>,
    pub output_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractTextConfig {
    pub input_path: String,
    pub pattern: String,
    #[serde(default)]
    pub extract_all: bool,
    pub output_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationType {
    Email,
    Url,
    Number,
    Integer,
    Phone,
    Date,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateDataConfig {
    pub input_path: String,
    pub validation_type: ValidationType,
    /// Custom regex (validation_type = custom).
    #[serde(default)]
    pub pattern: Option<String>,
    pub output_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalcOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Round,
    Sum,
    Average,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateConfig {
    pub input_path: String,
    pub operation: CalcOp,
    #[serde(default)]
    pub operand: Option<f64>,
    #[serde(default)]
    pub precision: Option<u32>,
    pub output_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecDirection {
    Encode,
    Decode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Base64,
    Url,
    Html,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodeDecodeConfig {
    pub input_path: String,
    pub operation: CodecDirection,
    pub encoding: Encoding,
    pub output_path: String,
}

/// The shape an operation kind is known to produce, used by the
/// validator's type-compatibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputShape {
    Array,
    Scalar,
    Object,
    /// Remote responses and passthroughs: could be anything.
    Unknown,
}

/// A workflow operation, tagged by kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OperationKind {
    ApiCall(ApiCallConfig),
    FilterData(FilterDataConfig),
    TransformData(TransformDataConfig),
    StoreData(StoreDataConfig),
    MergeData(MergeDataConfig),
    Conditional(ConditionalConfig),
    Loop(LoopConfig),
    Wait(WaitConfig),
    GetCurrentDateTime(GetCurrentDateTimeConfig),
    ConvertTimezone(ConvertTimezoneConfig),
    DateCalculation(DateCalculationConfig),
    FormatText(FormatTextConfig),
    ExtractText(ExtractTextConfig),
    ValidateData(ValidateDataConfig),
    Calculate(CalculateConfig),
    EncodeDecode(EncodeDecodeConfig),
}

impl OperationKind {
    /// The wire tag of this kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ApiCall(_) => "ApiCall",
            Self::FilterData(_) => "FilterData",
            Self::TransformData(_) => "TransformData",
            Self::StoreData(_) => "StoreData",
            Self::MergeData(_) => "MergeData",
            Self::Conditional(_) => "Conditional",
            Self::Loop(_) => "Loop",
            Self::Wait(_) => "Wait",
            Self::GetCurrentDateTime(_) => "GetCurrentDateTime",
            Self::ConvertTimezone(_) => "ConvertTimezone",
            Self::DateCalculation(_) => "DateCalculation",
            Self::FormatText(_) => "FormatText",
            Self::ExtractText(_) => "ExtractText",
            Self::ValidateData(_) => "ValidateData",
            Self::Calculate(_) => "Calculate",
            Self::EncodeDecode(_) => "EncodeDecode",
        }
    }

    /// Whether dispatching this kind reaches outside the process.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::ApiCall(_) | Self::StoreData(_))
    }

    /// Data-model paths this operation reads; these are the graph edges.
    pub fn input_paths(&self) -> Vec<&str> {
        match self {
            Self::FilterData(c) => vec![c.input_path.as_str()],
            Self::TransformData(c) => vec![c.input_path.as_str()],
            Self::StoreData(c) => vec![c.input_path.as_str()],
            Self::MergeData(c) => c.input_paths.iter().map(String::as_str).collect(),
            Self::Conditional(c) => vec![c.input_path.as_str()],
            Self::Loop(c) => vec![c.input_path.as_str()],
            Self::ConvertTimezone(c) => vec![c.input_path.as_str()],
            Self::DateCalculation(c) => vec![c.input_path.as_str()],
            Self::FormatText(c) => vec![c.input_path.as_str()],
            Self::ExtractText(c) => vec![c.input_path.as_str()],
            Self::ValidateData(c) => vec![c.input_path.as_str()],
            Self::Calculate(c) => vec![c.input_path.as_str()],
            Self::EncodeDecode(c) => vec![c.input_path.as_str()],
            Self::ApiCall(_) | Self::Wait(_) | Self::GetCurrentDateTime(_) => vec![],
        }
    }

    /// Where this operation writes its result, if anywhere.
    pub fn output_path(&self) -> Option<&str> {
        match self {
            Self::ApiCall(c) => Some(&c.output_path),
            Self::FilterData(c) => Some(&c.output_path),
            Self::TransformData(c) => Some(&c.output_path),
            Self::MergeData(c) => Some(&c.output_path),
            Self::Loop(c) => Some(&c.output_path),
            Self::GetCurrentDateTime(c) => Some(&c.output_path),
            Self::ConvertTimezone(c) => Some(&c.output_path),
            Self::DateCalculation(c) => Some(&c.output_path),
            Self::FormatText(c) => Some(&c.output_path),
            Self::ExtractText(c) => Some(&c.output_path),
            Self::ValidateData(c) => Some(&c.output_path),
            Self::Calculate(c) => Some(&c.output_path),
            Self::EncodeDecode(c) => Some(&c.output_path),
            Self::StoreData(_) | Self::Conditional(_) | Self::Wait(_) => None,
        }
    }

    /// Other operations this one names directly (conditional branches and
    /// loop bodies).
    pub fn referenced_operations(&self) -> Vec<&OperationId> {
        match self {
            Self::Conditional(c) => c.if_true.iter().chain(c.if_false.iter()).collect(),
            Self::Loop(c) => c.operations.iter().collect(),
            _ => vec![],
        }
    }

    /// The shape this kind is known to produce.
    pub fn output_shape(&self) -> OutputShape {
        match self {
            Self::FilterData(_) | Self::MergeData(_) | Self::Loop(_) => OutputShape::Array,
            Self::TransformData(c) => match c.transform {
                TransformKind::Map | TransformKind::Sort => OutputShape::Array,
                TransformKind::Reduce => OutputShape::Scalar,
            },
            Self::Calculate(_)
            | Self::FormatText(_)
            | Self::GetCurrentDateTime(_)
            | Self::ConvertTimezone(_)
            | Self::DateCalculation(_)
            | Self::EncodeDecode(_) => OutputShape::Scalar,
            Self::ValidateData(_) => OutputShape::Object,
            Self::ApiCall(_)
            | Self::StoreData(_)
            | Self::Conditional(_)
            | Self::Wait(_)
            | Self::ExtractText(_) => OutputShape::Unknown,
        }
    }

    /// The kind's config as a JSON value — the cache fingerprint input.
    pub fn config_value(&self) -> Value {
        // The enum is externally tagged; strip the tag to get bare config.
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map
                .into_iter()
                .next()
                .map(|(_, config)| config)
                .unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    /// Credential ids referenced anywhere in the config.
    pub fn credential_refs(&self) -> Vec<a2e_core::CredentialId> {
        let mut refs = Vec::new();
        collect_credential_refs(&self.config_value(), &mut refs);
        refs
    }
}

fn collect_credential_refs(value: &Value, refs: &mut Vec<a2e_core::CredentialId>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::Object(body)) = map.get("credentialRef") {
                if map.len() == 1 {
                    if let Some(Value::String(id)) = body.get("id") {
                        if let Ok(id) = a2e_core::CredentialId::new(id) {
                            refs.push(id);
                        }
                        return;
                    }
                }
            }
            for inner in map.values() {
                collect_credential_refs(inner, refs);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_credential_refs(item, refs);
            }
        }
        _ => {}
    }
}

/// One node of a workflow, as carried in `operationUpdate` frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub id: OperationId,
    #[serde(rename = "operation")]
    pub kind: OperationKind,
}
