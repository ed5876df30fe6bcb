//! The closed catalog of workflow operation kinds.
//!
//! The engine ships a fixed set of operation kinds; this table is what the
//! capability view advertises to agents and what the authorization layer
//! filters against.

use serde::Serialize;

/// Description of one operation kind, as advertised to agents.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// Whether the kind reaches outside the process (network or storage).
    pub remote: bool,
}

/// Every operation kind the engine can dispatch, in catalog order.
pub const OPERATION_CATALOG: &[OperationSpec] = &[
    OperationSpec {
        name: "ApiCall",
        description: "HTTP request against a registered API, with credential injection",
        remote: true,
    },
    OperationSpec {
        name: "FilterData",
        description: "Keep array elements matching every condition",
        remote: false,
    },
    OperationSpec {
        name: "TransformData",
        description: "Map, sort, or reduce an array",
        remote: false,
    },
    OperationSpec {
        name: "StoreData",
        description: "Write data to a named backing store",
        remote: true,
    },
    OperationSpec {
        name: "MergeData",
        description: "Combine several data-model paths into one object or array",
        remote: false,
    },
    OperationSpec {
        name: "Conditional",
        description: "Evaluate a predicate and select one of two successor operations",
        remote: false,
    },
    OperationSpec {
        name: "Loop",
        description: "Run a body of operations for each element of an array, up to a declared bound",
        remote: false,
    },
    OperationSpec {
        name: "Wait",
        description: "Pause for a fixed duration",
        remote: false,
    },
    OperationSpec {
        name: "GetCurrentDateTime",
        description: "Read the clock in a timezone, formatted as ISO-8601, timestamp, or a pattern",
        remote: false,
    },
    OperationSpec {
        name: "ConvertTimezone",
        description: "Re-express a datetime in another timezone",
        remote: false,
    },
    OperationSpec {
        name: "DateCalculation",
        description: "Add or subtract a delta from a datetime",
        remote: false,
    },
    OperationSpec {
        name: "FormatText",
        description: "Case, trim, template, and replace transformations on text",
        remote: false,
    },
    OperationSpec {
        name: "ExtractText",
        description: "Regex match (first or all) over text",
        remote: false,
    },
    OperationSpec {
        name: "ValidateData",
        description: "Typed predicate over a value (email, url, number, date, custom regex)",
        remote: false,
    },
    OperationSpec {
        name: "Calculate",
        description: "Arithmetic on numbers, or sum/average over an array",
        remote: false,
    },
    OperationSpec {
        name: "EncodeDecode",
        description: "Base64, URL, or HTML encoding and decoding",
        remote: false,
    },
];

/// Names of every operation kind, in catalog order.
pub fn operation_names() -> Vec<&'static str> {
    OPERATION_CATALOG.iter().map(|spec| spec.name).collect()
}
