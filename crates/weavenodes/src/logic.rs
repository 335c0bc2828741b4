use async_trait::async_trait;
use serde_json::{json, Value};
use weavecore::{
    Effector, EffectorContext, NodeCategory, NodeData, NodeDataItem, NodeDefinition, NodeError,
    ParameterSpec, ParameterType,
};

pub const CONDITION: &str = "logic.condition";
pub const MERGE: &str = "flow.merge";

pub fn condition_definition() -> NodeDefinition {
    NodeDefinition::processing(CONDITION, "Condition", NodeCategory::Logic)
        .with_description("Keeps only the items whose field matches")
        .with_parameter(ParameterSpec::new("field", "Field", ParameterType::String, "").required())
        .with_parameter(
            ParameterSpec::new("operation", "Operation", ParameterType::Options, "equals").with_options(&[
                ("equals", "Equals"),
                ("not_equals", "Not Equals"),
                ("contains", "Contains"),
                ("exists", "Exists"),
                ("greater_than", "Greater Than"),
                ("less_than", "Less Than"),
            ]),
        )
        .with_parameter(ParameterSpec::new("value", "Value", ParameterType::String, ""))
}

pub fn merge_definition() -> NodeDefinition {
    NodeDefinition::processing(MERGE, "Merge", NodeCategory::Logic)
        .with_description("Joins the items arriving from several branches")
        .with_parameter(
            ParameterSpec::new("mode", "Mode", ParameterType::Options, "append").with_options(&[
                ("append", "Append"),
                ("combine_by_index", "Combine by Index"),
            ]),
        )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Equals,
    NotEquals,
    Contains,
    Exists,
    GreaterThan,
    LessThan,
}

impl Operation {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "equals" => Some(Self::Equals),
            "not_equals" => Some(Self::NotEquals),
            "contains" => Some(Self::Contains),
            "exists" => Some(Self::Exists),
            "greater_than" => Some(Self::GreaterThan),
            "less_than" => Some(Self::LessThan),
            _ => None,
        }
    }

    fn matches(self, actual: Option<&Value>, expected: &Value) -> bool {
        let actual = actual.filter(|v| !v.is_null());
        match self {
            Self::Exists => actual.is_some(),
            Self::Equals => actual.is_some_and(|a| loosely_equal(a, expected)),
            Self::NotEquals => !actual.is_some_and(|a| loosely_equal(a, expected)),
            Self::Contains => match actual {
                Some(Value::String(s)) => s.contains(&text(expected)),
                Some(Value::Array(items)) => items.iter().any(|i| loosely_equal(i, expected)),
                _ => false,
            },
            Self::GreaterThan => compare(actual, expected).is_some_and(|(a, b)| a > b),
            Self::LessThan => compare(actual, expected).is_some_and(|(a, b)| a < b),
        }
    }
}

// Parameters arrive as strings from the editor, so "3" equals 3
fn loosely_equal(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match (number(actual), number(expected)) {
        (Some(a), Some(b)) => a == b,
        _ => text(actual) == text(expected),
    }
}

fn compare(actual: Option<&Value>, expected: &Value) -> Option<(f64, f64)> {
    Some((number(actual?)?, number(expected)?))
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub struct ConditionEffector;

#[async_trait]
impl Effector for ConditionEffector {
    fn kind(&self) -> &str {
        CONDITION
    }

    async fn execute(&self, ctx: EffectorContext) -> Result<NodeData, NodeError> {
        let field = ctx.parameter_str("field")?;
        let name = ctx.parameter_str("operation")?;
        let operation = Operation::parse(name).ok_or_else(|| NodeError::InvalidParameter {
            name: "operation".to_string(),
            expected: format!("a known comparison (got '{}')", name),
        })?;
        let expected = ctx.parameter_or("value", Value::Null);

        let passed: NodeData = ctx
            .input
            .iter()
            .filter(|item| operation.matches(item.field(field), &expected))
            .cloned()
            .collect();

        tracing::debug!(
            "{}: {} of {} item(s) passed {:?}",
            ctx.node_name,
            passed.len(),
            ctx.input.len(),
            operation
        );
        Ok(passed)
    }
}

pub struct MergeEffector;

#[async_trait]
impl Effector for MergeEffector {
    fn kind(&self) -> &str {
        MERGE
    }

    async fn execute(&self, ctx: EffectorContext) -> Result<NodeData, NodeError> {
        let mode = ctx.parameter_or("mode", json!("append"));
        match mode.as_str() {
            Some("append") => Ok(ctx.input),
            Some("combine_by_index") => Ok(combine_by_index(&ctx.input_groups)),
            _ => Err(NodeError::InvalidParameter {
                name: "mode".to_string(),
                expected: "append or combine_by_index".to_string(),
            }),
        }
    }
}

/// Zip the branches: item `i` of the output merges item `i` of every
/// non-empty branch, later branches winning on key clashes.
fn combine_by_index(groups: &[NodeData]) -> NodeData {
    let branches: Vec<&NodeData> = groups.iter().filter(|g| !g.is_empty()).collect();
    let len = branches.iter().map(|b| b.len()).min().unwrap_or(0);

    (0..len)
        .map(|i| {
            branches.iter().fold(NodeDataItem::default(), |mut merged, branch| {
                let item = &branch[i];
                merged.json.extend(item.json.clone());
                merged.binary.extend(item.binary.clone());
                merged
            })
        })
        .collect()
}
