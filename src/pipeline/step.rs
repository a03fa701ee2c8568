use crate::database::table::TabularResult;
use crate::format::FormattedValue;
use serde::Deserialize;
use serde::Serialize;

/// One requested unit of pipeline work, as received from the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub agent: String,
    #[serde(default)]
    pub prompt: String,
}

impl Step {
    pub fn new(agent: &str, prompt: &str) -> Step {
        Step {
            agent: agent.to_owned(),
            prompt: prompt.to_owned(),
        }
    }

    pub fn kind(&self) -> Option<StepKind> {
        StepKind::from_agent(&self.agent)
    }
}

/// The closed set of step kinds.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StepKind {
    /// Ask the query generator for query text
    Generate,
    /// Run query text against the store
    Execute,
    /// Encode the current table
    Format,
}

impl StepKind {
    /// Maps a wire agent name onto its kind; `None` for unknown agents.
    pub fn from_agent(agent: &str) -> Option<StepKind> {
        match agent.trim() {
            "sql_generator" => Some(StepKind::Generate),
            "executor" => Some(StepKind::Execute),
            "formatter" => Some(StepKind::Format),
            _ => None,
        }
    }

    pub const fn agent(&self) -> &'static str {
        match self {
            StepKind::Generate => "sql_generator",
            StepKind::Execute => "executor",
            StepKind::Format => "formatter",
        }
    }
}

/// The value threaded from one step to the next.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum LastResult {
    /// Nothing produced yet
    #[default]
    Empty,
    /// Query text from a generate step
    Query(String),
    /// Row set from an execute step
    Table(TabularResult),
    /// Status of an execute step whose last statement produced no rows
    Status(String),
    /// Encoded value from a format step
    Formatted(FormattedValue),
}

impl LastResult {
    pub fn name(&self) -> &'static str {
        match self {
            LastResult::Empty => "empty",
            LastResult::Query(_) => "query",
            LastResult::Table(_) => "table",
            LastResult::Status(_) => "status",
            LastResult::Formatted(_) => "formatted",
        }
    }

    pub fn as_query(&self) -> Option<&str> {
        match self {
            LastResult::Query(query) => Some(query),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agents_map_to_kinds() {
        assert_eq!(StepKind::from_agent("sql_generator"), Some(StepKind::Generate));
        assert_eq!(StepKind::from_agent("executor"), Some(StepKind::Execute));
        assert_eq!(StepKind::from_agent(" formatter "), Some(StepKind::Format));
        assert_eq!(StepKind::from_agent("summarizer"), None);
        assert_eq!(StepKind::Execute.agent(), "executor");
    }

    #[test]
    fn steps_deserialize_without_prompt() {
        let steps: Vec<Step> = serde_json::from_str(r#"[{"agent":"executor"},{"agent":"formatter","prompt":"json"}]"#).unwrap();
        assert_eq!(steps, vec![Step::new("executor", ""), Step::new("formatter", "json")]);
        assert_eq!(steps[0].kind(), Some(StepKind::Execute));
    }
}
