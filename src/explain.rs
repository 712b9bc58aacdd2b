//! Prose explanations of results.

use crate::operation::Operation;

use thiserror::Error;

/// Error producing an explanation
#[derive(Debug, Error)]
pub enum ExplainError {
    /// The explainer could not produce text
    #[error("explanation unavailable: {0}")]
    Unavailable(String),
}

/// Everything an explainer may describe about a result
#[derive(Clone, Debug, PartialEq)]
pub struct ExplanationContext<'a> {
    pub operation: Operation,
    pub parameter: &'a str,
    pub location: Option<&'a str>,
    pub start: &'a str,
    pub end: &'a str,
    pub value: f64,
    pub unit: &'a str,
}

/// Producer of a short explanation of a result
pub trait Explainer: Send + Sync {
    fn explain(&self, context: &ExplanationContext) -> Result<String, ExplainError>;
}

/// [Explainer] filling a fixed sentence template
#[derive(Clone, Copy, Debug, Default)]
pub struct SummaryExplainer;

impl Explainer for SummaryExplainer {
    fn explain(&self, context: &ExplanationContext) -> Result<String, ExplainError> {
        let parameter = context.parameter.replace('_', " ");
        let value = if context.value.is_nan() {
            "NaN".to_string()
        } else {
            format!("{:.6}", context.value)
        };
        let region = match context.location {
            Some(location) => format!(" over the {}", location),
            None => String::new(),
        };
        let text = format!(
            "The {} {}{} from {} to {} is: {} {}",
            context.operation, parameter, region, context.start, context.end, value, context.unit
        );
        Ok(collapse_newlines(text.trim()))
    }
}

/// Replace each run of newlines with a single space.
pub fn collapse_newlines(text: &str) -> String {
    let mut collapsed = String::with_capacity(text.len());
    let mut in_run = false;
    for c in text.chars() {
        if c == '\n' || c == '\r' {
            if !in_run {
                collapsed.push(' ');
                in_run = true;
            }
        } else {
            collapsed.push(c);
            in_run = false;
        }
    }
    collapsed
}

#[cfg(test)]
mod tests {
    use super::*;

    use regex::Regex;

    fn context(value: f64, location: Option<&'static str>) -> ExplanationContext<'static> {
        ExplanationContext {
            operation: Operation::Mean,
            parameter: "ocean_currents",
            location,
            start: "2020-01-01",
            end: "2020-12-31",
            value,
            unit: "m/s",
        }
    }

    #[test]
    fn summary_with_location() {
        let text = SummaryExplainer
            .explain(&context(0.25, Some("pacific ocean")))
            .unwrap();
        assert_eq!(
            "The mean ocean currents over the pacific ocean from 2020-01-01 to 2020-12-31 is: 0.250000 m/s",
            text
        );
    }

    #[test]
    fn summary_without_location() {
        let text = SummaryExplainer.explain(&context(1.0, None)).unwrap();
        assert_eq!(
            "The mean ocean currents from 2020-01-01 to 2020-12-31 is: 1.000000 m/s",
            text
        );
    }

    #[test]
    fn summary_nan_without_unit() {
        let mut context = context(f64::NAN, None);
        context.unit = "";
        let text = SummaryExplainer.explain(&context).unwrap();
        let re = Regex::new(r"is: NaN$").unwrap();
        assert!(re.is_match(&text), "{text}");
    }

    #[test]
    fn newlines_collapsed() {
        assert_eq!("a b c", collapse_newlines("a\n\n\nb\r\nc"));
        assert_eq!("unchanged", collapse_newlines("unchanged"));
    }
}
