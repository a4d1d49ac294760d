//! Ordered fallback between export strategies
//!
//! The report export tries each strategy in turn and keeps the first artifact
//! produced. Later strategies are degraded forms of the earlier ones.

use crate::error::ExportError;
use crate::model::{mime, Artifact, Issue};
use crate::naming::FileNamer;
use crate::plain::raw_text_artifact;
use crate::report::{build_report, ReportInput};
use chrono::NaiveDateTime;

/// What every strategy in a chain gets to work with.
#[derive(Clone, Copy)]
pub struct StrategyInput<'a> {
    pub file_name: &'a str,
    pub issues: &'a [Issue],
    pub edited_content: Option<&'a str>,
    pub generated: NaiveDateTime,
    pub namer: &'a FileNamer,
}

pub trait ExportStrategy {
    fn name(&self) -> &'static str;

    fn produce(&self, input: &StrategyInput<'_>) -> Result<Artifact, ExportError>;
}

/// Word-compatible HTML report.
#[derive(Debug, Default, Clone, Copy)]
pub struct WordReportStrategy;

impl ExportStrategy for WordReportStrategy {
    fn name(&self) -> &'static str {
        "word-report"
    }

    fn produce(&self, input: &StrategyInput<'_>) -> Result<Artifact, ExportError> {
        let html = build_report(&ReportInput {
            file_name: input.file_name,
            issues: input.issues,
            edited_content: input.edited_content,
            generated: input.generated,
        });
        Ok(Artifact::new(
            html.into_bytes(),
            input
                .namer
                .dated(input.file_name, input.generated.date(), "html"),
            mime::WORD_HTML,
        ))
    }
}

/// Edited content as plain text, the last resort.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawTextStrategy;

impl ExportStrategy for RawTextStrategy {
    fn name(&self) -> &'static str {
        "plain-text"
    }

    fn produce(&self, input: &StrategyInput<'_>) -> Result<Artifact, ExportError> {
        Ok(raw_text_artifact(
            input.edited_content,
            input.file_name,
            input.namer,
        ))
    }
}

/// Result of running a chain.
#[derive(Debug)]
pub struct ChainOutcome {
    pub artifact: Artifact,
    /// Name of the strategy that produced the artifact
    pub strategy: &'static str,
    /// Position of that strategy; anything above zero is a degraded result
    pub index: usize,
    pub failures: Vec<(&'static str, ExportError)>,
}

impl ChainOutcome {
    pub fn degraded(&self) -> bool {
        self.index > 0
    }
}

pub struct FallbackChain<'s> {
    strategies: Vec<Box<dyn ExportStrategy + 's>>,
}

impl<'s> FallbackChain<'s> {
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Report first, raw text if the report cannot be built.
    pub fn report() -> Self {
        Self::new()
            .then(WordReportStrategy)
            .then(RawTextStrategy)
    }

    pub fn then<S: ExportStrategy + 's>(mut self, strategy: S) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Try each strategy in order. Fails with the last error only when every
    /// strategy failed.
    pub fn run(&self, input: &StrategyInput<'_>) -> Result<ChainOutcome, ExportError> {
        let mut failures = Vec::new();
        for (index, strategy) in self.strategies.iter().enumerate() {
            match strategy.produce(input) {
                Ok(artifact) => {
                    if index > 0 {
                        tracing::warn!(
                            strategy = strategy.name(),
                            failed = failures.len(),
                            "export degraded to fallback strategy"
                        );
                    }
                    return Ok(ChainOutcome {
                        artifact,
                        strategy: strategy.name(),
                        index,
                        failures,
                    });
                }
                Err(e) => {
                    tracing::error!(strategy = strategy.name(), error = %e, "export strategy failed");
                    failures.push((strategy.name(), e));
                }
            }
        }
        Err(failures
            .pop()
            .map(|(_, e)| e)
            .unwrap_or_else(|| ExportError::Render("no export strategy configured".to_string())))
    }
}

impl Default for FallbackChain<'_> {
    fn default() -> Self {
        Self::report()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plain::NO_CONTENT;
    use chrono::NaiveDate;

    struct Failing;

    impl ExportStrategy for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn produce(&self, _input: &StrategyInput<'_>) -> Result<Artifact, ExportError> {
            Err(ExportError::Render("synthesis failed".into()))
        }
    }

    fn input<'a>(namer: &'a FileNamer, content: Option<&'a str>) -> StrategyInput<'a> {
        StrategyInput {
            file_name: "Paper.docx",
            issues: &[],
            edited_content: content,
            generated: NaiveDate::from_ymd_opt(2024, 1, 31)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            namer,
        }
    }

    #[test]
    fn test_first_strategy_wins() {
        let namer = FileNamer::default();
        let outcome = FallbackChain::report().run(&input(&namer, None)).unwrap();
        assert_eq!(outcome.strategy, "word-report");
        assert!(!outcome.degraded());
        assert_eq!(outcome.artifact.file_name, "Corrected_Paper_20240131.html");
        assert_eq!(outcome.artifact.mime_type, mime::WORD_HTML);
    }

    #[test]
    fn test_degrades_to_text() {
        let namer = FileNamer::default();
        let chain = FallbackChain::new().then(Failing).then(RawTextStrategy);

        let outcome = chain.run(&input(&namer, Some("<p>edited</p>"))).unwrap();
        assert!(outcome.degraded());
        assert_eq!(outcome.strategy, "plain-text");
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.artifact.file_name, "Corrected_Paper.txt");
        assert_eq!(outcome.artifact.bytes, b"<p>edited</p>");

        let outcome = chain.run(&input(&namer, None)).unwrap();
        assert_eq!(outcome.artifact.bytes, NO_CONTENT.as_bytes());
    }

    #[test]
    fn test_all_failing_returns_last_error() {
        let namer = FileNamer::default();
        let chain = FallbackChain::new().then(Failing);
        assert!(matches!(
            chain.run(&input(&namer, None)),
            Err(ExportError::Render(_))
        ));
        assert!(FallbackChain::new().is_empty());
    }
}
