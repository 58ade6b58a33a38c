//! Output formatting for CLI commands.

use serde::{Deserialize, Serialize};

use crate::cli::args::{LexiclassArgs, OutputFormat};
use crate::error::Result;

/// Summary of a training run.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TrainingReport {
    pub seed: u64,
    pub features: usize,
    pub training_records: usize,
    pub evaluation_records: usize,
    pub epochs_run: usize,
    pub best_epoch: Option<usize>,
    pub best_score: f64,
    pub accuracy: f64,
    pub model_file: String,
    pub evaluation_file: String,
    pub duration_ms: u64,
}

/// Loaded models and bound adapters of a serving process.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServingReport {
    pub models: Vec<String>,
    pub adapters: Vec<String>,
}

/// Print a command result in the selected format.
pub fn output_result<T: Serialize>(message: &str, result: &T, args: &LexiclassArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => output_human(message, result, args),
        OutputFormat::Json => output_json(result, args),
    }
}

fn output_human<T: Serialize>(message: &str, result: &T, args: &LexiclassArgs) -> Result<()> {
    if args.verbosity() > 0 {
        println!("{message}");
        println!();
    }

    let value = serde_json::to_value(result)?;
    if let Some(obj) = value.as_object() {
        for (key, value) in obj {
            match value {
                serde_json::Value::Array(items) => {
                    println!("{key}:");
                    for item in items {
                        println!("  {}", display_value(item));
                    }
                }
                other => println!("{key}: {}", display_value(other)),
            }
        }
    } else {
        println!("{}", display_value(&value));
    }
    Ok(())
}

fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "-".to_string(),
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => format!("{f:.4}"),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

fn output_json<T: Serialize>(result: &T, args: &LexiclassArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&json!("x")), "x");
        assert_eq!(display_value(&json!(3)), "3");
        assert_eq!(display_value(&json!(0.5)), "0.5000");
        assert_eq!(display_value(&json!(null)), "-");
    }
}
