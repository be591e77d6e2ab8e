//! `lifeline plan`: print the run's stages without touching any collaborator

use crate::cli::OutputFormat;
use anyhow::Result;
use console::style;
use lifeline_core::config::RunConfig;
use lifeline_core::script::{LifecycleScript, RunState};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlannedStage<'a> {
    index: usize,
    name: &'a str,
    steps: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Plan<'a> {
    stages: Vec<PlannedStage<'a>>,
    total_steps: usize,
    final_state: String,
}

pub fn execute(config: &RunConfig, output: OutputFormat) -> Result<()> {
    let script = LifecycleScript::standard(config);
    let final_state = script.validate()?;
    println!("{}", render(&script, &final_state, output)?);
    Ok(())
}

fn render(script: &LifecycleScript, final_state: &RunState, output: OutputFormat) -> Result<String> {
    match output {
        OutputFormat::Json => {
            let plan = Plan {
                stages: script
                    .stages()
                    .iter()
                    .enumerate()
                    .map(|(position, stage)| PlannedStage {
                        index: position + 1,
                        name: &stage.name,
                        steps: stage.steps.iter().map(|s| s.name.as_str()).collect(),
                    })
                    .collect(),
                total_steps: script.step_count(),
                final_state: final_state.to_string(),
            };
            Ok(serde_json::to_string_pretty(&plan)?)
        }
        OutputFormat::Text => {
            let mut out = String::new();
            for (position, stage) in script.stages().iter().enumerate() {
                out.push_str(&format!("{}\n", style(format!("{}. {}", position + 1, stage.name)).bold()));
                for step in &stage.steps {
                    out.push_str(&format!("   - {}\n", step.name));
                }
            }
            out.push_str(&format!(
                "\n{} stages, {} steps; ends with {}",
                script.stages().len(),
                script.step_count(),
                final_state
            ));
            Ok(out)
        }
    }
}
