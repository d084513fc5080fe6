//! Tool: manage_plan — model-facing plan operations.
//!
//! Dispatches over an `action` enum. Administrative operations (list,
//! reorder, remove, compact) stay on the `plan` CLI subcommands; the model
//! only works with one plan at a time.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use smolcode_plan::{Planner, StepStatus};

use super::{output, parse_args, Tool, ToolArgs, ToolError, ToolOutput};

pub struct ManagePlanTool {
    planner: Arc<Planner>,
}

impl ManagePlanTool {
    pub fn new(planner: Arc<Planner>) -> Self {
        Self { planner }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum Action {
    Inspect,
    GetNextStep,
    SetStatus,
    AddSteps,
    IsCompleted,
}

#[derive(Deserialize)]
struct Args {
    action: Action,
    plan: String,
    #[serde(default)]
    step_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    steps: Option<Vec<NewStep>>,
}

#[derive(Deserialize)]
struct NewStep {
    id: String,
    description: String,
    #[serde(default)]
    acceptance_criteria: Vec<String>,
}

#[async_trait]
impl Tool for ManagePlanTool {
    fn name(&self) -> &str {
        "manage_plan"
    }

    fn description(&self) -> &str {
        "Work with a named plan: inspect it, fetch the next open step, mark \
         steps TODO/DONE, append new steps, or check whether everything is \
         done. Plans that do not exist yet are created on add_steps."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "format": "enum",
                    "enum": ["inspect", "get_next_step", "set_status", "add_steps", "is_completed"],
                    "description": "Operation to perform."
                },
                "plan": {
                    "type": "string",
                    "description": "Plan name."
                },
                "step_id": {
                    "type": "string",
                    "description": "Step id (set_status only)."
                },
                "status": {
                    "type": "string",
                    "format": "enum",
                    "enum": ["TODO", "DONE"],
                    "description": "New status (set_status only)."
                },
                "steps": {
                    "type": "array",
                    "description": "Steps to append (add_steps only).",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "description": { "type": "string" },
                            "acceptance_criteria": {
                                "type": "array",
                                "items": { "type": "string" }
                            }
                        },
                        "required": ["id", "description"]
                    }
                }
            },
            "required": ["action", "plan"]
        })
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let args: Args = parse_args(args)?;
        let fail = |e: smolcode_plan::PlanError| ToolError::Failed(e.to_string());

        match args.action {
            Action::Inspect => {
                let plan = self.planner.get(&args.plan).map_err(fail)?;
                Ok(output(serde_json::json!({ "plan": plan.inspect() })))
            }
            Action::GetNextStep => {
                let plan = self.planner.get(&args.plan).map_err(fail)?;
                match plan.next_step() {
                    Some(step) => Ok(output(serde_json::json!({
                        "id": step.id,
                        "description": step.description,
                        "acceptance_criteria": step.acceptance_criteria,
                    }))),
                    None => Ok(output(serde_json::json!({ "done": true }))),
                }
            }
            Action::SetStatus => {
                let step_id = args.step_id.ok_or(ToolError::InvalidInput {
                    field: "step_id",
                    reason: "required for set_status".to_string(),
                })?;
                let status: StepStatus = args
                    .status
                    .as_deref()
                    .unwrap_or("DONE")
                    .parse()
                    .map_err(|reason| ToolError::InvalidInput {
                        field: "status",
                        reason,
                    })?;
                let mut plan = self.planner.get(&args.plan).map_err(fail)?;
                plan.set_status(&step_id, status).map_err(fail)?;
                self.planner.save(&plan).map_err(fail)?;
                Ok(output(serde_json::json!({ "updated": step_id })))
            }
            Action::AddSteps => {
                let steps = args.steps.unwrap_or_default();
                if steps.is_empty() {
                    return Err(ToolError::InvalidInput {
                        field: "steps",
                        reason: "add_steps needs at least one step".to_string(),
                    });
                }
                let mut plan = match self.planner.get(&args.plan) {
                    Ok(p) => p,
                    Err(smolcode_plan::PlanError::NotFound { .. }) => {
                        self.planner.create(&args.plan).map_err(fail)?
                    }
                    Err(e) => return Err(fail(e)),
                };
                let mut added = Vec::with_capacity(steps.len());
                for step in steps {
                    plan.add_step(step.id.clone(), step.description, step.acceptance_criteria)
                        .map_err(fail)?;
                    added.push(step.id);
                }
                self.planner.save(&plan).map_err(fail)?;
                Ok(output(serde_json::json!({ "added": added })))
            }
            Action::IsCompleted => {
                let plan = self.planner.get(&args.plan).map_err(fail)?;
                Ok(output(
                    serde_json::json!({ "completed": plan.is_completed() }),
                ))
            }
        }
    }
}
