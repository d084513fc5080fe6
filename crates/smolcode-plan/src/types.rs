use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    #[serde(rename = "TODO")]
    Todo,
    #[serde(rename = "DONE")]
    Done,
}

impl std::str::FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TODO" => Ok(StepStatus::Todo),
            "DONE" => Ok(StepStatus::Done),
            other => Err(format!("unknown status: {other} (expected TODO or DONE)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub description: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acceptance_criteria: Vec<String>,
}

/// A named ordered list of steps. Step ids are unique within a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Plan {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a TODO step. Fails on a duplicate id.
    pub fn add_step(
        &mut self,
        id: impl Into<String>,
        description: impl Into<String>,
        acceptance_criteria: Vec<String>,
    ) -> Result<()> {
        let id = id.into();
        if self.steps.iter().any(|s| s.id == id) {
            return Err(PlanError::DuplicateStep {
                plan: self.name.clone(),
                step: id,
            });
        }
        self.steps.push(Step {
            id,
            description: description.into(),
            status: StepStatus::Todo,
            acceptance_criteria,
        });
        Ok(())
    }

    pub fn set_status(&mut self, step_id: &str, status: StepStatus) -> Result<()> {
        match self.steps.iter_mut().find(|s| s.id == step_id) {
            Some(step) => {
                step.status = status;
                Ok(())
            }
            None => Err(PlanError::StepNotFound {
                plan: self.name.clone(),
                step: step_id.to_string(),
            }),
        }
    }

    /// Drop every step whose id appears in `ids`. Unknown ids are ignored.
    pub fn remove_steps(&mut self, ids: &[String]) {
        self.steps.retain(|s| !ids.contains(&s.id));
    }

    /// First step that is not DONE, or `None` when nothing is left to do.
    pub fn next_step(&self) -> Option<&Step> {
        self.steps.iter().find(|s| s.status != StepStatus::Done)
    }

    /// All steps DONE. Vacuously true for an empty plan, so a plan whose
    /// steps were all removed individually still compacts away.
    pub fn is_completed(&self) -> bool {
        self.steps.iter().all(|s| s.status == StepStatus::Done)
    }

    /// Steps whose ids appear in `ids` move to the front, in that order;
    /// everything else keeps its relative order behind them. Unknown ids
    /// are ignored.
    pub fn reorder(&mut self, ids: &[String]) {
        let mut front: Vec<Step> = Vec::new();
        for id in ids {
            if let Some(pos) = self.steps.iter().position(|s| &s.id == id) {
                front.push(self.steps.remove(pos));
            }
        }
        front.append(&mut self.steps);
        self.steps = front;
    }

    /// Render a human-readable Markdown view.
    pub fn inspect(&self) -> String {
        let mut out = format!("# Plan: {}\n", self.name);
        if self.steps.is_empty() {
            out.push_str("\n(no steps)\n");
            return out;
        }
        for step in &self.steps {
            let mark = match step.status {
                StepStatus::Done => "x",
                StepStatus::Todo => " ",
            };
            out.push_str(&format!("\n- [{}] **{}** — {}\n", mark, step.id, step.description));
            for criterion in &step.acceptance_criteria {
                out.push_str(&format!("  - {criterion}\n"));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_with_steps(ids: &[&str]) -> Plan {
        let mut plan = Plan::new("p");
        for id in ids {
            plan.add_step(*id, format!("step {id}"), vec![]).unwrap();
        }
        plan
    }

    #[test]
    fn duplicate_step_id_is_rejected() {
        let mut plan = plan_with_steps(&["s1"]);
        assert!(matches!(
            plan.add_step("s1", "again", vec![]),
            Err(PlanError::DuplicateStep { .. })
        ));
    }

    #[test]
    fn next_step_skips_done() {
        let mut plan = plan_with_steps(&["s1", "s2", "s3"]);
        plan.set_status("s1", StepStatus::Done).unwrap();
        assert_eq!(plan.next_step().unwrap().id, "s2");
        plan.set_status("s2", StepStatus::Done).unwrap();
        plan.set_status("s3", StepStatus::Done).unwrap();
        assert!(plan.next_step().is_none());
    }

    #[test]
    fn empty_plan_is_completed() {
        assert!(Plan::new("empty").is_completed());
    }

    #[test]
    fn remove_steps_ignores_unknown_ids() {
        let mut plan = plan_with_steps(&["a", "b", "c"]);
        plan.remove_steps(&["b".into(), "zz".into()]);
        let order: Vec<&str> = plan.steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(order, ["a", "c"]);
    }

    #[test]
    fn set_status_unknown_step_is_error() {
        let mut plan = plan_with_steps(&["s1"]);
        assert!(matches!(
            plan.set_status("nope", StepStatus::Done),
            Err(PlanError::StepNotFound { .. })
        ));
    }

    #[test]
    fn reorder_moves_named_steps_to_front() {
        let mut plan = plan_with_steps(&["a", "b", "c", "d"]);
        plan.reorder(&["c".into(), "a".into()]);
        let order: Vec<&str> = plan.steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(order, ["c", "a", "b", "d"]);
    }

    #[test]
    fn reorder_keeps_unmentioned_relative_order() {
        let mut plan = plan_with_steps(&["a", "b", "c", "d", "e"]);
        plan.reorder(&["d".into(), "unknown".into()]);
        let order: Vec<&str> = plan.steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(order, ["d", "a", "b", "c", "e"]);
    }

    #[test]
    fn status_serializes_uppercase() {
        let plan = plan_with_steps(&["s1"]);
        let json = serde_json::to_string(&plan).unwrap();
        assert!(json.contains("\"TODO\""));
    }

    #[test]
    fn inspect_renders_checkboxes_and_criteria() {
        let mut plan = Plan::new("release");
        plan.add_step("tag", "Tag the release", vec!["tag exists".into()])
            .unwrap();
        plan.set_status("tag", StepStatus::Done).unwrap();
        let md = plan.inspect();
        assert!(md.contains("# Plan: release"));
        assert!(md.contains("- [x] **tag**"));
        assert!(md.contains("  - tag exists"));
    }
}
