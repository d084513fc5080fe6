use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{PlanError, Result};
use crate::types::Plan;

/// Listing row for `plan list`.
#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    pub name: String,
    pub total_steps: usize,
    pub completed_steps: usize,
}

/// Plan storage: one `<name>.json` file per plan under a root directory.
pub struct Planner {
    root: PathBuf,
}

impl Planner {
    /// Create a planner rooted at `root`, creating the directory if absent.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn plan_path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(format!("{name}.json")))
    }

    /// Create a new empty plan. Fails when the plan already exists.
    pub fn create(&self, name: &str) -> Result<Plan> {
        let path = self.plan_path(name)?;
        if path.exists() {
            return Err(PlanError::AlreadyExists {
                name: name.to_string(),
            });
        }
        let plan = Plan::new(name);
        self.write(&path, &plan)?;
        Ok(plan)
    }

    /// Load a plan by name.
    pub fn get(&self, name: &str) -> Result<Plan> {
        let path = self.plan_path(name)?;
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PlanError::NotFound {
                    name: name.to_string(),
                })
            }
            Err(e) => return Err(PlanError::Io(e)),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Replace the stored plan with the given value.
    pub fn save(&self, plan: &Plan) -> Result<()> {
        let path = self.plan_path(&plan.name)?;
        self.write(&path, plan)
    }

    // Temp file + rename so a crash mid-write never corrupts the plan.
    fn write(&self, path: &Path, plan: &Plan) -> Result<()> {
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(plan)?)?;
        std::fs::rename(&tmp, path)?;
        debug!(name = %plan.name, steps = plan.steps.len(), "plan saved");
        Ok(())
    }

    /// Summaries of every stored plan, sorted by name. Unreadable files are
    /// logged and skipped.
    pub fn list(&self) -> Result<Vec<PlanSummary>> {
        let mut summaries = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let plan: Plan = match std::fs::read(&path)
                .map_err(PlanError::Io)
                .and_then(|b| serde_json::from_slice(&b).map_err(PlanError::Decode))
            {
                Ok(p) => p,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable plan file");
                    continue;
                }
            };
            summaries.push(PlanSummary {
                total_steps: plan.steps.len(),
                completed_steps: plan
                    .steps
                    .iter()
                    .filter(|s| s.status == crate::types::StepStatus::Done)
                    .count(),
                name: plan.name,
            });
        }
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }

    /// Delete a plan by name.
    pub fn remove(&self, name: &str) -> Result<()> {
        let path = self.plan_path(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(PlanError::NotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(PlanError::Io(e)),
        }
    }

    /// Remove every plan whose steps are all DONE. Returns the removed
    /// names, sorted.
    pub fn compact(&self) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for summary in self.list()? {
            let plan = match self.get(&summary.name) {
                Ok(p) => p,
                Err(_) => continue,
            };
            if plan.is_completed() {
                self.remove(&plan.name)?;
                removed.push(plan.name);
            }
        }
        removed.sort();
        Ok(removed)
    }

    /// Reorder a stored plan's steps (see `Plan::reorder`) and save.
    pub fn reorder(&self, name: &str, ids: &[String]) -> Result<Plan> {
        let mut plan = self.get(name)?;
        plan.reorder(ids);
        self.save(&plan)?;
        Ok(plan)
    }
}

fn validate_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && !name.starts_with('.')
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'));
    if ok {
        Ok(())
    } else {
        Err(PlanError::InvalidName {
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StepStatus;

    fn planner() -> (tempfile::TempDir, Planner) {
        let dir = tempfile::tempdir().expect("tempdir");
        let planner = Planner::open(dir.path().join("plans")).expect("open");
        (dir, planner)
    }

    #[test]
    fn lifecycle_create_complete_compact() {
        let (_dir, planner) = planner();
        planner.create("p").unwrap();

        let mut plan = planner.get("p").unwrap();
        plan.add_step("s1", "desc", vec![]).unwrap();
        plan.set_status("s1", StepStatus::Done).unwrap();
        planner.save(&plan).unwrap();

        assert!(planner.get("p").unwrap().is_completed());
        assert_eq!(planner.compact().unwrap(), vec!["p".to_string()]);
        assert!(matches!(
            planner.get("p"),
            Err(PlanError::NotFound { .. })
        ));
    }

    #[test]
    fn compact_keeps_plans_with_todo_steps() {
        let (_dir, planner) = planner();
        let mut plan = planner.create("open").unwrap();
        plan.add_step("s1", "still pending", vec![]).unwrap();
        planner.save(&plan).unwrap();

        assert!(planner.compact().unwrap().is_empty());
        assert!(planner.get("open").is_ok());
    }

    #[test]
    fn create_twice_is_already_exists() {
        let (_dir, planner) = planner();
        planner.create("p").unwrap();
        assert!(matches!(
            planner.create("p"),
            Err(PlanError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn list_counts_completion() {
        let (_dir, planner) = planner();
        let mut plan = planner.create("p").unwrap();
        plan.add_step("s1", "one", vec![]).unwrap();
        plan.add_step("s2", "two", vec![]).unwrap();
        plan.set_status("s1", StepStatus::Done).unwrap();
        planner.save(&plan).unwrap();

        let list = planner.list().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].total_steps, 2);
        assert_eq!(list[0].completed_steps, 1);
    }

    #[test]
    fn hostile_names_are_rejected() {
        let (_dir, planner) = planner();
        for name in ["../escape", "a/b", "", ".hidden", "nul\0byte"] {
            assert!(
                matches!(planner.create(name), Err(PlanError::InvalidName { .. })),
                "name {name:?} should be invalid"
            );
        }
    }

    #[test]
    fn reorder_persists() {
        let (_dir, planner) = planner();
        let mut plan = planner.create("p").unwrap();
        for id in ["a", "b", "c"] {
            plan.add_step(id, id, vec![]).unwrap();
        }
        planner.save(&plan).unwrap();

        planner.reorder("p", &["b".into()]).unwrap();
        let order: Vec<String> = planner
            .get("p")
            .unwrap()
            .steps
            .iter()
            .map(|s| s.id.clone())
            .collect();
        assert_eq!(order, ["b", "a", "c"]);
    }
}
