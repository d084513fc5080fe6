use clap::Subcommand;

use smolcode_plan::{Planner, StepStatus};

#[derive(Debug, Subcommand)]
pub enum PlanCmd {
    /// Create a new empty plan.
    New { name: String },
    /// Render a plan as Markdown.
    Inspect { name: String },
    /// Print the first step that is not DONE.
    NextStep { name: String },
    /// Set a step's status (TODO or DONE).
    Set {
        name: String,
        step_id: String,
        status: String,
    },
    /// Append a step to a plan.
    AddStep {
        name: String,
        id: String,
        description: String,
        /// Acceptance criteria, repeatable.
        #[arg(long = "criterion")]
        criteria: Vec<String>,
    },
    /// List plans with their completion counts.
    List,
    /// Move the named steps to the front of a plan, in the given order.
    Reorder { name: String, ids: Vec<String> },
    /// Remove every plan whose steps are all DONE.
    Compact,
    /// Delete plans by name.
    Remove { names: Vec<String> },
}

pub fn run(cmd: PlanCmd, planner: &Planner) -> anyhow::Result<()> {
    match cmd {
        PlanCmd::New { name } => {
            planner.create(&name)?;
            println!("created {name}");
        }
        PlanCmd::Inspect { name } => {
            print!("{}", planner.get(&name)?.inspect());
        }
        PlanCmd::NextStep { name } => {
            let plan = planner.get(&name)?;
            match plan.next_step() {
                Some(step) => println!("{}: {}", step.id, step.description),
                None => println!("all steps are done"),
            }
        }
        PlanCmd::Set {
            name,
            step_id,
            status,
        } => {
            let status: StepStatus = status.parse().map_err(anyhow::Error::msg)?;
            let mut plan = planner.get(&name)?;
            plan.set_status(&step_id, status)?;
            planner.save(&plan)?;
            println!("{name}/{step_id} set");
        }
        PlanCmd::AddStep {
            name,
            id,
            description,
            criteria,
        } => {
            let mut plan = planner.get(&name)?;
            plan.add_step(&id, &description, criteria)?;
            planner.save(&plan)?;
            println!("added {name}/{id}");
        }
        PlanCmd::List => {
            for summary in planner.list()? {
                println!(
                    "{}  {}/{} done",
                    summary.name, summary.completed_steps, summary.total_steps
                );
            }
        }
        PlanCmd::Reorder { name, ids } => {
            planner.reorder(&name, &ids)?;
            println!("reordered {name}");
        }
        PlanCmd::Compact => {
            for name in planner.compact()? {
                println!("removed {name}");
            }
        }
        PlanCmd::Remove { names } => {
            // Per-name outcomes: one failure does not stop the rest.
            for name in names {
                match planner.remove(&name) {
                    Ok(()) => println!("removed {name}"),
                    Err(e) => println!("{name}: {e}"),
                }
            }
        }
    }
    Ok(())
}
