// src/script/mod.rs

//! Submission script generation.
//!
//! One job becomes one batch script. Each task directory runs in its own
//! subshell so that a failing command only stops the remaining slots of that
//! task; sibling tasks still run and mark their own progress. Tag files are
//! created with `touch`, the job-id marker with a write-then-rename, so a
//! reader polling the remote root never observes a half-written artifact.
//!
//! - [`dialect`] describes the scheduler-specific parts (shebang, directive
//!   lines, job-id variable).
//! - [`quote`] holds the shell quoting helper.

pub mod dialect;
pub mod quote;

use std::collections::BTreeMap;

use crate::tags::{slot_tag, TagLayout, TASK_FINISHED_TAG};
use crate::types::TaskSpec;

pub use dialect::ScriptDialect;
pub use quote::shell_quote;

/// Environment name holding the directory the job started in.
const ROOT_VAR: &str = "JOBTAG_ROOT";

/// Script-level knobs that do not depend on the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOptions {
    /// File (inside each task dir) receiving appended command stdout.
    pub outlog: String,
    /// File (inside each task dir) receiving appended command stderr.
    pub errlog: String,
    /// Run task subshells concurrently and `wait` for all of them.
    pub parallel_tasks: bool,
    /// `module load` lines emitted before any task.
    pub module_list: Vec<String>,
    /// Files sourced before any task.
    pub source_list: Vec<String>,
    /// Variables exported before any task.
    pub envs: BTreeMap<String, String>,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self {
            outlog: "log".to_string(),
            errlog: "err".to_string(),
            parallel_tasks: true,
            module_list: Vec::new(),
            source_list: Vec::new(),
            envs: BTreeMap::new(),
        }
    }
}

/// Build the batch script for `tasks`.
///
/// With `restart` set, every slot is guarded by a check on its own marker,
/// so a resubmission re-runs only slots whose marker is absent. Slot indices
/// are the positions in each task's command list and do not shift when
/// earlier slots are skipped.
pub fn generate(
    dialect: &ScriptDialect,
    layout: &TagLayout,
    tasks: &[TaskSpec],
    options: &ScriptOptions,
    restart: bool,
) -> String {
    let mut lines: Vec<String> = Vec::new();

    lines.push(dialect.shebang.clone());
    lines.extend(dialect.directives.iter().cloned());
    lines.push(String::new());

    lines.push(format!("{ROOT_VAR}=\"$(pwd)\""));
    lines.push(format!(
        "printf '%s' \"{}\" > {} && mv -f {} {}",
        dialect.job_id_expr,
        shell_quote(&layout.job_id_staging()),
        shell_quote(&layout.job_id_staging()),
        shell_quote(&layout.job_id_marker()),
    ));
    lines.push(String::new());

    push_environment(&mut lines, options);

    for task in tasks {
        push_task(&mut lines, task, options, restart);
    }

    if options.parallel_tasks {
        lines.push("wait".to_string());
    }
    lines.push(String::new());
    push_job_marker(&mut lines, layout, tasks);

    let mut script = lines.join("\n");
    script.push('\n');
    script
}

fn push_environment(lines: &mut Vec<String>, options: &ScriptOptions) {
    for module in &options.module_list {
        lines.push(format!("module load {module}"));
    }
    for file in &options.source_list {
        lines.push(format!("source {}", shell_quote(file)));
    }
    for (key, value) in &options.envs {
        lines.push(format!("export {key}={}", shell_quote(value)));
    }
    if !(options.module_list.is_empty() && options.source_list.is_empty() && options.envs.is_empty())
    {
        lines.push(String::new());
    }
}

fn push_task(lines: &mut Vec<String>, task: &TaskSpec, options: &ScriptOptions, restart: bool) {
    let out = shell_quote(&options.outlog);
    let err = shell_quote(&options.errlog);

    lines.push("(".to_string());
    lines.push(format!("  cd {} || exit 1", shell_quote(&task.dir)));
    if restart {
        lines.push(format!("  if [ -f {TASK_FINISHED_TAG} ]; then exit 0; fi"));
    }

    for (slot, cmd) in task.commands.iter().enumerate() {
        let tag = slot_tag(slot);
        let indent = if restart { "    " } else { "  " };
        if restart {
            lines.push(format!("  if [ ! -f {tag} ]; then"));
        }
        lines.push(format!("{indent}{{"));
        if cmd.trim().is_empty() {
            // `{ }` with no command is a syntax error for the whole script.
            lines.push(format!("{indent}  :"));
        }
        for cmd_line in cmd.lines() {
            lines.push(format!("{indent}  {cmd_line}"));
        }
        lines.push(format!("{indent}}} 1>> {out} 2>> {err} || exit $?"));
        lines.push(format!("{indent}touch {tag}"));
        if restart {
            lines.push("  fi".to_string());
        }
    }

    lines.push(format!("  touch {TASK_FINISHED_TAG}"));
    if options.parallel_tasks {
        lines.push(") &".to_string());
    } else {
        lines.push(")".to_string());
    }
}

fn push_job_marker(lines: &mut Vec<String>, layout: &TagLayout, tasks: &[TaskSpec]) {
    lines.push(format!("cd \"${ROOT_VAR}\" || exit 1"));
    if !tasks.is_empty() {
        let dirs: Vec<String> = tasks.iter().map(|t| shell_quote(&t.dir)).collect();
        lines.push(format!("for d in {}; do", dirs.join(" ")));
        lines.push(format!("  [ -f \"$d/{TASK_FINISHED_TAG}\" ] || exit 1"));
        lines.push("done".to_string());
    }
    lines.push(format!("touch {}", shell_quote(&layout.job_marker())));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dialect() -> ScriptDialect {
        ScriptDialect {
            shebang: "#!/bin/bash -l".to_string(),
            directives: vec!["#SBATCH --nodes=1".to_string()],
            job_id_expr: "$SLURM_JOB_ID".to_string(),
        }
    }

    fn layout() -> TagLayout {
        TagLayout::new("u1".parse().unwrap())
    }

    fn two_tasks() -> Vec<TaskSpec> {
        TaskSpec::uniform(&["task0", "task1"], &["touch test1", "touch test2"])
    }

    #[test]
    fn job_id_marker_is_written_before_any_task() {
        let script = generate(&dialect(), &layout(), &two_tasks(), &ScriptOptions::default(), false);

        let id_line = script.find("u1_job_id").unwrap();
        let first_task = script.find("cd task0").unwrap();
        assert!(id_line < first_task);
        assert!(script.contains("printf '%s' \"$SLURM_JOB_ID\" > u1_job_id.tmp && mv -f u1_job_id.tmp u1_job_id"));
        assert!(script.starts_with("#!/bin/bash -l\n#SBATCH --nodes=1\n"));
    }

    #[test]
    fn every_slot_is_followed_by_its_marker() {
        let script = generate(&dialect(), &layout(), &two_tasks(), &ScriptOptions::default(), false);

        let run = script.find("touch test2").unwrap();
        let tag = script.find("touch tag_1_finished").unwrap();
        assert!(run < tag);
        assert_eq!(script.matches("touch tag_0_finished").count(), 2);
        assert_eq!(script.matches("touch tag_finished").count(), 2);
        assert!(script.contains("} 1>> log 2>> err || exit $?"));
        assert!(!script.contains("if [ ! -f"));
    }

    #[test]
    fn whole_job_marker_comes_last_and_checks_each_task() {
        let script = generate(&dialect(), &layout(), &two_tasks(), &ScriptOptions::default(), false);

        assert!(script.contains("wait\n"));
        assert!(script.contains("for d in task0 task1; do"));
        assert!(script.trim_end().ends_with("touch u1_tag_finished"));
    }

    #[test]
    fn restart_guards_each_slot_with_its_own_marker() {
        let script = generate(&dialect(), &layout(), &two_tasks(), &ScriptOptions::default(), true);

        assert!(script.contains("  if [ -f tag_finished ]; then exit 0; fi"));
        assert!(script.contains("  if [ ! -f tag_0_finished ]; then"));
        assert!(script.contains("  if [ ! -f tag_1_finished ]; then"));
        assert!(script.contains("    touch tag_1_finished"));
    }

    #[test]
    fn task_without_commands_still_marks_itself_finished() {
        let tasks = vec![TaskSpec::new("empty", Vec::new())];
        let script = generate(&dialect(), &layout(), &tasks, &ScriptOptions::default(), false);

        assert!(script.contains("cd empty || exit 1\n  touch tag_finished\n"));
        assert!(!script.contains("tag_0_finished"));
    }

    #[test]
    fn sequential_mode_runs_subshells_in_foreground() {
        let options = ScriptOptions {
            parallel_tasks: false,
            ..ScriptOptions::default()
        };
        let script = generate(&dialect(), &layout(), &two_tasks(), &options, false);

        assert!(!script.contains(") &"));
        assert!(!script.contains("\nwait\n"));
    }

    #[test]
    fn environment_is_set_up_before_tasks() {
        let mut options = ScriptOptions::default();
        options.module_list.push("gcc/12".to_string());
        options.source_list.push("/opt/env.sh".to_string());
        options.envs.insert("OMP_NUM_THREADS".to_string(), "4".to_string());
        let script = generate(&dialect(), &layout(), &two_tasks(), &options, false);

        let env = script.find("export OMP_NUM_THREADS=4").unwrap();
        assert!(script.contains("module load gcc/12"));
        assert!(script.contains("source /opt/env.sh"));
        assert!(env < script.find("cd task0").unwrap());
    }

    #[test]
    fn multi_line_commands_stay_inside_the_group() {
        let tasks = vec![TaskSpec::new("t", vec!["echo a\necho b".to_string()])];
        let script = generate(&dialect(), &layout(), &tasks, &ScriptOptions::default(), false);

        assert!(script.contains("  {\n    echo a\n    echo b\n  } 1>> log 2>> err || exit $?"));
    }

    #[test]
    fn blank_command_becomes_a_no_op() {
        let tasks = vec![TaskSpec::new("t", vec![String::new()])];
        let script = generate(&dialect(), &layout(), &tasks, &ScriptOptions::default(), false);

        assert!(script.contains("  {\n    :\n  } 1>> log 2>> err || exit $?"));
        assert!(!script.contains("{\n  }"));
    }
}
