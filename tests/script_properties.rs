use proptest::prelude::*;

use jobtag::script::{generate, ScriptDialect, ScriptOptions};
use jobtag::tags::TagLayout;
use jobtag::types::TaskSpec;

fn dialect() -> ScriptDialect {
    ScriptDialect {
        shebang: "#!/bin/bash".to_string(),
        directives: Vec::new(),
        job_id_expr: "$$".to_string(),
    }
}

// Task lists with distinct dirs and 0..6 simple commands each.
fn tasks_strategy() -> impl Strategy<Value = Vec<TaskSpec>> {
    proptest::collection::vec(proptest::collection::vec("[a-z]{1,8}", 0..6), 1..5).prop_map(
        |cmd_lists| {
            cmd_lists
                .into_iter()
                .enumerate()
                .map(|(i, cmds)| {
                    let commands = cmds.into_iter().map(|c| format!("echo {c}")).collect();
                    TaskSpec::new(format!("task{i}"), commands)
                })
                .collect()
        },
    )
}

proptest! {
    #[test]
    fn slot_markers_follow_command_positions(tasks in tasks_strategy(), restart in any::<bool>()) {
        let layout = TagLayout::new("p1".parse().unwrap());
        let script = generate(&dialect(), &layout, &tasks, &ScriptOptions::default(), restart);

        for task in &tasks {
            let start = script.find(&format!("cd {} ||", task.dir)).unwrap();
            let body = &script[start..];
            let end = body.find("touch tag_finished").unwrap();
            let body = &body[..end];

            let mut cursor = 0;
            for (slot, cmd) in task.commands.iter().enumerate() {
                let at = body[cursor..].find(cmd.as_str()).unwrap() + cursor;
                let touch = format!("touch tag_{slot}_finished");
                let marker_at = body[at..].find(&touch).unwrap() + at;
                if restart {
                    let guard = format!("if [ ! -f tag_{slot}_finished ]; then");
                    let guard_at = body[cursor..].find(&guard).unwrap() + cursor;
                    prop_assert!(guard_at < at);
                }
                cursor = marker_at + touch.len();
            }
            let past_end = format!("tag_{}_finished", task.commands.len());
            prop_assert!(!body.contains(&past_end));
        }
    }

    #[test]
    fn job_marker_is_the_last_command(tasks in tasks_strategy(), restart in any::<bool>()) {
        let layout = TagLayout::new("p2".parse().unwrap());
        let script = generate(&dialect(), &layout, &tasks, &ScriptOptions::default(), restart);

        prop_assert!(script.trim_end().ends_with("touch p2_tag_finished"));
        prop_assert_eq!(script.matches("p2_tag_finished").count(), 1);
        for task in &tasks {
            let check = script.rfind("for d in").unwrap();
            prop_assert!(script[check..].contains(task.dir.as_str()));
        }
    }
}
