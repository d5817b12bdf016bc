//! Property tests for placeholder substitution in `Task::render_prompt`
//! (§3 "Placeholder substitution", §8 invariant 8).

use std::collections::HashMap;
use std::time::Duration;

use proptest::prelude::*;
use reasoning_core::types::{BackendId, Priority, Task, TaskResult};

fn ident_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,8}".prop_map(|s| s)
}

// Excludes '{' and '}' so a dependency's output can never itself look like
// an unresolved placeholder and perturb a later, unrelated substitution.
fn output_strategy() -> impl Strategy<Value = String> {
    "[ -z|~]{0,40}".prop_map(|s| s)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// For any set of known dependency names and outputs, a prompt built
    /// entirely out of `{depName}` placeholders is rendered to exactly the
    /// (trimmed) concatenation of those outputs.
    #[test]
    fn known_placeholders_are_replaced_with_trimmed_output(
        deps in prop::collection::vec((ident_strategy(), output_strategy()), 1..5),
    ) {
        let mut unique: HashMap<String, String> = HashMap::new();
        for (name, output) in deps {
            unique.insert(name, output);
        }
        prop_assume!(!unique.is_empty());

        let dep_names: Vec<String> = unique.keys().cloned().collect();
        let prompt: String = dep_names.iter().map(|d| format!("{{{d}}}")).collect::<Vec<_>>().join("|");

        let task = Task::new("t", BackendId::Gpt, prompt, Priority::Medium, "explanation")
            .with_dependencies(dep_names.clone());

        let mut results = HashMap::new();
        for name in &dep_names {
            results.insert(
                name.clone(),
                TaskResult::success(name.clone(), unique[name].clone(), Duration::from_millis(1), 0),
            );
        }

        let rendered = task.render_prompt(&results);
        let expected = dep_names.iter().map(|d| unique[d].trim().to_string()).collect::<Vec<_>>().join("|");
        prop_assert_eq!(rendered, expected);
    }

    /// A placeholder naming a dependency with no entry in `results` (e.g. a
    /// dependency that failed and was never recorded, or a stray name not
    /// declared as a dependency at all) is left verbatim rather than
    /// replaced or dropped.
    #[test]
    fn unresolved_placeholders_are_left_verbatim(
        known in ident_strategy(),
        unknown in ident_strategy(),
        known_output in output_strategy(),
    ) {
        prop_assume!(known != unknown);

        let prompt = format!("before {{{known}}} middle {{{unknown}}} after");
        let task = Task::new("t", BackendId::Gpt, prompt, Priority::Medium, "explanation")
            .with_dependencies(vec![known.clone()]);

        let mut results = HashMap::new();
        results.insert(known.clone(), TaskResult::success(known.clone(), known_output.clone(), Duration::from_millis(1), 0));

        let rendered = task.render_prompt(&results);
        let expected = format!("before {} middle {{{unknown}}} after", known_output.trim());
        prop_assert_eq!(rendered, expected);
    }

    /// A prompt with no placeholders at all is returned unchanged regardless
    /// of what dependencies and results are supplied.
    #[test]
    fn prompt_without_placeholders_is_unchanged(
        prompt in "[ -~]{0,60}",
        dep in ident_strategy(),
        output in output_strategy(),
    ) {
        prop_assume!(!prompt.contains('{') && !prompt.contains('}'));

        let task = Task::new("t", BackendId::Gpt, prompt.clone(), Priority::Medium, "explanation")
            .with_dependencies(vec![dep.clone()]);

        let mut results = HashMap::new();
        results.insert(dep.clone(), TaskResult::success(dep, output, Duration::from_millis(1), 0));

        prop_assert_eq!(task.render_prompt(&results), prompt);
    }
}
