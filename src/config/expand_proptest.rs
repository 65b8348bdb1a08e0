//! Property-based tests for configuration merging and expansion.

#[cfg(test)]
mod proptest_tests {
    use crate::config::{parse, ArtifactsConfig, CopiesConfig};
    use crate::defaults::Layout;
    use proptest::prelude::*;

    fn artifact() -> impl Strategy<Value = ArtifactsConfig> {
        (
            prop_oneof![Just("local".to_string()), "[a-z]{3,6}"],
            prop_oneof![Just(String::new()), "[a-z]{1,4}/?"],
            prop_oneof![Just(String::new()), "/[a-z]{1,4}"],
        )
            .prop_map(|(from, source, destination)| ArtifactsConfig {
                from,
                source,
                destination,
            })
    }

    fn document(names: &[String], includes: &[(usize, usize)]) -> String {
        let mut yaml = String::from("version: v4\nbase: debian:bookworm\nvariants:\n");
        for (index, name) in names.iter().enumerate() {
            yaml.push_str(&format!("  {}:\n", name));
            // only include earlier variants so the graph stays acyclic
            let included: Vec<&str> = includes
                .iter()
                .filter(|(from, to)| *from == index && *to < index)
                .map(|(_, to)| names[*to].as_str())
                .collect();
            yaml.push_str(&format!("    includes: [{}]\n", included.join(", ")));
            yaml.push_str(&format!("    arguments: {{ARG_{}: \"{}\"}}\n", index, name));
        }
        yaml
    }

    proptest! {
        /// Property: expanding a variant never changes the parsed document,
        /// so expanding twice gives the same result
        #[test]
        fn expand_is_idempotent(
            count in 1usize..6,
            includes in prop::collection::vec((0usize..6, 0usize..6), 0..10),
        ) {
            let names: Vec<String> = (0..count).map(|i| format!("variant{}", i)).collect();
            let config = parse(&document(&names, &includes)).unwrap();

            for name in &names {
                let first = config.expand(name).unwrap();
                let second = config.expand(name).unwrap();
                prop_assert_eq!(first, second);
            }
        }

        /// Property: an expanded variant carries its own arguments and the
        /// arguments of every variant it includes
        #[test]
        fn expand_collects_included_arguments(
            count in 2usize..6,
            includes in prop::collection::vec((0usize..6, 0usize..6), 0..10),
        ) {
            let names: Vec<String> = (0..count).map(|i| format!("variant{}", i)).collect();
            let config = parse(&document(&names, &includes)).unwrap();

            for (index, name) in names.iter().enumerate() {
                let expanded = config.expand(name).unwrap();
                let own_argument = format!("ARG_{}", index);
                prop_assert!(expanded.common.arguments.0.contains_key(&own_argument));

                for dependency in config.includes_graph().get_deps(name).unwrap() {
                    let position = names.iter().position(|n| *n == dependency).unwrap();
                    let included_argument = format!("ARG_{}", position);
                    prop_assert!(expanded.common.arguments.0.contains_key(&included_argument));
                }
            }
        }

        /// Property: merging a copies list into itself leaves it unchanged
        /// when it has no duplicates
        #[test]
        fn copies_merge_with_self_is_stable(artifacts in prop::collection::vec(artifact(), 0..8)) {
            let mut unique: Vec<ArtifactsConfig> = Vec::new();
            for artifact in artifacts {
                if !unique.contains(&artifact) {
                    unique.push(artifact);
                }
            }
            let mut copies = CopiesConfig(unique.clone());
            copies.merge(&CopiesConfig(unique.clone()));
            prop_assert_eq!(copies.0, unique);
        }

        /// Property: every expanded copy has both a source and a destination
        #[test]
        fn expanded_copies_are_complete(
            artifacts in prop::collection::vec(artifact(), 0..8),
            app_dir in "/[a-z]{1,8}",
        ) {
            let expanded = CopiesConfig(artifacts).expand(&app_dir, &Layout::default());
            for artifact in expanded.iter() {
                prop_assert!(!artifact.source.is_empty());
                prop_assert!(!artifact.destination.is_empty());
            }
        }
    }
}
