//! Reading the nested option tree of an interaction.

use std::collections::HashMap;

use serde_json::Value;

use gantry_core::model::{InteractionData, InteractionDataOption};

/// The chosen command path: the command name followed by each selected
/// subcommand group and subcommand.
pub fn command_path(data: &InteractionData) -> Vec<String> {
    let mut path = vec![data.name.clone()];
    let mut options = &data.options;
    while let Some(sub) = options.iter().find(|o| o.is_subcommand()) {
        path.push(sub.name.clone());
        options = &sub.options;
    }
    path
}

/// Flattens the option tree depth-first into a name → value map.
///
/// Only options carrying a value are kept. When a name occurs at several
/// depths the deeper value wins.
pub fn flatten_options(options: &[InteractionDataOption]) -> HashMap<String, Value> {
    let mut flat = HashMap::new();
    collect(options, 0, &mut flat);
    flat.into_iter()
        .map(|(name, (_, value))| (name, value))
        .collect()
}

fn collect(
    options: &[InteractionDataOption],
    depth: usize,
    flat: &mut HashMap<String, (usize, Value)>,
) {
    for option in options {
        if let Some(value) = &option.value {
            match flat.get(&option.name) {
                Some((seen, _)) if *seen > depth => {}
                _ => {
                    flat.insert(option.name.clone(), (depth, value.clone()));
                }
            }
        }
        collect(&option.options, depth + 1, flat);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data() -> InteractionData {
        serde_json::from_value(json!({
            "id": "1",
            "name": "tag",
            "type": 1,
            "options": [
                { "name": "limit", "type": 4, "value": 1 },
                {
                    "name": "admin",
                    "type": 2,
                    "options": [{
                        "name": "edit",
                        "type": 1,
                        "options": [
                            { "name": "name", "type": 3, "value": "faq" },
                            { "name": "limit", "type": 4, "value": 5 }
                        ]
                    }]
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_command_path_follows_subcommands() {
        assert_eq!(command_path(&data()), ["tag", "admin", "edit"]);
    }

    #[test]
    fn test_flatten_prefers_deeper_values() {
        let flat = flatten_options(&data().options);
        assert_eq!(flat.len(), 2);
        assert_eq!(flat["name"], json!("faq"));
        assert_eq!(flat["limit"], json!(5));
    }

    #[test]
    fn test_flatten_deeper_value_survives_later_shallow_option() {
        let data: InteractionData = serde_json::from_value(json!({
            "id": "1",
            "name": "tag",
            "type": 1,
            "options": [
                {
                    "name": "admin",
                    "type": 2,
                    "options": [{
                        "name": "edit",
                        "type": 1,
                        "options": [{ "name": "limit", "type": 4, "value": 5 }]
                    }]
                },
                { "name": "limit", "type": 4, "value": 1 }
            ]
        }))
        .unwrap();
        let flat = flatten_options(&data.options);
        assert_eq!(flat.len(), 1);
        assert_eq!(flat["limit"], json!(5));
    }

    #[test]
    fn test_flat_command() {
        let data: InteractionData =
            serde_json::from_value(json!({ "id": "1", "name": "ping" })).unwrap();
        assert_eq!(command_path(&data), ["ping"]);
        assert!(flatten_options(&data.options).is_empty());
    }
}
