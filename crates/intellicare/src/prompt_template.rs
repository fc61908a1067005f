use include_dir::{include_dir, Dir};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context, Error as TeraError, Tera};

/// Prompt templates shipped with the crate
static PROMPTS_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/prompts");

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    let rendered = tera.render("inline_template", &context)?;
    Ok(rendered)
}

/// Bare file names always resolve to the bundled prompts, never the working directory
fn is_bundled_name(path: &Path) -> bool {
    !path.is_absolute() && path.parent().map_or(true, |parent| parent.as_os_str().is_empty())
}

/// Render a bundled prompt by name, or a template file given by an explicit path
pub fn load_prompt_file<T: Serialize>(
    template_file: impl Into<PathBuf>,
    context_data: &T,
) -> Result<String, TeraError> {
    let template_path = template_file.into();

    let template_content = if is_bundled_name(&template_path) {
        PROMPTS_DIR
            .get_file(&template_path)
            .and_then(|file| file.contents_utf8())
            .map(str::to_string)
            .ok_or_else(|| {
                TeraError::msg(format!(
                    "Prompt template not found: {}",
                    template_path.display()
                ))
            })?
    } else {
        fs::read_to_string(&template_path)
            .map_err(|e| TeraError::chain("Failed to read template file", e))?
    };

    load_prompt(&template_content, context_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::appointments::AcceptingAppointmentBook;
    use crate::capabilities::records::InMemoryRecordStore;
    use crate::capabilities::CapabilityRegistry;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[test]
    fn test_renders_capability_loop() {
        let template = "{% for c in capabilities %}- {{ c.name }}\n{% endfor %}";
        let mut context = HashMap::new();
        context.insert("capabilities", vec![json!({"name": "delete_appointment"})]);

        let result = load_prompt(template, &context).unwrap();
        assert_eq!(result, "- delete_appointment\n");
    }

    #[test]
    fn test_undefined_variable_is_an_error() {
        let mut context = HashMap::new();
        context.insert("time_zone", "UTC");

        let result = load_prompt("{{ time_zone }} at {{ current_time }}", &context);
        assert!(result.is_err());
    }

    #[test]
    fn test_disk_template_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locale.md");
        fs::write(&path, "Zone: {{ time_zone }}").unwrap();

        let mut context = HashMap::new();
        context.insert("time_zone", "Asia/Tokyo");

        assert_eq!(load_prompt_file(&path, &context).unwrap(), "Zone: Asia/Tokyo");
    }

    #[test]
    fn test_only_explicit_paths_reach_the_filesystem() {
        assert!(is_bundled_name(Path::new("follow_up.md")));
        assert!(!is_bundled_name(Path::new("./follow_up.md")));
        assert!(!is_bundled_name(Path::new("prompts/follow_up.md")));
        assert!(!is_bundled_name(&std::env::temp_dir().join("follow_up.md")));
    }

    #[test]
    fn test_explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let context: HashMap<String, String> = HashMap::new();
        assert!(load_prompt_file(dir.path().join("locale.md"), &context).is_err());
    }

    #[test]
    fn test_unknown_bundled_prompt() {
        let context: HashMap<String, String> = HashMap::new();
        let err = load_prompt_file("discharge.md", &context).unwrap_err();
        assert!(err.to_string().contains("discharge.md"));
    }

    #[test]
    fn test_bundled_locale_prompt() {
        let mut context = HashMap::new();
        context.insert("time_zone", "Europe/Dublin");
        context.insert("current_time", "2025-06-01T09:00:00+01:00");

        let result = load_prompt_file("locale.md", &context).unwrap();
        assert_eq!(
            result.trim(),
            "The user's current timezone is Europe/Dublin and the current time is 2025-06-01T09:00:00+01:00. Keep this in mind for all time-related discussions."
        );
    }

    #[test]
    fn test_system_prompt_lists_every_capability() {
        let registry = CapabilityRegistry::new(
            Arc::new(AcceptingAppointmentBook),
            Arc::new(InMemoryRecordStore::default()),
        );
        let mut context = HashMap::new();
        context.insert("capabilities", registry.descriptors());

        let result = load_prompt_file("system.md", &context).unwrap();

        for descriptor in registry.descriptors() {
            assert!(result.contains(&format!("function name - {}", descriptor.name)));
        }
        assert!(result.contains(
            "arguments - datetime (ISO 8601 format, UTC timezone), name (String), email (String)"
        ));
        assert!(result.contains("description - Generates and runs a PostgreSQL SELECT query"));
        assert!(result.contains(r#"{"to": "user", "message": "#));
    }
}
