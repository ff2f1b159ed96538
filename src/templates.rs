//! Built-in templates for new migration files.
//!
//! The registry is static data: each entry knows its file extension, the
//! interpreter used when a migration file is not executable, and the body
//! written by `migrate create`.

/// Placeholder substituted with the migration description.
pub const DESCRIPTION_PLACEHOLDER: &str = "{{DESCRIPTION}}";

/// Description written when none is given.
pub const DEFAULT_DESCRIPTION: &str = "TODO: Add description";

/// A template for creating new migration files.
#[derive(Debug)]
pub struct Template {
    /// Template name (e.g., "bash", "ts")
    pub name: &'static str,
    /// File extension including the dot (e.g., ".sh")
    pub extension: &'static str,
    /// Command used to run a non-executable file of this type
    pub interpreter: &'static [&'static str],
    /// Template body
    pub content: &'static str,
}

impl Template {
    /// Render the body with the description filled in.
    pub fn render(&self, description: Option<&str>) -> String {
        let description = description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_DESCRIPTION);
        self.content.replace(DESCRIPTION_PLACEHOLDER, description)
    }
}

pub static TEMPLATES: &[Template] = &[
    Template {
        name: "bash",
        extension: ".sh",
        interpreter: &["bash"],
        content: include_str!("../templates/bash.sh"),
    },
    Template {
        name: "ts",
        extension: ".ts",
        interpreter: &["npx", "tsx"],
        content: include_str!("../templates/typescript.ts"),
    },
    Template {
        name: "python",
        extension: ".py",
        interpreter: &["python3"],
        content: include_str!("../templates/python.py"),
    },
    Template {
        name: "node",
        extension: ".js",
        interpreter: &["node"],
        content: include_str!("../templates/node.js"),
    },
    Template {
        name: "ruby",
        extension: ".rb",
        interpreter: &["ruby"],
        content: include_str!("../templates/ruby.rb"),
    },
];

/// Get a template by name.
pub fn get_template(name: &str) -> Option<&'static Template> {
    TEMPLATES.iter().find(|t| t.name == name)
}

/// Find the template whose extension matches a file extension (without dot).
pub fn template_for_extension(extension: &str) -> Option<&'static Template> {
    TEMPLATES
        .iter()
        .find(|t| t.extension.trim_start_matches('.') == extension)
}

/// List all available template names.
pub fn list_templates() -> impl Iterator<Item = &'static str> {
    TEMPLATES.iter().map(|t| t.name)
}
