//! `sergen`: stamps out service, handler, route and DI boilerplate for a new entity.
//!
//! Template bodies live under `templates/sergen/` and are embedded at compile time.

use serde::Serialize;
use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};
use tera::{Context, Tera};

const SERVICE_TEMPLATE: &str = "service.rs";
const HANDLER_TEMPLATE: &str = "handler.rs";
const ROUTE_TEMPLATE: &str = "route.rs";
const DI_TEMPLATE: &str = "di.rs";

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("failed to load template {name}: {source}")]
    Template {
        name: &'static str,
        #[source]
        source: tera::Error,
    },

    #[error("failed to render {name}: {source}")]
    Render {
        name: &'static str,
        #[source]
        source: tera::Error,
    },

    #[error("{} already exists, refusing to overwrite it", .0.display())]
    AlreadyExists(PathBuf),

    #[error("{} does not exist, run sergen from the project root", .0.display())]
    MissingTarget(PathBuf),

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Names derived from the entity, as seen by the templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratorInput {
    pub module_name: String,
    pub entity_name: String,
    pub entity_name_low: String,
    pub entity_name_plural: String,
    pub entity_name_low_plural: String,
    pub entity_name_snake: String,
    pub entity_name_snake_plural: String,
    pub file_stem: String,
}

impl GeneratorInput {
    /// `plural` defaults to `entity + "s"` when absent or empty.
    pub fn new(module_name: &str, entity_name: &str, plural: Option<&str>) -> Self {
        let entity_name_plural = match plural {
            Some(p) if !p.is_empty() => p.to_string(),
            _ => format!("{entity_name}s"),
        };

        Self {
            module_name: module_name.to_string(),
            entity_name: entity_name.to_string(),
            entity_name_low: first_to_lower(entity_name),
            entity_name_low_plural: first_to_lower(&entity_name_plural),
            entity_name_snake: to_snake_case(entity_name),
            entity_name_snake_plural: to_snake_case(&entity_name_plural),
            file_stem: entity_name.to_lowercase(),
            entity_name_plural,
        }
    }
}

/// Lowercase the first character, leaving the rest untouched.
pub fn first_to_lower(s: &str) -> String {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };

    let mut lower = first.to_lowercase();
    // Characters whose lowercase form is not a single char (or is the char itself) stay as-is
    match (lower.next(), lower.next()) {
        (Some(lc), None) if lc != first => {
            let mut out = String::with_capacity(s.len());
            out.push(lc);
            out.push_str(chars.as_str());
            out
        }
        _ => s.to_string(),
    }
}

fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let mut prev_lower = false;
    for c in s.chars() {
        if c.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
        }
    }
    out
}

/// Files touched by one run, relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFiles {
    pub service: PathBuf,
    pub handler: PathBuf,
    pub routes: PathBuf,
    pub di: PathBuf,
}

impl GeneratedFiles {
    fn under(root: &Path, input: &GeneratorInput) -> Self {
        Self {
            service: root
                .join("src/services")
                .join(format!("{}_service.rs", input.file_stem)),
            handler: root.join("src/routes").join(format!("{}.rs", input.file_stem)),
            routes: root.join("src/routes/mod.rs"),
            di: root.join("src/app_state.rs"),
        }
    }
}

pub struct Generator {
    tera: Tera,
    input: GeneratorInput,
}

impl Generator {
    pub fn new(input: GeneratorInput) -> Result<Self, GeneratorError> {
        let mut tera = Tera::default();
        for (name, body) in [
            (
                SERVICE_TEMPLATE,
                include_str!("../../templates/sergen/service.rs.tera"),
            ),
            (
                HANDLER_TEMPLATE,
                include_str!("../../templates/sergen/handler.rs.tera"),
            ),
            (
                ROUTE_TEMPLATE,
                include_str!("../../templates/sergen/route.rs.tera"),
            ),
            (DI_TEMPLATE, include_str!("../../templates/sergen/di.rs.tera")),
        ] {
            tera.add_raw_template(name, body)
                .map_err(|source| GeneratorError::Template { name, source })?;
        }

        Ok(Self { tera, input })
    }

    pub fn render_service(&self) -> Result<String, GeneratorError> {
        self.render(SERVICE_TEMPLATE)
    }

    pub fn render_handler(&self) -> Result<String, GeneratorError> {
        self.render(HANDLER_TEMPLATE)
    }

    pub fn render_route(&self) -> Result<String, GeneratorError> {
        self.render(ROUTE_TEMPLATE)
    }

    pub fn render_di(&self) -> Result<String, GeneratorError> {
        self.render(DI_TEMPLATE)
    }

    fn render(&self, name: &'static str) -> Result<String, GeneratorError> {
        let context = Context::from_serialize(&self.input)
            .map_err(|source| GeneratorError::Render { name, source })?;
        self.tera
            .render(name, &context)
            .map_err(|source| GeneratorError::Render { name, source })
    }

    /// Write the service and handler files and append the route and DI snippets.
    ///
    /// Nothing is written unless both new files are absent and both append
    /// targets exist, so re-running for an existing entity changes nothing.
    pub fn generate(&self, root: &Path) -> Result<GeneratedFiles, GeneratorError> {
        let files = GeneratedFiles::under(root, &self.input);

        for path in [&files.service, &files.handler] {
            if path.exists() {
                return Err(GeneratorError::AlreadyExists(path.clone()));
            }
        }
        for path in [&files.routes, &files.di] {
            if !path.is_file() {
                return Err(GeneratorError::MissingTarget(path.clone()));
            }
        }

        let service = self.render_service()?;
        let handler = self.render_handler()?;
        let route = self.render_route()?;
        let di = self.render_di()?;

        create_new(&files.service, &service)?;
        tracing::info!(path = %files.service.display(), "created service");
        create_new(&files.handler, &handler)?;
        tracing::info!(path = %files.handler.display(), "created handler");
        append(&files.routes, &route)?;
        tracing::info!(path = %files.routes.display(), "appended route snippet");
        append(&files.di, &di)?;
        tracing::info!(path = %files.di.display(), "appended DI snippet");

        Ok(files)
    }
}

fn create_new(path: &Path, contents: &str) -> Result<(), GeneratorError> {
    let io = |source: std::io::Error| GeneratorError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(io)?;
    file.write_all(contents.as_bytes()).map_err(io)
}

fn append(path: &Path, contents: &str) -> Result<(), GeneratorError> {
    let io = |source: std::io::Error| GeneratorError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = OpenOptions::new().append(true).open(path).map_err(io)?;
    file.write_all(contents.as_bytes()).map_err(io)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_to_lower() {
        assert_eq!(first_to_lower("User"), "user");
        assert_eq!(first_to_lower("TodoItem"), "todoItem");
        assert_eq!(first_to_lower(""), "");
        assert_eq!(first_to_lower("user"), "user");
        assert_eq!(first_to_lower("日User"), "日User");
        assert_eq!(first_to_lower("Élan"), "élan");
    }

    #[test]
    fn test_plural_defaults_to_trailing_s() {
        let input = GeneratorInput::new("crate", "User", None);
        assert_eq!(input.entity_name_plural, "Users");
        assert_eq!(input.entity_name_low_plural, "users");

        let input = GeneratorInput::new("crate", "Person", Some(""));
        assert_eq!(input.entity_name_plural, "Persons");

        let input = GeneratorInput::new("crate", "Person", Some("People"));
        assert_eq!(input.entity_name_low_plural, "people");
    }

    #[test]
    fn test_derived_names() {
        let input = GeneratorInput::new("crate", "TodoItem", None);
        assert_eq!(input.entity_name_low, "todoItem");
        assert_eq!(input.entity_name_snake, "todo_item");
        assert_eq!(input.entity_name_snake_plural, "todo_items");
        assert_eq!(input.file_stem, "todoitem");
    }

    #[test]
    fn test_templates_render_entity_names() {
        let generator = Generator::new(GeneratorInput::new("crate", "User", None)).unwrap();

        let service = generator.render_service().unwrap();
        assert!(service.contains("pub struct UserService"));
        assert!(service.contains("use entity::users;"));
        assert!(service.contains("\"user_create\""));

        let handler = generator.render_handler().unwrap();
        assert!(handler.contains("/// GET /users/{id}"));
        assert!(handler.contains("state.user_service()"));

        let route = generator.render_route().unwrap();
        assert!(route.contains("pub mod user;"));
        assert!(route.contains("\"/users/{id}\""));

        let di = generator.render_di().unwrap();
        assert!(di.contains("pub fn user_service(&self)"));
    }
}
