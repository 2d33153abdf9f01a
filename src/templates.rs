//! Minijinja template engine configuration with built-in and on-disk templates.

use minijinja::{Environment, path_loader};

use crate::errors::HttpError;

const APPROVAL_TEMPLATE: &str = include_str!("../templates/approval.html");
const ERROR_TEMPLATE: &str = include_str!("../templates/error.html");

/// Build the template environment.
///
/// Templates are loaded from `template_path` when given; the built-in
/// `approval.html` and `error.html` are always available.
pub fn build_env(
    template_path: Option<&str>,
    version: &str,
) -> Result<Environment<'static>, HttpError> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.add_global("version", version.to_string());

    if let Some(template_path) = template_path {
        env.set_loader(path_loader(template_path));
    }

    env.add_template("approval.html", APPROVAL_TEMPLATE)
        .map_err(|e| HttpError::TemplateRenderingFailed(e.to_string()))?;
    env.add_template("error.html", ERROR_TEMPLATE)
        .map_err(|e| HttpError::TemplateRenderingFailed(e.to_string()))?;

    Ok(env)
}

/// Check that every named page template loads, so a misspelled page fails at startup.
pub fn ensure_templates(env: &Environment<'_>, names: &[&str]) -> Result<(), HttpError> {
    for name in names {
        env.get_template(name)
            .map_err(|e| HttpError::TemplateNotFound(format!("{}: {}", name, e)))?;
    }
    Ok(())
}
