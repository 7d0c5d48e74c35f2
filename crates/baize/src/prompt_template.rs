use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context, Error as TeraError, Tera};

use crate::config::Language;
use crate::models::tool::Tool;

const SYSTEM_EN: &str = include_str!("prompts/system_en.md");
const SYSTEM_ZH: &str = include_str!("prompts/system_zh.md");

/// Get the path to the prompts directory
fn prompts_dir() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir).join("src").join("prompts")
}

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    let rendered = tera.render("inline_template", &context)?;
    Ok(rendered)
}

pub fn load_prompt_file<T: Serialize>(
    template_file: impl Into<PathBuf>,
    context_data: &T,
) -> Result<String, TeraError> {
    let template_path = template_file.into();
    // if the template_file doesn't exist, try to load it from the prompts directory
    let file_path = if !template_path.exists() {
        prompts_dir().join(template_path)
    } else {
        template_path
    };

    let template_content = fs::read_to_string(file_path)
        .map_err(|e| TeraError::chain("Failed to read template file", e))?;
    load_prompt(&template_content, context_data)
}

#[derive(Serialize)]
struct SystemContext<'a> {
    tools: &'a [Tool],
    language: Language,
}

/// The system prompt for a turn. A custom template file replaces the built-in
/// template of either language.
pub fn system_prompt(
    language: Language,
    tools: &[Tool],
    template_file: Option<&Path>,
) -> Result<String, TeraError> {
    let context = SystemContext { tools, language };
    match template_file {
        Some(path) => load_prompt_file(path, &context),
        None => {
            let template = match language {
                Language::En => SYSTEM_EN,
                Language::Zh => SYSTEM_ZH,
            };
            load_prompt(template, &context)
        }
    }
}
