use serde::Serialize;
use tera::{Context, Error as TeraError, Tera};

pub const CATALOGUE_TEMPLATE: &str = include_str!("prompts/catalogue.md");
pub const EXAMPLES_TEMPLATE: &str = include_str!("prompts/examples.md");
pub const GENERATE_SYSTEM_TEMPLATE: &str = include_str!("prompts/generate_system.md");
pub const GENERATE_USER_TEMPLATE: &str = include_str!("prompts/generate_user.md");
pub const BASIC_TEMPLATE: &str = include_str!("prompts/basic.md");
pub const CHAT_SYSTEM_TEMPLATE: &str = include_str!("prompts/chat_system.md");
pub const SYSTEMS_TEMPLATE: &str = include_str!("prompts/systems.md");

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    let rendered = tera.render("inline_template", &context)?;
    Ok(rendered)
}
