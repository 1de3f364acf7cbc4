//! String template rendering utilities.

pub struct TemplateVars;

impl TemplateVars {
    pub const NAME: &'static str = "name";
    pub const VSN: &'static str = "vsn";
    pub const ENV: &'static str = "env";
    pub const SRC: &'static str = "src";
    pub const BRANCH: &'static str = "branch";
    pub const TARGET: &'static str = "target";
    pub const TARBALL: &'static str = "tarball";
}

pub fn render(template: &str, variables: &[(&str, &str)]) -> String {
    let mut result = template.to_string();

    for (key, value) in variables {
        let placeholder = format!("{{{{{}}}}}", key);
        result = result.replace(&placeholder, value);
    }

    result
}
