use std::collections::HashMap;

use crate::selector::Style;

const HEADLINE_PLACEHOLDER: &str = "{headline}";

/// Builds style-specific text prompts from a headline.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    templates: HashMap<Style, String>,
}

fn builtin_template(style: Style) -> &'static str {
    match style {
        Style::News => {
            "professional news illustration of {headline}, high quality digital art, detailed, \
             cinematic lighting, photojournalism style, editorial illustration, dramatic lighting"
        }
        Style::Funny => {
            "humorous cartoon illustration of {headline}, funny, vibrant colors, expressive \
             characters, comedy style, playful, exaggerated expressions, meme-worthy"
        }
        Style::Artistic => {
            "artistic interpretation of {headline}, modern digital art, creative composition, \
             stylized, detailed brushwork, vibrant colors, gallery quality"
        }
        Style::Realistic => {
            "photorealistic scene depicting {headline}, professional journalism photography, \
             documentary style, high resolution, detailed, natural lighting"
        }
    }
}

impl PromptBuilder {
    /// Built-in templates, replaced per style by any configured overrides.
    /// Override keys go through [`Style::from_name`].
    pub fn new(overrides: &HashMap<String, String>) -> Self {
        let mut templates: HashMap<Style, String> =
            [Style::News, Style::Funny, Style::Artistic, Style::Realistic]
                .into_iter()
                .map(|s| (s, builtin_template(s).to_string()))
                .collect();

        for (name, template) in overrides {
            templates.insert(Style::from_name(name), template.clone());
        }

        Self { templates }
    }

    pub fn build(&self, headline: &str, style: Style) -> String {
        let template = self
            .templates
            .get(&style)
            .map(String::as_str)
            .unwrap_or_else(|| builtin_template(Style::News));
        template.replace(HEADLINE_PLACEHOLDER, &clean_headline(headline))
    }
}

/// Strip quote characters and surrounding whitespace.
pub fn clean_headline(headline: &str) -> String {
    headline.replace(&['"', '\''][..], "").trim().to_string()
}
