//! The single HTML page: upload form plus result or error.

use minijinja::{context, Environment};
use serde::Serialize;

const INDEX_TEMPLATE: &str = include_str!("../../templates/index.html");

/// What the page shows. Every field is optional text, auto-escaped on render.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PageView {
    pub topic: String,
    pub grade: String,
    pub image_url: Option<String>,
    pub error: Option<String>,
}

/// Compiled page templates.
pub struct Pages {
    env: Environment<'static>,
}

impl Pages {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template("index.html", INDEX_TEMPLATE)?;
        Ok(Self { env })
    }

    pub fn render(&self, view: &PageView, provider: &str) -> Result<String, minijinja::Error> {
        self.env.get_template("index.html")?.render(context! {
            topic => &view.topic,
            grade => &view.grade,
            image_url => &view.image_url,
            error => &view.error,
            provider => provider,
        })
    }
}
