//! View rendering module
//!
//! The view renderer is a collaborator: the pipeline hands it a template
//! name and a `{message, error}` data bag and gets HTML back. The built-in
//! renderer covers the two views the bootstrap needs (index and error
//! page); a real template engine can be dropped in behind the trait.

/// Detail attached to the error page in development only
#[derive(Debug, Clone)]
pub struct ErrorDetail {
    pub status: u16,
    pub description: String,
}

/// Data bag passed to the renderer
#[derive(Debug, Clone)]
pub struct ViewData {
    pub message: String,
    pub error: Option<ErrorDetail>,
}

impl ViewData {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error: None,
        }
    }
}

/// Template-rendering collaborator
pub trait ViewRenderer: Send + Sync {
    /// Render the named view with the given data bag
    fn render(&self, view: &str, data: &ViewData) -> String;
}

/// Built-in renderer with minimal hard-coded templates
pub struct HtmlRenderer;

impl ViewRenderer for HtmlRenderer {
    fn render(&self, view: &str, data: &ViewData) -> String {
        match view {
            "index" => render_index(data),
            _ => render_error(data),
        }
    }
}

fn render_index(data: &ViewData) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n  <title>gqld</title>\n  <link rel=\"stylesheet\" href=\"/stylesheets/style.css\">\n</head>\n<body>\n  <h1>gqld</h1>\n  <p>{}</p>\n</body>\n</html>\n",
        escape_html(&data.message)
    )
}

fn render_error(data: &ViewData) -> String {
    let detail = data.error.as_ref().map_or(String::new(), |e| {
        format!(
            "  <h2>{}</h2>\n  <pre>{}</pre>\n",
            e.status,
            escape_html(&e.description)
        )
    });
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n  <title>Error</title>\n</head>\n<body>\n  <h1>{}</h1>\n{}</body>\n</html>\n",
        escape_html(&data.message),
        detail
    )
}

/// Escape text for interpolation into HTML
fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
