//! Human-readable method overview page.
//!
//! Lists every registered method with its parameters and return type. The
//! page is rendered once when the server is built; the registry never
//! changes afterwards.

use xmlrpc_core::{MethodDescriptor, Registry};

const STYLE: &str = "
body { font-family: Helvetica, Arial, sans-serif; padding: 0; margin: 0; }
body > div { padding: 0 20px; }
body > div > div { margin-bottom: 50px; border-top: 1px solid #cccccc; width: 90%; }
h1 { background-color: #1ba1e2; color: white; padding: 5px 20px; }
h2 { color: #1ba1e2; }
ul { margin-bottom: 30px; }
li { margin-bottom: 10px; }
li > a { color: #000000; }
table { width: 100%; }
tr:nth-child(even) { background: #cccccc; }
tr:nth-child(odd) { background: #ffffff; }
td { height: 40px; vertical-align: middle; padding: 0 10px; }
";

/// Renders the overview page.
///
/// An empty `title` falls back to the names of the registered services.
pub fn render(registry: &Registry, title: &str) -> String {
    let methods = registry.methods();
    let title = if title.trim().is_empty() {
        let mut services: Vec<&str> = methods.iter().map(|m| m.service()).collect();
        services.sort_unstable();
        services.dedup();
        format!("XML-RPC Methods for {}", services.join(","))
    } else {
        format!("XML-RPC Methods for {}", title)
    };
    let title = escape(&title);

    let mut html = String::with_capacity(4096);
    html.push_str("<!DOCTYPE html><html><head>");
    html.push_str("<meta charset=\"utf-8\">");
    html.push_str(&format!("<title>{}</title>", title));
    html.push_str("<meta name=\"robots\" content=\"noindex\">");
    html.push_str(&format!("<style type=\"text/css\">{}</style>", STYLE));
    html.push_str("</head><body>");
    html.push_str(&format!("<h1>{}</h1><div>", title));

    html.push_str("<p>The following methods are supported:</p><ul>");
    for method in &methods {
        let name = escape(method.name());
        html.push_str(&format!("<li><a href=\"#{0}\">{0}</a></li>", name));
    }
    html.push_str("</ul>");

    for method in &methods {
        render_method(&mut html, method);
    }

    html.push_str("</div></body></html>");
    html
}

fn render_method(html: &mut String, method: &MethodDescriptor) {
    let name = escape(method.name());
    html.push_str(&format!(
        "<div><h2><a name=\"{0}\" id=\"{0}\">{0}</a></h2>",
        name
    ));
    if !method.description().is_empty() {
        html.push_str(&format!("<p>{}</p>", escape(method.description())));
    }

    html.push_str("<h3>Parameters</h3><table>");
    for param in method.params() {
        html.push_str(&table_row(
            &param.ty.to_string(),
            param.name.as_deref().unwrap_or("-"),
        ));
    }
    html.push_str("</table>");

    let returns = if !method.returns_description().is_empty() {
        method.returns_description()
    } else if !method.description().is_empty() {
        method.description()
    } else {
        "-"
    };
    html.push_str("<h3>Return Value</h3><table>");
    html.push_str(&table_row(&method.returns().to_string(), returns));
    html.push_str("</table></div>");
}

fn table_row(ty: &str, text: &str) -> String {
    format!(
        "<tr><td style=\"width:30%\">{}</td><td>{}</td></tr>",
        escape(ty),
        escape(text)
    )
}

/// Escapes text for HTML content and attribute values.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
