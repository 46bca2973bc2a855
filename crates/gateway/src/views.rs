use std::fmt::Write;

const STYLE: &str = "body{font-family:sans-serif;max-width:52rem;margin:2rem auto;padding:0 1rem}\
img{max-width:100%;border:1px solid #ccc}\
label{display:block;margin:.75rem 0 .25rem}";

/// Data shown on the result page.
#[derive(Debug, Clone)]
pub struct ResultView {
    pub image_url: String,
    pub download_url: String,
    pub labels: Vec<String>,
    pub model_used: String,
}

pub fn render_index(models: &[String], default_model: &str) -> String {
    let mut options = String::new();
    for model in models {
        let selected = if model == default_model { " selected" } else { "" };
        let _ = writeln!(
            options,
            r#"      <option value="{value}"{selected}>{value}</option>"#,
            value = escape_html(model),
        );
    }

    page(
        "Object Detection",
        &format!(
            r#"  <h1>Object Detection</h1>
  <form action="/predict" method="post" enctype="multipart/form-data">
    <label for="file">Image</label>
    <input type="file" id="file" name="file" accept="image/*">
    <label for="model_choice">Model</label>
    <select id="model_choice" name="model_choice">
{options}    </select>
    <p><button type="submit">Detect</button></p>
  </form>
"#
        ),
    )
}

pub fn render_result(view: &ResultView) -> String {
    let labels = if view.labels.is_empty() {
        "  <p>No objects detected.</p>\n".to_string()
    } else {
        let mut items = String::from("  <ul>\n");
        for label in &view.labels {
            let _ = writeln!(items, "    <li>{}</li>", escape_html(label));
        }
        items.push_str("  </ul>\n");
        items
    };

    page(
        "Detection Result",
        &format!(
            r#"  <h1>Detection Result</h1>
  <p>Model used: <strong>{model}</strong></p>
  <img src="{image}" alt="Annotated result">
  <h2>Detected classes</h2>
{labels}  <p><a href="{download}">Download result</a></p>
  <p><a href="/">Upload another image</a></p>
"#,
            model = escape_html(&view.model_used),
            image = escape_html(&view.image_url),
            download = escape_html(&view.download_url),
        ),
    )
}

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>{title}</title>
  <style>{STYLE}</style>
</head>
<body>
{body}</body>
</html>
"#,
        title = escape_html(title),
    )
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(labels: &[&str]) -> ResultView {
        ResultView {
            image_url: "/results/abc.jpg".to_string(),
            download_url: "/download/abc.jpg".to_string(),
            labels: labels.iter().map(|s| s.to_string()).collect(),
            model_used: "best".to_string(),
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#39;&lt;/a&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_index_lists_models_with_default_selected() {
        let html = render_index(&["best".to_string(), "last".to_string()], "last");

        assert!(html.contains(r#"name="file""#));
        assert!(html.contains(r#"enctype="multipart/form-data""#));
        assert!(html.contains(r#"<option value="best">best</option>"#));
        assert!(html.contains(r#"<option value="last" selected>last</option>"#));
    }

    #[test]
    fn test_result_page_lists_labels_and_links() {
        let html = render_result(&view(&["person", "car"]));

        assert!(html.contains(r#"<img src="/results/abc.jpg""#));
        assert!(html.contains(r#"href="/download/abc.jpg""#));
        assert!(html.contains("<li>person</li>"));
        assert!(html.contains("<li>car</li>"));
        assert!(html.contains("<strong>best</strong>"));
    }

    #[test]
    fn test_result_page_with_no_detections() {
        let html = render_result(&view(&[]));

        assert!(!html.contains("<li>"));
        assert!(html.contains("No objects detected."));
    }

    #[test]
    fn test_result_page_escapes_labels() {
        let html = render_result(&view(&["<script>"]));

        assert!(html.contains("<li>&lt;script&gt;</li>"));
        assert!(!html.contains("<li><script>"));
    }
}
