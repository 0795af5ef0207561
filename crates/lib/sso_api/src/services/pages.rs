//! HTML pages for the interactive authorize flow.

use axum::response::Html;

use crate::models::AuthorizeParams;
use crate::routes;

/// Escape text for inclusion in HTML content or a quoted attribute.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn hidden(name: &str, value: &str) -> String {
    format!(
        r#"<input type="hidden" name="{}" value="{}">"#,
        name,
        escape(value)
    )
}

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>
body {{ font-family: system-ui, sans-serif; background: #f4f5f7; display: flex; justify-content: center; padding-top: 10vh; }}
main {{ background: #fff; padding: 2rem; border-radius: 8px; box-shadow: 0 2px 8px rgba(0,0,0,.1); width: 22rem; }}
label {{ display: block; margin-top: 1rem; }}
input[type=text], input[type=password] {{ width: 100%; padding: .5rem; box-sizing: border-box; }}
button {{ margin-top: 1.5rem; width: 100%; padding: .6rem; }}
.error {{ color: #b00020; }}
</style>
</head>
<body>
<main>
{body}
</main>
</body>
</html>"#,
        title = escape(title),
        body = body,
    ))
}

/// Login form that posts back to the login endpoint with the authorize parameters.
pub fn login_page(params: &AuthorizeParams, error: Option<&str>) -> Html<String> {
    let error_block = error
        .map(|e| format!(r#"<p class="error">{}</p>"#, escape(e)))
        .unwrap_or_default();
    let body = format!(
        r#"<h1>Sign in</h1>
<p>Sign in to continue to <strong>{client}</strong>.</p>
{error_block}
<form method="post" action="{action}">
{client_id}
{redirect_uri}
{response_type}
{scope}
{state}
<label>Username or email <input type="text" name="username" autocomplete="username" required></label>
<label>Password <input type="password" name="password" autocomplete="current-password" required></label>
<button type="submit">Sign in</button>
</form>"#,
        client = escape(&params.client_id),
        action = routes::LOGIN_FORM,
        client_id = hidden("client_id", &params.client_id),
        redirect_uri = hidden("redirect_uri", &params.redirect_uri),
        response_type = hidden("response_type", &params.response_type),
        scope = hidden("scope", params.scope.as_deref().unwrap_or_default()),
        state = hidden("state", params.state.as_deref().unwrap_or_default()),
    );
    layout("Sign in", &body)
}

/// Error page for failures that cannot be redirected back to the client.
pub fn error_page(title: &str, message: &str) -> Html<String> {
    let body = format!(
        r#"<h1>{}</h1>
<p class="error">{}</p>"#,
        escape(title),
        escape(message)
    );
    layout(title, &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_neutralizes_markup() {
        assert_eq!(
            escape(r#"<script>"x" & 'y'</script>"#),
            "&lt;script&gt;&quot;x&quot; &amp; &#x27;y&#x27;&lt;/script&gt;"
        );
    }

    #[test]
    fn login_page_carries_authorize_parameters() {
        let params = AuthorizeParams {
            client_id: "app1".into(),
            redirect_uri: "https://app.test/cb".into(),
            response_type: "code".into(),
            scope: Some("openid profile".into()),
            state: Some("xyz\"><b>".into()),
        };
        let Html(page) = login_page(&params, Some("Invalid credentials"));
        assert!(page.contains(r#"name="client_id" value="app1""#));
        assert!(page.contains(r#"name="scope" value="openid profile""#));
        assert!(page.contains("xyz&quot;&gt;&lt;b&gt;"));
        assert!(page.contains("Invalid credentials"));
        assert!(page.contains(routes::LOGIN_FORM));
    }
}
