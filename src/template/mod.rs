//! Rendering of the nginx virtual host and the static landing page
//!
//! Both artifacts are small per-domain templates rendered with minijinja.
//! The landing page carries a fixed marker line that the post-install smoke
//! test looks for.

use minijinja::{Environment, context};

use crate::ProvisionError;

/// Marker text the local smoke test asserts on
pub const LANDING_MARKER: &str = "provisioned by provision-rs";

/// Port-80 virtual host; certbot rewrites this once a certificate exists
const VHOST_TEMPLATE: &str = r#"server {
    listen 80;
    listen [::]:80;

    root {{ site_root }};
    index index.html;

    server_name {{ domain }} {{ www_domain }};

    location / {
        try_files $uri $uri/ =404;
    }
}
"#;

const LANDING_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>{{ domain }}</title>
</head>
<body>
    <h1>{{ domain }}</h1>
    <p>{{ marker }}</p>
</body>
</html>
"#;

/// Render the per-domain port-80 virtual host definition
pub fn render_vhost(
    domain: &str,
    www_domain: &str,
    site_root: &str,
) -> Result<String, ProvisionError> {
    render(
        "vhost",
        VHOST_TEMPLATE,
        context! { domain, www_domain, site_root },
    )
}

/// Render the static landing page
pub fn render_landing_page(domain: &str) -> Result<String, ProvisionError> {
    render(
        "landing",
        LANDING_TEMPLATE,
        context! { domain, marker => LANDING_MARKER },
    )
}

fn render(
    name: &str,
    template: &str,
    ctx: minijinja::Value,
) -> Result<String, ProvisionError> {
    let mut env = Environment::new();
    env.add_template(name, template)
        .map_err(|e| ProvisionError::Template(format!("template parse error: {e}")))?;

    let tmpl = env
        .get_template(name)
        .map_err(|e| ProvisionError::Template(e.to_string()))?;

    tmpl.render(ctx)
        .map_err(|e| ProvisionError::Template(format!("template render error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_vhost() {
        let out = render_vhost("example.com", "www.example.com", "/var/www/example.com/html")
            .unwrap();
        assert!(out.contains("listen 80;"));
        assert!(out.contains("server_name example.com www.example.com;"));
        assert!(out.contains("root /var/www/example.com/html;"));
    }

    #[test]
    fn test_render_landing_page_has_marker() {
        let out = render_landing_page("example.com").unwrap();
        assert!(out.contains(LANDING_MARKER));
        assert!(out.contains("<title>example.com</title>"));
    }
}
