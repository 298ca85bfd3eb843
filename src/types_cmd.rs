//! `mval types`: print the document type registry.

use anyhow::Result;

use crate::config::Config;
use crate::registry::{LinkCategory, TypeRegistry};

pub fn render_types(registry: &TypeRegistry) -> String {
    let mut out = format!(
        "{:<6} {:<34} {:<10} {:<9} {}\n",
        "TYPE", "TABLE", "LINK", "THRESHOLD", "IGNORED TAGS"
    );
    for d in registry.descriptors() {
        let link = match registry.link_category(d.code) {
            LinkCategory::Article => "article",
            LinkCategory::Product => "product",
        };
        out.push_str(&format!(
            "{:<6} {:<34} {:<10} {:<9} {}\n",
            d.code,
            d.destination_table,
            link,
            format!("{:.2}", d.loss_threshold),
            registry.excluded_tags(d).join(", ")
        ));
    }

    let ignored: Vec<String> = registry.ignored_types().iter().map(i64::to_string).collect();
    out.push('\n');
    out.push_str(&format!(
        "Ignored types: {}\n",
        if ignored.is_empty() {
            "(none)".to_string()
        } else {
            ignored.join(", ")
        }
    ));
    out
}

pub fn list_types(config: &Config) -> Result<()> {
    let registry = config.registry()?;
    print!("{}", render_types(&registry));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[test]
    fn test_render_types() {
        let cfg = parse_config(
            r#"
[validation]
ignored_types = [200, 11]
article_types = [7]

[environments.DEV]
source_url = "sqlite::memory:"
destination_url = "sqlite::memory:"
url_base = "https://dev.example.org"

[types.7]
table = "fassarticle.t_article"
id_column = "doc_id"
cross_reference_column = "article_id"
url_template = "{base}/article/{}"

[types.3]
table = "fassspc.t_spc"
id_column = "doc_id"
cross_reference_column = "npl_id"
url_template = "{base}/health/product/{}/spc"
loss_threshold = 0.05
"#,
        )
        .unwrap();
        let out = render_types(&cfg.registry().unwrap());
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with("TYPE"));
        assert!(lines[1].starts_with("3 "));
        assert!(lines[1].contains("product"));
        assert!(lines[1].contains("0.05"));
        assert!(lines[2].starts_with("7 "));
        assert!(lines[2].contains("article"));
        assert!(out.contains("Ignored types: 11, 200"));
    }
}
