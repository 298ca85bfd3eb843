//! Document type registry.
//!
//! Maps a legacy document-type code to the destination table that holds its
//! migrated rendering, together with the per-type comparison settings.
//! The registry is built once from the config file and never mutated; the
//! orchestrator receives it by reference.
//!
//! Each code resolves to exactly one of:
//!
//! | Resolution | Meaning |
//! |------------|---------|
//! | [`Resolution::Configured`] | has a [`TypeDescriptor`], gets validated |
//! | [`Resolution::Ignored`] | deliberately not migrated, skipped silently |
//! | [`Resolution::NotConfigured`] | unknown, skipped with a one-time warning |

use std::collections::{BTreeMap, BTreeSet};

/// Destination-side description of one document type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    pub code: i64,
    /// Possibly schema-qualified table name, e.g. `fasssmpc.t_fass_smpc`.
    pub destination_table: String,
    pub id_column: String,
    pub cross_reference_column: String,
    /// Public URL pattern. `{base}` is the environment's URL base and `{}`
    /// the cross-reference id.
    pub url_template: String,
    pub ignored_tags: Vec<String>,
    pub loss_threshold: f64,
}

impl TypeDescriptor {
    /// Table name without its schema prefix, used in reports.
    pub fn table_short_name(&self) -> &str {
        self.destination_table
            .rsplit('.')
            .next()
            .unwrap_or(&self.destination_table)
    }

    /// Render the public URL for a migrated document, or `N/A` when the
    /// destination row has no cross-reference id.
    pub fn document_url(&self, url_base: &str, cross_reference: Option<&str>) -> String {
        match cross_reference {
            Some(id) if !id.is_empty() => self
                .url_template
                .replace("{base}", url_base)
                .replace("{}", id),
            _ => "N/A".to_string(),
        }
    }
}

/// Result of [`TypeRegistry::resolve`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution<'a> {
    Configured(&'a TypeDescriptor),
    Ignored,
    NotConfigured,
}

/// Which association a document type must have to count as published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkCategory {
    Article,
    Product,
}

#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    descriptors: BTreeMap<i64, TypeDescriptor>,
    ignored_types: BTreeSet<i64>,
    article_types: BTreeSet<i64>,
    global_ignored_tags: Vec<String>,
}

impl TypeRegistry {
    pub fn new(
        descriptors: BTreeMap<i64, TypeDescriptor>,
        ignored_types: BTreeSet<i64>,
        article_types: BTreeSet<i64>,
        global_ignored_tags: Vec<String>,
    ) -> Self {
        Self {
            descriptors,
            ignored_types,
            article_types,
            global_ignored_tags,
        }
    }

    pub fn resolve(&self, code: i64) -> Resolution<'_> {
        if self.ignored_types.contains(&code) {
            return Resolution::Ignored;
        }
        match self.descriptors.get(&code) {
            Some(descriptor) => Resolution::Configured(descriptor),
            None => Resolution::NotConfigured,
        }
    }

    pub fn descriptor(&self, code: i64) -> Option<&TypeDescriptor> {
        self.descriptors.get(&code)
    }

    pub fn is_configured(&self, code: i64) -> bool {
        self.descriptors.contains_key(&code)
    }

    pub fn is_ignored(&self, code: i64) -> bool {
        self.ignored_types.contains(&code)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.descriptors.values()
    }

    pub fn ignored_types(&self) -> &BTreeSet<i64> {
        &self.ignored_types
    }

    pub fn article_types(&self) -> &BTreeSet<i64> {
        &self.article_types
    }

    pub fn global_ignored_tags(&self) -> &[String] {
        &self.global_ignored_tags
    }

    pub fn link_category(&self, code: i64) -> LinkCategory {
        if self.article_types.contains(&code) {
            LinkCategory::Article
        } else {
            LinkCategory::Product
        }
    }

    /// Union of the global tag exclusions and the descriptor's own.
    pub fn excluded_tags(&self, descriptor: &TypeDescriptor) -> Vec<String> {
        let mut tags = self.global_ignored_tags.clone();
        for tag in &descriptor.ignored_tags {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }
        tags
    }

    /// Codes that are both configured and ignored. A valid registry has none.
    pub fn conflicting_codes(&self) -> Vec<i64> {
        self.ignored_types
            .iter()
            .copied()
            .filter(|code| self.descriptors.contains_key(code))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(code: i64, table: &str) -> TypeDescriptor {
        TypeDescriptor {
            code,
            destination_table: table.to_string(),
            id_column: "document_id".to_string(),
            cross_reference_column: "npl_id".to_string(),
            url_template: "{base}/health/product/{}/smpc".to_string(),
            ignored_tags: vec!["heading".to_string(), "meta-data".to_string()],
            loss_threshold: 0.0,
        }
    }

    fn registry() -> TypeRegistry {
        let mut descriptors = BTreeMap::new();
        descriptors.insert(6, descriptor(6, "fasssmpc.t_fass_smpc"));
        descriptors.insert(7, descriptor(7, "t_leaflet"));
        TypeRegistry::new(
            descriptors,
            [11, 200].into_iter().collect(),
            [7].into_iter().collect(),
            vec!["audittrail-list".to_string(), "meta-data".to_string()],
        )
    }

    #[test]
    fn test_resolve() {
        let reg = registry();
        assert!(matches!(reg.resolve(6), Resolution::Configured(d) if d.code == 6));
        assert_eq!(reg.resolve(200), Resolution::Ignored);
        assert_eq!(reg.resolve(99), Resolution::NotConfigured);
    }

    #[test]
    fn test_table_short_name() {
        let reg = registry();
        assert_eq!(reg.descriptor(6).unwrap().table_short_name(), "t_fass_smpc");
        assert_eq!(reg.descriptor(7).unwrap().table_short_name(), "t_leaflet");
    }

    #[test]
    fn test_document_url() {
        let d = descriptor(6, "fasssmpc.t_fass_smpc");
        assert_eq!(
            d.document_url("https://www.example.org", Some("2004")),
            "https://www.example.org/health/product/2004/smpc"
        );
        assert_eq!(d.document_url("https://www.example.org", None), "N/A");
        assert_eq!(d.document_url("https://www.example.org", Some("")), "N/A");
    }

    #[test]
    fn test_excluded_tags_union_without_duplicates() {
        let reg = registry();
        let tags = reg.excluded_tags(reg.descriptor(6).unwrap());
        assert_eq!(tags, vec!["audittrail-list", "meta-data", "heading"]);
    }

    #[test]
    fn test_link_category() {
        let reg = registry();
        assert_eq!(reg.link_category(7), LinkCategory::Article);
        assert_eq!(reg.link_category(6), LinkCategory::Product);
        assert_eq!(reg.link_category(99), LinkCategory::Product);
    }

    #[test]
    fn test_conflicting_codes() {
        let mut reg = registry();
        assert!(reg.conflicting_codes().is_empty());
        reg.ignored_types.insert(6);
        assert_eq!(reg.conflicting_codes(), vec![6]);
    }
}
