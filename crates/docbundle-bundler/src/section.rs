use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::config::{SectionRule, SeedConfig};

const ROOT_SECTION: &str = "main";

/// Assigns every page to the section it is bundled with.
#[derive(Debug, Clone, Default)]
pub struct Sectioner {
    curated: HashMap<String, String>,
    rules: Vec<SectionRule>,
    scope: Option<Url>,
    local_root: Option<PathBuf>,
}

impl Sectioner {
    pub fn new(
        seed: &SeedConfig,
        rules: &[SectionRule],
        scope: Option<Url>,
        local_root: Option<PathBuf>,
    ) -> Self {
        let mut curated = HashMap::new();
        if let SeedConfig::Sections(sections) = seed {
            for section in sections {
                for url in &section.urls {
                    curated
                        .entry(normalize(url))
                        .or_insert_with(|| section.name.clone());
                }
            }
        }
        Self {
            curated,
            rules: rules.to_vec(),
            scope,
            local_root,
        }
    }

    pub fn label_url(&self, url: &Url) -> String {
        if let Some(name) = self.curated.get(&normalize(url.as_str())) {
            return name.clone();
        }
        if let Some(label) = self.rule_label(url.as_str()) {
            return label;
        }

        let path = url.path();
        let rest = match &self.scope {
            Some(scope) if url.as_str().starts_with(scope.as_str()) => {
                &url.as_str()[scope.as_str().len()..]
            }
            _ => path.trim_start_matches('/'),
        };
        first_segment(rest)
            .unwrap_or(ROOT_SECTION)
            .to_string()
    }

    pub fn label_path(&self, path: &Path) -> String {
        if let Some(label) = self.rule_label(&path.to_string_lossy()) {
            return label;
        }

        let relative = match &self.local_root {
            Some(root) => path.strip_prefix(root).unwrap_or(path),
            None => path,
        };
        let dirs: Vec<String> = relative
            .parent()
            .map(|parent| {
                parent
                    .components()
                    .filter_map(|component| match component {
                        Component::Normal(dir) => Some(dir.to_string_lossy().into_owned()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        if dirs.is_empty() {
            ROOT_SECTION.to_string()
        } else {
            dirs.join("_")
        }
    }

    fn rule_label(&self, location: &str) -> Option<String> {
        self.rules
            .iter()
            .find(|rule| location.contains(&rule.pattern))
            .map(|rule| rule.label.clone())
    }
}

fn first_segment(path: &str) -> Option<&str> {
    // query and fragment are not part of the path
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let segment = path.split('/').find(|segment| !segment.is_empty())?;
    // a page sitting right at the scope root is not a directory
    let is_last = path.trim_end_matches('/') == segment && !path.ends_with('/');
    (!is_last || !segment.contains('.')).then(|| segment)
}

fn normalize(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Section;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn scoped() -> Sectioner {
        Sectioner::new(
            &SeedConfig::default(),
            &[],
            Some(url("https://example.com/docs/")),
            None,
        )
    }

    #[test]
    fn first_segment_below_scope() {
        let sectioner = scoped();
        assert_eq!(
            sectioner.label_url(&url("https://example.com/docs/language/Loops/")),
            "language"
        );
        assert_eq!(
            sectioner.label_url(&url("https://example.com/docs/concepts/a.html#x")),
            "concepts"
        );
        assert_eq!(sectioner.label_url(&url("https://example.com/docs/")), "main");
        assert_eq!(
            sectioner.label_url(&url("https://example.com/docs/index.html")),
            "main"
        );
        assert_eq!(
            sectioner.label_url(&url("https://example.com/docs/faq/")),
            "faq"
        );
    }

    #[test]
    fn outside_scope_uses_whole_path() {
        let sectioner = scoped();
        assert_eq!(
            sectioner.label_url(&url("https://other.com/blog/post/")),
            "blog"
        );
        let unscoped = Sectioner::default();
        assert_eq!(unscoped.label_url(&url("https://example.com/")), "main");
    }

    #[test]
    fn rules_before_path() {
        let rules = vec![
            SectionRule {
                pattern: "/writing".into(),
                label: "04_writing_scripts".into(),
            },
            SectionRule {
                pattern: "/w".into(),
                label: "never".into(),
            },
        ];
        let sectioner = Sectioner::new(&SeedConfig::default(), &rules, None, None);
        assert_eq!(
            sectioner.label_url(&url("https://example.com/docs/writing/Style_guide/")),
            "04_writing_scripts"
        );
    }

    #[test]
    fn curated_sections_win() {
        let seed = SeedConfig::Sections(vec![Section {
            name: "Language".into(),
            urls: vec!["https://example.com/docs/concepts/Alerts/".into()],
        }]);
        let rules = vec![SectionRule {
            pattern: "concepts".into(),
            label: "concepts".into(),
        }];
        let sectioner = Sectioner::new(&seed, &rules, None, None);
        assert_eq!(
            sectioner.label_url(&url("https://example.com/docs/concepts/Alerts/")),
            "Language"
        );
        assert_eq!(
            sectioner.label_url(&url("https://example.com/docs/concepts/Colors/")),
            "concepts"
        );
    }

    #[test]
    fn local_files_by_directory() {
        let sectioner = Sectioner::new(
            &SeedConfig::default(),
            &[],
            None,
            Some(PathBuf::from("/site")),
        );
        assert_eq!(
            sectioner.label_path(Path::new("/site/language/loops.html")),
            "language"
        );
        assert_eq!(
            sectioner.label_path(Path::new("/site/concepts/alerts/index.html")),
            "concepts_alerts"
        );
        assert_eq!(sectioner.label_path(Path::new("/site/index.html")), "main");
    }
}
