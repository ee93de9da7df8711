//! Redirect resolver: maps a visited location to a redirect or a view.
//!
//! Routes:
//! - `/` shows the editor, unless the hash fragment names an alias
//! - the privacy path shows the privacy page
//! - anything else is looked up as an alias, falling back to not-found
//!
//! Path and fragment use the same matching rule: the leading `/` or `#` is
//! stripped, then an exact key match wins, otherwise the first key equal
//! ignoring case matches. An empty name never matches, and neither does an
//! alias whose URL is empty.

use crate::aliases::{AliasMap, AliasStore};
use crate::kv::KeyValueStore;

use serde::Serialize;
use tracing::{debug, info};

pub const ROOT_PATH: &str = "/";

/// Fixed path of the static privacy page
pub const DEFAULT_PRIVACY_PATH: &str = "/about/privacy";

/// Performs a full page navigation (not a client-side route change).
pub trait Navigator {
    fn navigate(&self, url: &str);
}

impl<F: Fn(&str)> Navigator for F {
    fn navigate(&self, url: &str) {
        self(url)
    }
}

/// What a pathname refers to, before any alias lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route<'a> {
    Editor,
    Privacy,
    /// Candidate alias name (leading slash stripped)
    Alias(&'a str),
}

/// Classify a pathname.
pub fn route<'a>(pathname: &'a str, privacy_path: &str) -> Route<'a> {
    if pathname.is_empty() || pathname == ROOT_PATH {
        Route::Editor
    } else if pathname == privacy_path {
        Route::Privacy
    } else {
        Route::Alias(pathname.strip_prefix('/').unwrap_or(pathname))
    }
}

/// What the page should do for a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Resolution {
    /// Navigation to `url` was requested
    Redirect { url: String },
    Editor,
    Privacy,
    /// No alias matched; `pathname` is shown to the user as visited
    NotFound { pathname: String },
}

/// Destination for `name` in `aliases`, using the shared matching rule.
pub fn find_alias<'m>(aliases: &'m AliasMap, name: &str) -> Option<&'m str> {
    if name.is_empty() {
        return None;
    }
    // An alias without a destination is not a match
    if let Some(url) = aliases.get(name).filter(|url| !url.is_empty()) {
        return Some(url);
    }
    let wanted = name.to_lowercase();
    aliases
        .iter()
        .find(|(key, url)| !url.is_empty() && key.to_lowercase() == wanted)
        .map(|(_, url)| url.as_str())
}

/// Fragment without its leading `#`.
pub fn fragment_name(hash: &str) -> &str {
    hash.strip_prefix('#').unwrap_or(hash)
}

/// Resolves locations against the alias store and redirects on a match.
pub struct RedirectResolver<S, N> {
    aliases: AliasStore<S>,
    navigator: N,
    privacy_path: String,
}

impl<S: KeyValueStore, N: Navigator> RedirectResolver<S, N> {
    pub fn new(aliases: AliasStore<S>, navigator: N, privacy_path: impl Into<String>) -> Self {
        Self {
            aliases,
            navigator,
            privacy_path: privacy_path.into(),
        }
    }

    /// Page-load resolution of `pathname` and `hash` (either may be empty).
    pub fn resolve_location(&self, pathname: &str, hash: &str) -> Resolution {
        match route(pathname, &self.privacy_path) {
            Route::Privacy => Resolution::Privacy,
            Route::Editor => match self.redirect_to(fragment_name(hash)) {
                Some(url) => Resolution::Redirect { url },
                None => Resolution::Editor,
            },
            Route::Alias(name) => match self.redirect_to(name) {
                Some(url) => Resolution::Redirect { url },
                None => {
                    debug!("No alias for {}", pathname);
                    Resolution::NotFound {
                        pathname: pathname.to_string(),
                    }
                }
            },
        }
    }

    /// In-page `hashchange` resolution. Returns the URL navigated to, if any.
    pub fn resolve_fragment(&self, hash: &str) -> Option<String> {
        self.redirect_to(fragment_name(hash))
    }

    fn redirect_to(&self, name: &str) -> Option<String> {
        let url = self.aliases.lookup(name)?;
        info!("Redirecting {} to {}", name, url);
        self.navigator.navigate(&url);
        Some(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::InMemoryStore;
    use crate::persistence::Persistence;
    use std::sync::{Arc, Mutex};

    type Visited = Arc<Mutex<Vec<String>>>;

    fn resolver(
        pairs: &[(&str, &str)],
    ) -> (RedirectResolver<InMemoryStore, impl Navigator>, Visited) {
        let store = AliasStore::with_default_key(Persistence::new(InMemoryStore::new()));
        let mapping: AliasMap = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        store.set(&mapping).unwrap();

        let visited: Visited = Arc::new(Mutex::new(Vec::new()));
        let visited_clone = Arc::clone(&visited);
        let navigator = move |url: &str| visited_clone.lock().unwrap().push(url.to_string());
        (RedirectResolver::new(store, navigator, DEFAULT_PRIVACY_PATH), visited)
    }

    #[test]
    fn test_route_classification() {
        assert_eq!(route("/", DEFAULT_PRIVACY_PATH), Route::Editor);
        assert_eq!(route("", DEFAULT_PRIVACY_PATH), Route::Editor);
        assert_eq!(route("/about/privacy", DEFAULT_PRIVACY_PATH), Route::Privacy);
        assert_eq!(route("/foo", DEFAULT_PRIVACY_PATH), Route::Alias("foo"));
    }

    #[test]
    fn test_path_match_redirects() {
        let (resolver, visited) = resolver(&[("foo", "https://example.com")]);

        let resolution = resolver.resolve_location("/foo", "");

        assert_eq!(
            resolution,
            Resolution::Redirect {
                url: "https://example.com".into()
            }
        );
        assert_eq!(*visited.lock().unwrap(), vec!["https://example.com"]);
    }

    #[test]
    fn test_missing_path_is_not_found_with_pathname() {
        let (resolver, visited) = resolver(&[("foo", "https://example.com")]);

        assert_eq!(
            resolver.resolve_location("/missing", ""),
            Resolution::NotFound {
                pathname: "/missing".into()
            }
        );
        assert!(visited.lock().unwrap().is_empty());
    }

    #[test]
    fn test_root_with_matching_hash_redirects() {
        let (resolver, visited) = resolver(&[("foo", "https://example.com")]);

        assert_eq!(
            resolver.resolve_location("/", "#foo"),
            Resolution::Redirect {
                url: "https://example.com".into()
            }
        );
        assert_eq!(visited.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_root_without_match_shows_editor() {
        let (resolver, visited) = resolver(&[("foo", "https://example.com")]);

        assert_eq!(resolver.resolve_location("/", ""), Resolution::Editor);
        assert_eq!(resolver.resolve_location("/", "#nope"), Resolution::Editor);
        assert!(visited.lock().unwrap().is_empty());
    }

    #[test]
    fn test_reserved_privacy_path_is_never_looked_up() {
        let (resolver, visited) = resolver(&[("about", "https://a.example")]);

        assert_eq!(resolver.resolve_location("/about/privacy", ""), Resolution::Privacy);
        assert!(visited.lock().unwrap().is_empty());
    }

    #[test]
    fn test_case_insensitive_match_prefers_exact_key() {
        let (resolver, _) = resolver(&[("Docs", "https://upper.example"), ("docs", "https://lower.example")]);

        assert_eq!(
            resolver.resolve_fragment("#Docs").as_deref(),
            Some("https://upper.example")
        );
        assert_eq!(
            resolver.resolve_fragment("#docs").as_deref(),
            Some("https://lower.example")
        );
        assert_eq!(
            resolver.resolve_fragment("#DOCS").as_deref(),
            Some("https://upper.example")
        );
    }

    #[test]
    fn test_path_and_fragment_match_the_same_way() {
        let (resolver, _) = resolver(&[("GitHub", "https://github.com")]);

        assert_eq!(
            resolver.resolve_location("/github", ""),
            Resolution::Redirect {
                url: "https://github.com".into()
            }
        );
        assert_eq!(
            resolver.resolve_fragment("#GITHUB").as_deref(),
            Some("https://github.com")
        );
    }

    #[test]
    fn test_empty_fragment_never_matches() {
        let (resolver, visited) = resolver(&[("foo", "https://example.com")]);
        assert_eq!(resolver.resolve_fragment(""), None);
        assert_eq!(resolver.resolve_fragment("#"), None);
        assert!(visited.lock().unwrap().is_empty());
    }

    #[test]
    fn test_alias_with_empty_url_is_not_a_match() {
        let (resolver, visited) = resolver(&[("foo", "")]);

        assert_eq!(
            resolver.resolve_location("/foo", ""),
            Resolution::NotFound {
                pathname: "/foo".into()
            }
        );
        assert_eq!(resolver.resolve_location("/", "#foo"), Resolution::Editor);
        assert_eq!(resolver.resolve_fragment("#FOO"), None);
        assert!(visited.lock().unwrap().is_empty());
    }

    #[test]
    fn test_empty_exact_match_falls_back_to_case_insensitive() {
        let aliases: AliasMap = [("Foo", "https://foo.example"), ("foo", "")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(find_alias(&aliases, "foo"), Some("https://foo.example"));
    }

    #[test]
    fn test_resolution_serializes_with_kind_tag() {
        let json = serde_json::to_value(Resolution::NotFound {
            pathname: "/x".into(),
        })
        .unwrap();
        assert_eq!(json["kind"], "notFound");
        assert_eq!(json["pathname"], "/x");
    }
}
