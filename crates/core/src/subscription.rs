//! Store subscriptions and the matcher deciding which feature sets a store ingests.
//!
//! Matching rules, evaluated in list order (first decisive match wins):
//!
//! 1. an empty project or name pattern is a configuration error
//! 2. a `*` project or a `*` name matches everything, whatever the other entries say
//! 3. otherwise the project must equal the pattern exactly
//! 4. the name pattern is a glob (`*` becomes `.*` unless the pattern already holds
//!    `.*`) and must match the whole feature-set name
//!
//! The project side never supports partial globs and the `exclude` flag is not
//! consulted; both are long-standing behaviors that stores depend on.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

pub const WILDCARD: &str = "*";

/// A `(project, name, exclude)` rule selecting feature sets for a store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subscription {
    pub project: String,
    pub name: String,
    /// Recorded for the spec service; not consulted by [`matches`].
    #[serde(default)]
    pub exclude: bool,
}

impl Subscription {
    pub fn new(project: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            name: name.into(),
            exclude: false,
        }
    }

    pub fn excluding(mut self) -> Self {
        self.exclude = true;
        self
    }

    /// Subscribes to every feature set (`*` on either side).
    pub fn is_wildcard(&self) -> bool {
        self.project == WILDCARD || self.name == WILDCARD
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.project.is_empty() || self.name.is_empty() {
            return Err(DomainError::invalid_subscription(format!(
                "subscription is missing arguments: project={:?} name={:?}",
                self.project, self.name
            )));
        }
        Ok(())
    }

    /// Anchored regex for the name pattern.
    pub fn name_regex(&self) -> DomainResult<Regex> {
        compile_glob(&self.name).map_err(|e| {
            DomainError::invalid_subscription(format!("name pattern {:?}: {e}", self.name))
        })
    }
}

/// Translate a subscription glob into an anchored regex.
///
/// Patterns that already contain `.*` are taken as regexes verbatim.
pub fn compile_glob(pattern: &str) -> Result<Regex, regex::Error> {
    let translated = if pattern.contains(".*") {
        pattern.to_string()
    } else {
        pattern.replace('*', ".*")
    };
    Regex::new(&format!("^(?:{translated})$"))
}

/// Decide whether `project_name/feature_set_name` belongs to a store with these
/// subscriptions.
pub fn matches(
    subscriptions: &[Subscription],
    project_name: &str,
    feature_set_name: &str,
) -> DomainResult<bool> {
    for sub in subscriptions {
        sub.validate()?;

        if sub.is_wildcard() {
            return Ok(true);
        }

        if project_name != sub.project {
            continue;
        }

        if sub.name_regex()?.is_match(feature_set_name) {
            return Ok(true);
        }
    }

    Ok(false)
}

/// Validate every subscription up front (empty patterns, uncompilable names).
pub fn validate_all(subscriptions: &[Subscription]) -> DomainResult<()> {
    SubscriptionMatcher::compile(subscriptions).map(|_| ())
}

#[derive(Debug, Clone)]
enum Rule {
    Everything,
    Named { project: String, name: Regex },
}

/// A store's subscriptions with every name pattern compiled once.
///
/// Same decisions as [`matches`], but every subscription is validated up front,
/// so a bad entry is reported even when an earlier one would have matched.
#[derive(Debug, Clone)]
pub struct SubscriptionMatcher {
    rules: Vec<Rule>,
}

impl SubscriptionMatcher {
    pub fn compile(subscriptions: &[Subscription]) -> DomainResult<Self> {
        let rules = subscriptions
            .iter()
            .map(|sub| {
                sub.validate()?;
                if sub.is_wildcard() {
                    Ok(Rule::Everything)
                } else {
                    Ok(Rule::Named {
                        project: sub.project.clone(),
                        name: sub.name_regex()?,
                    })
                }
            })
            .collect::<DomainResult<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn matches(&self, project_name: &str, feature_set_name: &str) -> bool {
        self.rules.iter().any(|rule| match rule {
            Rule::Everything => true,
            Rule::Named { project, name } => project == project_name && name.is_match(feature_set_name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_patterns_are_configuration_errors() {
        let subs = vec![Subscription::new("", "features")];
        assert!(matches!(
            matches(&subs, "project1", "features"),
            Err(DomainError::InvalidSubscription(_))
        ));

        let subs = vec![Subscription::new("project1", "")];
        assert!(validate_all(&subs).is_err());
    }

    #[test]
    fn project_must_match_exactly() {
        let subs = vec![Subscription::new("project1", "features")];

        assert!(matches(&subs, "project1", "features").unwrap());
        assert!(!matches(&subs, "project10", "features").unwrap());
        // No globbing on the project side.
        let subs = vec![Subscription::new("proj*", "features")];
        assert!(!matches(&subs, "project1", "features").unwrap());
    }

    #[test]
    fn name_glob_is_anchored() {
        let subs = vec![Subscription::new("project1", "driver_*")];

        assert!(matches(&subs, "project1", "driver_hourly").unwrap());
        assert!(!matches(&subs, "project1", "hourly_driver_stats").unwrap());
        assert!(!matches(&subs, "project1", "customer").unwrap());
    }

    #[test]
    fn existing_regex_tokens_are_kept() {
        let subs = vec![Subscription::new("project1", "driver_.*_v[0-9]")];

        assert!(matches(&subs, "project1", "driver_hourly_v2").unwrap());
        assert!(!matches(&subs, "project1", "driver_hourly_vX").unwrap());
    }

    #[test]
    fn first_matching_subscription_wins() {
        let subs = vec![
            Subscription::new("project1", "a*"),
            Subscription::new("project2", "b*"),
        ];

        assert!(matches(&subs, "project2", "bananas").unwrap());
        assert!(!matches(&subs, "project2", "apples").unwrap());
    }

    #[test]
    fn wildcard_entry_bypasses_exclude_flags() {
        // Policy quirk: the wildcard entry is itself flagged `exclude`, and still
        // subscribes the store to everything.
        let subs = vec![
            Subscription::new("project2", "secret").excluding(),
            Subscription::new("*", "*").excluding(),
        ];

        assert!(matches(&subs, "project1", "secret").unwrap());
        assert!(matches(&subs, "project2", "secret").unwrap());
    }

    #[test]
    fn no_subscriptions_match_nothing() {
        assert!(!matches(&[], "project1", "features").unwrap());
    }

    #[test]
    fn invalid_regex_is_reported() {
        let subs = vec![Subscription::new("project1", "driver_(.*")];
        assert!(matches!(
            matches(&subs, "project1", "driver_x"),
            Err(DomainError::InvalidSubscription(_))
        ));
    }

    #[test]
    fn compiled_matcher_rejects_any_bad_entry() {
        let subs = vec![Subscription::new("*", "*"), Subscription::new("project1", "")];

        // The free function stops at the wildcard; the compiled form checks every entry.
        assert!(matches(&subs, "project1", "x").unwrap());
        assert!(matches!(
            SubscriptionMatcher::compile(&subs),
            Err(DomainError::InvalidSubscription(_))
        ));
    }

    #[test]
    fn compiled_matcher_follows_the_same_rules() {
        let subs = vec![
            Subscription::new("project1", "driver_*"),
            Subscription::new("project2", "driver_.*_v[0-9]"),
        ];
        let matcher = SubscriptionMatcher::compile(&subs).unwrap();

        assert!(matcher.matches("project1", "driver_hourly"));
        assert!(!matcher.matches("project1", "hourly_driver"));
        assert!(matcher.matches("project2", "driver_daily_v3"));
        assert!(!matcher.matches("project3", "driver_hourly"));
        assert!(!SubscriptionMatcher::compile(&[]).unwrap().matches("project1", "x"));
    }

    fn pattern() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,8}\\*?"
    }

    fn subscription() -> impl Strategy<Value = Subscription> {
        (pattern(), pattern(), any::<bool>()).prop_map(|(project, name, exclude)| Subscription {
            project,
            name,
            exclude,
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: any list holding a `*` project or name entry matches every feature set.
        #[test]
        fn any_wildcard_entry_matches_everything(
            mut subs in prop::collection::vec(subscription(), 0..6),
            position in 0usize..6,
            wildcard_project in any::<bool>(),
            exclude in any::<bool>(),
            project in "[a-z0-9_]{1,12}",
            name in "[a-z0-9_]{1,12}",
        ) {
            let wildcard = if wildcard_project {
                Subscription { project: WILDCARD.to_string(), name: "x".to_string(), exclude }
            } else {
                Subscription { project: "x".to_string(), name: WILDCARD.to_string(), exclude }
            };
            let at = position.min(subs.len());
            subs.insert(at, wildcard);

            prop_assert!(matches(&subs, &project, &name).unwrap());
        }

        /// Property: `(project1, *)` accepts any feature-set name in project1.
        #[test]
        fn project_wide_subscription_accepts_any_name(name in "[A-Za-z0-9_.\\-]{1,24}") {
            let subs = vec![Subscription::new("project1", "*")];
            prop_assert!(matches(&subs, "project1", &name).unwrap());
        }

        /// Property: for valid lists the compiled matcher and `matches` agree.
        #[test]
        fn compiled_matcher_agrees_with_matches(
            subs in prop::collection::vec(subscription(), 0..6),
            project in "[a-z][a-z0-9_]{0,8}",
            name in "[a-z][a-z0-9_]{0,8}",
        ) {
            let matcher = SubscriptionMatcher::compile(&subs).unwrap();
            prop_assert_eq!(matcher.matches(&project, &name), matches(&subs, &project, &name).unwrap());
        }
    }
}
