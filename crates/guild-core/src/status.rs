//! Archetype status rules and the transition pre-checks.
//!
//! [`StatusRules`] is built once from configuration and never changes.
//! [`check_transition`] runs the three checks every status change must
//! pass before a handler sees the payload.

use std::collections::{BTreeMap, BTreeSet};

use guild_types::{Archetype, Golem, GolemStatus};

use crate::config::{ArchetypeConfig, default_archetypes};
use crate::error::GameError;

/// Per-archetype rule entry.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ArchetypeRule {
    allowed: BTreeSet<GolemStatus>,
    capacity: u64,
    travel_time_pct: u64,
}

impl From<&ArchetypeConfig> for ArchetypeRule {
    fn from(config: &ArchetypeConfig) -> Self {
        Self {
            allowed: config.allowed_statuses.iter().copied().collect(),
            capacity: config.capacity,
            travel_time_pct: config.travel_time_pct,
        }
    }
}

/// Immutable lookup table of what each archetype may do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRules {
    rules: BTreeMap<Archetype, ArchetypeRule>,
}

impl StatusRules {
    /// Build the table from configuration. Archetypes missing from
    /// `archetypes` fall back to their built-in defaults.
    pub fn from_config(archetypes: &BTreeMap<Archetype, ArchetypeConfig>) -> Self {
        let mut rules: BTreeMap<Archetype, ArchetypeRule> = default_archetypes()
            .iter()
            .map(|(archetype, config)| (*archetype, ArchetypeRule::from(config)))
            .collect();
        for (archetype, config) in archetypes {
            rules.insert(*archetype, ArchetypeRule::from(config));
        }
        Self { rules }
    }

    /// Whether `archetype` may enter `status`.
    pub fn is_allowed(&self, archetype: Archetype, status: GolemStatus) -> bool {
        self.rules
            .get(&archetype)
            .is_some_and(|rule| rule.allowed.contains(&status))
    }

    /// Carrying capacity of a freshly summoned golem of `archetype`.
    pub fn capacity(&self, archetype: Archetype) -> u64 {
        self.rules.get(&archetype).map_or(0, |rule| rule.capacity)
    }

    /// Travel time scaling for `archetype`, in percent of the route's time.
    pub fn travel_time_pct(&self, archetype: Archetype) -> u64 {
        self.rules
            .get(&archetype)
            .map_or(100, |rule| rule.travel_time_pct)
    }
}

impl Default for StatusRules {
    fn default() -> Self {
        Self::from_config(&BTreeMap::new())
    }
}

/// Validate a requested status change for `golem`.
///
/// Checks, in order: the status name parses, the golem is not busy, and
/// the archetype allows the status. Returns the parsed status.
///
/// # Errors
///
/// Returns [`GameError::StatusNotRecognized`], [`GameError::GolemBusy`] or
/// [`GameError::StatusNotAllowedForArchetype`].
pub fn check_transition(
    rules: &StatusRules,
    golem: &Golem,
    requested: &str,
) -> Result<GolemStatus, GameError> {
    let status: GolemStatus = requested
        .parse()
        .ok()
        .ok_or_else(|| GameError::StatusNotRecognized {
            status: requested.to_owned(),
        })?;

    if golem.is_busy() {
        return Err(GameError::GolemBusy {
            golem: golem.symbol.clone(),
            status: golem.status,
        });
    }

    if !rules.is_allowed(golem.archetype, status) {
        return Err(GameError::StatusNotAllowedForArchetype {
            status,
            archetype: golem.archetype,
        });
    }

    Ok(status)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn golem(archetype: Archetype, status: GolemStatus) -> Golem {
        Golem {
            symbol: format!("{}-0", archetype.abbreviation()),
            archetype,
            location_symbol: "A-G".to_owned(),
            status,
            status_detail: None,
            arrival_time: None,
            capacity: 10,
        }
    }

    #[test]
    fn default_allowance_table() {
        let rules = StatusRules::default();
        let allowed = |a, s| rules.is_allowed(a, s);

        assert!(allowed(Archetype::Invoker, GolemStatus::Invoking));
        assert!(!allowed(Archetype::Invoker, GolemStatus::Traveling));
        assert!(allowed(Archetype::Harvester, GolemStatus::Harvesting));
        assert!(!allowed(Archetype::Harvester, GolemStatus::Packing));
        assert!(allowed(Archetype::Courier, GolemStatus::Storing));
        assert!(!allowed(Archetype::Courier, GolemStatus::Transacting));
        assert!(!allowed(Archetype::Artisan, GolemStatus::Harvesting));
        assert!(allowed(Archetype::Merchant, GolemStatus::Transacting));
        for archetype in Archetype::ALL {
            assert!(allowed(archetype, GolemStatus::Idle));
        }

        assert_eq!(rules.capacity(Archetype::Courier), 50);
        assert_eq!(rules.travel_time_pct(Archetype::Courier), 75);
        assert_eq!(rules.travel_time_pct(Archetype::Merchant), 100);
    }

    #[test]
    fn idle_golem_transitions_follow_the_configured_table() {
        let rules = StatusRules::default();
        let table = default_archetypes();
        for archetype in Archetype::ALL {
            let allowed = &table.get(&archetype).unwrap().allowed_statuses;
            let idle = golem(archetype, GolemStatus::Idle);
            for status in GolemStatus::ALL {
                let result = check_transition(&rules, &idle, status.as_str());
                if allowed.contains(&status) {
                    assert_eq!(result.unwrap(), status, "{archetype} -> {status}");
                } else {
                    assert!(
                        matches!(
                            result,
                            Err(GameError::StatusNotAllowedForArchetype { status: s, archetype: a })
                                if s == status && a == archetype
                        ),
                        "{archetype} -> {status}"
                    );
                }
            }
        }
    }

    #[test]
    fn configured_archetype_overrides_default() {
        let archetypes = BTreeMap::from([(
            Archetype::Artisan,
            ArchetypeConfig {
                allowed_statuses: vec![GolemStatus::Idle, GolemStatus::Harvesting],
                capacity: 3,
                travel_time_pct: 50,
            },
        )]);
        let rules = StatusRules::from_config(&archetypes);
        assert!(rules.is_allowed(Archetype::Artisan, GolemStatus::Harvesting));
        assert!(!rules.is_allowed(Archetype::Artisan, GolemStatus::Traveling));
        assert_eq!(rules.capacity(Archetype::Artisan), 3);
        assert_eq!(rules.capacity(Archetype::Merchant), 25);
    }

    #[test]
    fn unknown_status_is_checked_first() {
        let rules = StatusRules::default();
        let busy = golem(Archetype::Merchant, GolemStatus::Transacting);
        assert!(matches!(
            check_transition(&rules, &busy, "dancing"),
            Err(GameError::StatusNotRecognized { status }) if status == "dancing"
        ));
    }

    #[test]
    fn blocking_statuses_report_busy() {
        let rules = StatusRules::default();
        for status in GolemStatus::ALL.into_iter().filter(|s| s.is_blocking()) {
            let g = golem(Archetype::Merchant, status);
            assert!(matches!(
                check_transition(&rules, &g, "idle"),
                Err(GameError::GolemBusy { .. })
            ));
        }
    }

    #[test]
    fn harvesting_is_not_blocking() {
        let rules = StatusRules::default();
        let g = golem(Archetype::Harvester, GolemStatus::Harvesting);
        assert_eq!(
            check_transition(&rules, &g, "Traveling").unwrap(),
            GolemStatus::Traveling
        );
    }

    #[test]
    fn disallowed_status_for_archetype() {
        let rules = StatusRules::default();
        let g = golem(Archetype::Harvester, GolemStatus::Idle);
        assert!(matches!(
            check_transition(&rules, &g, "transacting"),
            Err(GameError::StatusNotAllowedForArchetype {
                status: GolemStatus::Transacting,
                archetype: Archetype::Harvester,
            })
        ));
    }
}
