use std::fmt;
use std::str::FromStr;

use super::SubpluginCapabilities;
use crate::lifecycle::{LifecycleError, SettingsType};

/// Trigger subplugins that can start a workflow for a course
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    /// Started by a user from the course page
    Manual,
    /// Courses whose start date lies a configured delay in the past
    StartDateDelay,
    /// Courses within (or outside) a set of categories
    Categories,
    /// Courses within a single category
    Category,
    /// Fires on fixed calendar dates
    SpecificDate,
    /// Excludes the site course; one instance system-wide
    SiteCourse,
    /// Delays courses that recently left a workflow; one instance system-wide
    DelayedCourses,
}

impl TriggerKind {
    pub const ALL: [TriggerKind; 7] = [
        TriggerKind::Manual,
        TriggerKind::StartDateDelay,
        TriggerKind::Categories,
        TriggerKind::Category,
        TriggerKind::SpecificDate,
        TriggerKind::SiteCourse,
        TriggerKind::DelayedCourses,
    ];

    /// Resolve a stored subplugin name
    pub fn lookup(name: &str) -> Result<Self, LifecycleError> {
        name.parse()
    }

    pub fn is_manual_trigger(&self) -> bool {
        matches!(self, TriggerKind::Manual)
    }

    pub fn has_multiple_instances(&self) -> bool {
        !matches!(self, TriggerKind::SiteCourse | TriggerKind::DelayedCourses)
    }
}

impl SubpluginCapabilities for TriggerKind {
    fn name(&self) -> &'static str {
        match self {
            TriggerKind::Manual => "manual",
            TriggerKind::StartDateDelay => "startdatedelay",
            TriggerKind::Categories => "categories",
            TriggerKind::Category => "category",
            TriggerKind::SpecificDate => "specificdate",
            TriggerKind::SiteCourse => "sitecourse",
            TriggerKind::DelayedCourses => "delayedcourses",
        }
    }

    fn instance_settings(&self) -> &'static [&'static str] {
        match self {
            TriggerKind::Manual => &["icon", "displayname", "capability"],
            TriggerKind::StartDateDelay => &["delay"],
            TriggerKind::Categories => &["categories", "exclude"],
            TriggerKind::Category => &["category_select"],
            TriggerKind::SpecificDate => &["dates", "timelastrun"],
            TriggerKind::SiteCourse | TriggerKind::DelayedCourses => &[],
        }
    }
}

impl FromStr for TriggerKind {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TriggerKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| LifecycleError::UnknownSubplugin {
                kind: SettingsType::Trigger,
                name: s.to_string(),
            })
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name() {
        for kind in TriggerKind::ALL {
            assert_eq!(TriggerKind::lookup(kind.name()).unwrap(), kind);
        }
        assert!(matches!(
            TriggerKind::lookup("lastaccess"),
            Err(LifecycleError::UnknownSubplugin { .. })
        ));
    }

    #[test]
    fn test_only_manual_is_manual() {
        let manual: Vec<_> = TriggerKind::ALL
            .into_iter()
            .filter(TriggerKind::is_manual_trigger)
            .collect();
        assert_eq!(manual, vec![TriggerKind::Manual]);
    }

    #[test]
    fn test_single_instance_triggers() {
        assert!(!TriggerKind::SiteCourse.has_multiple_instances());
        assert!(!TriggerKind::DelayedCourses.has_multiple_instances());
        assert!(TriggerKind::StartDateDelay.has_multiple_instances());
        assert!(TriggerKind::Manual.has_multiple_instances());
    }
}
