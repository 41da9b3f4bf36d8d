use std::fmt;
use std::str::FromStr;

use super::SubpluginCapabilities;
use crate::lifecycle::{LifecycleError, SettingsType};

/// Step subplugins a workflow can apply to a course
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    Email,
    DeleteCourse,
    CreateBackup,
    MakeInvisible,
    Duplicate,
}

impl StepKind {
    pub const ALL: [StepKind; 5] = [
        StepKind::Email,
        StepKind::DeleteCourse,
        StepKind::CreateBackup,
        StepKind::MakeInvisible,
        StepKind::Duplicate,
    ];

    pub fn lookup(name: &str) -> Result<Self, LifecycleError> {
        name.parse()
    }
}

impl SubpluginCapabilities for StepKind {
    fn name(&self) -> &'static str {
        match self {
            StepKind::Email => "email",
            StepKind::DeleteCourse => "deletecourse",
            StepKind::CreateBackup => "createbackup",
            StepKind::MakeInvisible => "makeinvisible",
            StepKind::Duplicate => "duplicate",
        }
    }

    fn instance_settings(&self) -> &'static [&'static str] {
        match self {
            StepKind::Email => &["responsetimeout", "subject", "content", "contenthtml"],
            StepKind::DeleteCourse => &["maximumdeletionspercron"],
            StepKind::CreateBackup => &["maximumbackupspercron"],
            StepKind::MakeInvisible | StepKind::Duplicate => &[],
        }
    }
}

impl FromStr for StepKind {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StepKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| LifecycleError::UnknownSubplugin {
                kind: SettingsType::Step,
                name: s.to_string(),
            })
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
