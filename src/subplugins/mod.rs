// Subplugin registry - the fixed set of trigger and step kinds known to the manager

pub mod steps;
pub mod triggers;

pub use steps::StepKind;
pub use triggers::TriggerKind;

/// Capabilities every subplugin kind declares
pub trait SubpluginCapabilities {
    /// Registry name, as stored on instances
    fn name(&self) -> &'static str;

    /// Setting keys an instance of this subplugin carries
    fn instance_settings(&self) -> &'static [&'static str];
}
