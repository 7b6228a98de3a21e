//! Activation decision policy
//!
//! A model is activated during composition only if it has an activation hook
//! at all. Given a hook, an explicit `activate` setting wins; without one the
//! process-wide `activate_during_composition` flag decides.
//!
//! | hook | flag | `activate` | result |
//! |------|------|------------|--------|
//! | no   | any  | any        | false  |
//! | yes  | on   | unset      | true   |
//! | yes  | off  | unset      | false  |
//! | yes  | any  | true       | true   |
//! | yes  | any  | false      | false  |

use crate::model::ViewModel;
use crate::settings::CompositionSettings;

/// Decides whether a composed model gets its activation hook invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActivationController {
    activate_during_composition: bool,
}

impl ActivationController {
    /// Controller with the process-wide activation flag
    pub fn new(activate_during_composition: bool) -> Self {
        Self {
            activate_during_composition,
        }
    }

    /// Process-wide flag this controller was built with
    pub fn activate_during_composition(&self) -> bool {
        self.activate_during_composition
    }

    /// Whether `model` should be activated under `settings`
    pub fn should_activate(&self, model: &dyn ViewModel, settings: &CompositionSettings) -> bool {
        if !model.can_activate() {
            return false;
        }
        settings.activate.unwrap_or(self.activate_during_composition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Model {
        can_activate: bool,
    }

    impl ViewModel for Model {
        fn module_id(&self) -> &str {
            "viewmodels/test"
        }

        fn can_activate(&self) -> bool {
            self.can_activate
        }
    }

    fn settings(activate: Option<bool>) -> CompositionSettings {
        CompositionSettings {
            activate,
            ..Default::default()
        }
    }

    #[test]
    fn test_truth_table() {
        let cases = [
            // (hook, flag, activate, expected)
            (false, false, None, false),
            (false, true, None, false),
            (false, false, Some(true), false),
            (false, true, Some(true), false),
            (false, true, Some(false), false),
            (true, true, None, true),
            (true, false, None, false),
            (true, false, Some(true), true),
            (true, true, Some(true), true),
            (true, false, Some(false), false),
            (true, true, Some(false), false),
        ];

        for (hook, flag, activate, expected) in cases {
            let controller = ActivationController::new(flag);
            let model = Model { can_activate: hook };
            assert_eq!(
                controller.should_activate(&model, &settings(activate)),
                expected,
                "hook={} flag={} activate={:?}",
                hook,
                flag,
                activate
            );
        }
    }

    #[test]
    fn test_default_flag_is_off() {
        let controller = ActivationController::default();
        assert!(!controller.activate_during_composition());
        assert!(!controller.should_activate(&Model { can_activate: true }, &settings(None)));
    }
}
