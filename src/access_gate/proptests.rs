//! Property-based tests for the access gate

use super::*;
use proptest::prelude::*;

fn arb_flags() -> impl Strategy<Value = AccessFlags> {
    (any::<bool>(), any::<bool>(), any::<bool>())
        .prop_map(|(a, p, s)| AccessFlags::new(a, p, s))
}

fn arb_screen() -> impl Strategy<Value = Screen> {
    prop::sample::select(Screen::ALL.to_vec())
}

proptest! {
    /// Every request settles on a screen the gate allows
    #[test]
    fn prop_resolve_lands_on_allowed_screen(flags in arb_flags(), screen in arb_screen()) {
        let landed = resolve(Some(flags), screen).expect("flags are loaded");
        prop_assert_eq!(decide(Some(flags), landed), GateDecision::Allow);
    }

    /// Signed-in users always land on their onboarding stage
    #[test]
    fn prop_signed_in_lands_on_stage(p in any::<bool>(), s in any::<bool>(), screen in arb_screen()) {
        let flags = AccessFlags::new(true, p, s);
        prop_assert_eq!(resolve(Some(flags), screen), Some(flags.stage()));
    }

    /// Signed-out users only ever see public screens
    #[test]
    fn prop_signed_out_stays_public(p in any::<bool>(), s in any::<bool>(), screen in arb_screen()) {
        let flags = AccessFlags::new(false, p, s);
        let landed = resolve(Some(flags), screen).expect("flags are loaded");
        prop_assert!(landed.is_public());
        if screen.is_public() {
            prop_assert_eq!(landed, screen);
        }
    }

    /// Never redirect to the screen that was requested
    #[test]
    fn prop_redirect_changes_screen(flags in arb_flags(), screen in arb_screen()) {
        if let GateDecision::Redirect(target) = decide(Some(flags), screen) {
            prop_assert_ne!(target, screen);
        }
    }
}
