//! The prank arbiter.
//!
//! Every disruptive behavior asks the same question before starting: is a
//! major prank allowed right now? Centralizing the answer keeps the mutual
//! exclusion rules in one place instead of scattered across state machines.

use crate::config::Config;
use crate::world::WorldState;

/// Decide whether a major prank may start right now.
///
/// A prank is refused while the startup grace period runs, while the user
/// is dragging the agent, while a modal prompt is open, in scare mode,
/// while another major prank (heist, pointer capture, final sequence) is
/// active, and, when `respect_input` is on, while the user has been active
/// within the grace window.
pub fn may_start_major_prank(
    world: &WorldState,
    other_prank_active: bool,
    now: f64,
    idle_s: f64,
    config: &Config,
) -> bool {
    if world.intro_active && now < world.intro_until {
        return false;
    }
    if world.dragging || world.prompt_open || world.scary_mode {
        return false;
    }
    if other_prank_active {
        return false;
    }
    if config.respect_input && idle_s < config.active_grace_s {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::IDLE_SENTINEL_S;

    fn setup() -> (Config, WorldState) {
        let config = Config::new().screen(800, 600).seed(1);
        let mut world = WorldState::new(&config);
        world.intro_active = false;
        (config, world)
    }

    #[test]
    fn test_allows_when_fully_idle() {
        let (config, world) = setup();
        assert!(may_start_major_prank(
            &world,
            false,
            10.0,
            IDLE_SENTINEL_S,
            &config
        ));
    }

    #[test]
    fn test_refuses_during_intro() {
        let (config, mut world) = setup();
        world.intro_active = true;
        world.intro_until = 3.0;
        assert!(!may_start_major_prank(&world, false, 1.0, 99.0, &config));
        // Intro expired by time even if the flag was not cleared yet.
        assert!(may_start_major_prank(&world, false, 4.0, 99.0, &config));
    }

    #[test]
    fn test_refuses_while_dragging_or_prompt() {
        let (config, mut world) = setup();
        world.dragging = true;
        assert!(!may_start_major_prank(&world, false, 10.0, 99.0, &config));
        world.dragging = false;
        world.prompt_open = true;
        assert!(!may_start_major_prank(&world, false, 10.0, 99.0, &config));
    }

    #[test]
    fn test_refuses_in_scare_mode() {
        let (config, mut world) = setup();
        world.scary_mode = true;
        assert!(!may_start_major_prank(&world, false, 10.0, 99.0, &config));
    }

    #[test]
    fn test_refuses_when_another_prank_active() {
        let (config, world) = setup();
        assert!(!may_start_major_prank(&world, true, 10.0, 99.0, &config));
    }

    #[test]
    fn test_respect_input_grace() {
        let (config, world) = setup();
        assert!(!may_start_major_prank(&world, false, 10.0, 0.5, &config));
        assert!(may_start_major_prank(&world, false, 10.0, 1.3, &config));

        let config = config.respect_input(false);
        assert!(may_start_major_prank(&world, false, 10.0, 0.0, &config));
    }
}
