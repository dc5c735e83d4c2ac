//! Clock anchors and the affine real-to-virtual transform

use timewarp_core::{scale_delta, ClockDomain, Speed};

use crate::RealNow;

/// "At real time `real_base`, virtual time was `virtual_base`"
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Anchor {
    pub real_base: i64,
    pub virtual_base: i64,
}

impl Anchor {
    /// Anchor where virtual and real time coincide
    pub fn identity(real_now: i64) -> Self {
        Anchor {
            real_base: real_now,
            virtual_base: real_now,
        }
    }

    /// virtual = virtual_base + (real_now - real_base) * speed
    #[inline]
    pub fn project(&self, real_now: i64, speed: Speed) -> i64 {
        let delta = real_now.saturating_sub(self.real_base);
        self.virtual_base
            .saturating_add(scale_delta(delta, speed.get()))
    }
}

/// Anchors plus speed. The unit that must be read and written atomically.
/// INVARIANT: for every scaled domain d,
/// virtual(d) = anchor[d].virtual_base + (real(d) - anchor[d].real_base) * speed
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClockState {
    speed: Speed,
    anchors: [Anchor; 2],
    scale_wallclock: bool,
}

impl ClockState {
    /// Both anchors at the given readings, speed 1.0
    pub fn new(now: RealNow, scale_wallclock: bool) -> Self {
        ClockState {
            speed: Speed::ONE,
            anchors: [
                Anchor::identity(now.monotonic),
                Anchor::identity(now.wallclock),
            ],
            scale_wallclock,
        }
    }

    #[inline]
    pub fn speed(&self) -> Speed {
        self.speed
    }

    #[inline]
    pub fn anchor(&self, domain: ClockDomain) -> Anchor {
        self.anchors[domain.index()]
    }

    /// Whether reads of `domain` are transformed at all
    #[inline]
    pub fn is_scaled(&self, domain: ClockDomain) -> bool {
        match domain {
            ClockDomain::Monotonic => true,
            ClockDomain::WallClock => self.scale_wallclock,
        }
    }

    /// Virtual reading for a real reading. Unscaled domains pass through.
    ///
    /// A monotonic reading that predates the anchor (sampled just before a
    /// concurrent re-anchor) is pinned to the anchor so the domain never
    /// runs backwards.
    pub fn read_virtual(&self, domain: ClockDomain, real_now: i64) -> i64 {
        if !self.is_scaled(domain) {
            return real_now;
        }
        let anchor = self.anchor(domain);
        match domain {
            ClockDomain::Monotonic if real_now < anchor.real_base => anchor.virtual_base,
            _ => anchor.project(real_now, self.speed),
        }
    }

    /// Re-anchor every scaled domain at `now`, then switch to `new_speed`.
    /// Virtual time is continuous across the switch.
    pub fn rebase(&mut self, new_speed: Speed, now: RealNow) {
        for domain in ClockDomain::ALL {
            if !self.is_scaled(domain) {
                continue;
            }
            let real_now = now.get(domain);
            let virtual_now = self.read_virtual(domain, real_now);
            self.anchors[domain.index()] = Anchor {
                real_base: real_now,
                virtual_base: virtual_now,
            };
        }
        self.speed = new_speed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use timewarp_core::NANOS_PER_SEC;

    const DAY_NS: i64 = 86_400 * NANOS_PER_SEC;

    fn at(mono: i64, wall: i64) -> RealNow {
        RealNow {
            monotonic: mono,
            wallclock: wall,
        }
    }

    fn speed(v: f64) -> Speed {
        Speed::new(v).unwrap()
    }

    #[test]
    fn test_initial_state_is_identity() {
        let state = ClockState::new(at(5_000, 1_700_000_000 * NANOS_PER_SEC), true);
        assert_eq!(state.speed(), Speed::ONE);
        assert_eq!(state.read_virtual(ClockDomain::Monotonic, 9_000), 9_000);
    }

    #[test]
    fn test_rebase_is_continuous() {
        let mut state = ClockState::new(at(0, 0), false);
        state.rebase(speed(2.0), at(NANOS_PER_SEC, NANOS_PER_SEC));

        // 1s at 1x, then 1s at 2x
        assert_eq!(
            state.read_virtual(ClockDomain::Monotonic, 2 * NANOS_PER_SEC),
            3 * NANOS_PER_SEC
        );

        let before = state.read_virtual(ClockDomain::Monotonic, 5 * NANOS_PER_SEC);
        state.rebase(speed(0.25), at(5 * NANOS_PER_SEC, 5 * NANOS_PER_SEC));
        let after = state.read_virtual(ClockDomain::Monotonic, 5 * NANOS_PER_SEC);
        assert_eq!(before, after);
    }

    #[test]
    fn test_new_slope_is_not_retroactive() {
        let mut state = ClockState::new(at(0, 0), false);
        state.rebase(speed(2.5), at(10 * NANOS_PER_SEC, 0));
        assert_eq!(
            state.read_virtual(ClockDomain::Monotonic, 12 * NANOS_PER_SEC),
            10 * NANOS_PER_SEC + 5 * NANOS_PER_SEC
        );
    }

    #[test]
    fn test_freeze_holds_virtual_time() {
        let mut state = ClockState::new(at(0, 0), false);
        state.rebase(speed(3.0), at(NANOS_PER_SEC, 0));
        state.rebase(Speed::FROZEN, at(2 * NANOS_PER_SEC, 0));
        let frozen = 4 * NANOS_PER_SEC;
        for real in [2 * NANOS_PER_SEC, 3 * NANOS_PER_SEC, DAY_NS] {
            assert_eq!(state.read_virtual(ClockDomain::Monotonic, real), frozen);
        }

        state.rebase(Speed::ONE, at(DAY_NS, 0));
        assert_eq!(
            state.read_virtual(ClockDomain::Monotonic, DAY_NS + 7),
            frozen + 7
        );
    }

    #[test]
    fn test_wallclock_passthrough_when_disabled() {
        let wall = 1_700_000_000 * NANOS_PER_SEC;
        let mut state = ClockState::new(at(0, wall), false);
        state.rebase(speed(8.0), at(NANOS_PER_SEC, wall + NANOS_PER_SEC));

        assert!(!state.is_scaled(ClockDomain::WallClock));
        assert_eq!(state.anchor(ClockDomain::WallClock), Anchor::identity(wall));
        assert_eq!(
            state.read_virtual(ClockDomain::WallClock, wall + 2 * NANOS_PER_SEC),
            wall + 2 * NANOS_PER_SEC
        );
        assert_ne!(
            state.read_virtual(ClockDomain::Monotonic, 2 * NANOS_PER_SEC),
            2 * NANOS_PER_SEC
        );
    }

    #[test]
    fn test_wallclock_scaled_when_enabled() {
        let wall = 1_700_000_000 * NANOS_PER_SEC;
        let mut state = ClockState::new(at(0, wall), true);
        state.rebase(speed(2.0), at(0, wall));
        assert_eq!(
            state.read_virtual(ClockDomain::WallClock, wall + NANOS_PER_SEC),
            wall + 2 * NANOS_PER_SEC
        );
    }

    #[test]
    fn test_stale_monotonic_reading_pinned_to_anchor() {
        let mut state = ClockState::new(at(0, 0), false);
        state.rebase(speed(10.0), at(100, 100));
        let anchored = state.read_virtual(ClockDomain::Monotonic, 100);
        assert_eq!(state.read_virtual(ClockDomain::Monotonic, 90), anchored);
    }

    proptest! {
        #[test]
        fn prop_affine(
            base in 0i64..DAY_NS,
            delta in 0i64..(30 * DAY_NS),
            s in 0.001f64..64.0,
        ) {
            let mut state = ClockState::new(at(0, 0), false);
            state.rebase(speed(s), at(base, 0));
            let got = state.read_virtual(ClockDomain::Monotonic, base + delta);
            let expected = base as f64 + delta as f64 * s;
            let tolerance = 1.0 + expected.abs() * 1e-12;
            prop_assert!((got as f64 - expected).abs() <= tolerance);
        }

        #[test]
        fn prop_monotonic_between_rebases(
            mut reads in proptest::collection::vec(0i64..DAY_NS, 2..32),
            s in 0.0f64..100.0,
        ) {
            reads.sort_unstable();
            let mut state = ClockState::new(at(0, 0), false);
            state.rebase(speed(s), at(reads[0], 0));
            let mut last = i64::MIN;
            for real in reads {
                let v = state.read_virtual(ClockDomain::Monotonic, real);
                prop_assert!(v >= last);
                last = v;
            }
        }

        #[test]
        fn prop_continuity_across_any_change(
            t1 in 0i64..DAY_NS,
            step in 0i64..DAY_NS,
            s1 in 0.0f64..1000.0,
            s2 in 0.0f64..1000.0,
        ) {
            let mut state = ClockState::new(at(0, 0), false);
            state.rebase(speed(s1), at(t1, 0));
            let t2 = t1 + step;
            let before = state.read_virtual(ClockDomain::Monotonic, t2);
            state.rebase(speed(s2), at(t2, 0));
            prop_assert_eq!(state.read_virtual(ClockDomain::Monotonic, t2), before);
        }
    }
}
