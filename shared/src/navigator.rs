use serde::{Deserialize, Serialize};

/// Selection and overlay toggle for a frame sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationState {
    pub selected_index: usize,
    pub show_overlay: bool,
}

impl Default for NavigationState {
    fn default() -> Self {
        Self {
            selected_index: 0,
            show_overlay: true,
        }
    }
}

/// Keeps `selected_index` inside `0..frame_count`. With no frames there is
/// no selection and every move is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameNavigator {
    frame_count: usize,
    state: NavigationState,
}

impl FrameNavigator {
    #[must_use]
    pub fn new(frame_count: usize) -> Self {
        Self {
            frame_count,
            state: NavigationState::default(),
        }
    }

    /// Switches to a new sequence. Selection goes back to the first frame
    /// and the overlay back on.
    pub fn load(&mut self, frame_count: usize) {
        *self = Self::new(frame_count);
    }

    pub fn reset(&mut self) {
        self.state = NavigationState::default();
    }

    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    #[must_use]
    pub fn state(&self) -> NavigationState {
        self.state
    }

    #[must_use]
    pub fn current(&self) -> Option<usize> {
        (self.frame_count > 0).then_some(self.state.selected_index)
    }

    #[must_use]
    pub fn show_overlay(&self) -> bool {
        self.state.show_overlay
    }

    #[must_use]
    pub fn can_prev(&self) -> bool {
        self.frame_count > 0 && self.state.selected_index > 0
    }

    #[must_use]
    pub fn can_next(&self) -> bool {
        self.frame_count > 0 && self.state.selected_index + 1 < self.frame_count
    }

    /// Returns whether the selection moved.
    pub fn next(&mut self) -> bool {
        if !self.can_next() {
            return false;
        }
        self.state.selected_index += 1;
        true
    }

    /// Returns whether the selection moved.
    pub fn prev(&mut self) -> bool {
        if !self.can_prev() {
            return false;
        }
        self.state.selected_index -= 1;
        true
    }

    /// Clamps `index` into range. Returns whether the selection moved.
    pub fn goto(&mut self, index: usize) -> bool {
        if self.frame_count == 0 {
            return false;
        }
        let target = index.min(self.frame_count - 1);
        let moved = target != self.state.selected_index;
        self.state.selected_index = target;
        moved
    }

    pub fn set_overlay(&mut self, enabled: bool) {
        self.state.show_overlay = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn walks_a_five_frame_sequence() {
        let mut nav = FrameNavigator::new(5);
        assert_eq!(nav.current(), Some(0));
        assert!(!nav.can_prev());

        assert!(nav.next());
        assert!(nav.next());
        assert_eq!(nav.current(), Some(2));

        assert!(nav.goto(4));
        assert!(!nav.next());
        assert_eq!(nav.current(), Some(4));

        assert!(!nav.goto(7));
        assert_eq!(nav.current(), Some(4));

        assert!(nav.prev());
        assert_eq!(nav.current(), Some(3));
    }

    #[test]
    fn goto_clamps_past_the_end() {
        let mut nav = FrameNavigator::new(3);
        assert!(nav.goto(99));
        assert_eq!(nav.current(), Some(2));
        assert!(!nav.goto(2));
    }

    #[test]
    fn three_frames_back_and_forth() {
        let mut nav = FrameNavigator::new(3);
        nav.goto(2);
        assert!(!nav.next());
        assert_eq!(nav.current(), Some(2));
        nav.prev();
        nav.prev();
        assert_eq!(nav.current(), Some(0));
        assert!(!nav.prev());
        assert_eq!(nav.current(), Some(0));
    }

    #[test]
    fn empty_sequence_has_no_selection() {
        let mut nav = FrameNavigator::new(0);
        assert_eq!(nav.current(), None);
        assert!(!nav.next());
        assert!(!nav.prev());
        assert!(!nav.goto(0));
        assert!(!nav.can_next());
        assert_eq!(nav.current(), None);
    }

    #[test]
    fn single_frame_cannot_move() {
        let mut nav = FrameNavigator::new(1);
        assert!(!nav.next());
        assert!(!nav.prev());
        assert_eq!(nav.current(), Some(0));
    }

    #[test]
    fn load_resets_selection_and_overlay() {
        let mut nav = FrameNavigator::new(5);
        nav.goto(3);
        nav.set_overlay(false);

        nav.load(2);
        assert_eq!(nav.current(), Some(0));
        assert!(nav.show_overlay());
        assert_eq!(nav.frame_count(), 2);
    }

    #[test]
    fn reset_returns_to_first_frame() {
        let mut nav = FrameNavigator::new(4);
        nav.goto(3);
        nav.set_overlay(false);
        nav.reset();
        assert_eq!(nav.state(), NavigationState::default());
        assert_eq!(nav.frame_count(), 4);
    }

    #[test]
    fn overlay_toggle_keeps_selection() {
        let mut nav = FrameNavigator::new(3);
        nav.goto(2);
        nav.set_overlay(false);
        assert_eq!(nav.current(), Some(2));
        assert!(!nav.show_overlay());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Next,
        Prev,
        Goto(usize),
        Overlay(bool),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Next),
            Just(Op::Prev),
            (0usize..20).prop_map(Op::Goto),
            any::<bool>().prop_map(Op::Overlay),
        ]
    }

    proptest! {
        #[test]
        fn next_n_times_reaches_last(count in 1usize..40) {
            let mut nav = FrameNavigator::new(count);
            for _ in 0..count {
                nav.next();
            }
            prop_assert_eq!(nav.current(), Some(count - 1));
        }

        #[test]
        fn selection_stays_in_range(count in 0usize..12, ops in prop::collection::vec(op(), 0..50)) {
            let mut nav = FrameNavigator::new(count);
            for op in ops {
                match op {
                    Op::Next => { nav.next(); }
                    Op::Prev => { nav.prev(); }
                    Op::Goto(i) => { nav.goto(i); }
                    Op::Overlay(on) => nav.set_overlay(on),
                }
                match nav.current() {
                    Some(i) => prop_assert!(i < count),
                    None => prop_assert_eq!(count, 0),
                }
            }
        }
    }
}
