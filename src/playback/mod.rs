/// A pausable audio preview rendered somewhere in a view.
pub trait PreviewControl {
    fn pause(&self);
}

/// Keeps at most one preview playing across the many controls a history
/// or feed view renders. Purely reactive: controls report `on_play` and
/// the coordinator pauses whichever control was recorded before, if any
/// and if different. A control resuming itself is not paused. There is no
/// forced stop on teardown; dropping the coordinator drops the record.
#[derive(Debug, Default)]
pub struct PlaybackCoordinator<C> {
    current: Option<C>,
}

impl<C: PreviewControl + PartialEq> PlaybackCoordinator<C> {
    pub fn new() -> Self {
        Self { current: None }
    }

    pub fn on_play(&mut self, control: C) {
        if let Some(current) = &self.current {
            if *current != control {
                current.pause();
            }
        }
        self.current = Some(control);
    }

    pub fn playing(&self) -> Option<&C> {
        self.current.as_ref()
    }
}
