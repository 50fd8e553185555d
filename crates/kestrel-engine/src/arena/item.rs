/// An arena slot. Deleting a slot drops its value but keeps the slot, so a
/// stale handle is detected instead of aliasing a newer item.
#[derive(Debug, Clone)]
pub struct Item<T> {
    pub(super) data: Option<T>,
}

#[bon::bon]
impl<T> Item<T> {
    #[builder]
    pub fn new(data: T) -> Self {
        Self { data: Some(data) }
    }
}

impl<T> Item<T> {
    pub fn deleted(&self) -> bool {
        self.data.is_none()
    }

    pub fn get(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub(super) fn get_mut(&mut self) -> Option<&mut T> {
        self.data.as_mut()
    }

    /// Move the value out, leaving a tombstone.
    pub(super) fn take(&mut self) -> Option<T> {
        self.data.take()
    }
}
